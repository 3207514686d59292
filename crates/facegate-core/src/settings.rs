//! Reference-set settings: the `{ "numberOfFaces": N }` document.

use serde::Deserialize;
use std::num::NonZeroU32;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Reference images per employee, named `1.jpg` ..= `N.jpg`.
    pub number_of_faces: NonZeroU32,
}

impl Settings {
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reference image file names, in extraction order.
    pub fn reference_files(&self) -> impl Iterator<Item = String> {
        (1..=self.number_of_faces.get()).map(|i| format!("{i}.jpg"))
    }
}
