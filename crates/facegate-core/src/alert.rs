//! The single user-visible result of a login attempt.
//!
//! Whatever happens during a submission — a decision or an error — is folded
//! into exactly one [`Alert`], which travels to the client as JSON.

use crate::frame::DisplaySize;
use crate::policy::{AccessDecision, STATUS_OK};
use crate::types::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Success,
    Warning,
    Error,
}

impl AlertKind {
    pub fn icon(self) -> &'static str {
        match self {
            AlertKind::Success => "✔",
            AlertKind::Warning => "⚠",
            AlertKind::Error => "✖",
        }
    }
}

/// A recognized face as drawn over the preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedFace {
    /// Box in display coordinates.
    pub bbox: BoundingBox,
    /// Employee name, or the placeholder for unknown faces.
    pub label: String,
    pub distance: f32,
}

/// Everything a completed submission produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub decision: AccessDecision,
    pub faces: Vec<AnnotatedFace>,
    pub display: DisplaySize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub faces: Vec<AnnotatedFace>,
    #[serde(default)]
    pub display: Option<DisplaySize>,
}

impl Alert {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: AlertKind::Error,
            title: "Error".into(),
            text: text.into(),
            faces: Vec::new(),
            display: None,
        }
    }

    pub fn from_submission(submission: Submission) -> Self {
        let (kind, title) = if submission.decision.status == STATUS_OK {
            (AlertKind::Success, "Success!")
        } else {
            (AlertKind::Warning, "Attention!")
        };
        Self {
            kind,
            title: title.into(),
            text: submission.decision.message,
            faces: submission.faces,
            display: Some(submission.display),
        }
    }

    /// Fold the outcome of one submission into its alert.
    pub fn from_outcome<E: fmt::Display>(outcome: Result<Submission, E>) -> Self {
        match outcome {
            Ok(submission) => Self::from_submission(submission),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind.icon(), self.title, self.text)
    }
}
