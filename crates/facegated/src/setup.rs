//! Startup: load models, build the labeled reference set, construct the gate.

use crate::config::{Config, CredentialScheme};
use crate::engine::{self, EngineError, EngineHandle, FaceEngine};
use crate::gate::Gate;
use facegate_core::directory::DirectoryError;
use facegate_core::types::MatcherError;
use facegate_core::{
    AccessPolicy, CredentialVerifier, EmployeeDirectory, FaceMatcher, Frame, HashedVerifier,
    LabeledDescriptors, PlaintextVerifier, Settings,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to load settings from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },
    #[error("employee directory: {0}")]
    Directory(#[from] DirectoryError),
    #[error("model loading: {0}")]
    Engine(#[from] EngineError),
    #[error("reference image {path}: {reason}")]
    Reference { path: PathBuf, reason: String },
    #[error("reference image {path}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: EngineError,
    },
    #[error("matcher: {0}")]
    Matcher(#[from] MatcherError),
    #[error("{what} timed out after {secs}s")]
    Timeout { what: String, secs: u64 },
    #[error("setup task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Full startup sequence for the real ONNX engine.
pub async fn initialize(config: &Config) -> Result<Gate<EngineHandle>, SetupError> {
    let scrfd = config.scrfd_model_path();
    let arcface = config.arcface_model_path();
    tracing::info!(scrfd = %scrfd.display(), arcface = %arcface.display(), "loading models");
    let engine = tokio::task::spawn_blocking(move || engine::spawn_engine(&scrfd, &arcface)).await??;
    tracing::info!("models loaded");

    let directory = match &config.directory_path {
        Some(path) => EmployeeDirectory::load(path)?,
        None => EmployeeDirectory::builtin()?,
    };

    build_gate(engine, directory, config).await
}

/// Everything after model loading: settings, reference descriptors, matcher.
pub async fn build_gate<E: FaceEngine>(
    engine: E,
    directory: EmployeeDirectory,
    config: &Config,
) -> Result<Gate<E>, SetupError> {
    let limit = config.io_timeout();
    let settings = load_settings(&config.settings_path, limit).await?;
    tracing::info!(
        employees = directory.len(),
        number_of_faces = settings.number_of_faces.get(),
        "building labeled descriptors"
    );

    let labeled =
        load_labeled_descriptors(&engine, &directory, settings, &config.labeled_images_dir, limit).await?;
    let matcher = FaceMatcher::new(labeled, config.match_threshold)?;
    tracing::info!(threshold = matcher.threshold(), "face matcher ready");

    let verifier: Box<dyn CredentialVerifier> = match config.credential_scheme {
        CredentialScheme::Plaintext => Box::new(PlaintextVerifier),
        CredentialScheme::Argon2 => Box::new(HashedVerifier),
    };

    Ok(Gate::new(
        engine,
        matcher,
        AccessPolicy::new(directory, verifier),
        config.display_max,
        limit,
    ))
}

pub async fn load_settings(path: &Path, limit: Duration) -> Result<Settings, SetupError> {
    let config_load = |reason: String| SetupError::ConfigLoad {
        path: path.to_path_buf(),
        reason,
    };
    let raw = timeout(limit, tokio::fs::read_to_string(path))
        .await
        .map_err(|_| config_load(format!("timed out after {}s", limit.as_secs())))?
        .map_err(|e| config_load(e.to_string()))?;
    Settings::from_json(&raw).map_err(|e| config_load(e.to_string()))
}

/// One task per employee; inside a task the reference images are read and
/// described strictly in order `1..=N`. Results keep directory order.
async fn load_labeled_descriptors<E: FaceEngine>(
    engine: &E,
    directory: &EmployeeDirectory,
    settings: Settings,
    root: &Path,
    limit: Duration,
) -> Result<Vec<LabeledDescriptors>, SetupError> {
    let mut tasks = JoinSet::new();
    for (slot, employee) in directory.iter().enumerate() {
        let engine = engine.clone();
        let name = employee.name.clone();
        let folder = root.join(&employee.path);
        tasks.spawn(async move {
            let result = describe_employee(&engine, &name, &folder, settings, limit).await;
            (slot, result)
        });
    }

    let mut slots: Vec<Option<LabeledDescriptors>> = (0..directory.len()).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (slot, result) = joined?;
        // Returning early drops the JoinSet, which aborts the other employees.
        slots[slot] = Some(result?);
    }
    Ok(slots.into_iter().flatten().collect())
}

async fn describe_employee<E: FaceEngine>(
    engine: &E,
    name: &str,
    folder: &Path,
    settings: Settings,
    limit: Duration,
) -> Result<LabeledDescriptors, SetupError> {
    let mut descriptors = Vec::with_capacity(settings.number_of_faces.get() as usize);
    for file in settings.reference_files() {
        let path = folder.join(file);
        let timed_out = || SetupError::Timeout {
            what: format!("reference image {}", path.display()),
            secs: limit.as_secs(),
        };

        let bytes = timeout(limit, tokio::fs::read(&path))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| SetupError::Reference {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let frame = Frame::decode(&bytes).map_err(|e| SetupError::Reference {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let descriptor = timeout(limit, engine.describe_reference(frame))
            .await
            .map_err(|_| timed_out())?
            .map_err(|source| SetupError::Extraction {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(employee = name, path = %path.display(), "reference described");
        descriptors.push(descriptor);
    }
    Ok(LabeledDescriptors::new(name, descriptors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use facegate_core::{EmployeeRecord, Role};
    use image::{GrayImage, ImageFormat, Luma};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Writes `labeled/<folder>/<i>.jpg` tagged for [`FakeEngine`] plus the settings file.
    fn layout(number_of_faces: u32, employees: &[(&str, u8)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("settings")).unwrap();
        std::fs::write(
            dir.path().join("settings/config.json"),
            format!(r#"{{ "numberOfFaces": {number_of_faces} }}"#),
        )
        .unwrap();
        for (folder, employee) in employees {
            let folder = dir.path().join("labeled").join(folder);
            std::fs::create_dir_all(&folder).unwrap();
            for i in 1..=number_of_faces as u8 {
                // PNG content behind a .jpg name: the decoder sniffs the format.
                GrayImage::from_pixel(4, 4, Luma([employee * 16 + i]))
                    .save_with_format(folder.join(format!("{i}.jpg")), ImageFormat::Png)
                    .unwrap();
            }
        }
        dir
    }

    fn config_for(root: &Path) -> Config {
        let env: HashMap<&str, String> = HashMap::from([
            ("FACEGATE_SETTINGS_PATH", root.join("settings/config.json").display().to_string()),
            ("FACEGATE_LABELED_IMAGES_DIR", root.join("labeled").display().to_string()),
            ("FACEGATE_IO_TIMEOUT_SECS", "5".to_string()),
        ]);
        Config::from_lookup(|key| env.get(key).cloned())
    }

    fn two_employees() -> EmployeeDirectory {
        EmployeeDirectory::new(vec![
            EmployeeRecord::new("Alice", "alice", Role::Admin, "alice", "pw1"),
            EmployeeRecord::new("Bob", "bob", Role::Employee, "bob", "pw2"),
        ])
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_sequential_extractions_per_employee() {
        let root = layout(2, &[("alice", 1), ("bob", 2)]);
        let engine = FakeEngine::default();

        let gate = build_gate(engine.clone(), two_employees(), &config_for(root.path()))
            .await
            .unwrap();

        assert_eq!(engine.calls_for(1), vec![1, 2]);
        assert_eq!(engine.calls_for(2), vec![1, 2]);
        assert_eq!(engine.reference_calls.lock().unwrap().len(), 4);
        assert_eq!(*engine.max_in_flight_per_employee.lock().unwrap(), 1);
        assert_eq!(gate.matcher().labels().collect::<Vec<_>>(), vec!["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_missing_settings_is_config_load_error() {
        let root = layout(1, &[("alice", 1)]);
        std::fs::remove_file(root.path().join("settings/config.json")).unwrap();

        let err = build_gate(FakeEngine::default(), two_employees(), &config_for(root.path()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::ConfigLoad { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_zero_faces_is_config_load_error() {
        let root = layout(1, &[("alice", 1)]);
        std::fs::write(root.path().join("settings/config.json"), r#"{ "numberOfFaces": 0 }"#).unwrap();

        let err = load_settings(&root.path().join("settings/config.json"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::ConfigLoad { .. }));
    }

    #[tokio::test]
    async fn test_missing_reference_image_fails_setup() {
        // Bob's folder is never written.
        let root = layout(2, &[("alice", 1)]);

        let err = build_gate(FakeEngine::default(), two_employees(), &config_for(root.path()))
            .await
            .err()
            .unwrap();
        match err {
            SetupError::Reference { path, .. } => assert!(path.ends_with("bob/1.jpg"), "{}", path.display()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reference_without_face_fails_setup() {
        let root = layout(1, &[("alice", 1), ("bob", 2)]);
        let engine = FakeEngine {
            fail_references: true,
            ..FakeEngine::default()
        };

        let err = build_gate(engine, two_employees(), &config_for(root.path()))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SetupError::Extraction {
                source: EngineError::NoFaceDetected,
                ..
            }
        ));
    }
}
