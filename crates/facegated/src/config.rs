use facegate_core::DEFAULT_DISTANCE_THRESHOLD;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How stored employee passwords are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialScheme {
    Plaintext,
    Argon2,
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// JSON document holding `numberOfFaces`.
    pub settings_path: PathBuf,
    /// Root of the per-employee reference image folders.
    pub labeled_images_dir: PathBuf,
    /// Optional TOML roster; the built-in roster is used when unset.
    pub directory_path: Option<PathBuf>,
    pub credential_scheme: CredentialScheme,
    /// Euclidean distance below which a face is attributed to an employee.
    pub match_threshold: f32,
    /// Upper bound for every reference read and engine request.
    pub io_timeout_secs: u64,
    /// Side of the square box submitted photos are previewed in.
    pub display_max: u32,
    /// Serve on the system bus instead of the session bus.
    pub system_bus: bool,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            model_dir: var("FACEGATE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(facegate_core::default_model_dir),
            settings_path: var("FACEGATE_SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("settings/config.json")),
            labeled_images_dir: var("FACEGATE_LABELED_IMAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("labeled_images")),
            directory_path: var("FACEGATE_DIRECTORY_PATH").map(PathBuf::from),
            credential_scheme: match var("FACEGATE_CREDENTIAL_SCHEME").as_deref() {
                Some("argon2") => CredentialScheme::Argon2,
                _ => CredentialScheme::Plaintext,
            },
            match_threshold: parsed(&var, "FACEGATE_MATCH_THRESHOLD").unwrap_or(DEFAULT_DISTANCE_THRESHOLD),
            io_timeout_secs: parsed(&var, "FACEGATE_IO_TIMEOUT_SECS").unwrap_or(10),
            display_max: parsed(&var, "FACEGATE_DISPLAY_MAX").unwrap_or(300),
            system_bus: var("FACEGATE_SYSTEM_BUS").map(|v| v != "0").unwrap_or(false),
        }
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs.max(1))
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join(facegate_core::detector::SCRFD_MODEL_FILE)
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> PathBuf {
        self.model_dir.join(facegate_core::recognizer::ARCFACE_MODEL_FILE)
    }
}

fn parsed<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.parse().ok())
}
