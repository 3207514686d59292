//! facegate-core — photo-and-password login building blocks.
//!
//! SCRFD face detection and ArcFace descriptors via ONNX Runtime, a
//! nearest-label matcher, the employee directory, and the access policy that
//! turns a recognized face plus typed credentials into a decision.

pub mod alert;
pub mod alignment;
pub mod detector;
pub mod directory;
pub mod frame;
pub mod policy;
pub mod recognizer;
pub mod settings;
pub mod types;

pub use alert::{Alert, AlertKind, AnnotatedFace, Submission};
pub use detector::FaceDetector;
pub use directory::{EmployeeDirectory, EmployeeRecord, Role};
pub use frame::{DisplaySize, Frame};
pub use policy::{
    AccessDecision, AccessPolicy, CredentialVerifier, FaceOutcome, HashedVerifier, LoginCredentials,
    PlaintextVerifier, PolicyError,
};
pub use recognizer::FaceRecognizer;
pub use settings::Settings;
pub use types::{
    BoundingBox, Descriptor, FaceMatcher, LabeledDescriptors, MatchResult, DEFAULT_DISTANCE_THRESHOLD,
    UNKNOWN_DISPLAY_LABEL, UNKNOWN_LABEL,
};

use std::path::PathBuf;

/// Where model files live when nothing else is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/facegate/models")
}
