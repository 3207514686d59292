use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label reported by [`FaceMatcher`] when no reference is close enough.
pub const UNKNOWN_LABEL: &str = "unknown";

/// What an unknown face is called in user-facing output.
pub const UNKNOWN_DISPLAY_LABEL: &str = "Unknown user";

/// Default Euclidean distance cutoff between a probe and a labeled reference.
///
/// Descriptors are L2-normalized, so `d² = 2 - 2·cos`; 1.1 corresponds to a
/// cosine similarity of about 0.40.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 1.1;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    /// Rescale the box (and its landmarks) by a uniform factor.
    ///
    /// Used to map detections from the decoded image onto the display size.
    pub fn scaled(&self, factor: f32) -> BoundingBox {
        BoundingBox {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
            confidence: self.confidence,
            landmarks: self
                .landmarks
                .map(|lms| lms.map(|(x, y)| (x * factor, y * factor))),
        }
    }
}

/// Face descriptor vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two descriptors.
    pub fn euclidean_distance(&self, other: &Descriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// All reference descriptors extracted for one employee.
#[derive(Debug, Clone)]
pub struct LabeledDescriptors {
    pub label: String,
    pub descriptors: Vec<Descriptor>,
}

impl LabeledDescriptors {
    pub fn new(label: impl Into<String>, descriptors: Vec<Descriptor>) -> Self {
        Self {
            label: label.into(),
            descriptors,
        }
    }

    /// Mean distance from `probe` to every reference of this label.
    fn mean_distance(&self, probe: &Descriptor) -> f32 {
        let total: f32 = self
            .descriptors
            .iter()
            .map(|d| d.euclidean_distance(probe))
            .sum();
        total / self.descriptors.len() as f32
    }
}

/// Result of matching one probe descriptor against the labeled references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Employee name, or [`UNKNOWN_LABEL`].
    pub label: String,
    pub distance: f32,
}

impl MatchResult {
    pub fn new(label: impl Into<String>, distance: f32) -> Self {
        Self {
            label: label.into(),
            distance,
        }
    }

    pub fn unknown(distance: f32) -> Self {
        Self::new(UNKNOWN_LABEL, distance)
    }

    pub fn is_unknown(&self) -> bool {
        self.label == UNKNOWN_LABEL
    }

    /// Human-readable label; the unknown sentinel becomes a placeholder.
    pub fn display_label(&self) -> &str {
        if self.is_unknown() {
            UNKNOWN_DISPLAY_LABEL
        } else {
            &self.label
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum MatcherError {
    #[error("matcher needs at least one labeled descriptor set")]
    Empty,
    #[error("label {0:?} has no reference descriptors")]
    EmptyLabel(String),
}

/// Nearest-label matcher over per-employee descriptor sets.
///
/// Built once after setup and never mutated. Every label is scored on each
/// lookup; the label with the smallest mean distance wins if that distance is
/// strictly below the threshold.
#[derive(Debug, Clone)]
pub struct FaceMatcher {
    labeled: Vec<LabeledDescriptors>,
    threshold: f32,
}

impl FaceMatcher {
    pub fn new(labeled: Vec<LabeledDescriptors>, threshold: f32) -> Result<Self, MatcherError> {
        if labeled.is_empty() {
            return Err(MatcherError::Empty);
        }
        if let Some(empty) = labeled.iter().find(|l| l.descriptors.is_empty()) {
            return Err(MatcherError::EmptyLabel(empty.label.clone()));
        }
        Ok(Self { labeled, threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labeled.iter().map(|l| l.label.as_str())
    }

    pub fn find_best_match(&self, probe: &Descriptor) -> MatchResult {
        let mut best_label = UNKNOWN_LABEL;
        let mut best_distance = f32::INFINITY;

        for set in &self.labeled {
            let distance = set.mean_distance(probe);
            if distance < best_distance {
                best_distance = distance;
                best_label = set.label.as_str();
            }
        }

        if best_distance < self.threshold {
            MatchResult::new(best_label, best_distance)
        } else {
            MatchResult::unknown(best_distance)
        }
    }
}
