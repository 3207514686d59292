//! The login gate: one submitted photo plus credentials -> one alert.

use crate::engine::{EngineError, FaceEngine};
use facegate_core::frame::FrameError;
use facegate_core::{
    AccessPolicy, Alert, AnnotatedFace, CredentialVerifier, FaceMatcher, Frame, LoginCredentials,
    PolicyError, Submission,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Please upload a photo to perform the face check.")]
    NoImage,
    #[error("Could not read the uploaded photo: {0}")]
    Decode(#[from] FrameError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("Face engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("Face check timed out after {0}s.")]
    Timeout(u64),
    #[error("Models are still loading. Try again shortly.")]
    Loading,
    #[error("Setup failed: {0}")]
    SetupFailed(String),
}

/// Immutable login context built once by setup.
pub struct Gate<E> {
    engine: E,
    matcher: FaceMatcher,
    policy: AccessPolicy<Box<dyn CredentialVerifier>>,
    display_max: u32,
    limit: Duration,
}

impl<E: FaceEngine> Gate<E> {
    pub fn new(
        engine: E,
        matcher: FaceMatcher,
        policy: AccessPolicy<Box<dyn CredentialVerifier>>,
        display_max: u32,
        limit: Duration,
    ) -> Self {
        Self {
            engine,
            matcher,
            policy,
            display_max,
            limit,
        }
    }

    pub fn matcher(&self) -> &FaceMatcher {
        &self.matcher
    }

    pub fn employee_count(&self) -> usize {
        self.policy.directory().len()
    }

    /// Run one login attempt end to end.
    pub async fn submit(
        &self,
        credentials: &LoginCredentials,
        image: Option<&[u8]>,
    ) -> Result<Submission, GateError> {
        let bytes = image.filter(|b| !b.is_empty()).ok_or(GateError::NoImage)?;
        let frame = Frame::decode(bytes)?;
        let display = frame.fit_within(self.display_max, self.display_max);

        let detected = timeout(self.limit, self.engine.detect_all(frame))
            .await
            .map_err(|_| GateError::Timeout(self.limit.as_secs()))??;

        let mut results = Vec::with_capacity(detected.len());
        let mut faces = Vec::with_capacity(detected.len());
        for face in &detected {
            let result = self.matcher.find_best_match(&face.descriptor);
            faces.push(AnnotatedFace {
                bbox: face.bbox.scaled(display.scale),
                label: result.display_label().to_string(),
                distance: result.distance,
            });
            results.push(result);
        }
        tracing::debug!(
            faces = faces.len(),
            labels = ?results.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(),
            "faces matched"
        );

        let decision = self.policy.decide_results(credentials, &results)?;
        Ok(Submission {
            decision,
            faces,
            display,
        })
    }
}

/// Setup progress as seen by the D-Bus service.
pub enum Readiness<E> {
    Loading,
    Ready(Arc<Gate<E>>),
    Failed(String),
}

impl<E> Clone for Readiness<E> {
    fn clone(&self) -> Self {
        match self {
            Readiness::Loading => Readiness::Loading,
            Readiness::Ready(gate) => Readiness::Ready(Arc::clone(gate)),
            Readiness::Failed(reason) => Readiness::Failed(reason.clone()),
        }
    }
}

impl<E> Readiness<E> {
    pub fn label(&self) -> &'static str {
        match self {
            Readiness::Loading => "loading",
            Readiness::Ready(_) => "ready",
            Readiness::Failed(_) => "failed",
        }
    }
}

/// Handle a login request in whatever state setup is in.
///
/// Produces exactly one alert per call.
pub async fn login<E: FaceEngine>(
    readiness: Readiness<E>,
    credentials: &LoginCredentials,
    image: Option<&[u8]>,
) -> Alert {
    let outcome = match readiness {
        Readiness::Loading => Err(GateError::Loading),
        Readiness::Failed(reason) => Err(GateError::SetupFailed(reason)),
        Readiness::Ready(gate) => gate.submit(credentials, image).await,
    };
    if let Err(e) = &outcome {
        tracing::info!(error = %e, "login attempt failed");
    }
    Alert::from_outcome(outcome)
}
