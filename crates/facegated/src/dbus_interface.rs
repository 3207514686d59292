use crate::engine::{EngineHandle, FaceEngine};
use crate::gate::{self, Readiness};
use facegate_core::LoginCredentials;
use tokio::sync::watch;
use tracing::Instrument;
use zbus::interface;

pub const BUS_NAME: &str = "org.facegate.Gate1";
pub const OBJECT_PATH: &str = "/org/facegate/Gate1";

/// D-Bus interface for the facegate daemon.
///
/// Bus name: org.facegate.Gate1
/// Object path: /org/facegate/Gate1
pub struct GateService {
    readiness: watch::Receiver<Readiness<EngineHandle>>,
}

impl GateService {
    pub fn new(readiness: watch::Receiver<Readiness<EngineHandle>>) -> Self {
        Self { readiness }
    }
}

#[interface(name = "org.facegate.Gate1")]
impl GateService {
    /// Submit a photo with credentials. Returns the alert as JSON.
    ///
    /// An empty `image` means no photo was chosen.
    async fn login(&self, username: &str, password: &str, image: Vec<u8>) -> zbus::fdo::Result<String> {
        let submission_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("login", %submission_id, username, image_bytes = image.len());
        let readiness = self.readiness.borrow().clone();
        let credentials = LoginCredentials::new(username, password);

        let alert = gate::login(readiness, &credentials, Some(image.as_slice()))
            .instrument(span.clone())
            .await;
        span.in_scope(|| tracing::info!(kind = ?alert.kind, "login answered"));

        serde_json::to_string(&alert).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let readiness = self.readiness.borrow().clone();
        Ok(status_json(&readiness).to_string())
    }
}

/// `Status()` payload: version and state, plus the roster size and threshold
/// once ready, or the reason once failed.
fn status_json<E: FaceEngine>(readiness: &Readiness<E>) -> serde_json::Value {
    let mut status = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "state": readiness.label(),
    });
    match readiness {
        Readiness::Ready(gate) => {
            status["employees"] = gate.employee_count().into();
            status["threshold"] = gate.matcher().threshold().into();
        }
        Readiness::Failed(reason) => status["reason"] = reason.as_str().into(),
        Readiness::Loading => {}
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::gate::Gate;
    use facegate_core::{
        AccessPolicy, CredentialVerifier, Descriptor, EmployeeDirectory, EmployeeRecord, FaceMatcher,
        LabeledDescriptors, PlaintextVerifier, Role,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn ready() -> Readiness<FakeEngine> {
        let matcher = FaceMatcher::new(
            vec![LabeledDescriptors::new("Alice", vec![Descriptor::new(vec![1.0, 0.0])])],
            0.75,
        )
        .unwrap();
        let directory = EmployeeDirectory::new(vec![
            EmployeeRecord::new("Alice", "alice", Role::Admin, "alice", "pw1"),
            EmployeeRecord::new("Bob", "bob", Role::Employee, "bob", "pw2"),
        ])
        .unwrap();
        let verifier: Box<dyn CredentialVerifier> = Box::new(PlaintextVerifier);
        let gate = Gate::new(
            FakeEngine::default(),
            matcher,
            AccessPolicy::new(directory, verifier),
            300,
            Duration::from_secs(5),
        );
        Readiness::Ready(Arc::new(gate))
    }

    #[test]
    fn test_status_while_loading() {
        let status = status_json::<FakeEngine>(&Readiness::Loading);
        assert_eq!(status["state"], "loading");
        assert_eq!(status["version"], env!("CARGO_PKG_VERSION"));
        assert!(status.get("employees").is_none());
        assert!(status.get("reason").is_none());
    }

    #[test]
    fn test_status_when_ready() {
        let status = status_json(&ready());
        assert_eq!(status["state"], "ready");
        assert_eq!(status["employees"], 2);
        assert_eq!(status["threshold"], 0.75);
        assert!(status.get("reason").is_none());
    }

    #[test]
    fn test_status_after_failure() {
        let status = status_json::<FakeEngine>(&Readiness::Failed("models missing".into()));
        assert_eq!(status["state"], "failed");
        assert_eq!(status["reason"], "models missing");
        assert!(status.get("threshold").is_none());
    }
}
