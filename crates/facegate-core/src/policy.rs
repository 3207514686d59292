//! Access policy: recognition outcome + submitted credentials -> decision.
//!
//! Only administrators are let in, and only when the face in the photo
//! belongs to the same employee whose credentials were typed. The function is
//! pure over its inputs and the directory.

use crate::directory::{EmployeeDirectory, EmployeeRecord, Role};
use crate::types::MatchResult;
use argon2::password_hash::{self, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const STATUS_OK: u16 = 200;
pub const STATUS_UNAUTHORIZED: u16 = 401;

pub const MSG_NOT_FOUND: &str = "Access denied. User not found.";
pub const MSG_REQUIRES_ELEVATION: &str = "Access requires elevation.";
pub const MSG_INCORRECT_CREDENTIALS: &str = "Incorrect credentials.";

/// Username and password typed for one login attempt.
#[derive(Clone, Default)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub status: u16,
    pub message: String,
}

impl AccessDecision {
    fn granted(name: &str) -> Self {
        Self {
            status: STATUS_OK,
            message: format!("Access granted. Welcome, {name}!"),
        }
    }

    fn denied(message: &str) -> Self {
        Self {
            status: STATUS_UNAUTHORIZED,
            message: message.to_string(),
        }
    }

    pub fn is_granted(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// What recognition saw in the submitted photo.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceOutcome {
    Single(MatchResult),
    TooManyFaces(usize),
    NoFaceDetected,
}

impl FaceOutcome {
    /// Classify the ordered per-face match results of one image.
    pub fn from_results(results: &[MatchResult]) -> Self {
        match results {
            [] => FaceOutcome::NoFaceDetected,
            [single] => FaceOutcome::Single(single.clone()),
            many => FaceOutcome::TooManyFaces(many.len()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Please upload a photo with exactly one face (found {0}).")]
    MultipleFaces(usize),
}

/// Checks typed credentials against an employee record.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, record: &EmployeeRecord, username: &str, password: &str) -> bool;
}

impl<V: CredentialVerifier + ?Sized> CredentialVerifier for Box<V> {
    fn verify(&self, record: &EmployeeRecord, username: &str, password: &str) -> bool {
        (**self).verify(record, username, password)
    }
}

/// Exact, case-sensitive comparison against the stored plaintext password.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextVerifier;

impl CredentialVerifier for PlaintextVerifier {
    fn verify(&self, record: &EmployeeRecord, username: &str, password: &str) -> bool {
        record.username == username && record.password == password
    }
}

/// Verifies passwords stored as argon2 PHC strings
/// (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`).
///
/// Records whose password does not parse as a PHC string never verify.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedVerifier;

impl HashedVerifier {
    /// Produce a stored-password string for `password` with a fresh random salt.
    pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }
}

impl CredentialVerifier for HashedVerifier {
    fn verify(&self, record: &EmployeeRecord, username: &str, password: &str) -> bool {
        if record.username != username {
            return false;
        }
        let Ok(parsed) = PasswordHash::new(&record.password) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

/// The access policy bound to a directory and a credential verifier.
pub struct AccessPolicy<V = PlaintextVerifier> {
    directory: EmployeeDirectory,
    verifier: V,
}

impl AccessPolicy<PlaintextVerifier> {
    pub fn plaintext(directory: EmployeeDirectory) -> Self {
        Self::new(directory, PlaintextVerifier)
    }
}

impl<V: CredentialVerifier> AccessPolicy<V> {
    pub fn new(directory: EmployeeDirectory, verifier: V) -> Self {
        Self { directory, verifier }
    }

    pub fn directory(&self) -> &EmployeeDirectory {
        &self.directory
    }

    /// Decide one login attempt.
    ///
    /// More than one face is an input error and is rejected before any
    /// credential is looked at. No face at all is an ordinary "not found".
    pub fn decide(
        &self,
        credentials: &LoginCredentials,
        outcome: &FaceOutcome,
    ) -> Result<AccessDecision, PolicyError> {
        let result = match outcome {
            FaceOutcome::TooManyFaces(count) => return Err(PolicyError::MultipleFaces(*count)),
            FaceOutcome::NoFaceDetected => return Ok(AccessDecision::denied(MSG_NOT_FOUND)),
            FaceOutcome::Single(result) => result,
        };

        let employee = match self.directory.find(&result.label) {
            Some(employee) if !result.is_unknown() => employee,
            _ => return Ok(AccessDecision::denied(MSG_NOT_FOUND)),
        };

        if employee.role != Role::Admin {
            return Ok(AccessDecision::denied(MSG_REQUIRES_ELEVATION));
        }

        if self
            .verifier
            .verify(employee, &credentials.username, &credentials.password)
        {
            Ok(AccessDecision::granted(&employee.name))
        } else {
            Ok(AccessDecision::denied(MSG_INCORRECT_CREDENTIALS))
        }
    }

    /// [`decide`](Self::decide) over the raw ordered match results.
    pub fn decide_results(
        &self,
        credentials: &LoginCredentials,
        results: &[MatchResult],
    ) -> Result<AccessDecision, PolicyError> {
        self.decide(credentials, &FaceOutcome::from_results(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> EmployeeDirectory {
        EmployeeDirectory::new(vec![
            EmployeeRecord::new("Alice", "alice", Role::Admin, "alice", "pw1"),
            EmployeeRecord::new("Bob", "bob", Role::Employee, "bob", "pw2"),
        ])
        .unwrap()
    }

    fn policy() -> AccessPolicy {
        AccessPolicy::plaintext(directory())
    }

    fn face(label: &str) -> MatchResult {
        MatchResult::new(label, 0.3)
    }

    #[test]
    fn test_admin_with_matching_credentials_is_granted() {
        let decision = policy()
            .decide_results(&LoginCredentials::new("alice", "pw1"), &[face("Alice")])
            .unwrap();
        assert_eq!(decision.status, STATUS_OK);
        assert!(decision.message.contains("Alice"));
        assert!(decision.is_granted());
    }

    #[test]
    fn test_wrong_password_is_incorrect_credentials() {
        let decision = policy()
            .decide_results(&LoginCredentials::new("alice", "wrong"), &[face("Alice")])
            .unwrap();
        assert_eq!(decision, AccessDecision::denied(MSG_INCORRECT_CREDENTIALS));
    }

    #[test]
    fn test_credentials_are_case_sensitive() {
        let policy = policy();
        for (user, pass) in [("Alice", "pw1"), ("alice", "PW1"), ("alice ", "pw1"), ("", "")] {
            let decision = policy
                .decide_results(&LoginCredentials::new(user, pass), &[face("Alice")])
                .unwrap();
            assert_eq!(decision.status, STATUS_UNAUTHORIZED, "{user:?}/{pass:?}");
            assert_eq!(decision.message, MSG_INCORRECT_CREDENTIALS);
        }
    }

    #[test]
    fn test_credentials_of_another_employee_do_not_grant() {
        let decision = policy()
            .decide_results(&LoginCredentials::new("bob", "pw2"), &[face("Alice")])
            .unwrap();
        assert_eq!(decision.message, MSG_INCORRECT_CREDENTIALS);
    }

    #[test]
    fn test_unknown_face_is_not_found() {
        let policy = policy();
        for creds in [LoginCredentials::new("alice", "pw1"), LoginCredentials::default()] {
            let decision = policy.decide_results(&creds, &[MatchResult::unknown(0.8)]).unwrap();
            assert_eq!(decision.status, STATUS_UNAUTHORIZED);
            assert!(decision.message.contains("not found"));
        }
    }

    #[test]
    fn test_label_absent_from_directory_is_not_found() {
        let decision = policy()
            .decide_results(&LoginCredentials::new("alice", "pw1"), &[face("Mallory")])
            .unwrap();
        assert_eq!(decision.message, MSG_NOT_FOUND);
    }

    #[test]
    fn test_no_face_is_not_found() {
        let decision = policy()
            .decide_results(&LoginCredentials::new("alice", "pw1"), &[])
            .unwrap();
        assert_eq!(decision.message, MSG_NOT_FOUND);
    }

    #[test]
    fn test_non_admin_requires_elevation_even_with_exact_credentials() {
        let decision = policy()
            .decide_results(&LoginCredentials::new("bob", "pw2"), &[face("Bob")])
            .unwrap();
        assert_eq!(decision.status, STATUS_UNAUTHORIZED);
        assert_eq!(decision.message, MSG_REQUIRES_ELEVATION);
    }

    #[test]
    fn test_multiple_faces_rejected_regardless_of_credentials() {
        let policy = policy();
        for creds in [LoginCredentials::new("alice", "pw1"), LoginCredentials::new("x", "y")] {
            let err = policy
                .decide_results(&creds, &[face("Alice"), face("Bob")])
                .unwrap_err();
            assert_eq!(err, PolicyError::MultipleFaces(2));
        }
        let err = policy
            .decide_results(
                &LoginCredentials::default(),
                &[MatchResult::unknown(0.9), MatchResult::unknown(0.9), face("Alice")],
            )
            .unwrap_err();
        assert_eq!(err, PolicyError::MultipleFaces(3));
    }

    #[test]
    fn test_face_outcome_from_results() {
        assert_eq!(FaceOutcome::from_results(&[]), FaceOutcome::NoFaceDetected);
        assert_eq!(
            FaceOutcome::from_results(&[face("Alice")]),
            FaceOutcome::Single(face("Alice"))
        );
        assert_eq!(
            FaceOutcome::from_results(&[face("Alice"), face("Alice")]),
            FaceOutcome::TooManyFaces(2)
        );
    }

    #[test]
    fn test_hashed_verifier() {
        let stored = HashedVerifier::hash_password("pw1").unwrap();
        assert!(stored.starts_with("$argon2id$"), "{stored}");
        assert!(!stored.contains("pw1"));
        assert_ne!(stored, HashedVerifier::hash_password("pw1").unwrap());

        let record = EmployeeRecord::new("Alice", "alice", Role::Admin, "alice", stored);
        assert!(HashedVerifier.verify(&record, "alice", "pw1"));
        assert!(!HashedVerifier.verify(&record, "alice", "pw2"));
        assert!(!HashedVerifier.verify(&record, "ALICE", "pw1"));
    }

    #[test]
    fn test_hashed_verifier_rejects_non_phc_records() {
        let salted_sha = "sha256$d6a4$317e";
        for stored in ["pw1", "", salted_sha] {
            let record = EmployeeRecord::new("Alice", "alice", Role::Admin, "alice", stored);
            assert!(!HashedVerifier.verify(&record, "alice", "pw1"), "{stored:?}");
        }
    }

    #[test]
    fn test_policy_with_hashed_verifier() {
        let dir = EmployeeDirectory::new(vec![EmployeeRecord::new(
            "Alice",
            "alice",
            Role::Admin,
            "alice",
            HashedVerifier::hash_password("pw1").unwrap(),
        )])
        .unwrap();
        let policy = AccessPolicy::new(dir, HashedVerifier);
        let decision = policy
            .decide_results(&LoginCredentials::new("alice", "pw1"), &[face("Alice")])
            .unwrap();
        assert!(decision.is_granted());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let rendered = format!("{:?}", LoginCredentials::new("alice", "pw1"));
        assert!(!rendered.contains("pw1"));
    }
}
