//! Credential gate: shared-password check in constant time
//!
//! Both the reference secret and the submitted value are hashed with SHA-256
//! before comparison, so the comparison runs over equal-length digests and
//! neither content nor length of a matching prefix is observable in timing.
//!
//! There is no rate limiting or lockout.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Outcome of a password attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Password matched
    Granted,
    /// Password did not match
    Denied,
    /// Nothing was submitted; prompt again without an error
    Empty,
}

/// Holds the digest of the reference secret
#[derive(Clone)]
pub struct CredentialGate {
    digest: [u8; 32],
}

impl CredentialGate {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    /// Check a submitted password
    pub fn check(&self, submitted: &str) -> GateOutcome {
        if submitted.is_empty() {
            return GateOutcome::Empty;
        }
        if self.authenticate(submitted) {
            GateOutcome::Granted
        } else {
            GateOutcome::Denied
        }
    }

    /// Constant-time equality against the reference secret
    pub fn authenticate(&self, submitted: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(submitted.as_bytes()).into();
        candidate[..].ct_eq(&self.digest[..]).into()
    }
}

impl std::fmt::Debug for CredentialGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGate").finish_non_exhaustive()
    }
}
