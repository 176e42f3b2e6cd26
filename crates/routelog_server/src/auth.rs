//! Admin token check.
//!
//! Both tokens are hashed with SHA-256 before comparison, so the compare
//! always runs over 32 bytes whatever the presented length.

use crate::error::{ServerError, ServerResult};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Validates the admin token sent with admin requests.
#[derive(Clone)]
pub struct AdminGuard {
    expected: Option<[u8; 32]>,
}

impl std::fmt::Debug for AdminGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGuard")
            .field("enabled", &self.expected.is_some())
            .finish()
    }
}

impl AdminGuard {
    /// Creates a guard. With no token configured every request is refused.
    pub fn new(token: Option<&str>) -> Self {
        Self {
            expected: token.filter(|t| !t.is_empty()).map(digest),
        }
    }

    /// Checks a presented token.
    pub fn verify(&self, presented: Option<&str>) -> ServerResult<()> {
        let Some(expected) = &self.expected else {
            return Err(unauthorized());
        };
        let presented = digest(presented.unwrap_or_default());
        if bool::from(expected[..].ct_eq(&presented[..])) {
            Ok(())
        } else {
            Err(unauthorized())
        }
    }
}

fn unauthorized() -> ServerError {
    ServerError::NotAuthorized("Unauthorized".into())
}

fn digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_token() {
        let guard = AdminGuard::new(Some("s3cret"));
        assert!(guard.verify(Some("s3cret")).is_ok());
    }

    #[test]
    fn rejects_wrong_or_missing_token() {
        let guard = AdminGuard::new(Some("s3cret"));
        assert!(guard.verify(Some("s3cre")).is_err());
        assert!(guard.verify(Some("")).is_err());
        assert!(guard.verify(None).is_err());
    }

    #[test]
    fn disabled_guard_rejects_everything() {
        let guard = AdminGuard::new(None);
        assert!(guard.verify(Some("")).is_err());
        assert!(guard.verify(None).is_err());
        assert!(AdminGuard::new(Some("")).verify(Some("")).is_err());
    }

    #[test]
    fn digests_differing_in_one_byte_are_rejected() {
        let guard = AdminGuard::new(Some("token-a"));
        assert!(guard.verify(Some("token-b")).is_err());
        assert!(guard.verify(Some("token-a ")).is_err());
        assert!(guard.verify(Some("token-a")).is_ok());
    }

    #[test]
    fn debug_hides_token() {
        let shown = format!("{:?}", AdminGuard::new(Some("s3cret")));
        assert!(!shown.contains("s3cret"));
    }
}
