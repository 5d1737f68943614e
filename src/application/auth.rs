//! Shared-secret gate for mutating requests.

use axum::http::Method;
use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing credential header")]
    Missing,
    #[error("credential does not match")]
    Mismatch,
    #[error("no credential configured; mutations are disabled")]
    NotConfigured,
}

/// Compares a request header against the configured secret.
///
/// Reads (`GET`, `HEAD`) always pass. Every other method needs the header to
/// equal the secret byte for byte. Without a configured secret all
/// mutations are refused.
#[derive(Clone)]
pub struct AuthGuard {
    secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for AuthGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGuard")
            .field("configured", &self.secret.is_some())
            .finish()
    }
}

impl AuthGuard {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret
                .filter(|value| !value.is_empty())
                .map(String::into_bytes),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn requires_credential(method: &Method) -> bool {
        !matches!(*method, Method::GET | Method::HEAD)
    }

    pub fn check(&self, method: &Method, presented: Option<&[u8]>) -> Result<(), AuthError> {
        if !Self::requires_credential(method) {
            return Ok(());
        }

        let secret = self.secret.as_deref().ok_or(AuthError::NotConfigured)?;
        let presented = presented.ok_or(AuthError::Missing)?;

        // ct_eq on slices of different lengths is false without leaking content.
        if secret.ct_eq(presented).unwrap_u8() == 1 {
            Ok(())
        } else {
            Err(AuthError::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> AuthGuard {
        AuthGuard::new(Some("s3cret".to_string()))
    }

    #[test]
    fn reads_pass_without_credential() {
        assert_eq!(guard().check(&Method::GET, None), Ok(()));
        assert_eq!(guard().check(&Method::HEAD, None), Ok(()));
        assert_eq!(AuthGuard::new(None).check(&Method::GET, None), Ok(()));
    }

    #[test]
    fn mutations_require_exact_secret() {
        let guard = guard();
        assert_eq!(guard.check(&Method::PUT, Some(b"s3cret")), Ok(()));
        assert_eq!(guard.check(&Method::DELETE, Some(b"s3cret")), Ok(()));
        assert_eq!(
            guard.check(&Method::PUT, Some(b"s3cret ")),
            Err(AuthError::Mismatch)
        );
        assert_eq!(
            guard.check(&Method::PUT, Some(b"S3CRET")),
            Err(AuthError::Mismatch)
        );
        assert_eq!(guard.check(&Method::DELETE, None), Err(AuthError::Missing));
    }

    #[test]
    fn unconfigured_guard_refuses_mutations() {
        let guard = AuthGuard::new(Some(String::new()));
        assert!(!guard.is_configured());
        assert_eq!(
            guard.check(&Method::PUT, Some(b"")),
            Err(AuthError::NotConfigured)
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", guard());
        assert!(!rendered.contains("s3cret"));
    }
}
