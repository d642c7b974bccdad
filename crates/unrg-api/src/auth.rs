//! Bearer token gate for the `/api` tree.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingHeader,
    InvalidFormat,
    InvalidToken,
}

impl AuthRejection {
    /// Client-facing message.
    pub fn message(&self) -> &'static str {
        match self {
            AuthRejection::MissingHeader => "Authorization header required",
            AuthRejection::InvalidFormat => "Invalid authorization format",
            AuthRejection::InvalidToken => "Invalid token",
        }
    }

    /// Metrics label.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthRejection::MissingHeader => "missing",
            AuthRejection::InvalidFormat => "format",
            AuthRejection::InvalidToken => "token",
        }
    }
}

/// Compares presented tokens against the configured secret.
///
/// Both sides go through HMAC-SHA256 under a per-process random key and the
/// tags are compared with `verify_slice`, which runs in constant time.
#[derive(Clone)]
pub struct TokenVerifier {
    key: [u8; 16],
    expected: Vec<u8>,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let key = *Uuid::new_v4().as_bytes();
        // An empty tag never verifies.
        let expected = tag(&key, secret.as_bytes()).unwrap_or_default();
        Self { key, expected }
    }

    pub fn verify(&self, presented: &str) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(presented.as_bytes());
        mac.verify_slice(&self.expected).is_ok()
    }

    /// Decide a request from its `Authorization` header.
    pub fn check(&self, header: Option<&HeaderValue>) -> Result<(), AuthRejection> {
        let header = header.ok_or(AuthRejection::MissingHeader)?;
        let header = header.to_str().map_err(|_| AuthRejection::InvalidFormat)?;
        let token = bearer_token(header).ok_or(AuthRejection::InvalidFormat)?;

        if self.verify(token) {
            Ok(())
        } else {
            Err(AuthRejection::InvalidToken)
        }
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier").finish_non_exhaustive()
    }
}

fn tag(key: &[u8], value: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(value);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Extract `<value>` from a header of the exact form `Bearer <value>`.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, value) = header.split_once(' ')?;
    if scheme != "Bearer" || value.contains(' ') {
        return None;
    }
    Some(value)
}

/// Middleware rejecting unauthenticated requests before any handler runs.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    match state.verifier.check(request.headers().get(header::AUTHORIZATION)) {
        Ok(()) => {
            debug!(path = %request.uri().path(), "Request authorized");
            Ok(next.run(request).await)
        }
        Err(rejection) => {
            warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = rejection.reason(),
                "Rejected unauthenticated request"
            );
            metrics::record_auth_rejection(rejection.reason());
            Err(ApiError::unauthorized(rejection.message()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(value: &str) -> HeaderValue {
        HeaderValue::from_str(value).unwrap()
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), Some(""));
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("bearer abc"), None);
        assert_eq!(bearer_token("Token abc"), None);
        assert_eq!(bearer_token("Bearer abc def"), None);
        assert_eq!(bearer_token("Bearer  abc"), None);
    }

    #[test]
    fn test_verify() {
        let verifier = TokenVerifier::new("s3cret");
        assert!(verifier.verify("s3cret"));
        assert!(!verifier.verify("s3cre"));
        assert!(!verifier.verify("s3cret "));
        assert!(!verifier.verify(""));
    }

    #[test]
    fn test_check_rejections() {
        let verifier = TokenVerifier::new("s3cret");

        assert_eq!(verifier.check(None), Err(AuthRejection::MissingHeader));
        assert_eq!(
            verifier.check(Some(&header("s3cret"))),
            Err(AuthRejection::InvalidFormat)
        );
        assert_eq!(
            verifier.check(Some(&header("Basic s3cret"))),
            Err(AuthRejection::InvalidFormat)
        );
        assert_eq!(
            verifier.check(Some(&header("Bearer wrong"))),
            Err(AuthRejection::InvalidToken)
        );
        assert_eq!(verifier.check(Some(&header("Bearer s3cret"))), Ok(()));
    }

    #[test]
    fn test_verifiers_are_independent() {
        let a = TokenVerifier::new("one");
        let b = TokenVerifier::new("two");
        assert!(a.verify("one"));
        assert!(!b.verify("one"));
    }

    #[test]
    fn test_debug_hides_secret_material() {
        let verifier = TokenVerifier::new("s3cret");
        assert_eq!(format!("{:?}", verifier), "TokenVerifier { .. }");
    }
}
