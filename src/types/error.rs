//! Error types for Turnstile
//!
//! `AuthError` is the classified failure of the trust core (keys, tokens,
//! passwords, credential transport). `TurnstileError` is the crate-wide error
//! that every failure is eventually reported through, with an HTTP status
//! attached.

use hyper::StatusCode;

/// Classified failures of key loading, token verification and password checks.
///
/// Every verification path returns one of these instead of a boolean so
/// callers can tell an expired session from a forged one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Key material could not be parsed or is not an RSA key. Startup only.
    #[error("Key format error: {0}")]
    KeyFormat(String),

    /// Token envelope is unparseable or uses an algorithm other than RS256.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Token is expired")]
    TokenExpired,

    /// `nbf` or `iat` lies in the future.
    #[error("Token is not valid yet")]
    TokenNotYetValid,

    #[error("Missing {0} claim")]
    MissingClaim(&'static str),

    #[error("Failed expectation: {0}")]
    ExpectationFailed(String),

    /// Wrong password or unusable stored hash. Deliberately undifferentiated.
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Authorization credential is not found")]
    CredentialNotFound,

    #[error("Authorization header is not in Bearer scheme")]
    MalformedAuthorization,

    #[error("Unsupported authorization scheme {0}")]
    UnsupportedScheme(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),

    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl AuthError {
    /// True for the one failure callers usually treat as "log in again".
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::KeyFormat(_) | Self::Signing(_) | Self::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// A candidate password that fails the strength policy, with every reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Password is invalid: {}", .reasons.join(", "))]
pub struct PasswordPolicyError {
    pub reasons: Vec<&'static str>,
}

/// Main error type for Turnstile operations
#[derive(Debug, thiserror::Error)]
pub enum TurnstileError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The request deadline elapsed before its work reported an outcome.
    #[error("Service is unavailable or timed out")]
    DeadlineExceeded,

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl TurnstileError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Self::Auth(e) => e.status_code(),
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<PasswordPolicyError> for TurnstileError {
    fn from(err: PasswordPolicyError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<std::io::Error> for TurnstileError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for TurnstileError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

/// Result type alias for Turnstile operations
pub type Result<T> = std::result::Result<T, TurnstileError>;
