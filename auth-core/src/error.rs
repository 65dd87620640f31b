use thiserror::Error;

use crate::store::StoreError;

/// Flow-level error taxonomy. Client-facing kinds are deterministic and
/// non-retryable without changing input, except `RateLimited` which is
/// retryable after the stated delay. `Unauthorized` (no valid identity) and
/// `Forbidden` (valid identity, insufficient role) are never merged.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("email already registered")]
    DuplicateEmail,

    #[error("user not found")]
    NotFound,

    #[error("invalid verification code")]
    InvalidCode,

    #[error("verification code has expired")]
    Expired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account locked")]
    AccountLocked,

    #[error("email not verified")]
    EmailNotVerified,

    #[error("too many code requests, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    #[error("operation not permitted")]
    Forbidden,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AuthError::StoreUnavailable(msg),
            StoreError::NotFound => AuthError::NotFound,
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::InvalidInput(err.to_string())
    }
}
