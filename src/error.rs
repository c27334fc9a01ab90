use crate::infrastructure::error::{ApiError, CacheError, CredentialError};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Pagination stalled: server repeated cursor {cursor:?}")]
    PaginationStalled { cursor: Option<String> },

    #[error("OAuth state mismatch; the authorization response was not for this request")]
    InvalidState,

    #[error("No account signed in")]
    NoAccount,

    #[error("OAuth is not configured; set GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET")]
    OAuthNotConfigured,
}

impl Error {
    /// `Some(reset_at)` when the server is rate limiting us
    pub fn is_rate_limited(&self) -> Option<Option<DateTime<Utc>>> {
        match self {
            Error::Api(ApiError::RateLimitExceeded { reset_at }) => Some(*reset_at),
            _ => None,
        }
    }

    /// The stored token is missing or no longer accepted
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Error::Api(ApiError::Unauthorized)
                | Error::Credential(CredentialError::NotFound { .. })
                | Error::NoAccount
        )
    }

    /// Transient failures where a manual "try again" is worthwhile
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Api(
                ApiError::NoConnection
                    | ApiError::Timeout
                    | ApiError::ServerError { .. }
                    | ApiError::RateLimitExceeded { .. }
            ) | Error::PaginationStalled { .. }
        )
    }
}
