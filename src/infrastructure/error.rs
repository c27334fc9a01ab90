//! Error types for the API client, credential store and cache.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures talking to the GitHub API, classified from the HTTP exchange.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication required. Please sign in again")]
    Unauthorized,

    #[error("{}", rate_limit_message(.reset_at))]
    RateLimitExceeded { reset_at: Option<DateTime<Utc>> },

    #[error("Resource not found")]
    NotFound,

    #[error("Server error ({status}). Please try again later")]
    ServerError { status: u16 },

    #[error("No internet connection. Please check your network")]
    NoConnection,

    #[error("Request timed out. Please try again")]
    Timeout,

    #[error("Failed to decode response: {0}")]
    DecodingFailed(String),

    #[error("{}", .0.join("\n"))]
    GraphQl(Vec<String>),

    #[error("No data received from server")]
    NoData,

    #[error("{}", http_message(.status, .message))]
    Http {
        status: u16,
        message: Option<String>,
    },

    #[error("An unexpected error occurred: {0}")]
    Unknown(String),
}

fn rate_limit_message(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(reset_at) => format!("Rate limit exceeded. Resets at {}", reset_at.to_rfc3339()),
        None => "Rate limit exceeded. Please try again later".to_string(),
    }
}

fn http_message(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("HTTP error with status code {}", status),
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_connect() {
            ApiError::NoConnection
        } else if e.is_builder() {
            ApiError::InvalidRequest(e.to_string())
        } else if e.is_decode() {
            ApiError::DecodingFailed(e.to_string())
        } else {
            ApiError::Unknown(e.to_string())
        }
    }
}

/// Keeps the JSON path of the field that failed, e.g.
/// `viewer.pullRequests.nodes[0].number: missing field`
impl From<serde_path_to_error::Error<serde_json::Error>> for ApiError {
    fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = e.path().to_string();
        ApiError::DecodingFailed(format!("{path}: {}", e.into_inner()))
    }
}

/// Failures reading or writing stored tokens.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credential stored for account '{account}'")]
    NotFound { account: String },

    #[error("Credential store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential store is corrupt: {0}")]
    Corrupt(String),
}

/// Failures reading or writing the local cache database.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache is corrupt: {0}")]
    Corrupt(String),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_message_with_and_without_reset() {
        let reset_at = DateTime::from_timestamp(1_700_000_000, 0);
        let with_reset = ApiError::RateLimitExceeded { reset_at };
        assert!(with_reset.to_string().contains("2023-11-14T22:13:20"));

        let without = ApiError::RateLimitExceeded { reset_at: None };
        assert_eq!(
            without.to_string(),
            "Rate limit exceeded. Please try again later"
        );
    }

    #[test]
    fn test_http_error_prefers_server_message() {
        let with_message = ApiError::Http {
            status: 422,
            message: Some("Validation Failed".to_string()),
        };
        assert_eq!(with_message.to_string(), "Validation Failed");

        let bare = ApiError::Http {
            status: 418,
            message: None,
        };
        assert_eq!(bare.to_string(), "HTTP error with status code 418");
    }

    #[test]
    fn test_graphql_errors_joined() {
        let err = ApiError::GraphQl(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(err.to_string(), "first\nsecond");
    }
}
