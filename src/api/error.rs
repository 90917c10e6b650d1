use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::auth::credentials::StoreError;

/// Reason string the backend attaches to 401 responses.
///
/// Only `token.expired` and `token.invalid` are recoverable via the
/// refresh endpoint; anything else ends the session outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReason {
    TokenExpired,
    TokenInvalid,
    Other(String),
}

impl AuthReason {
    pub fn parse(message: &str) -> Self {
        match message {
            "token.expired" => AuthReason::TokenExpired,
            "token.invalid" => AuthReason::TokenInvalid,
            other => AuthReason::Other(other.to_string()),
        }
    }

    /// Whether this reason warrants a refresh attempt.
    pub fn is_refreshable(&self) -> bool {
        matches!(self, AuthReason::TokenExpired | AuthReason::TokenInvalid)
    }
}

/// Outcome of a failed refresh round-trip.
///
/// Cloneable so one failure can fan out to every request queued behind
/// the in-flight refresh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("refresh endpoint returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("network error during token refresh: {0}")]
    Transport(String),

    #[error("token refresh timed out after {0:?}")]
    TimedOut(Duration),

    #[error("token refresh abandoned before completing")]
    Abandoned,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {message}")]
    Unauthorized { reason: AuthReason, message: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Credential storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Pull the display message out of an error body, if the server sent one.
    pub fn extract_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .map(|e| e.message)
    }

    /// Map a non-2xx response to the matching error variant.
    pub fn from_response(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body)
            .unwrap_or_else(|| Self::truncate_body(body.trim()));
        let message = if message.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            message
        };

        if status.as_u16() == 401 {
            ApiError::Unauthorized {
                reason: AuthReason::parse(&message),
                message,
            }
        } else {
            ApiError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}
