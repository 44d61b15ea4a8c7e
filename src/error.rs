use thiserror::Error;

use crate::metrics::ErrorType;

/// Failures surfaced by [`crate::client::ApiClient`].
#[derive(Error, Debug)]
pub enum ApiClientError {
    /// No HTTP response was obtained (connect, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The remote answered with a status other than 200.
    #[error("{}", format_api_error(.status, .reason, .body))]
    Api {
        status: u16,
        reason: String,
        body: Option<String>,
    },

    /// A 200 response whose body is not valid JSON.
    #[error("invalid JSON in response: {0}")]
    Decoding(#[source] serde_json::Error),

    #[error("failed to serialize request body: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn format_api_error(status: &u16, reason: &str, body: &Option<String>) -> String {
    match body {
        Some(body) => format!("{}: {}: {}", status, reason, body),
        None => format!("{}: {}", status, reason),
    }
}

impl ApiClientError {
    pub fn kind(&self) -> ErrorType {
        match self {
            ApiClientError::Transport(_) => ErrorType::Transport,
            ApiClientError::Api { .. } => ErrorType::Api,
            ApiClientError::Decoding(_) => ErrorType::Decoding,
            ApiClientError::Encoding(_) | ApiClientError::InvalidRequest(_) => ErrorType::Request,
        }
    }

    /// HTTP status reported by the remote, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
