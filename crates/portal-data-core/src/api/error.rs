use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for server-supplied error messages
const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a server message to avoid logging excessive data
    fn truncate_message(message: &str) -> String {
        if message.len() <= MAX_ERROR_MESSAGE_LENGTH {
            return message.to_string();
        }
        let mut end = MAX_ERROR_MESSAGE_LENGTH;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &message[..end],
            message.len()
        )
    }

    /// Build a `RequestFailed` from a non-success status and the parsed body.
    ///
    /// Uses the body's `error` string when the server sent one.
    pub fn from_status(status: u16, payload: &Value) -> Self {
        let message = match payload.get("error").and_then(Value::as_str) {
            Some(message) if !message.is_empty() => Self::truncate_message(message),
            _ => format!("Request failed: {}", status),
        };
        ApiError::RequestFailed { status, message }
    }

    /// HTTP status when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RequestFailed { status, .. } => Some(*status),
            ApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the transport itself failed and no response was received.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Transport(_))
    }
}
