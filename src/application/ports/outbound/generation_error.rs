//! Failure of an external generation call

/// Phrases that indicate the remote service rejected our credential
const AUTH_MARKERS: [&str; 7] = [
    "unauthorized",
    "forbidden",
    "invalid api key",
    "incorrect api key",
    "invalid_api_key",
    "authentication",
    "api key",
];

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty response body")]
    EmptyBody,
    #[error("generation did not finish: {0}")]
    Incomplete(String),
}

impl GenerationError {
    /// Whether this failure looks like a missing or rejected credential
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Api { status, .. } if *status == 401 || *status == 403 => true,
            other => looks_like_auth_failure(&other.to_string()),
        }
    }
}

/// Inspect a failure message for authorization-related phrasing
pub fn looks_like_auth_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    AUTH_MARKERS.iter().any(|marker| lower.contains(marker))
}
