//! Common error types for trackfeat

use thiserror::Error;

/// Common result type for trackfeat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by both provider clients and the resolver
///
/// Per-track errors (`NotFound`, `Transport`, `Format`) are recorded in the
/// owning `TrackResult` and never abort sibling tracks. `Auth` is the one
/// exception: it blocks all further calls on that provider and is raised to
/// the caller of the whole resolution.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller passed a missing/empty required argument; never retried and
    /// raised before any network call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Remote search or lookup yielded no match; terminal per track
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network/HTTP-layer failure, including non-2xx responses
    #[error("Transport error for {url} (status {status:?}): {message}")]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Response JSON missing the expected shape
    #[error("Malformed response: {0}")]
    Format(String),

    /// Credential exchange failure; fatal for further calls on the provider
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a `Transport` error from a reqwest failure on `url`
    pub fn transport(url: impl Into<String>, err: reqwest::Error) -> Self {
        Error::Transport {
            url: url.into(),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// Build a `Transport` error from a non-2xx status on `url`
    pub fn http_status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Error::Transport {
            url: url.into(),
            status: Some(status),
            message: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display_carries_url_and_status() {
        let err = Error::http_status("https://api.example.com/v1/track", 503, "unavailable");
        let text = err.to_string();
        assert!(text.contains("https://api.example.com/v1/track"));
        assert!(text.contains("503"));
    }

    #[test]
    fn test_validation_display() {
        let err = Error::Validation("artist name is required".into());
        assert_eq!(err.to_string(), "Invalid input: artist name is required");
    }
}
