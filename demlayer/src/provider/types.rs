//! Provider error types

use thiserror::Error;

/// Errors that can occur fetching from an upstream raster service.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Transport failure (connect, send, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Upstream answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Body shorter (or longer) than the requested raster
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    /// Request exceeded its deadline
    #[error("Request timed out")]
    Timeout,

    /// Upstream URL could not be built
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

impl ProviderError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::InvalidUrl(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::ShortRead {
            expected: 8,
            actual: 4
        }
        .is_retryable());
        assert!(!ProviderError::InvalidUrl("x".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ProviderError::ShortRead {
                expected: 8,
                actual: 4
            }
            .to_string(),
            "Short read: expected 8 bytes, got 4"
        );
    }
}
