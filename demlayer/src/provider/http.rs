//! HTTP client abstraction for testability

use super::types::ProviderError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Asynchronous GET against an upstream raster service.
///
/// The cache builder is generic over this trait so tests can substitute a
/// mock that counts requests or fails on demand.
pub trait UpstreamClient: Send + Sync {
    /// Performs an HTTP GET and returns the full response body.
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, ProviderError>> + Send;
}

/// Default User-Agent sent to upstream services.
const DEFAULT_USER_AGENT: &str = concat!("demlayer/", env!("CARGO_PKG_VERSION"));

/// Upstream client backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
}

impl ReqwestUpstreamClient {
    /// Creates a client with a 30 second request timeout.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(30)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ProviderError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl UpstreamClient for ReqwestUpstreamClient {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        trace!(url = url, "Upstream GET starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "Upstream request failed"
                );
                if e.is_timeout() {
                    return Err(ProviderError::Timeout);
                }
                return Err(ProviderError::Http(format!("Request failed: {}", e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "Upstream error status");
            return Err(ProviderError::Status(status.as_u16()));
        }

        match response.bytes().await {
            Ok(bytes) => {
                debug!(url = url, bytes = bytes.len(), "Upstream response read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read upstream body");
                Err(ProviderError::Http(format!("Failed to read response: {}", e)))
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Mock upstream client returning a fixed response and counting calls
    #[derive(Clone)]
    pub struct MockUpstreamClient {
        pub response: Result<Vec<u8>, ProviderError>,
        pub calls: Arc<AtomicUsize>,
    }

    impl MockUpstreamClient {
        pub fn new(response: Result<Vec<u8>, ProviderError>) -> Self {
            Self {
                response,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl UpstreamClient for MockUpstreamClient {
        async fn get(&self, _url: &str) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_mock_client_success() {
        let mock = MockUpstreamClient::new(Ok(vec![1, 2, 3, 4]));

        let result = mock.get("http://example.com").await;
        assert_eq!(result, Ok(vec![1, 2, 3, 4]));
        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let mock = MockUpstreamClient::new(Err(ProviderError::Status(503)));

        let result = mock.get("http://example.com").await;
        assert_eq!(result, Err(ProviderError::Status(503)));
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestUpstreamClient::with_timeout(5).is_ok());
    }
}
