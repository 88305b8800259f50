//! Production transport against a live choropleth backend.

use crate::error::EnvError;
use crate::transport::ChoroplethTransport;
use crate::types::{ChoroplethQuery, HttpResponse, CHOROPLETH_PATH};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport for the given backend base URL (no trailing path).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL of the choropleth endpoint.
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, CHOROPLETH_PATH)
    }
}

#[async_trait]
impl ChoroplethTransport for HttpTransport {
    async fn get(&self, query: &ChoroplethQuery) -> Result<HttpResponse, EnvError> {
        let url = self.url();
        debug!("GET {} ({})", url, query);

        let resp = self
            .client
            .get(&url)
            .query(&query.pairs())
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnvError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    EnvError::network(e.to_string())
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| EnvError::body(e.to_string()))?;
        Ok(HttpResponse::new(status, body))
    }

    fn endpoint(&self) -> String {
        self.url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let transport = HttpTransport::new("http://127.0.0.1:5020/");
        assert_eq!(transport.url(), "http://127.0.0.1:5020/api/map/choropleth");
        assert_eq!(transport.endpoint(), transport.url());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Port 9 (discard) is essentially never listening on loopback.
        let transport = HttpTransport::new("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let result = transport.get(&ChoroplethQuery::default()).await;
        assert!(matches!(
            result,
            Err(EnvError::NetworkError(_)) | Err(EnvError::Timeout(_))
        ));
    }
}
