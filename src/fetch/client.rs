//! HTTP collaborator used by the fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::error::FetchError;

/// Browser-like User-Agent; some tile services reject non-browser clients.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:136.0) Gecko/20100101 Firefox/136.0";

/// Status and payload of one GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileResponse {
    pub status: u16,
    /// Body bytes; only read for successful responses.
    pub body: Vec<u8>,
    /// Response headers rendered for diagnostics.
    pub headers: String,
}

/// A single synchronous-looking GET. Object-safe so the crawler can be
/// driven by scripted clients in tests.
#[async_trait]
pub trait TileClient: Send + Sync {
    async fn get(&self, url: &str, headers: &[(String, String)])
        -> Result<TileResponse, FetchError>;
}

#[async_trait]
impl<T: TileClient + ?Sized> TileClient for std::sync::Arc<T> {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TileResponse, FetchError> {
        (**self).get(url, headers).await
    }
}

/// reqwest-backed client with a fixed User-Agent and request timeout.
#[derive(Debug, Clone)]
pub struct HttpTileClient {
    client: reqwest::Client,
}

impl HttpTileClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(30)))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TileClient for HttpTileClient {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TileResponse, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let rendered_headers = format!("{:?}", response.headers());

        let body = if status == StatusCode::OK {
            response.bytes().await.map_err(transport)?.to_vec()
        } else {
            Vec::new()
        };

        tracing::trace!(status = status.as_u16(), bytes = body.len(), %url, "GET");

        Ok(TileResponse {
            status: status.as_u16(),
            body,
            headers: rendered_headers,
        })
    }
}
