use thiserror::Error;

/// Errors raised by the HTTP layer.
///
/// None of these escape the fetcher's retry loop on their own: a transport
/// error only counts as one failed attempt against the mirror budget.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to compress tile payload: {0}")]
    Compress(#[from] std::io::Error),
}

/// Terminal failure of one tile after every mirror was tried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFailure {
    /// HTTP status of the last attempt, `None` for a transport error.
    pub status: Option<u16>,
    pub url: String,
    /// Response headers or transport error text of the last attempt.
    pub detail: String,
}

impl std::fmt::Display for TileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {} from {}", status, self.url),
            None => write!(f, "no response from {}", self.url),
        }
    }
}
