//! Client configuration and credentials.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use megalist_core::{Error, Result, MAX_BATCH_SIZE};

/// Default Web API root.
pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplies a bearer credential for each request.
///
/// Session issuance lives outside this crate; implementations return the
/// current token or `None` when the user is signed out or the token expired.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// A fixed bearer token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

/// Settings shared by every request a client makes.
#[derive(Clone)]
pub struct ClientContext {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Items requested per page when listing tracks.
    pub page_size: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    tokens: Arc<dyn TokenProvider>,
}

impl ClientContext {
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: MAX_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
            tokens,
        }
    }

    /// Context authenticated with a fixed token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(Arc::new(StaticToken::new(token)))
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the page size, clamped to what the service accepts.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The current bearer token, or an authentication error.
    pub fn access_token(&self) -> Result<String> {
        self.tokens
            .access_token()
            .ok_or_else(|| Error::Authentication("no access token available".to_string()))
    }
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
