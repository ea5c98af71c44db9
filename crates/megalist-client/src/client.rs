//! Web API client implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use megalist_core::{Error, HttpError, Result};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::context::ClientContext;
use crate::parser::parse_error_message;

/// Back-off applied when a 429 carries no `Retry-After`.
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(30);

/// Playlist service client.
///
/// Requests are never retried. A 429 response blocks further requests until
/// the advertised `Retry-After` has passed; calls made while blocked fail
/// with [`Error::RateLimited`] without reaching the network.
#[derive(Clone)]
pub struct PlaylistClient {
    /// HTTP client for making requests.
    http: reqwest::Client,
    /// Client context for requests.
    pub(crate) context: ClientContext,
    /// Rate limiter state.
    rate_limit_state: Arc<RwLock<RateLimitState>>,
}

#[derive(Debug, Default)]
struct RateLimitState {
    /// Time when we can make requests again (if rate limited).
    blocked_until: Option<Instant>,
}

impl RateLimitState {
    fn is_blocked(&self) -> bool {
        self.blocked_until.is_some_and(|until| Instant::now() < until)
    }

    fn block_for(&mut self, duration: Duration) {
        self.blocked_until = Some(Instant::now() + duration);
    }

    fn remaining_secs(&self) -> Option<u64> {
        self.blocked_until
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs())
    }
}

impl PlaylistClient {
    /// Create a new client with the given context.
    pub fn new(context: ClientContext) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("megalist/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(context.timeout)
            .pool_max_idle_per_host(10)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            context,
            rate_limit_state: Arc::new(RwLock::new(RateLimitState::default())),
        })
    }

    /// Create a client authenticated with a fixed token.
    pub fn with_token(token: impl Into<String>) -> Result<Self> {
        Self::new(ClientContext::with_token(token))
    }

    /// The context this client was built with.
    pub const fn context(&self) -> &ClientContext {
        &self.context
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.context.base_url)
            .map_err(|e| HttpError::InvalidUrl(format!("{}: {e}", self.context.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| HttpError::InvalidUrl(self.context.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET and decode a JSON response.
    pub(crate) async fn get<R: DeserializeOwned>(&self, url: Url) -> Result<R> {
        let bytes = self.execute(Method::GET, url, None).await?;
        decode(&bytes)
    }

    /// Send a JSON body and return the raw response bytes.
    pub(crate) async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &T,
    ) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(body)?;
        self.execute(method, url, Some(body)).await
    }

    /// Send a request without a body and return the raw response bytes.
    pub(crate) async fn send_empty(&self, method: Method, url: Url) -> Result<Vec<u8>> {
        self.execute(method, url, None).await
    }

    async fn execute(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> Result<Vec<u8>> {
        let token = self.context.access_token()?;

        {
            let state = self.rate_limit_state.read();
            if state.is_blocked() {
                return Err(Error::RateLimited {
                    retry_after_secs: state.remaining_secs(),
                });
            }
        }

        debug!("{method} {url}");

        let mut request = self.http.request(method.clone(), url.clone()).bearer_auth(token);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Http(HttpError::Timeout)
            } else if e.is_connect() {
                Error::Http(HttpError::ConnectionFailed(e.to_string()))
            } else {
                Error::Network(e.to_string())
            }
        })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after: Option<u64> = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok());

            warn!("Rate limited on {method} {url}, retry after {retry_after:?}s");
            self.rate_limit_state.write().block_for(
                retry_after.map_or(DEFAULT_RATE_LIMIT_BACKOFF, Duration::from_secs),
            );

            return Err(Error::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            let message = parse_error_message(&response.text().await.unwrap_or_default());

            if status == StatusCode::UNAUTHORIZED {
                return Err(Error::Authentication(message));
            }

            return Err(Error::Http(HttpError::StatusError {
                status: status.as_u16(),
                message,
            }));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))
    }
}

/// Decode a JSON response body.
pub(crate) fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::ParseError(format!("Failed to parse response: {e}")))
}
