//! Network transport between orchestration and HTTP

use std::time::Duration;

use async_trait::async_trait;

use crate::config::FetchConfig;
use crate::error::{Error, Result, TransportError};
use crate::request::{Method, Request};

/// Longest body excerpt carried in a status error
const STATUS_MESSAGE_LIMIT: usize = 200;

/// Status and body of one response
///
/// Consumed immediately by the normalizer; never retained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Successful response with `body`
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body of a 2xx response, or [`TransportError::Status`]
    pub fn into_success_body(self, request: &Request) -> std::result::Result<Vec<u8>, TransportError> {
        if self.is_success() {
            return Ok(self.body);
        }
        let message: String = String::from_utf8_lossy(&self.body)
            .trim()
            .chars()
            .take(STATUS_MESSAGE_LIMIT)
            .collect();
        Err(TransportError::Status {
            status: self.status,
            url: request.url.to_string(),
            message,
        })
    }
}

/// Performs network calls for built requests
///
/// Implementations report any HTTP status as a [`RawResponse`]; turning
/// non-success statuses into errors is the caller's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the status and full body
    async fn send(&self, request: &Request) -> std::result::Result<RawResponse, TransportError>;
}

/// Production [`Transport`] backed by a shared reqwest client
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the configured timeout and user agent
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "failed to create HTTP client: {e}"
                )))
            })?;

        Ok(Self {
            client,
            timeout: config.request_timeout,
        })
    }

    fn map_error(&self, request: &Request, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                url: request.url.to_string(),
                after: self.timeout,
            }
        } else if e.is_connect() {
            TransportError::Connection(format!("connection failed for '{}': {e}", request.url))
        } else {
            TransportError::Connection(format!("request to '{}' failed: {e}", request.url))
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &Request) -> std::result::Result<RawResponse, TransportError> {
        let builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_error(request, e))?;
        let status = response.status().as_u16();

        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_error(request, e))?;

        tracing::debug!(url = %request.url, status, bytes = body.len(), "response received");

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}
