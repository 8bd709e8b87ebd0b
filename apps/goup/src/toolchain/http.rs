//! Blocking HTTP access for goup.
//!
//! The pipeline talks to the network only through the [`HttpClient`] trait so
//! tests can substitute a recording fake. [`ReqwestClient`] is the real
//! implementation on top of `reqwest::blocking`.

use std::io::Read;
use std::time::Duration;

use crate::errors::GoupError;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("goup/", env!("CARGO_PKG_VERSION"));

/// Response to a GET request: a status code and a streaming body.
pub struct HttpResponse {
    /// Numeric HTTP status code.
    pub status: u16,
    /// Response body, read lazily.
    pub body: Box<dyn Read>,
}

impl HttpResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turns a non-success response into `GoupError::HttpStatus`.
    ///
    /// # Errors
    ///
    /// Returns `GoupError::HttpStatus` when the status is not 2xx.
    pub fn error_for_status(self, url: &str) -> Result<Self, GoupError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GoupError::http_status(url, self.status))
        }
    }
}

/// Minimal GET-only HTTP capability.
pub trait HttpClient {
    /// Issues a GET request and returns once response headers are received.
    ///
    /// # Errors
    ///
    /// Returns `GoupError::Network` if the request cannot be built or the
    /// transport fails. Non-success statuses are returned as responses.
    fn get(&self, url: &str) -> Result<HttpResponse, GoupError>;
}

/// [`HttpClient`] backed by a `reqwest` blocking client.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client. `None` disables the request timeout entirely.
    ///
    /// # Errors
    ///
    /// Returns `GoupError::Network` if the TLS backend cannot be initialised.
    pub fn new(timeout: Option<Duration>) -> Result<Self, GoupError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GoupError::network_with_source("failed to create HTTP client", e))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, GoupError> {
        log::debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| GoupError::network_with_source(format!("failed to fetch {url}"), e))?;
        let status = response.status().as_u16();
        log::debug!("GET {url} -> {status}");
        Ok(HttpResponse {
            status,
            body: Box::new(response),
        })
    }
}
