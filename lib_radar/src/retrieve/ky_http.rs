//! # HTTP Retrieval Utilities
//!
//! This module provides an asynchronous API client wrapper around `reqwest`.
//! It joins relative paths onto a fixed base URL, attaches a bearer token to
//! every request and returns a standardized response that keeps the status,
//! headers and either the decoded body or the raw error text.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Sent with every request; some APIs (GitHub included) reject anonymous agents.
pub const USER_AGENT: &str = "TrendRadar-Ingestor/1.0";

/// Errors raised before a usable response was obtained.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The base URL or the joined path is not a valid URL.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The bearer token contains characters not allowed in a header.
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    /// Client construction, connection, timeout or body transfer failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A success body that is not valid JSON for the expected type.
    #[error("response body could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A standardized container for API responses.
///
/// This struct wraps the deserialized data along with metadata about the
/// HTTP transaction, such as status codes and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized body. `None` for failures and for an empty or `null`
    /// success body.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A reusable asynchronous HTTP client bound to one base URL.
///
/// The inner `reqwest::Client` is pooled, so one instance should be shared by
/// every request made against the same service.
pub struct ApiClient {
    /// The underlying pooled client.
    inner: reqwest::Client,
    /// The base URL to which all relative paths are joined. Always ends in `/`.
    base_url: Url,
    /// Pre-built `Authorization` header, marked sensitive so it never shows in debug output.
    auth_header: Option<HeaderValue>,
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL (e.g. "https://api.github.com").
    /// * `auth_token` - An optional bearer token for the Authorization header.
    /// * `timeout` - Upper bound for a whole request, connect to last byte.
    ///
    /// # Errors
    /// Returns an `HttpError` if the base URL is not absolute, the token is
    /// not a valid header value, or the TLS backend cannot be initialized.
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self, HttpError> {
        // A trailing slash keeps any path prefix of the base when joining.
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let url = Url::parse(&normalized)?;

        let auth_header = match auth_token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))?;
                value.set_sensitive(true);
                Some(value)
            }
            None => None,
        };

        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            inner,
            base_url: url,
            auth_header,
        })
    }

    /// The normalized base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a request and decodes a success body as `T`.
    ///
    /// Non-2xx statuses are not errors: they come back with `success: false`
    /// and the body text in `error_body`, so callers can classify them.
    ///
    /// # Arguments
    /// * `method` - The HTTP verb.
    /// * `path` - The path relative to the base URL; a leading `/` is ignored.
    /// * `headers` - Optional additional headers for this specific request.
    ///
    /// # Errors
    /// Returns an `HttpError` if URL joining, the network exchange, or body
    /// decoding fails.
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        headers: Option<HeaderMap>,
    ) -> Result<ApiResponse<T>, HttpError>
    where
        T: DeserializeOwned,
    {
        let full_url = self.base_url.join(path.trim_start_matches('/'))?;
        let mut req = self.inner.request(method, full_url);

        if let Some(h) = headers {
            req = req.headers(h);
        }

        if let Some(auth) = &self.auth_header {
            req = req.header(AUTHORIZATION, auth.clone());
        }

        let response: reqwest::Response = req.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        if status.is_success() {
            let body = response.bytes().await?;
            let data = decode_body::<T>(&body)?;
            Ok(ApiResponse {
                data,
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            // Capture the error body as a string for diagnosis
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }
}

/// Decodes a success body. Empty, whitespace-only and `null` bodies are `None`.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<T>>(body)
}
