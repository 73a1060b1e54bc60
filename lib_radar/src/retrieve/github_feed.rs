//! # GitHub Events Feed
//!
//! Reads the head of the public events feed. Each call is one GET with no
//! cursor, ETag or pagination state carried between calls. Failures are
//! classified for logging but handled identically by the caller: the cycle
//! ends and the next tick tries again.

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use serde_json::Value;

use crate::error::{FeedError, FeedFailureCause};
use crate::retrieve::ky_http::{ApiClient, HttpError};

/// Media type GitHub recommends for REST calls.
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
/// Pinned REST API version.
const GITHUB_API_VERSION: &str = "2022-11-28";

/// A source of raw event payloads.
pub trait EventFeed: Send + Sync {
    /// Fetches the current batch. An empty vector means "no events this cycle".
    fn fetch(&self) -> impl Future<Output = Result<Vec<Value>, FeedError>> + Send;
}

/// The GitHub implementation of [`EventFeed`].
pub struct GithubFeedClient {
    client: ApiClient,
    path: String,
}

impl GithubFeedClient {
    /// Wraps a configured `ApiClient`; `path` is relative to its base URL.
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    fn request_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(GITHUB_API_VERSION));
        headers
    }
}

impl EventFeed for GithubFeedClient {
    async fn fetch(&self) -> Result<Vec<Value>, FeedError> {
        let response = self
            .client
            .request::<Vec<Value>>(Method::GET, &self.path, Some(Self::request_headers()))
            .await
            .map_err(classify_http_error)?;

        log_rate_limit(&response.headers);

        if !response.success {
            return Err(status_error(
                response.status,
                response.error_body.unwrap_or_default(),
            ));
        }

        Ok(response.data.unwrap_or_default())
    }
}

/// Maps a non-2xx status to its failure class.
pub(crate) fn status_error(status: u16, body: String) -> FeedError {
    let cause = match status {
        400..=499 => FeedFailureCause::ClientError(status),
        500..=599 => FeedFailureCause::ServerError(status),
        _ => FeedFailureCause::UnexpectedStatus(status),
    };
    FeedError::Unavailable { cause, detail: body }
}

fn classify_http_error(err: HttpError) -> FeedError {
    match err {
        HttpError::Decode(e) => FeedError::Malformed(e.to_string()),
        HttpError::Request(e) if e.is_timeout() => FeedError::Unavailable {
            cause: FeedFailureCause::Timeout,
            detail: e.to_string(),
        },
        other => FeedError::Unavailable {
            cause: FeedFailureCause::Transport,
            detail: other.to_string(),
        },
    }
}

fn log_rate_limit(headers: &HeaderMap) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Some(remaining) = header("x-ratelimit-remaining") {
        log::debug!(
            "GitHub rate limit remaining: {} (resets at {})",
            remaining,
            header("x-ratelimit-reset").unwrap_or("unknown")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_are_classified_by_range() {
        assert_eq!(
            status_error(403, "rate limited".into()).cause(),
            Some(FeedFailureCause::ClientError(403))
        );
        assert_eq!(
            status_error(502, String::new()).cause(),
            Some(FeedFailureCause::ServerError(502))
        );
        assert_eq!(
            status_error(304, String::new()).cause(),
            Some(FeedFailureCause::UnexpectedStatus(304))
        );
    }

    #[test]
    fn status_error_keeps_body_for_diagnosis() {
        let err = status_error(401, r#"{"message":"Bad credentials"}"#.into());
        assert_eq!(
            err.to_string(),
            r#"feed unavailable (client error 401): {"message":"Bad credentials"}"#
        );
    }

    #[test]
    fn decode_failures_are_malformed() {
        let decode = serde_json::from_str::<Vec<Value>>("{}").unwrap_err();
        let err = classify_http_error(HttpError::Decode(decode));
        assert!(matches!(err, FeedError::Malformed(_)));
        assert_eq!(err.cause(), None);
    }
}
