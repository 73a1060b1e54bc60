//! # Error Taxonomy
//!
//! Every failure the ingestion pipeline can observe, grouped by the boundary
//! that contains it:
//!
//! - **Cycle level**: [`FeedError`]. The cycle is abandoned and the next tick
//!   is the retry.
//! - **Record level**: [`RecordInvalid`] (skipped with a warning, never counted
//!   as an error) and [`PublishError`] (counted, never retried).

use std::fmt;

use thiserror::Error;

/// Why the upstream feed could not deliver a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFailureCause {
    /// The feed answered with a 4xx status.
    ClientError(u16),
    /// The feed answered with a 5xx status.
    ServerError(u16),
    /// The feed answered with a non-success status outside 4xx/5xx.
    UnexpectedStatus(u16),
    /// Connection, TLS or I/O failure before a status was received.
    Transport,
    /// The request did not complete within the fetch timeout.
    Timeout,
}

impl fmt::Display for FeedFailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientError(status) => write!(f, "client error {}", status),
            Self::ServerError(status) => write!(f, "server error {}", status),
            Self::UnexpectedStatus(status) => write!(f, "unexpected status {}", status),
            Self::Transport => f.write_str("transport error"),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

/// Failure to obtain a batch from the feed.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Transport or status failure. `detail` carries the response body for
    /// status failures and the underlying error text otherwise.
    #[error("feed unavailable ({cause}): {detail}")]
    Unavailable {
        /// Classification used for logging.
        cause: FeedFailureCause,
        /// Body text or error description.
        detail: String,
    },

    /// The response body could not be interpreted as a batch of events.
    #[error("feed response malformed: {0}")]
    Malformed(String),
}

impl FeedError {
    /// The failure classification, or `None` for a malformed body.
    pub fn cause(&self) -> Option<FeedFailureCause> {
        match self {
            Self::Unavailable { cause, .. } => Some(*cause),
            Self::Malformed(_) => None,
        }
    }
}

/// A single feed element that cannot be published.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordInvalid {
    #[error("event payload is null")]
    Null,

    #[error("event payload malformed: {0}")]
    Malformed(String),

    #[error("event has no repo")]
    MissingSubject,

    #[error("event has null or blank repo name")]
    BlankSubjectName,
}

/// Failure handing a record to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Refused at call time; nothing was sent.
    #[error("publish rejected: {0}")]
    Rejected(String),

    /// Reported later through the completion handle.
    #[error("publish failed: {0}")]
    Failed(String),
}
