//! # Data Retrieval Module
//!
//! HTTP access to the upstream event feed.
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A generic bearer-authenticated `ApiClient` built on
//!   `reqwest`, returning status, headers and an optional JSON body.
//! - **`github_feed`**: The `EventFeed` contract and its GitHub
//!   implementation, which classifies every failure into `FeedError`.
//!
//! There is deliberately no retry middleware here: the ingestion schedule's
//! next tick is the retry.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with bearer authentication and a request timeout.
pub mod ky_http;
/// The `EventFeed` trait and the GitHub public events client.
pub mod github_feed;

pub use github_feed::{EventFeed, GithubFeedClient};
pub use ky_http::{ApiClient, ApiResponse, HttpError};
