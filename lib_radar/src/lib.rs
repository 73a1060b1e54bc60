//! # lib_radar
//!
//! Shared building blocks for the TrendRadar ingestion worker. Each folder is
//! gated behind a cargo feature of the same name so that binaries only pull in
//! the stack they actually use.
//!
//! - **`models`**: the normalized `EventRecord` and the relevance predicate.
//! - **`retrieve`**: HTTP access to the upstream event feed.
//! - **`connections`**: the broker publish primitive.
//! - **`ingestors`**: the scheduled poll-filter-publish loop.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

#[cfg(feature = "models")]
pub mod error;

#[cfg(feature = "models")]
pub mod models;

#[cfg(feature = "retrieve")]
pub mod retrieve;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "ingestors")]
pub mod ingestors;

#[cfg(all(test, feature = "ingestors"))]
pub(crate) mod test_utils;

// Re-export the types most callers need.
#[cfg(feature = "models")]
pub use error::{FeedError, FeedFailureCause, PublishError, RecordInvalid};
#[cfg(feature = "models")]
pub use models::{EventKind, EventRecord, RelevanceFilter};
