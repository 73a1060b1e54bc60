//! # Data Ingestors Module
//!
//! Ingestors are the "front door" for external data entering the pipeline.
//! Each submodule drives one upstream source end to end.
//!
//! ## Contained Modules:
//! - **`github_polling`**: A self-scheduling poller for the GitHub public
//!   events feed that filters events and republishes the relevant ones onto a
//!   partitioned broker topic keyed by repository.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// The scheduled poll-filter-publish loop for the GitHub events feed.
pub mod github_polling;

// --- Public API Re-exports ---
pub use github_polling::{CycleSummary, DeliveryStats, GithubPollingIngestor, PollSettings};
