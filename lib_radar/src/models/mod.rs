//! # Event Models
//!
//! The normalized representation of one feed event and the pure predicate
//! deciding whether it is worth propagating downstream.

/// `EventRecord` and the nested actor/repo references.
pub mod github_event;
/// `EventKind` and the `RelevanceFilter` allow-set.
pub mod relevance;

pub use github_event::{Actor, EventRecord, Subject};
pub use relevance::{EventKind, RelevanceFilter, HIGH_VALUE_KINDS};
