//! # Relevance Filter
//!
//! Decides which events are worth propagating to the broker. The rule is a
//! pure function over an enumerated set of event kinds: it never fails, never
//! touches the network, and returns the same answer for the same record.
//!
//! The allow-set is fixed for the life of the process. `WatchEvent` and
//! `ForkEvent` are the default high-value kinds; `PushEvent` is deliberately
//! left out because its volume drowns the signal downstream consumers want.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::models::github_event::EventRecord;

/// The event types published by the GitHub events API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    CommitComment,
    Create,
    Delete,
    Fork,
    Gollum,
    IssueComment,
    Issues,
    Member,
    Public,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    PullRequestReviewThread,
    Push,
    Release,
    Sponsorship,
    Watch,
}

/// Kinds propagated when no override is configured.
pub const HIGH_VALUE_KINDS: [EventKind; 2] = [EventKind::Watch, EventKind::Fork];

impl EventKind {
    /// Every known kind, in declaration order.
    pub const ALL: [EventKind; 17] = [
        EventKind::CommitComment,
        EventKind::Create,
        EventKind::Delete,
        EventKind::Fork,
        EventKind::Gollum,
        EventKind::IssueComment,
        EventKind::Issues,
        EventKind::Member,
        EventKind::Public,
        EventKind::PullRequest,
        EventKind::PullRequestReview,
        EventKind::PullRequestReviewComment,
        EventKind::PullRequestReviewThread,
        EventKind::Push,
        EventKind::Release,
        EventKind::Sponsorship,
        EventKind::Watch,
    ];

    /// The upstream `type` string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::CommitComment => "CommitCommentEvent",
            EventKind::Create => "CreateEvent",
            EventKind::Delete => "DeleteEvent",
            EventKind::Fork => "ForkEvent",
            EventKind::Gollum => "GollumEvent",
            EventKind::IssueComment => "IssueCommentEvent",
            EventKind::Issues => "IssuesEvent",
            EventKind::Member => "MemberEvent",
            EventKind::Public => "PublicEvent",
            EventKind::PullRequest => "PullRequestEvent",
            EventKind::PullRequestReview => "PullRequestReviewEvent",
            EventKind::PullRequestReviewComment => "PullRequestReviewCommentEvent",
            EventKind::PullRequestReviewThread => "PullRequestReviewThreadEvent",
            EventKind::Push => "PushEvent",
            EventKind::Release => "ReleaseEvent",
            EventKind::Sponsorship => "SponsorshipEvent",
            EventKind::Watch => "WatchEvent",
        }
    }

    /// Maps an upstream `type` string to a kind. Unknown strings yield `None`.
    pub fn from_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unrecognized event type name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::from_type(trimmed).ok_or_else(|| UnknownEventKind(trimmed.to_string()))
    }
}

/// The allow-set of high-value event kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceFilter {
    allowed: BTreeSet<EventKind>,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::with_kinds(HIGH_VALUE_KINDS)
    }
}

impl RelevanceFilter {
    /// Builds a filter admitting exactly `kinds`.
    pub fn with_kinds(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            allowed: kinds.into_iter().collect(),
        }
    }

    /// True iff the record's type is a known kind in the allow-set.
    /// A missing or unrecognized type is never relevant.
    pub fn is_relevant(&self, record: &EventRecord) -> bool {
        record
            .event_type()
            .and_then(EventKind::from_type)
            .is_some_and(|kind| self.allowed.contains(&kind))
    }

    /// The admitted kinds, in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.allowed.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_of_type(event_type: serde_json::Value) -> EventRecord {
        EventRecord::from_payload(json!({
            "id": "1",
            "type": event_type,
            "repo": { "name": "acme/repo" }
        }))
        .unwrap()
    }

    #[test]
    fn default_allow_set_is_watch_and_fork() {
        let filter = RelevanceFilter::default();

        assert!(filter.is_relevant(&record_of_type(json!("WatchEvent"))));
        assert!(filter.is_relevant(&record_of_type(json!("ForkEvent"))));
        assert!(!filter.is_relevant(&record_of_type(json!("PushEvent"))));
        assert!(!filter.is_relevant(&record_of_type(json!("IssueCommentEvent"))));
    }

    #[test]
    fn null_or_unknown_type_is_not_relevant() {
        let filter = RelevanceFilter::with_kinds(EventKind::ALL);

        assert!(!filter.is_relevant(&record_of_type(json!(null))));
        assert!(!filter.is_relevant(&record_of_type(json!("TeleportEvent"))));
        assert!(!filter.is_relevant(&record_of_type(json!("watchevent"))));
    }

    #[test]
    fn filtering_is_idempotent() {
        let filter = RelevanceFilter::default();
        let record = record_of_type(json!("ForkEvent"));

        assert_eq!(filter.is_relevant(&record), filter.is_relevant(&record));
    }

    #[test]
    fn every_kind_round_trips_through_its_type_string() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_type(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn parses_configured_kind_names() {
        assert_eq!(" PushEvent ".parse::<EventKind>(), Ok(EventKind::Push));
        assert_eq!(
            "Push".parse::<EventKind>(),
            Err(UnknownEventKind("Push".to_string()))
        );
    }

    #[test]
    fn unknown_kind_names_the_offending_value() {
        let err = "StarEvent".parse::<EventKind>().unwrap_err();

        assert_eq!(err.to_string(), "unknown event kind 'StarEvent'");
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn custom_allow_set_replaces_defaults() {
        let filter = RelevanceFilter::with_kinds([EventKind::Release]);

        assert!(filter.is_relevant(&record_of_type(json!("ReleaseEvent"))));
        assert!(!filter.is_relevant(&record_of_type(json!("WatchEvent"))));
        assert_eq!(filter.kinds().collect::<Vec<_>>(), vec![EventKind::Release]);
    }
}
