//! # GitHub Event Record
//!
//! One occurrence pulled from the public events feed. Records are parsed one
//! element at a time so that a single bad element never poisons its batch:
//! unknown upstream fields are ignored, while a missing `id` or a field of the
//! wrong type turns only that element into a [`RecordInvalid`].
//!
//! The serialized form keeps the upstream field names (`type`, `repo`,
//! `created_at`) so downstream consumers see the same shape the feed emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordInvalid;

/// The principal that caused the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<u64>,
    pub login: Option<String>,
}

/// The repository the event targets. Its `name` (`owner/repo`) is the
/// partition key on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Option<u64>,
    pub name: Option<String>,
    pub url: Option<String>,
}

/// A normalized feed event. Immutable once parsed; read through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    id: String,
    #[serde(rename = "type")]
    event_type: Option<String>,
    actor: Option<Actor>,
    #[serde(rename = "repo")]
    subject: Option<Subject>,
    #[serde(rename = "created_at")]
    occurred_at: Option<DateTime<Utc>>,
}

impl EventRecord {
    /// Builds a record from one raw element of the feed array.
    ///
    /// # Errors
    /// - [`RecordInvalid::Null`] for a JSON `null` element.
    /// - [`RecordInvalid::Malformed`] when `id` is missing or any known field
    ///   has the wrong type.
    pub fn from_payload(raw: Value) -> Result<Self, RecordInvalid> {
        if raw.is_null() {
            return Err(RecordInvalid::Null);
        }
        serde_json::from_value(raw).map_err(|e| RecordInvalid::Malformed(e.to_string()))
    }

    /// Opaque upstream identifier, used for log correlation only.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Upstream event type string, e.g. `"WatchEvent"`.
    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        self.occurred_at
    }

    /// The broker partition key: the repository name.
    ///
    /// # Errors
    /// [`RecordInvalid::MissingSubject`] if the event has no repo, and
    /// [`RecordInvalid::BlankSubjectName`] if the repo name is null or blank.
    pub fn partition_key(&self) -> Result<&str, RecordInvalid> {
        let subject = self.subject.as_ref().ok_or(RecordInvalid::MissingSubject)?;
        match subject.name.as_deref() {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(RecordInvalid::BlankSubjectName),
        }
    }
}
