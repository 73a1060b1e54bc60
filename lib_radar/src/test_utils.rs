//! Test doubles for the feed and the publisher.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{json, Value};

use crate::connections::publisher::{Delivery, EventPublisher, PublishHandle};
use crate::error::{FeedError, PublishError};
use crate::ingestors::DeliveryStats;
use crate::models::EventRecord;
use crate::retrieve::github_feed::EventFeed;

/// A feed element with the given id, type and `repo` value.
pub fn event(id: &str, event_type: &str, repo: Value) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "actor": { "id": 1, "login": "octocat" },
        "repo": repo,
        "created_at": "2024-06-01T12:00:00Z"
    })
}

/// Polls `stats` until it reaches the expected counts, then asserts them.
pub async fn wait_for_deliveries(stats: &DeliveryStats, delivered: u64, failed: u64) {
    for _ in 0..200 {
        if stats.delivered() == delivered && stats.failed() == failed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!((stats.delivered(), stats.failed()), (delivered, failed));
}

/// Returns the same response on every fetch.
pub struct StaticFeed {
    response: Result<Vec<Value>, FeedError>,
    calls: AtomicUsize,
}

impl StaticFeed {
    pub fn ok(batch: Vec<Value>) -> Self {
        Self {
            response: Ok(batch),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn err(error: FeedError) -> Self {
        Self {
            response: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EventFeed for StaticFeed {
    async fn fetch(&self) -> Result<Vec<Value>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Never answers.
pub struct StallingFeed;

impl EventFeed for StallingFeed {
    async fn fetch(&self) -> Result<Vec<Value>, FeedError> {
        std::future::pending().await
    }
}

/// Takes `delay` per fetch and records how many fetches ran at once.
pub struct SlowFeed {
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowFeed {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl EventFeed for SlowFeed {
    async fn fetch(&self) -> Result<Vec<Value>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

/// Records every publish; rejects, fails or panics on chosen event ids.
#[derive(Default)]
pub struct RecordingPublisher {
    calls: Mutex<Vec<(String, String)>>,
    reject: HashSet<String>,
    fail_later: HashSet<String>,
    panic_on: HashSet<String>,
}

impl RecordingPublisher {
    pub fn rejecting<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            reject: ids.into_iter().map(str::to_owned).collect(),
            ..Self::default()
        }
    }

    pub fn failing_later<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            fail_later: ids.into_iter().map(str::to_owned).collect(),
            ..Self::default()
        }
    }

    pub fn panicking_on<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            panic_on: ids.into_iter().map(str::to_owned).collect(),
            ..Self::default()
        }
    }

    /// `(key, event id)` for every publish call, in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, key: &str, record: &EventRecord) -> Result<PublishHandle, PublishError> {
        self.calls
            .lock()
            .unwrap()
            .push((key.to_owned(), record.id().to_owned()));

        if self.panic_on.contains(record.id()) {
            panic!("publisher bug on event {}", record.id());
        }
        if self.reject.contains(record.id()) {
            return Err(PublishError::Rejected("broker unreachable".to_string()));
        }
        if self.fail_later.contains(record.id()) {
            return Ok(PublishHandle::ready(Err(PublishError::Failed(
                "NOT_LEADER_FOR_PARTITION".to_string(),
            ))));
        }
        Ok(PublishHandle::ready(Ok(Delivery {
            stream: "raw-github-events:0".to_string(),
            partition: 0,
            entry_id: "0-1".to_string(),
        })))
    }
}
