//! # GitHub Events Polling Ingestor
//!
//! A self-scheduling ingestor for the GitHub public events feed. Each cycle
//! fetches the head of the feed, drops events that are malformed or not worth
//! propagating, and hands the rest to the broker keyed by repository name.
//!
//! ## Key Design Principles:
//! - **Fixed Delay**: The next cycle starts `poll_interval` after the previous
//!   one *finished*. Cycles run sequentially inside one task, so two cycles
//!   can never overlap and race on the same feed window.
//! - **Two Failure Boundaries**: A feed failure ends the cycle; a record
//!   failure ends only that record, including a publisher that panics.
//!   Neither ever escapes `run_cycle`.
//! - **Fire-and-Forget Publish**: The loop only issues sends. Each completion
//!   is awaited on its own spawned task, which logs the outcome and bumps the
//!   process-wide [`DeliveryStats`]. A cycle summary is therefore computed
//!   before its sends resolve: "dispatched" means issued, not acknowledged.
//! - **Borrowed Collaborators**: The feed client and the publisher are shared
//!   `Arc`s built by the caller, who also owns their shutdown.
//!
//! Delivery is at-least-once only if something upstream replays lost events;
//! a failed send is logged and counted, never retried.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

use crate::connections::publisher::{EventPublisher, PublishHandle};
use crate::error::{FeedError, FeedFailureCause, PublishError};
use crate::models::{EventRecord, RelevanceFilter};
use crate::retrieve::github_feed::EventFeed;

/// Scheduling and routing settings for the ingestor.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Broker topic, used for log attribution.
    pub topic: String,
    /// Delay between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Upper bound for one feed fetch.
    pub fetch_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            topic: "raw-github-events".to_string(),
            poll_interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Per-cycle counters. Reset every cycle.
///
/// `relevant <= fetched` and `dispatched + errored == relevant` always hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Elements in the fetched batch.
    pub fetched: usize,
    /// Null, unparsable, or missing a usable repo name.
    pub invalid: usize,
    /// Valid but outside the high-value allow-set.
    pub not_relevant: usize,
    /// Valid and high value.
    pub relevant: usize,
    /// Sends issued to the broker.
    pub dispatched: usize,
    /// Sends the broker rejected synchronously.
    pub errored: usize,
    /// The feed could not deliver a batch this cycle.
    pub feed_failed: bool,
}

/// Asynchronous publish outcomes over the life of the process.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl DeliveryStats {
    /// Sends the broker acknowledged.
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Sends that failed after being issued.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// # GitHub Polling Ingestor
///
/// Ties a feed, the relevance filter and a publisher into the scheduled loop.
pub struct GithubPollingIngestor<F, P> {
    feed: Arc<F>,
    publisher: Arc<P>,
    filter: RelevanceFilter,
    settings: PollSettings,
    deliveries: Arc<DeliveryStats>,
}

impl<F, P> GithubPollingIngestor<F, P>
where
    F: EventFeed,
    P: EventPublisher,
{
    /// Creates a new ingestor over shared collaborators.
    pub fn new(feed: Arc<F>, publisher: Arc<P>, filter: RelevanceFilter, settings: PollSettings) -> Self {
        Self {
            feed,
            publisher,
            filter,
            settings,
            deliveries: Arc::new(DeliveryStats::default()),
        }
    }

    /// Lifetime counters fed by the completion tasks.
    pub fn deliveries(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.deliveries)
    }

    /// # Main Execution Loop
    ///
    /// Runs a cycle, then waits `poll_interval` or until `shutdown` fires.
    /// A shutdown sent mid-cycle is observed once that cycle has finished.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        log::info!(
            "GitHub polling ingestor started: topic '{}', delay {:?}, high value kinds [{}]",
            self.settings.topic,
            self.settings.poll_interval,
            self.filter.kinds().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
        );

        loop {
            self.run_cycle().await;

            log::debug!(
                "Deliveries so far - acknowledged: {}, failed: {}",
                self.deliveries.delivered(),
                self.deliveries.failed()
            );

            tokio::select! {
                _ = shutdown.recv() => {
                    log::info!("GitHub polling ingestor shutting down.");
                    break;
                }
                _ = sleep(self.settings.poll_interval) => {}
            }
        }
    }

    /// # Execute One Cycle
    ///
    /// Fetches, filters and dispatches one batch. Never fails: every error is
    /// logged and reflected in the returned summary.
    pub async fn run_cycle(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let ts_in = Instant::now();

        log::debug!("Fetching GitHub events from feed");
        let batch = match timeout(self.settings.fetch_timeout, self.feed.fetch()).await {
            Ok(Ok(batch)) => batch,
            Ok(Err(err)) => {
                log_feed_error(&err);
                summary.feed_failed = true;
                return summary;
            }
            Err(_) => {
                log::error!(
                    "Timed out after {:?} while fetching GitHub events",
                    self.settings.fetch_timeout
                );
                summary.feed_failed = true;
                return summary;
            }
        };

        if batch.is_empty() {
            log::debug!("No events received from GitHub feed");
            return summary;
        }

        summary.fetched = batch.len();
        log::info!("Received {} events from GitHub feed", batch.len());

        for raw in batch {
            self.process_record(raw, &mut summary);
        }

        log::info!(
            "Event processing complete in {:?} - High value: {}, Dispatched: {}, Errors: {}, Invalid: {}, Not high value: {}",
            ts_in.elapsed(),
            summary.relevant,
            summary.dispatched,
            summary.errored,
            summary.invalid,
            summary.not_relevant
        );

        summary
    }

    /// Handles one element of the batch. Every outcome ends in a counter.
    fn process_record(&self, raw: Value, summary: &mut CycleSummary) {
        let record = match EventRecord::from_payload(raw) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping unusable event: {}", e);
                summary.invalid += 1;
                return;
            }
        };

        let key = match record.partition_key() {
            Ok(key) => key.to_owned(),
            Err(e) => {
                log::warn!("Event {} skipped: {}", record.id(), e);
                summary.invalid += 1;
                return;
            }
        };

        if !self.filter.is_relevant(&record) {
            summary.not_relevant += 1;
            return;
        }
        summary.relevant += 1;

        // A panicking publisher costs this record only.
        let issued = panic::catch_unwind(AssertUnwindSafe(|| self.publisher.publish(&key, &record)))
            .unwrap_or_else(|payload| {
                Err(PublishError::Rejected(format!(
                    "publisher panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        match issued {
            Ok(handle) => {
                summary.dispatched += 1;
                self.watch_completion(handle, record.id().to_owned(), key);
            }
            Err(e) => {
                summary.errored += 1;
                log::error!(
                    "Failed to send event {} for repo {} to topic {}: {}",
                    record.id(),
                    key,
                    self.settings.topic,
                    e
                );
            }
        }
    }

    /// Awaits a send off the scheduling path. A panic here is contained by the
    /// spawned task.
    fn watch_completion(&self, handle: PublishHandle, event_id: String, key: String) {
        let stats = Arc::clone(&self.deliveries);
        let topic = self.settings.topic.clone();

        tokio::spawn(async move {
            match handle.outcome().await {
                Ok(delivery) => {
                    stats.record_delivered();
                    log::debug!(
                        "Sent event {} for repo {} to {} as {}",
                        event_id,
                        key,
                        delivery.stream,
                        delivery.entry_id
                    );
                }
                Err(e) => {
                    stats.record_failed();
                    log::error!(
                        "Failed to send event {} for repo {} to topic {}: {}",
                        event_id,
                        key,
                        topic,
                        e
                    );
                }
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn log_feed_error(err: &FeedError) {
    match err {
        FeedError::Unavailable { cause, detail } => match cause {
            FeedFailureCause::ClientError(status) => {
                log::error!("HTTP client error while fetching GitHub events: {} - {}", status, detail)
            }
            FeedFailureCause::ServerError(status) => {
                log::error!("HTTP server error while fetching GitHub events: {} - {}", status, detail)
            }
            FeedFailureCause::UnexpectedStatus(status) => {
                log::error!("Unexpected HTTP status while fetching GitHub events: {} - {}", status, detail)
            }
            FeedFailureCause::Transport | FeedFailureCause::Timeout => {
                log::error!("Transport error while fetching GitHub events ({}): {}", cause, detail)
            }
        },
        FeedError::Malformed(detail) => {
            log::error!("GitHub events response could not be read as a batch: {}", detail)
        }
    }
}
