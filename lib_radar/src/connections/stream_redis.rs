//! # Redis Streams Publisher
//!
//! Publishes records onto a topic split into `partitions` Redis streams named
//! `{topic}:{partition}`. The partition is derived from a SHA-256 of the key,
//! so every record for one repository lands on the same stream and keeps its
//! relative order there.
//!
//! Sends run on spawned tasks sharing one auto-reconnecting
//! `ConnectionManager`. An in-flight gate caps the number of unacknowledged
//! sends; when it is exhausted, or after [`RedisStreamPublisher::flush`] has
//! closed it, new publishes are rejected synchronously.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{Client, RedisResult};
use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::timeout;

use crate::connections::publisher::{Delivery, EventPublisher, PublishHandle};
use crate::error::PublishError;
use crate::models::EventRecord;

/// Settings for a [`RedisStreamPublisher`].
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Topic name; the prefix of every partition stream.
    pub topic: String,
    /// Number of partition streams. Zero is treated as one.
    pub partitions: u32,
    /// Approximate cap on entries kept per stream (`MAXLEN ~`).
    pub max_len: usize,
    /// How long one send may wait for the broker.
    pub publish_timeout: Duration,
    /// Maximum sends awaiting acknowledgement at once.
    pub max_in_flight: u32,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            topic: "raw-github-events".to_string(),
            partitions: 6,
            max_len: 100_000,
            publish_timeout: Duration::from_secs(5),
            max_in_flight: 1024,
        }
    }
}

/// Partition index for `key`.
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    let digest = Sha256::digest(key.as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    head % partitions.max(1)
}

/// Stream name for one partition of `topic`.
pub fn stream_name(topic: &str, partition: u32) -> String {
    format!("{}:{}", topic, partition)
}

/// Caps the sends awaiting acknowledgement. Once closed it rejects everything.
#[derive(Debug)]
struct InFlightGate {
    permits: Arc<Semaphore>,
    capacity: u32,
}

impl InFlightGate {
    fn new(capacity: u32) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    /// The permit is held until the send resolves.
    fn enter(&self) -> Result<OwnedSemaphorePermit, PublishError> {
        Arc::clone(&self.permits).try_acquire_owned().map_err(|e| match e {
            TryAcquireError::Closed => PublishError::Rejected("publisher is closed".to_string()),
            TryAcquireError::NoPermits => {
                PublishError::Rejected(format!("{} sends already in flight", self.capacity))
            }
        })
    }

    fn in_flight(&self) -> usize {
        (self.capacity as usize).saturating_sub(self.permits.available_permits())
    }

    /// Closes the gate, having waited up to `wait` for every permit to return.
    async fn drain(&self, wait: Duration) -> bool {
        let drained = timeout(wait, self.permits.acquire_many(self.capacity)).await;
        self.permits.close();
        matches!(drained, Ok(Ok(_)))
    }
}

fn current_runtime() -> Result<Handle, PublishError> {
    Handle::try_current().map_err(|e| PublishError::Rejected(format!("no runtime to issue the send: {}", e)))
}

/// Resolves one issued `XADD` into a delivery or a failure.
async fn await_ack<S>(send: S, publish_timeout: Duration, stream: String, partition: u32) -> Result<Delivery, PublishError>
where
    S: Future<Output = RedisResult<String>>,
{
    match timeout(publish_timeout, send).await {
        Ok(Ok(entry_id)) => Ok(Delivery {
            stream,
            partition,
            entry_id,
        }),
        Ok(Err(e)) => Err(PublishError::Failed(e.to_string())),
        Err(_) => Err(PublishError::Failed(format!(
            "no broker acknowledgement within {:?}",
            publish_timeout
        ))),
    }
}

/// A handler for publishing records to Redis Streams.
pub struct RedisStreamPublisher {
    conn: ConnectionManager,
    options: StreamOptions,
    gate: InFlightGate,
}

impl RedisStreamPublisher {
    /// Opens a managed connection to the broker.
    ///
    /// # Arguments
    /// * `url` - The redis URL (e.g., "redis://127.0.0.1/").
    pub async fn connect(url: &str, options: StreamOptions) -> RedisResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::with_connection(conn, options))
    }

    /// Wraps an existing connection.
    pub fn with_connection(conn: ConnectionManager, options: StreamOptions) -> Self {
        let gate = InFlightGate::new(options.max_in_flight);
        Self { conn, options, gate }
    }

    pub fn topic(&self) -> &str {
        &self.options.topic
    }

    /// Sends issued but not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.gate.in_flight()
    }

    /// Stops accepting new sends and waits up to `wait` for in-flight ones.
    /// Returns `true` if everything drained.
    pub async fn flush(&self, wait: Duration) -> bool {
        self.gate.drain(wait).await
    }
}

impl EventPublisher for RedisStreamPublisher {
    fn publish(&self, key: &str, record: &EventRecord) -> Result<PublishHandle, PublishError> {
        let runtime = current_runtime()?;

        let payload = serde_json::to_string(record)
            .map_err(|e| PublishError::Rejected(format!("record could not be serialized: {}", e)))?;

        let permit = self.gate.enter()?;

        let partition = partition_for(key, self.options.partitions);
        let stream = stream_name(&self.options.topic, partition);

        let mut cmd = redis::cmd("XADD");
        cmd.arg(&stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.options.max_len)
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("event_id")
            .arg(record.id())
            .arg("payload")
            .arg(payload);

        let mut conn = self.conn.clone();
        let publish_timeout = self.options.publish_timeout;
        let (completer, handle) = PublishHandle::pending();

        runtime.spawn(async move {
            let _permit = permit;
            let outcome = await_ack(cmd.query_async::<String>(&mut conn), publish_timeout, stream, partition).await;
            // Nobody listening means nobody cares about the outcome.
            let _ = completer.send(outcome);
        });

        Ok(handle)
    }
}
