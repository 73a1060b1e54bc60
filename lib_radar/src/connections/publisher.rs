//! # Publisher Contract
//!
//! A publish is split in two halves. The synchronous half issues the send and
//! either returns a [`PublishHandle`] or rejects the record on the spot. The
//! asynchronous half resolves the handle exactly once, with the broker's
//! delivery metadata or the failure cause.
//!
//! Callers must pass a non-blank key; publishers do not re-validate it.

use tokio::sync::oneshot;

use crate::error::PublishError;
use crate::models::EventRecord;

/// Where the broker stored a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Stream (topic partition) the record was appended to.
    pub stream: String,
    /// Partition index derived from the key.
    pub partition: u32,
    /// Broker-assigned entry id.
    pub entry_id: String,
}

/// Sending half of a [`PublishHandle`], held by whoever performs the send.
pub type Completer = oneshot::Sender<Result<Delivery, PublishError>>;

/// Completion of one asynchronous publish.
#[derive(Debug)]
pub struct PublishHandle {
    rx: oneshot::Receiver<Result<Delivery, PublishError>>,
}

impl PublishHandle {
    /// A handle that resolves when the returned [`Completer`] is used.
    pub fn pending() -> (Completer, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// A handle that is already resolved.
    pub fn ready(outcome: Result<Delivery, PublishError>) -> Self {
        let (tx, handle) = Self::pending();
        let _ = tx.send(outcome);
        handle
    }

    /// Waits for the broker's answer. A completer dropped without an answer
    /// counts as a failed publish.
    pub async fn outcome(self) -> Result<Delivery, PublishError> {
        self.rx.await.unwrap_or_else(|_| {
            Err(PublishError::Failed(
                "send abandoned before the broker answered".to_string(),
            ))
        })
    }
}

/// Hands keyed records to a message broker.
pub trait EventPublisher: Send + Sync {
    /// Issues the send without waiting for acknowledgement.
    ///
    /// # Errors
    /// [`PublishError::Rejected`] when the send cannot even be issued.
    fn publish(&self, key: &str, record: &EventRecord) -> Result<PublishHandle, PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery() -> Delivery {
        Delivery {
            stream: "raw-github-events:3".to_string(),
            partition: 3,
            entry_id: "1717243200000-0".to_string(),
        }
    }

    #[tokio::test]
    async fn ready_handle_yields_its_outcome() {
        assert_eq!(PublishHandle::ready(Ok(delivery())).outcome().await, Ok(delivery()));
    }

    #[tokio::test]
    async fn pending_handle_resolves_from_another_task() {
        let (completer, handle) = PublishHandle::pending();
        tokio::spawn(async move {
            let _ = completer.send(Err(PublishError::Failed("NOSCRIPT".into())));
        });

        assert_eq!(handle.outcome().await, Err(PublishError::Failed("NOSCRIPT".into())));
    }

    #[tokio::test]
    async fn dropped_completer_is_a_failure() {
        let (completer, handle) = PublishHandle::pending();
        drop(completer);

        assert!(matches!(handle.outcome().await, Err(PublishError::Failed(_))));
    }
}
