//! # Connections Module
//!
//! This module handles the hand-off of records to the message broker.

/// The publish contract and its asynchronous completion handle.
pub mod publisher;

/// Redis Streams implementation of the publisher, partitioned by key.
pub mod stream_redis;

pub use publisher::{Delivery, EventPublisher, PublishHandle};
pub use stream_redis::{RedisStreamPublisher, StreamOptions};
