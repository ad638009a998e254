//! Transport seams between the dispatch core and a broker.
//!
//! The core only needs four capabilities from a backend:
//!
//! - append a keyed payload to a durable topic ([`DurableTransport`])
//! - fire a payload at a pub/sub channel ([`EphemeralTransport`])
//! - read a durable topic as a consumer-group member and commit progress
//!   ([`LogConsumer`], opened through a [`LogConnector`])
//!
//! Implementations live in `snippetquiz-infra` (Redis) and
//! [`crate::in_memory_bus`] (tests/dev). All of them are synchronous.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TransportError;

/// Append-only, partitioned-by-key log writer.
///
/// Records sharing a `key` on the same `topic` must be read back in the order
/// they were sent.
pub trait DurableTransport: Send + Sync {
    fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), TransportError>;
}

/// Fire-and-forget pub/sub writer. No persistence, no acknowledgement.
pub trait EphemeralTransport: Send + Sync {
    fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError>;
}

impl<T: DurableTransport + ?Sized> DurableTransport for Arc<T> {
    fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), TransportError> {
        (**self).send(topic, key, payload)
    }
}

impl<T: EphemeralTransport + ?Sized> EphemeralTransport for Arc<T> {
    fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        (**self).send(channel, payload)
    }
}

/// One record read from a durable topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub key: Option<String>,
    pub payload: String,
}

/// A consumer-group member reading durable topics.
///
/// Offsets advance only through [`LogConsumer::commit`]; records returned by
/// `poll` but never committed are delivered again after a reconnect.
pub trait LogConsumer: Send {
    fn subscribe(&mut self, topics: &BTreeSet<String>) -> Result<(), TransportError>;

    /// Wait up to `timeout` for records. An empty batch is not an error.
    fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumedRecord>, TransportError>;

    /// Commit everything returned by previous polls.
    fn commit(&mut self) -> Result<(), TransportError>;

    fn close(&mut self);
}

/// Opens consumer connections. Held by the inbound consumer so that a stopped
/// consumer can be started again.
pub trait LogConnector: Send + Sync {
    type Consumer: LogConsumer + 'static;

    fn connect(&self) -> Result<Self::Consumer, TransportError>;
}
