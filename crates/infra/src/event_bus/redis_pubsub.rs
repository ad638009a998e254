//! Redis pub/sub-backed ephemeral transport.
//!
//! Note: Redis pub/sub is not durable (messages are dropped when nobody is
//! subscribed to the channel). That is exactly the contract of ephemeral
//! events.

use redis::Commands;
use tracing::{debug, instrument};

use snippetquiz_events::{EphemeralTransport, TransportError};

#[derive(Debug, Clone)]
pub struct RedisPubSubTransport {
    client: redis::Client,
}

impl RedisPubSubTransport {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, TransportError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

impl EphemeralTransport for RedisPubSubTransport {
    #[instrument(skip(self, payload), err)]
    fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let receivers: i64 = conn
            .publish(channel, payload)
            .map_err(|e| TransportError::publish(channel, e.to_string()))?;

        debug!(channel, receivers, "ephemeral event published");
        Ok(())
    }
}
