//! Infrastructure event bus implementations.
//!
//! The publishing contract and transport seams live in `snippetquiz-events`
//! as pure mechanics. This module provides the router that ties them
//! together and the Redis-backed transports.

pub mod router;

#[cfg(feature = "redis")]
pub mod redis_pubsub;
#[cfg(feature = "redis")]
pub mod redis_streams;

pub use router::{DurableEventBus, EphemeralEventBus, EventRouter, ephemeral_channel};

#[cfg(feature = "redis")]
pub use redis_pubsub::RedisPubSubTransport;
#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsConnector, RedisStreamsConsumer, RedisStreamsTransport};
