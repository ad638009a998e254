//! Error taxonomy of the dispatch core.
//!
//! | error | raised by | handling |
//! |---|---|---|
//! | [`CodecError::UnknownEventType`] | envelope decoding | logged, message dropped |
//! | [`BusError::HandlerNotRegistered`] | command/query dispatch | returned to the caller |
//! | [`BusError::HandlerExecution`] | command/query dispatch | returned to the caller |
//! | [`SubscriberDispatchError`] | inbound consumer | logged per subscriber |
//! | [`TransportError::Publish`] | event bus | logged, batch continues |

use thiserror::Error;

/// Failure to turn bytes into an event (or an event into bytes).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The envelope's `type` is not in the type registry.
    ///
    /// Either a foreign/corrupt payload or a producer that is ahead of this
    /// binary. Both are recoverable: consumers log and drop.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload is not a structurally valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope is valid but its attributes don't fit the registered event.
    #[error("invalid attributes for {event_type}: {reason}")]
    InvalidAttributes { event_type: String, reason: String },

    /// Serializing an event failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl CodecError {
    pub fn invalid_attributes(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAttributes {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }
}

/// Registry construction failure (detected once, at startup).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("event type registered twice: {0}")]
    DuplicateEventType(String),

    #[error("more than one handler registered for {0}")]
    DuplicateHandler(&'static str),

    #[error("subscriber {subscriber} registered twice for {key}")]
    DuplicateSubscriber { key: String, subscriber: &'static str },
}

/// Command/query dispatch failure. Always surfaced to the caller.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no handler registered for {0}")]
    HandlerNotRegistered(&'static str),

    #[error("handler for {request_type} failed: {cause}")]
    HandlerExecution {
        request_type: &'static str,
        cause: anyhow::Error,
    },
}

/// Failure reported by a durable or ephemeral backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("publish to {destination} failed: {reason}")]
    Publish { destination: String, reason: String },

    #[error("poll failed: {0}")]
    Poll(String),

    #[error("commit failed: {0}")]
    Commit(String),
}

impl TransportError {
    pub fn publish(destination: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Publish {
            destination: destination.into(),
            reason: reason.into(),
        }
    }
}

/// A subscriber returned an error while consuming an event.
///
/// Never propagated: the inbound consumer logs it and moves on to the next
/// subscriber.
#[derive(Debug, Error)]
#[error("subscriber {subscriber} failed for {key}: {cause}")]
pub struct SubscriberDispatchError {
    pub subscriber: &'static str,
    pub key: String,
    pub cause: anyhow::Error,
}
