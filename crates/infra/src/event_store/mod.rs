//! Append-only, user-scoped event store.
//!
//! Streams are keyed by `(user_id, aggregate_id)` and hold domain events only.
//! The first event of a stream gets version `0`; every append continues from
//! the last stored version. An empty stream has no version.
//!
//! [`EventStorePublisher`] is what command handlers use: it versions the
//! domain events of a batch through the store and then publishes the batch.

mod in_memory;
mod publisher;

use std::sync::Arc;

use thiserror::Error;

use snippetquiz_core::{AggregateId, UserId};
use snippetquiz_events::Event;

pub use in_memory::InMemoryEventStore;
pub use publisher::EventStorePublisher;

/// Optimistic concurrency expectation for an append.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip the check.
    Any,
    /// The stream must be empty.
    NoStream,
    /// The last stored event must carry exactly this version.
    Exact(i64),
}

impl ExpectedVersion {
    pub fn matches(self, current: Option<i64>) -> bool {
        match self {
            Self::Any => true,
            Self::NoStream => current.is_none(),
            Self::Exact(version) => current == Some(version),
        }
    }
}

impl From<Option<i64>> for ExpectedVersion {
    fn from(current: Option<i64>) -> Self {
        current.map_or(Self::NoStream, Self::Exact)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: expected {expected:?}, found {found:?}")]
    Concurrency {
        expected: ExpectedVersion,
        found: Option<i64>,
    },

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

pub trait EventStore<P>: Send + Sync {
    /// Append a batch to one stream, assigning consecutive versions.
    ///
    /// All events must share user and aggregate, and must be domain events.
    /// The batch is stored entirely or not at all.
    fn append(
        &self,
        events: Vec<Event<P>>,
        expected: ExpectedVersion,
    ) -> Result<Vec<Event<P>>, EventStoreError>;

    /// Every stored event of a stream, in version order.
    fn load_stream(
        &self,
        user_id: UserId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<Event<P>>, EventStoreError>;

    fn current_version(
        &self,
        user_id: UserId,
        aggregate_id: AggregateId,
    ) -> Result<Option<i64>, EventStoreError> {
        Ok(self
            .load_stream(user_id, aggregate_id)?
            .last()
            .map(Event::version))
    }
}

impl<P, S> EventStore<P> for Arc<S>
where
    S: EventStore<P> + ?Sized,
{
    fn append(
        &self,
        events: Vec<Event<P>>,
        expected: ExpectedVersion,
    ) -> Result<Vec<Event<P>>, EventStoreError> {
        (**self).append(events, expected)
    }

    fn load_stream(
        &self,
        user_id: UserId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<Event<P>>, EventStoreError> {
        (**self).load_stream(user_id, aggregate_id)
    }

    fn current_version(
        &self,
        user_id: UserId,
        aggregate_id: AggregateId,
    ) -> Result<Option<i64>, EventStoreError> {
        (**self).current_version(user_id, aggregate_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expectations_match_the_current_version() {
        assert!(ExpectedVersion::Any.matches(None));
        assert!(ExpectedVersion::Any.matches(Some(4)));
        assert!(ExpectedVersion::NoStream.matches(None));
        assert!(!ExpectedVersion::NoStream.matches(Some(0)));
        assert!(ExpectedVersion::Exact(2).matches(Some(2)));
        assert!(!ExpectedVersion::Exact(2).matches(Some(3)));
        assert!(!ExpectedVersion::Exact(0).matches(None));
    }

    #[test]
    fn current_version_converts_into_an_expectation() {
        assert_eq!(ExpectedVersion::from(None), ExpectedVersion::NoStream);
        assert_eq!(ExpectedVersion::from(Some(1)), ExpectedVersion::Exact(1));
    }
}
