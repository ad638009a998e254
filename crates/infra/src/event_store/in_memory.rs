use std::collections::HashMap;
use std::sync::RwLock;

use snippetquiz_core::{AggregateId, UserId};
use snippetquiz_events::{Event, EventKind, Payload};

use super::{EventStore, EventStoreError, ExpectedVersion};

type StreamKey = (UserId, AggregateId);

/// In-memory append-only event store.
///
/// Intended for tests/dev. Not optimized for performance.
pub struct InMemoryEventStore<P> {
    streams: RwLock<HashMap<StreamKey, Vec<Event<P>>>>,
}

impl<P> InMemoryEventStore<P> {
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
        }
    }
}

impl<P> Default for InMemoryEventStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> core::fmt::Debug for InMemoryEventStore<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let streams = self.streams.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("InMemoryEventStore")
            .field("streams", &streams)
            .finish()
    }
}

fn poisoned() -> EventStoreError {
    EventStoreError::Unavailable("lock poisoned".to_string())
}

impl<P: Payload> EventStore<P> for InMemoryEventStore<P> {
    fn append(
        &self,
        events: Vec<Event<P>>,
        expected: ExpectedVersion,
    ) -> Result<Vec<Event<P>>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let key = (first.user_id(), first.aggregate_id());

        for (idx, e) in events.iter().enumerate() {
            if e.user_id() != key.0 {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple user ids (index {idx})"
                )));
            }
            if e.aggregate_id() != key.1 {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate ids (index {idx})"
                )));
            }
            if e.kind() != EventKind::Domain {
                return Err(EventStoreError::InvalidAppend(format!(
                    "{} is not a domain event (index {idx})",
                    e.event_name()
                )));
            }
        }

        let mut streams = self.streams.write().map_err(|_| poisoned())?;
        let stream = streams.entry(key).or_default();
        let current = stream.last().map(Event::version);

        if !expected.matches(current) {
            return Err(EventStoreError::Concurrency {
                expected,
                found: current,
            });
        }

        let mut next = current.map_or(0, |v| v + 1);
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = e.with_version(next);
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        user_id: UserId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<Event<P>>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| poisoned())?;
        Ok(streams
            .get(&(user_id, aggregate_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use snippetquiz_contentbank::{CharacterMessage, ContentBankCreated, ContentBankRenamed};

    use crate::app_event::AppEvent;

    fn created(bank: AggregateId, user: UserId) -> Event<AppEvent> {
        Event::new(
            bank,
            user,
            ContentBankCreated {
                name: "Bank1".to_string(),
                created_at: Utc::now().naive_utc(),
            },
        )
    }

    fn renamed(bank: AggregateId, user: UserId, name: &str) -> Event<AppEvent> {
        Event::new(
            bank,
            user,
            ContentBankRenamed {
                name: name.to_string(),
                updated_at: Utc::now().naive_utc(),
            },
        )
    }

    #[test]
    fn versions_start_at_zero_and_continue_across_appends() {
        let store = InMemoryEventStore::<AppEvent>::new();
        let (bank, user) = (AggregateId::new(), UserId::new());

        let first = store
            .append(
                vec![created(bank, user), renamed(bank, user, "a")],
                ExpectedVersion::NoStream,
            )
            .unwrap();
        let second = store
            .append(vec![renamed(bank, user, "b")], ExpectedVersion::Exact(1))
            .unwrap();

        assert_eq!(first.iter().map(Event::version).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(second[0].version(), 2);
        assert_eq!(store.current_version(user, bank).unwrap(), Some(2));
        assert_eq!(store.load_stream(user, bank).unwrap().len(), 3);
    }

    #[test]
    fn stale_expectations_are_rejected_without_storing() {
        let store = InMemoryEventStore::<AppEvent>::new();
        let (bank, user) = (AggregateId::new(), UserId::new());
        store
            .append(vec![created(bank, user)], ExpectedVersion::NoStream)
            .unwrap();

        let err = store
            .append(vec![created(bank, user)], ExpectedVersion::NoStream)
            .unwrap_err();
        assert_eq!(
            err,
            EventStoreError::Concurrency {
                expected: ExpectedVersion::NoStream,
                found: Some(0),
            }
        );

        let err = store
            .append(vec![renamed(bank, user, "x")], ExpectedVersion::Exact(5))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency { .. }));
        assert_eq!(store.load_stream(user, bank).unwrap().len(), 1);
    }

    #[test]
    fn streams_are_scoped_per_user() {
        let store = InMemoryEventStore::<AppEvent>::new();
        let bank = AggregateId::new();
        let (alice, bob) = (UserId::new(), UserId::new());

        store
            .append(vec![created(bank, alice)], ExpectedVersion::NoStream)
            .unwrap();

        assert!(store.load_stream(bob, bank).unwrap().is_empty());
        assert_eq!(store.current_version(bob, bank).unwrap(), None);
    }

    #[test]
    fn mixed_batches_are_invalid() {
        let store = InMemoryEventStore::<AppEvent>::new();
        let user = UserId::new();

        let err = store
            .append(
                vec![created(AggregateId::new(), user), created(AggregateId::new(), user)],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));

        let bank = AggregateId::new();
        let err = store
            .append(
                vec![Event::new(bank, user, CharacterMessage::text("hi"))],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::InvalidAppend(_)));
        assert!(store.load_stream(user, bank).unwrap().is_empty());
    }
}
