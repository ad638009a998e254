//! Event router: one `publish` call, two transports.
//!
//! ```text
//! publish(aggregate_type, [e1, e2, e3])
//!     ├─ Ephemeral → EphemeralEventBus → pub/sub channel "{aggregate_type}:user-id:{user_id}"
//!     └─ Domain / Integration → DurableEventBus → log topic `aggregate_type`, key = aggregate_id
//! ```
//!
//! The ephemeral half goes out first, then the durable half. The halves are
//! not atomic with each other, nor with whatever write produced the events.

use tracing::{debug, error};

use snippetquiz_core::UserId;
use snippetquiz_events::envelope;
use snippetquiz_events::{
    DurableTransport, EphemeralTransport, Event, EventBus, Payload, PublishReport, Route, route,
};

/// Pub/sub channel for a user's ephemeral events.
pub fn ephemeral_channel(aggregate_type: &str, user_id: UserId) -> String {
    format!("{aggregate_type}:user-id:{user_id}")
}

/// Writes each event to the durable log: topic = aggregate type, key =
/// aggregate id (same-aggregate ordering).
#[derive(Debug, Clone)]
pub struct DurableEventBus<T> {
    transport: T,
}

impl<T: DurableTransport> DurableEventBus<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<P: Payload, T: DurableTransport> EventBus<P> for DurableEventBus<T> {
    fn publish(&self, aggregate_type: &str, events: &[Event<P>]) -> PublishReport {
        let mut report = PublishReport::default();

        for event in events {
            let sent = envelope::encode(event)
                .map_err(|e| e.to_string())
                .and_then(|payload| {
                    self.transport
                        .send(aggregate_type, &event.aggregate_id().to_string(), &payload)
                        .map_err(|e| e.to_string())
                });

            if let Err(err) = &sent {
                error!(
                    topic = aggregate_type,
                    event_type = event.event_name(),
                    event_id = %event.event_id(),
                    aggregate_id = %event.aggregate_id(),
                    error = %err,
                    "failed to publish durable event"
                );
            }
            report.record(sent.is_ok());
        }

        report
    }
}

/// Sends each event to its user's pub/sub channel. Nothing is persisted.
#[derive(Debug, Clone)]
pub struct EphemeralEventBus<T> {
    transport: T,
}

impl<T: EphemeralTransport> EphemeralEventBus<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<P: Payload, T: EphemeralTransport> EventBus<P> for EphemeralEventBus<T> {
    fn publish(&self, aggregate_type: &str, events: &[Event<P>]) -> PublishReport {
        let mut report = PublishReport::default();

        for event in events {
            let channel = ephemeral_channel(aggregate_type, event.user_id());
            let sent = envelope::encode(event)
                .map_err(|e| e.to_string())
                .and_then(|payload| {
                    self.transport
                        .send(&channel, &payload)
                        .map_err(|e| e.to_string())
                });

            if let Err(err) = &sent {
                error!(
                    channel = %channel,
                    event_type = event.event_name(),
                    event_id = %event.event_id(),
                    error = %err,
                    "failed to publish ephemeral event"
                );
            }
            report.record(sent.is_ok());
        }

        report
    }
}

/// Splits a batch by [`route`] and hands each half to its bus.
#[derive(Debug, Clone)]
pub struct EventRouter<D, E> {
    durable: D,
    ephemeral: E,
}

impl<D, E> EventRouter<D, E> {
    pub fn new(durable: D, ephemeral: E) -> Self {
        Self { durable, ephemeral }
    }

    pub fn durable(&self) -> &D {
        &self.durable
    }

    pub fn ephemeral(&self) -> &E {
        &self.ephemeral
    }
}

impl<DT: DurableTransport, ET: EphemeralTransport>
    EventRouter<DurableEventBus<DT>, EphemeralEventBus<ET>>
{
    /// Router over a durable log transport and a pub/sub transport.
    pub fn over(durable: DT, ephemeral: ET) -> Self {
        Self::new(DurableEventBus::new(durable), EphemeralEventBus::new(ephemeral))
    }
}

impl<P, D, E> EventBus<P> for EventRouter<D, E>
where
    P: Payload,
    D: EventBus<P>,
    E: EventBus<P>,
{
    fn publish(&self, aggregate_type: &str, events: &[Event<P>]) -> PublishReport {
        let (ephemeral, durable): (Vec<Event<P>>, Vec<Event<P>>) = events
            .iter()
            .cloned()
            .partition(|e| route(e.kind()) == Route::Ephemeral);

        debug!(
            aggregate_type,
            ephemeral = ephemeral.len(),
            durable = durable.len(),
            "routing event batch"
        );

        let mut report = PublishReport::default();
        if !ephemeral.is_empty() {
            report = report.merge(self.ephemeral.publish(aggregate_type, &ephemeral));
        }
        if !durable.is_empty() {
            report = report.merge(self.durable.publish(aggregate_type, &durable));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use snippetquiz_contentbank::{AGGREGATE_TYPE, CharacterMessage, ContentBankCreated};
    use snippetquiz_core::AggregateId;
    use snippetquiz_events::{InMemoryLog, InMemoryPubSub};

    use crate::app_event::AppEvent;

    /// Records every batch it is asked to publish.
    #[derive(Default)]
    struct RecordingBus {
        calls: Mutex<Vec<Vec<&'static str>>>,
    }

    impl EventBus<AppEvent> for RecordingBus {
        fn publish(&self, _aggregate_type: &str, events: &[Event<AppEvent>]) -> PublishReport {
            self.calls
                .lock()
                .unwrap()
                .push(events.iter().map(|e| e.event_name()).collect());
            PublishReport {
                published: events.len(),
                failed: 0,
            }
        }
    }

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

    fn character(bank: AggregateId, user: UserId) -> Event<AppEvent> {
        Event::new(bank, user, CharacterMessage::text("Bank ready"))
    }

    #[test]
    fn each_backend_gets_exactly_one_call_with_its_events() {
        let durable = Arc::new(RecordingBus::default());
        let ephemeral = Arc::new(RecordingBus::default());
        let router = EventRouter::new(Arc::clone(&durable), Arc::clone(&ephemeral));
        let (bank, user) = (AggregateId::new(), UserId::new());

        let report = router.publish("X", &[character(bank, user), created(bank, user)]);

        assert_eq!(report, PublishReport { published: 2, failed: 0 });
        assert_eq!(
            *ephemeral.calls.lock().unwrap(),
            vec![vec!["character.message.ephemeral"]]
        );
        assert_eq!(
            *durable.calls.lock().unwrap(),
            vec![vec!["content_bank.created"]]
        );
    }

    #[test]
    fn empty_halves_are_not_published() {
        let durable = Arc::new(RecordingBus::default());
        let ephemeral = Arc::new(RecordingBus::default());
        let router = EventRouter::new(Arc::clone(&durable), Arc::clone(&ephemeral));

        router.publish("X", &[created(AggregateId::new(), UserId::new())]);

        assert!(ephemeral.calls.lock().unwrap().is_empty());
        assert_eq!(durable.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn ephemeral_events_go_to_the_user_channel_only() {
        let log = Arc::new(InMemoryLog::new());
        let pubsub = Arc::new(InMemoryPubSub::new());
        let router = EventRouter::over(Arc::clone(&log), Arc::clone(&pubsub));
        let (bank, user) = (AggregateId::new(), UserId::new());

        let report = router.publish(AGGREGATE_TYPE, &[character(bank, user)]);

        assert!(report.is_complete());
        assert!(log.records().is_empty());
        let sent = pubsub.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, format!("content-bank-aggregate:user-id:{user}"));
    }

    #[test]
    fn durable_events_are_keyed_by_aggregate_id() {
        let log = Arc::new(InMemoryLog::new());
        let router = EventRouter::over(Arc::clone(&log), InMemoryPubSub::new());
        let (bank, user) = (AggregateId::new(), UserId::new());

        router.publish(AGGREGATE_TYPE, &[created(bank, user), created(bank, user)]);

        let records = log.records_for(AGGREGATE_TYPE);
        assert_eq!(records.len(), 2);
        assert!(
            records
                .iter()
                .all(|r| r.key.as_deref() == Some(bank.to_string().as_str()))
        );
    }

    #[test]
    fn a_failing_send_does_not_abort_the_batch() {
        let log = Arc::new(InMemoryLog::new());
        let pubsub = Arc::new(InMemoryPubSub::new());
        let (bank, user) = (AggregateId::new(), UserId::new());
        pubsub.fail_channel(ephemeral_channel("X", user));
        let router = EventRouter::over(Arc::clone(&log), Arc::clone(&pubsub));

        let report = router.publish(
            "X",
            &[character(bank, user), created(bank, user), created(bank, user)],
        );

        assert_eq!(report, PublishReport { published: 2, failed: 1 });
        assert_eq!(log.records_for("X").len(), 2);
    }
}
