//! Processed-event bookkeeping for at-least-once consumption.
//!
//! The inbound consumer commits after a batch, so a crash mid-batch replays
//! events a subscriber already handled. Wrapping a subscriber in
//! [`Idempotent`] turns those replays into no-ops.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tracing::debug;

use snippetquiz_core::EventId;
use snippetquiz_events::{AggregateSubscriber, Event, IntegrationSubscriber, Payload};

/// Which `(event, subscriber)` pairs have been handled.
pub trait ProcessedEvents: Send + Sync {
    fn is_processed(&self, event_id: EventId, subscriber: &str) -> bool;
    fn mark_processed(&self, event_id: EventId, subscriber: &str);
}

impl<S> ProcessedEvents for Arc<S>
where
    S: ProcessedEvents + ?Sized,
{
    fn is_processed(&self, event_id: EventId, subscriber: &str) -> bool {
        (**self).is_processed(event_id, subscriber)
    }

    fn mark_processed(&self, event_id: EventId, subscriber: &str) {
        (**self).mark_processed(event_id, subscriber)
    }
}

/// In-memory processed-event store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProcessedEvents {
    inner: RwLock<HashSet<(EventId, String)>>,
}

impl InMemoryProcessedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|set| set.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProcessedEvents for InMemoryProcessedEvents {
    fn is_processed(&self, event_id: EventId, subscriber: &str) -> bool {
        self.inner
            .read()
            .map(|set| set.contains(&(event_id, subscriber.to_string())))
            .unwrap_or(false)
    }

    fn mark_processed(&self, event_id: EventId, subscriber: &str) {
        if let Ok(mut set) = self.inner.write() {
            set.insert((event_id, subscriber.to_string()));
        }
    }
}

/// Skips events the wrapped subscriber already handled successfully.
///
/// Only successful runs are recorded, so a failed event is retried on
/// redelivery.
pub struct Idempotent<S> {
    inner: S,
    processed: Arc<dyn ProcessedEvents>,
}

impl<S> Idempotent<S> {
    pub fn new(inner: S, processed: Arc<dyn ProcessedEvents>) -> Self {
        Self { inner, processed }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn run<P: Payload>(
        &self,
        subscriber: &'static str,
        event: &Event<P>,
        handle: impl FnOnce() -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        let event_id = event.event_id();
        if self.processed.is_processed(event_id, subscriber) {
            debug!(subscriber, event_id = %event_id, "event already processed; skipping");
            return Ok(());
        }

        handle()?;
        self.processed.mark_processed(event_id, subscriber);
        Ok(())
    }
}

impl<P, S> AggregateSubscriber<P> for Idempotent<S>
where
    P: Payload,
    S: AggregateSubscriber<P>,
{
    fn name(&self) -> &'static str {
        AggregateSubscriber::<P>::name(&self.inner)
    }

    fn on(&self, event: &Event<P>) -> anyhow::Result<()> {
        let name = AggregateSubscriber::<P>::name(&self.inner);
        self.run(name, event, || AggregateSubscriber::on(&self.inner, event))
    }
}

impl<P, S> IntegrationSubscriber<P> for Idempotent<S>
where
    P: Payload,
    S: IntegrationSubscriber<P>,
{
    fn name(&self) -> &'static str {
        IntegrationSubscriber::<P>::name(&self.inner)
    }

    fn on(&self, event: &Event<P>) -> anyhow::Result<()> {
        let name = IntegrationSubscriber::<P>::name(&self.inner);
        self.run(name, event, || IntegrationSubscriber::on(&self.inner, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use snippetquiz_contentbank::AuthUserVerified;
    use snippetquiz_core::{AggregateId, UserId};

    use crate::app_event::AppEvent;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl IntegrationSubscriber<AppEvent> for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn on(&self, _event: &Event<AppEvent>) -> anyhow::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                anyhow::bail!("transient");
            }
            Ok(())
        }
    }

    fn verified() -> Event<AppEvent> {
        Event::new(AggregateId::new(), UserId::new(), AuthUserVerified {})
    }

    #[test]
    fn duplicate_delivery_runs_the_subscriber_once() {
        let store = Arc::new(InMemoryProcessedEvents::new());
        let subscriber = Idempotent::new(Counting::default(), store.clone());
        let event = verified();

        IntegrationSubscriber::on(&subscriber, &event).unwrap();
        IntegrationSubscriber::on(&subscriber, &event).unwrap();

        assert_eq!(subscriber.inner().calls.load(Ordering::SeqCst), 1);
        assert!(store.is_processed(event.event_id(), "counting"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failures_are_not_recorded() {
        let store = Arc::new(InMemoryProcessedEvents::new());
        let subscriber = Idempotent::new(
            Counting {
                fail_first: true,
                ..Counting::default()
            },
            store.clone(),
        );
        let event = verified();

        assert!(IntegrationSubscriber::on(&subscriber, &event).is_err());
        assert!(!store.is_processed(event.event_id(), "counting"));

        IntegrationSubscriber::on(&subscriber, &event).unwrap();
        assert_eq!(subscriber.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn records_are_per_subscriber() {
        let store = InMemoryProcessedEvents::new();
        let event = verified();

        store.mark_processed(event.event_id(), "a");

        assert!(store.is_processed(event.event_id(), "a"));
        assert!(!store.is_processed(event.event_id(), "b"));
    }
}
