use std::sync::Arc;

use tracing::warn;

use snippetquiz_events::{Event, EventBus, EventKind, Payload, PublishReport};

use super::{EventStore, EventStoreError, ExpectedVersion};

/// Stores the domain events of a batch, then publishes the whole batch.
///
/// Non-domain events (ephemeral messages, integration notifications) are
/// published unversioned ahead of the stored ones. Nothing is published when
/// the append fails.
pub struct EventStorePublisher<P> {
    store: Arc<dyn EventStore<P>>,
    bus: Arc<dyn EventBus<P>>,
}

impl<P: Payload> EventStorePublisher<P> {
    pub fn new(store: Arc<dyn EventStore<P>>, bus: Arc<dyn EventBus<P>>) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &dyn EventStore<P> {
        self.store.as_ref()
    }

    pub fn save_events(
        &self,
        aggregate_type: &str,
        events: Vec<Event<P>>,
        expected: ExpectedVersion,
    ) -> Result<PublishReport, EventStoreError> {
        let (domain, mut batch): (Vec<_>, Vec<_>) = events
            .into_iter()
            .partition(|e| e.kind() == EventKind::Domain);

        batch.extend(self.store.append(domain, expected)?);

        let report = self.bus.publish(aggregate_type, &batch);
        if !report.is_complete() {
            warn!(
                aggregate_type,
                published = report.published,
                failed = report.failed,
                "stored events partially published"
            );
        }
        Ok(report)
    }
}

impl<P> core::fmt::Debug for EventStorePublisher<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventStorePublisher").finish_non_exhaustive()
    }
}
