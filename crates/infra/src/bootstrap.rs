//! Explicit wiring of the dispatch core.
//!
//! Every event type, subscriber and handler is registered here, once, at
//! startup. Nothing is discovered at runtime.
//!
//! | topic / event | subscriber |
//! |---|---|
//! | `content-bank-aggregate` | [`ContentBankProjection`] |
//! | `quiz-aggregate` | [`QuizProjection`] (idempotent) |
//! | `auth.user.verified` | [`CreateDefaultContentBank`] (idempotent) |
//! | `ai-processor.topics.added` | [`ContentEntryTopics`] |

use std::sync::Arc;
use std::time::Duration;

use snippetquiz_contentbank::{
    AuthUserVerified, ContentBankView, CreateContentBank, DeleteContentBank, FindContentBank,
    ListContentBanks, RenameContentBank, TopicsAdded,
};
use snippetquiz_core::AggregateId;
use snippetquiz_events::{
    CommandBus, EnvelopeCodec, EventBus, EventDefinition, LogConnector, QueryBus, RegistryError,
    SubscriberRegistry, TypeRegistry,
};

use crate::app_event::{AppEvent, register_events};
use crate::event_store::{EventStorePublisher, InMemoryEventStore};
use crate::handlers::{
    ContentBankQueries, ContentBankService, ContentEntryTopics, CreateDefaultContentBank,
};
use crate::processed::{Idempotent, InMemoryProcessedEvents};
use crate::projections::{ContentBankProjection, QuizProjection, QuizView};
use crate::read_model::InMemoryUserStore;
use crate::workers::{EventDispatcher, InboundConsumer};

/// Type registry holding every application event.
pub fn type_registry() -> Result<TypeRegistry<AppEvent>, RegistryError> {
    register_events(TypeRegistry::builder()).build()
}

/// Stores shared by handlers and projections.
#[derive(Debug, Clone, Default)]
pub struct Stores {
    /// Write-side state of content banks.
    pub bank_state: Arc<InMemoryUserStore<AggregateId, ContentBankView>>,
    /// Projected content bank views (query side).
    pub content_banks: Arc<InMemoryUserStore<AggregateId, ContentBankView>>,
    pub quizzes: Arc<InMemoryUserStore<AggregateId, QuizView>>,
    /// Topics per content entry.
    pub entry_topics: Arc<InMemoryUserStore<AggregateId, Vec<String>>>,
    pub processed: Arc<InMemoryProcessedEvents>,
    /// Versioned domain events, per user and aggregate.
    pub event_store: Arc<InMemoryEventStore<AppEvent>>,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Everything a process needs to publish, consume and dispatch.
pub struct Dispatch {
    pub codec: EnvelopeCodec<AppEvent>,
    pub subscribers: Arc<SubscriberRegistry<AppEvent>>,
    pub commands: Arc<CommandBus>,
    pub queries: Arc<QueryBus>,
    pub events: Arc<dyn EventBus<AppEvent>>,
}

impl Dispatch {
    pub fn dispatcher(&self) -> Arc<EventDispatcher<AppEvent>> {
        Arc::new(EventDispatcher::new(
            self.codec.clone(),
            Arc::clone(&self.subscribers),
        ))
    }

    pub fn consumer<C: LogConnector>(
        &self,
        connector: C,
        poll_timeout: Duration,
    ) -> InboundConsumer<C, AppEvent> {
        InboundConsumer::new(connector, self.dispatcher(), poll_timeout)
    }
}

impl core::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatch")
            .field("subscribers", &self.subscribers)
            .field("commands", &self.commands)
            .field("queries", &self.queries)
            .finish_non_exhaustive()
    }
}

/// Build registries and buses on top of `events`.
pub fn build(events: Arc<dyn EventBus<AppEvent>>, stores: &Stores) -> Result<Dispatch, RegistryError> {
    let codec = EnvelopeCodec::new(Arc::new(type_registry()?));

    let service = Arc::new(ContentBankService::new(
        EventStorePublisher::new(stores.event_store.clone(), Arc::clone(&events)),
        Arc::clone(&stores.bank_state),
    ));
    let commands = Arc::new(
        CommandBus::builder()
            .register::<CreateContentBank>(Arc::clone(&service))
            .register::<RenameContentBank>(Arc::clone(&service))
            .register::<DeleteContentBank>(service)
            .build()?,
    );

    let queries = Arc::new(ContentBankQueries::new(Arc::clone(&stores.content_banks)));
    let queries = Arc::new(
        QueryBus::builder()
            .register::<FindContentBank>(Arc::clone(&queries))
            .register::<ListContentBanks>(queries)
            .build()?,
    );

    let processed = stores.processed.clone();
    let subscribers = SubscriberRegistry::<AppEvent>::builder()
        .aggregate(
            snippetquiz_contentbank::AGGREGATE_TYPE,
            Arc::new(ContentBankProjection::new(Arc::clone(&stores.content_banks))),
        )
        .aggregate(
            snippetquiz_quiz::AGGREGATE_TYPE,
            Arc::new(Idempotent::new(
                QuizProjection::new(Arc::clone(&stores.quizzes)),
                processed.clone(),
            )),
        )
        .integration(
            AuthUserVerified::NAME,
            Arc::new(Idempotent::new(
                CreateDefaultContentBank::new(Arc::clone(&commands)),
                processed,
            )),
        )
        .integration(
            TopicsAdded::NAME,
            Arc::new(ContentEntryTopics::new(Arc::clone(&stores.entry_topics))),
        )
        .build()?;

    Ok(Dispatch {
        codec,
        subscribers: Arc::new(subscribers),
        commands,
        queries,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use snippetquiz_events::{Event, PublishReport};

    struct NullBus;

    impl EventBus<AppEvent> for NullBus {
        fn publish(&self, _aggregate_type: &str, events: &[Event<AppEvent>]) -> PublishReport {
            PublishReport {
                published: events.len(),
                failed: 0,
            }
        }
    }

    #[test]
    fn consumer_topics_cover_aggregates_and_integration_events() {
        let dispatch = build(Arc::new(NullBus), &Stores::new()).unwrap();

        let expected: BTreeSet<String> = [
            "ai-processor.topics.added",
            "auth.user.verified",
            "content-bank-aggregate",
            "quiz-aggregate",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(dispatch.subscribers.topics(), expected);
    }

    #[test]
    fn every_content_bank_request_has_a_handler() {
        let dispatch = build(Arc::new(NullBus), &Stores::new()).unwrap();

        assert!(dispatch.commands.handles::<CreateContentBank>());
        assert!(dispatch.commands.handles::<RenameContentBank>());
        assert!(dispatch.commands.handles::<DeleteContentBank>());
        assert!(dispatch.queries.handles::<FindContentBank>());
        assert!(dispatch.queries.handles::<ListContentBanks>());
    }

    #[test]
    fn registry_knows_every_event() {
        let registry = type_registry().unwrap();
        assert_eq!(registry.len(), 11);
    }
}
