//! `ai-processor.topics.added` → topics attached to a content entry.

use tracing::{info, warn};

use snippetquiz_core::AggregateId;
use snippetquiz_events::{Event, IntegrationSubscriber};

use crate::app_event::AppEvent;
use crate::read_model::UserStore;

/// Records the topics the AI processor extracted for each content entry.
///
/// An entry keeps the first non-empty topic list it receives.
pub struct ContentEntryTopics<S> {
    store: S,
}

impl<S> ContentEntryTopics<S>
where
    S: UserStore<AggregateId, Vec<String>>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Trim, drop blanks and deduplicate, keeping first-seen order.
fn clean_topics(raw: &[String]) -> Vec<String> {
    let mut topics: Vec<String> = Vec::with_capacity(raw.len());
    for topic in raw.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !topics.iter().any(|t| t == topic) {
            topics.push(topic.to_string());
        }
    }
    topics
}

impl<S> IntegrationSubscriber<AppEvent> for ContentEntryTopics<S>
where
    S: UserStore<AggregateId, Vec<String>>,
{
    fn name(&self) -> &'static str {
        "content_entry_topics"
    }

    fn on(&self, event: &Event<AppEvent>) -> anyhow::Result<()> {
        let AppEvent::TopicsAdded(added) = event.payload() else {
            warn!(event_type = event.event_name(), "unexpected integration event");
            return Ok(());
        };
        let (entry_id, user_id) = (event.aggregate_id(), event.user_id());

        if let Some(existing) = self.store.get(user_id, &entry_id) {
            if !existing.is_empty() {
                warn!(entry_id = %entry_id, ?existing, "content entry already has topics");
                return Ok(());
            }
        }

        let topics = clean_topics(&added.topics);
        info!(entry_id = %entry_id, count = topics.len(), "topics linked to content entry");
        self.store.upsert(user_id, entry_id, topics);
        Ok(())
    }
}
