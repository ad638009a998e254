//! Content bank projection.
//!
//! Builds the user-scoped [`ContentBankView`] read model from the
//! `content-bank-aggregate` topic.

use snippetquiz_contentbank::{ContentBankCreated, ContentBankRenamed, ContentBankView};
use snippetquiz_core::{AggregateId, UserId};
use snippetquiz_events::{AggregateSubscriber, Event};
use tracing::{debug, warn};

use crate::app_event::AppEvent;
use crate::read_model::UserStore;

/// Projection that maintains the content banks of every user.
pub struct ContentBankProjection<S> {
    store: S,
}

impl<S> ContentBankProjection<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply one content bank event. Other events are ignored.
    pub fn apply(&self, event: &Event<AppEvent>) {
        let (bank_id, user_id) = (event.aggregate_id(), event.user_id());

        match event.payload() {
            AppEvent::ContentBankCreated(e) => self.apply_created(bank_id, user_id, e),
            AppEvent::ContentBankRenamed(e) => self.apply_renamed(bank_id, user_id, e),
            AppEvent::ContentBankDeleted(_) => {
                if self.store.remove(user_id, &bank_id).is_none() {
                    debug!(bank_id = %bank_id, "deleted bank was not projected");
                }
            }
            _ => {}
        }
    }

    fn apply_created(&self, bank_id: AggregateId, user_id: UserId, e: &ContentBankCreated) {
        // Redelivery of the creation must not reset a later rename.
        if self.store.get(user_id, &bank_id).is_some() {
            return;
        }

        let view = ContentBankView {
            id: bank_id,
            user_id,
            name: e.name.clone(),
            created_at: e.created_at,
            updated_at: e.created_at,
        };
        self.store.upsert(user_id, bank_id, view);
    }

    fn apply_renamed(&self, bank_id: AggregateId, user_id: UserId, e: &ContentBankRenamed) {
        let Some(mut view) = self.store.get(user_id, &bank_id) else {
            warn!(bank_id = %bank_id, "rename for unknown bank ignored");
            return;
        };

        view.name = e.name.clone();
        view.updated_at = e.updated_at;
        self.store.upsert(user_id, bank_id, view);
    }
}

impl<S> AggregateSubscriber<AppEvent> for ContentBankProjection<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    fn name(&self) -> &'static str {
        "content_bank_projection"
    }

    fn on(&self, event: &Event<AppEvent>) -> anyhow::Result<()> {
        self.apply(event);
        Ok(())
    }
}
