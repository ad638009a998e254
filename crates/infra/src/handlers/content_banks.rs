//! Content bank command and query handlers.
//!
//! Commands change the bank state owned by [`ContentBankService`], version
//! their events through the event store and publish them; queries only read
//! the projected views.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use snippetquiz_contentbank::{
    AGGREGATE_TYPE, CharacterMessage, ContentBankCreated, ContentBankDeleted, ContentBankRenamed,
    ContentBankView, CreateContentBank, DeleteContentBank, FindContentBank, ListContentBanks,
    RenameContentBank, normalize_name,
};
use snippetquiz_core::{AggregateId, DomainError, UserId};
use snippetquiz_events::{CommandHandler, Event, QueryHandler};

use crate::app_event::AppEvent;
use crate::event_store::{EventStoreError, EventStorePublisher, ExpectedVersion};
use crate::read_model::UserStore;

/// Write side of the content bank context.
///
/// Commands are serialized: the uniqueness checks and the writes that follow
/// them happen under one lock.
pub struct ContentBankService<S> {
    events: EventStorePublisher<AppEvent>,
    banks: S,
    writes: Mutex<()>,
}

impl<S> ContentBankService<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    pub fn new(events: EventStorePublisher<AppEvent>, banks: S) -> Self {
        Self {
            events,
            banks,
            writes: Mutex::new(()),
        }
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| anyhow::anyhow!("content bank write lock poisoned"))
    }

    fn ensure_name_free(
        &self,
        user_id: UserId,
        name: &str,
        except: Option<AggregateId>,
    ) -> Result<(), DomainError> {
        let taken = self
            .banks
            .list(user_id)
            .iter()
            .any(|bank| bank.name == name && Some(bank.id) != except);
        if taken {
            return Err(DomainError::conflict(
                "a content bank with this name already exists",
            ));
        }
        Ok(())
    }

    fn expected_version(
        &self,
        user_id: UserId,
        bank_id: AggregateId,
    ) -> Result<ExpectedVersion, EventStoreError> {
        Ok(self.events.store().current_version(user_id, bank_id)?.into())
    }

    fn save(
        &self,
        events: Vec<Event<AppEvent>>,
        expected: ExpectedVersion,
    ) -> anyhow::Result<()> {
        match self.events.save_events(AGGREGATE_TYPE, events, expected) {
            Ok(_) => Ok(()),
            Err(EventStoreError::Concurrency { .. }) => Err(DomainError::conflict(
                "content bank was modified concurrently",
            )
            .into()),
            Err(err) => Err(err.into()),
        }
    }
}

impl<S> CommandHandler<CreateContentBank> for ContentBankService<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    fn handle(&self, command: CreateContentBank) -> anyhow::Result<()> {
        let CreateContentBank {
            bank_id,
            user_id,
            name,
        } = command;
        let name = normalize_name(&name)?;

        let _guard = self.lock()?;
        if self.banks.get(user_id, &bank_id).is_some() {
            let err = DomainError::conflict(format!("content bank {bank_id} already exists"));
            return Err(err.into());
        }
        self.ensure_name_free(user_id, &name, None)?;

        let now = Utc::now().naive_utc();
        self.save(
            vec![
                Event::new(
                    bank_id,
                    user_id,
                    CharacterMessage::text(format!("Your content bank \"{name}\" is ready!")),
                ),
                Event::new(
                    bank_id,
                    user_id,
                    ContentBankCreated {
                        name: name.clone(),
                        created_at: now,
                    },
                ),
            ],
            ExpectedVersion::NoStream,
        )?;

        self.banks.upsert(
            user_id,
            bank_id,
            ContentBankView {
                id: bank_id,
                user_id,
                name,
                created_at: now,
                updated_at: now,
            },
        );
        info!(bank_id = %bank_id, user_id = %user_id, "content bank created");
        Ok(())
    }
}

impl<S> CommandHandler<RenameContentBank> for ContentBankService<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    fn handle(&self, command: RenameContentBank) -> anyhow::Result<()> {
        let RenameContentBank {
            bank_id,
            user_id,
            name,
        } = command;
        let name = normalize_name(&name)?;

        let _guard = self.lock()?;
        let mut bank = self
            .banks
            .get(user_id, &bank_id)
            .ok_or_else(DomainError::not_found)?;
        self.ensure_name_free(user_id, &name, Some(bank_id))?;

        let updated_at = Utc::now().naive_utc();
        let expected = self.expected_version(user_id, bank_id)?;
        self.save(
            vec![Event::new(
                bank_id,
                user_id,
                ContentBankRenamed {
                    name: name.clone(),
                    updated_at,
                },
            )],
            expected,
        )?;

        bank.name = name;
        bank.updated_at = updated_at;
        self.banks.upsert(user_id, bank_id, bank);
        Ok(())
    }
}

impl<S> CommandHandler<DeleteContentBank> for ContentBankService<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    fn handle(&self, command: DeleteContentBank) -> anyhow::Result<()> {
        let DeleteContentBank { bank_id, user_id } = command;

        let _guard = self.lock()?;
        if self.banks.get(user_id, &bank_id).is_none() {
            return Err(DomainError::not_found().into());
        }

        let expected = self.expected_version(user_id, bank_id)?;
        self.save(
            vec![Event::new(bank_id, user_id, ContentBankDeleted {})],
            expected,
        )?;
        self.banks.remove(user_id, &bank_id);
        Ok(())
    }
}

/// Read side: answers from the projected views.
pub struct ContentBankQueries<S> {
    views: S,
}

impl<S> ContentBankQueries<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    pub fn new(views: S) -> Self {
        Self { views }
    }
}

impl<S> QueryHandler<FindContentBank> for ContentBankQueries<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    fn handle(&self, query: FindContentBank) -> anyhow::Result<Option<ContentBankView>> {
        Ok(self.views.get(query.user_id, &query.bank_id))
    }
}

impl<S> QueryHandler<ListContentBanks> for ContentBankQueries<S>
where
    S: UserStore<AggregateId, ContentBankView>,
{
    fn handle(&self, query: ListContentBanks) -> anyhow::Result<Vec<ContentBankView>> {
        let mut banks = self.views.list(query.user_id);
        banks.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(banks)
    }
}
