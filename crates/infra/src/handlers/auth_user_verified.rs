//! `auth.user.verified` → a "Default" content bank for the new user.

use std::sync::Arc;

use tracing::{info, warn};

use snippetquiz_contentbank::{CreateContentBank, DEFAULT_BANK_NAME};
use snippetquiz_core::{AggregateId, DomainError, UserId};
use snippetquiz_events::{BusError, CommandBus, Event, IntegrationSubscriber};

use crate::app_event::AppEvent;

pub struct CreateDefaultContentBank {
    commands: Arc<CommandBus>,
}

impl CreateDefaultContentBank {
    pub fn new(commands: Arc<CommandBus>) -> Self {
        Self { commands }
    }
}

impl IntegrationSubscriber<AppEvent> for CreateDefaultContentBank {
    fn name(&self) -> &'static str {
        "create_default_content_bank"
    }

    fn on(&self, event: &Event<AppEvent>) -> anyhow::Result<()> {
        let AppEvent::AuthUserVerified(_) = event.payload() else {
            warn!(event_type = event.event_name(), "unexpected integration event");
            return Ok(());
        };

        // The verified user is the event's aggregate.
        let user_id = UserId::from_uuid(*event.aggregate_id().as_uuid());
        info!(user_id = %user_id, "user verified; creating default content bank");

        let command = CreateContentBank {
            bank_id: AggregateId::new(),
            user_id,
            name: DEFAULT_BANK_NAME.to_string(),
        };

        match self.commands.dispatch(command) {
            Ok(()) => Ok(()),
            Err(BusError::HandlerExecution { cause, .. })
                if matches!(cause.downcast_ref::<DomainError>(), Some(DomainError::Conflict(_))) =>
            {
                info!(user_id = %user_id, "default content bank already exists");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use snippetquiz_contentbank::AuthUserVerified;
    use snippetquiz_events::CommandHandler;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<CreateContentBank>>,
        conflict: bool,
    }

    impl CommandHandler<CreateContentBank> for Recorder {
        fn handle(&self, command: CreateContentBank) -> anyhow::Result<()> {
            self.commands.lock().unwrap().push(command);
            if self.conflict {
                return Err(DomainError::conflict("exists").into());
            }
            Ok(())
        }
    }

    fn subscriber(recorder: &Arc<Recorder>) -> CreateDefaultContentBank {
        let bus = CommandBus::builder()
            .register::<CreateContentBank>(Arc::clone(recorder))
            .build()
            .unwrap();
        CreateDefaultContentBank::new(Arc::new(bus))
    }

    #[test]
    fn dispatches_a_default_bank_for_the_verified_user() {
        let recorder = Arc::new(Recorder::default());
        let user = UserId::new();
        let event = Event::new(AggregateId::from_uuid(*user.as_uuid()), user, AuthUserVerified {});

        subscriber(&recorder).on(&event).unwrap();

        let commands = recorder.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].user_id, user);
        assert_eq!(commands[0].name, DEFAULT_BANK_NAME);
    }

    #[test]
    fn an_existing_default_bank_is_not_an_error() {
        let recorder = Arc::new(Recorder {
            conflict: true,
            ..Recorder::default()
        });
        let user = UserId::new();
        let event = Event::new(AggregateId::from_uuid(*user.as_uuid()), user, AuthUserVerified {});

        assert!(subscriber(&recorder).on(&event).is_ok());
    }
}
