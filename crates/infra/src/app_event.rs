//! The application's event union.
//!
//! Every concrete event of every context is one variant of [`AppEvent`]. The
//! list below is the single place a new event has to be added: the enum, its
//! [`Payload`] implementation, the `From` conversions and the type-registry
//! registrations are all generated from it.

use snippetquiz_contentbank::{
    AuthUserVerified, CharacterMessage, ContentBankCreated, ContentBankDeleted,
    ContentBankRenamed, TopicsAdded,
};
use snippetquiz_events::{
    Attributes, CodecError, EventDefinition, EventKind, Payload, TypeRegistryBuilder,
    attributes_of,
};
use snippetquiz_quiz::{QuizAnswerMarked, QuizCreated, QuizDeleted, QuizProgress, QuizStatusUpdated};

macro_rules! app_events {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum AppEvent {
            $($variant($ty)),+
        }

        impl Payload for AppEvent {
            fn event_name(&self) -> &'static str {
                match self {
                    $(AppEvent::$variant(_) => <$ty as EventDefinition>::NAME),+
                }
            }

            fn kind(&self) -> EventKind {
                match self {
                    $(AppEvent::$variant(_) => <$ty as EventDefinition>::KIND),+
                }
            }

            fn to_attributes(&self) -> Result<Attributes, CodecError> {
                match self {
                    $(AppEvent::$variant(e) => attributes_of(e)),+
                }
            }
        }

        $(
            impl From<$ty> for AppEvent {
                fn from(value: $ty) -> Self {
                    AppEvent::$variant(value)
                }
            }
        )+

        /// Register every application event on a type-registry builder.
        pub fn register_events(builder: TypeRegistryBuilder<AppEvent>) -> TypeRegistryBuilder<AppEvent> {
            builder
                $(.register::<$ty>(AppEvent::$variant))+
        }
    };
}

app_events! {
    // content bank
    ContentBankCreated(ContentBankCreated),
    ContentBankRenamed(ContentBankRenamed),
    ContentBankDeleted(ContentBankDeleted),
    CharacterMessage(CharacterMessage),
    AuthUserVerified(AuthUserVerified),
    TopicsAdded(TopicsAdded),
    // quiz
    QuizCreated(QuizCreated),
    QuizStatusUpdated(QuizStatusUpdated),
    QuizAnswerMarked(QuizAnswerMarked),
    QuizDeleted(QuizDeleted),
    QuizProgress(QuizProgress),
}
