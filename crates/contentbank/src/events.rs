use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use snippetquiz_events::{EventDefinition, EventKind};

/// Domain event: a content bank was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBankCreated {
    pub name: String,
    pub created_at: NaiveDateTime,
}

impl EventDefinition for ContentBankCreated {
    const NAME: &'static str = "content_bank.created";
    const KIND: EventKind = EventKind::Domain;
}

/// Domain event: a content bank got a new name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBankRenamed {
    pub name: String,
    pub updated_at: NaiveDateTime,
}

impl EventDefinition for ContentBankRenamed {
    const NAME: &'static str = "content_bank.renamed";
    const KIND: EventKind = EventKind::Domain;
}

/// Domain event: a content bank was removed. Carries no fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBankDeleted {}

impl EventDefinition for ContentBankDeleted {
    const NAME: &'static str = "content_bank.deleted";
    const KIND: EventKind = EventKind::Domain;
}

/// Ephemeral notification rendered by the UI's guide character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterMessage {
    pub character_message: String,
    #[serde(rename = "characterSpriteURL")]
    pub character_sprite_url: Option<String>,
    pub character_animate_to: Option<i32>,
    pub character_animate_seconds: Option<i32>,
}

impl CharacterMessage {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            character_message: message.into(),
            character_sprite_url: None,
            character_animate_to: None,
            character_animate_seconds: None,
        }
    }
}

impl EventDefinition for CharacterMessage {
    const NAME: &'static str = "character.message.ephemeral";
    const KIND: EventKind = EventKind::Ephemeral;
}

/// Integration event from the auth service: a user confirmed their account.
///
/// The aggregate is the user, so `aggregate_id` and `user_id` carry the same
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUserVerified {}

impl EventDefinition for AuthUserVerified {
    const NAME: &'static str = "auth.user.verified";
    const KIND: EventKind = EventKind::Integration;
}

/// Integration event from the AI processor: topics extracted for a content
/// entry (`aggregate_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicsAdded {
    #[serde(default)]
    pub topics: Vec<String>,
}

impl EventDefinition for TopicsAdded {
    const NAME: &'static str = "ai-processor.topics.added";
    const KIND: EventKind = EventKind::Integration;
}
