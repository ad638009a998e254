//! Content bank context: events, commands and queries.
//!
//! This crate only declares the messages; handlers and projections are wired
//! up in `snippetquiz-infra`.

pub mod commands;
pub mod events;

/// Durable topic (and ephemeral channel prefix) for content bank events.
pub const AGGREGATE_TYPE: &str = "content-bank-aggregate";

pub use commands::{
    ContentBankView, CreateContentBank, DEFAULT_BANK_NAME, DeleteContentBank, FindContentBank,
    ListContentBanks, RenameContentBank, normalize_name,
};
pub use events::{
    AuthUserVerified, CharacterMessage, ContentBankCreated, ContentBankDeleted,
    ContentBankRenamed, TopicsAdded,
};
