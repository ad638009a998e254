//! Command/query handlers and integration subscribers.

pub mod auth_user_verified;
pub mod content_banks;
pub mod topics_added;

pub use auth_user_verified::CreateDefaultContentBank;
pub use content_banks::{ContentBankQueries, ContentBankService};
pub use topics_added::ContentEntryTopics;
