use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use snippetquiz_core::{AggregateId, DomainError, DomainResult, UserId};
use snippetquiz_events::{Command, Query};

/// Name given to the bank created for every newly verified user.
pub const DEFAULT_BANK_NAME: &str = "Default";

const MAX_NAME_LEN: usize = 255;

/// Trim a bank name and reject blank or oversized ones.
pub fn normalize_name(name: &str) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("content bank name must not be blank"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "content bank name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContentBank {
    pub bank_id: AggregateId,
    pub user_id: UserId,
    pub name: String,
}

impl Command for CreateContentBank {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameContentBank {
    pub bank_id: AggregateId,
    pub user_id: UserId,
    pub name: String,
}

impl Command for RenameContentBank {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteContentBank {
    pub bank_id: AggregateId,
    pub user_id: UserId,
}

impl Command for DeleteContentBank {}

/// Read-side view of one content bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBankView {
    pub id: AggregateId,
    pub user_id: UserId,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindContentBank {
    pub bank_id: AggregateId,
    pub user_id: UserId,
}

impl Query for FindContentBank {
    type Response = Option<ContentBankView>;
}

/// All banks of a user, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListContentBanks {
    pub user_id: UserId,
}

impl Query for ListContentBanks {
    type Response = Vec<ContentBankView>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        assert_eq!(normalize_name("  Rust notes ").unwrap(), "Rust notes");
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(matches!(normalize_name("   "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn oversized_names_are_rejected() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        assert!(normalize_name(&name).is_err());
        assert!(normalize_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
    }
}
