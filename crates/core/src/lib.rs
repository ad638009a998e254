//! `snippetquiz-core`: identifiers and domain errors shared by every crate.
//!
//! This crate has no infrastructure concerns and no knowledge of transports.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, EventId, UserId};
