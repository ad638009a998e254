//! User-scoped read model storage abstractions.

pub mod user_store;

pub use user_store::{InMemoryUserStore, UserStore};
