//! Command/query handler abstractions.
//!
//! Commands express **intent** ("create a content bank"), queries ask for a
//! read-only answer. Both are plain values routed by their Rust type: exactly
//! one handler per type, registered once at startup on a
//! [`crate::command_bus::CommandBus`] / [`crate::command_bus::QueryBus`].
//!
//! Handlers return `anyhow::Result` so that they can bubble up whatever their
//! collaborators fail with; the bus wraps the error with the request type.

use std::sync::Arc;

/// A request to change state. Carries no return value.
pub trait Command: core::fmt::Debug + Send + 'static {}

/// A read-only request with a typed answer.
pub trait Query: core::fmt::Debug + Send + 'static {
    type Response: Send + 'static;
}

pub trait CommandHandler<C: Command>: Send + Sync {
    fn handle(&self, command: C) -> anyhow::Result<()>;
}

pub trait QueryHandler<Q: Query>: Send + Sync {
    fn handle(&self, query: Q) -> anyhow::Result<Q::Response>;
}

impl<C: Command, H: CommandHandler<C> + ?Sized> CommandHandler<C> for Arc<H> {
    fn handle(&self, command: C) -> anyhow::Result<()> {
        (**self).handle(command)
    }
}

impl<Q: Query, H: QueryHandler<Q> + ?Sized> QueryHandler<Q> for Arc<H> {
    fn handle(&self, query: Q) -> anyhow::Result<Q::Response> {
        (**self).handle(query)
    }
}
