//! In-process command and query buses.
//!
//! Handlers are keyed by the request's Rust type (`TypeId`), one handler per
//! type. Both buses are assembled by a builder and immutable afterwards;
//! registering a second handler for the same type is a build error rather
//! than a silent overwrite.
//!
//! Dispatch runs synchronously on the caller's thread.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{BusError, RegistryError};
use crate::handler::{Command, CommandHandler, Query, QueryHandler};

/// Type-erased `Arc<dyn CommandHandler<C>>` / `Arc<dyn QueryHandler<Q>>`.
type ErasedHandler = Box<dyn Any + Send + Sync>;

#[derive(Default)]
struct HandlerTable {
    handlers: HashMap<TypeId, ErasedHandler>,
    names: HashMap<TypeId, &'static str>,
    duplicate: Option<&'static str>,
}

impl HandlerTable {
    fn insert<R: 'static, H: Any + Send + Sync>(&mut self, handler: H) {
        let key = TypeId::of::<R>();
        if self.handlers.contains_key(&key) {
            self.duplicate.get_or_insert(type_name::<R>());
            return;
        }
        self.handlers.insert(key, Box::new(handler));
        self.names.insert(key, type_name::<R>());
    }

    fn get<R: 'static, H: Any>(&self) -> Result<&H, BusError> {
        self.handlers
            .get(&TypeId::of::<R>())
            .and_then(|h| h.downcast_ref::<H>())
            .ok_or(BusError::HandlerNotRegistered(type_name::<R>()))
    }

    fn check(&self) -> Result<(), RegistryError> {
        match self.duplicate {
            Some(name) => Err(RegistryError::DuplicateHandler(name)),
            None => Ok(()),
        }
    }

    fn registered(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.names.values().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Routes each command to its single registered handler.
pub struct CommandBus {
    table: HandlerTable,
}

impl CommandBus {
    pub fn builder() -> CommandBusBuilder {
        CommandBusBuilder::default()
    }

    /// Run the handler registered for `C`.
    ///
    /// Fails with [`BusError::HandlerNotRegistered`] before anything runs if
    /// no handler exists; handler errors come back as
    /// [`BusError::HandlerExecution`].
    pub fn dispatch<C: Command>(&self, command: C) -> Result<(), BusError> {
        let handler = self.table.get::<C, Arc<dyn CommandHandler<C>>>()?;
        debug!(command = type_name::<C>(), "dispatching command");

        handler
            .handle(command)
            .map_err(|cause| BusError::HandlerExecution {
                request_type: type_name::<C>(),
                cause,
            })
    }

    pub fn handles<C: Command>(&self) -> bool {
        self.table.handlers.contains_key(&TypeId::of::<C>())
    }
}

impl core::fmt::Debug for CommandBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandBus")
            .field("commands", &self.table.registered())
            .finish()
    }
}

#[derive(Default)]
pub struct CommandBusBuilder {
    table: HandlerTable,
}

impl CommandBusBuilder {
    pub fn register<C: Command>(mut self, handler: impl CommandHandler<C> + 'static) -> Self {
        let handler: Arc<dyn CommandHandler<C>> = Arc::new(handler);
        self.table.insert::<C, _>(handler);
        self
    }

    pub fn build(self) -> Result<CommandBus, RegistryError> {
        self.table.check()?;
        Ok(CommandBus { table: self.table })
    }
}

/// Routes each query to its single registered handler.
pub struct QueryBus {
    table: HandlerTable,
}

impl QueryBus {
    pub fn builder() -> QueryBusBuilder {
        QueryBusBuilder::default()
    }

    pub fn ask<Q: Query>(&self, query: Q) -> Result<Q::Response, BusError> {
        let handler = self.table.get::<Q, Arc<dyn QueryHandler<Q>>>()?;
        debug!(query = type_name::<Q>(), "asking query");

        handler
            .handle(query)
            .map_err(|cause| BusError::HandlerExecution {
                request_type: type_name::<Q>(),
                cause,
            })
    }

    pub fn handles<Q: Query>(&self) -> bool {
        self.table.handlers.contains_key(&TypeId::of::<Q>())
    }
}

impl core::fmt::Debug for QueryBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryBus")
            .field("queries", &self.table.registered())
            .finish()
    }
}

#[derive(Default)]
pub struct QueryBusBuilder {
    table: HandlerTable,
}

impl QueryBusBuilder {
    pub fn register<Q: Query>(mut self, handler: impl QueryHandler<Q> + 'static) -> Self {
        let handler: Arc<dyn QueryHandler<Q>> = Arc::new(handler);
        self.table.insert::<Q, _>(handler);
        self
    }

    pub fn build(self) -> Result<QueryBus, RegistryError> {
        self.table.check()?;
        Ok(QueryBus { table: self.table })
    }
}
