//! `snippetquiz-events`: event/command dispatch mechanics.
//!
//! Pure plumbing with no knowledge of content banks or quizzes:
//!
//! - [`event`]: the event value, kinds and the payload contract
//! - [`envelope`]: wire codec
//! - [`registry`]: event name → decoder
//! - [`subscriber`]: topic / event name → subscribers
//! - [`bus`], [`transport`]: publishing seams and routing
//! - [`command_bus`]: typed command/query dispatch
//! - [`in_memory_bus`]: in-process transports for tests/dev

pub mod bus;
pub mod command_bus;
pub mod envelope;
pub mod error;
pub mod event;
pub mod handler;
pub mod in_memory_bus;
pub mod registry;
pub mod subscriber;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use bus::{EventBus, PublishReport, Route, Subscription, route};
pub use command_bus::{CommandBus, CommandBusBuilder, QueryBus, QueryBusBuilder};
pub use envelope::EnvelopeCodec;
pub use error::{
    BusError, CodecError, RegistryError, SubscriberDispatchError, TransportError,
};
pub use event::{
    Attributes, Event, EventDefinition, EventKind, Payload, UNSET_VERSION, attributes_of,
    definition_from,
};
pub use handler::{Command, CommandHandler, Query, QueryHandler};
pub use in_memory_bus::{InMemoryLog, InMemoryLogConnector, InMemoryLogConsumer, InMemoryPubSub};
pub use registry::{Decoder, TypeRegistry, TypeRegistryBuilder};
pub use subscriber::{
    AggregateSubscriber, IntegrationSubscriber, SubscriberRegistry, SubscriberRegistryBuilder,
};
pub use transport::{ConsumedRecord, DurableTransport, EphemeralTransport, LogConnector, LogConsumer};
