//! Background workers.

pub mod inbound_consumer;

pub use inbound_consumer::{
    ConsumerError, ConsumerState, DispatchOutcome, EventDispatcher, InboundConsumer, WorkerHandle,
};
