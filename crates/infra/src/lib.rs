//! Infrastructure layer: composition, Redis adapters, config, workers.
//!
//! - [`app_event`]: the application's event union and its registrations
//! - [`event_bus`]: event router and Redis transports (feature `redis`)
//! - [`workers`]: the inbound consumer
//! - [`handlers`], [`projections`], [`read_model`], [`processed`]: the
//!   content bank and quiz behaviour hanging off the dispatch core
//! - [`bootstrap`]: explicit wiring of all of the above

pub mod app_event;
pub mod bootstrap;
pub mod config;
pub mod event_bus;
pub mod event_store;
pub mod handlers;
pub mod processed;
pub mod projections;
pub mod read_model;
pub mod workers;


pub use app_event::AppEvent;
pub use bootstrap::{Dispatch, Stores};
pub use config::{ConfigError, DispatchConfig};
pub use workers::{ConsumerError, ConsumerState, DispatchOutcome, EventDispatcher, InboundConsumer};
