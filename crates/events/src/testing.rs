//! Event fixtures shared by this crate's unit tests.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::event::{Attributes, EventDefinition, EventKind, Payload, attributes_of};
use crate::registry::TypeRegistry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pinged {
    pub count: u32,
    pub label: String,
}

impl EventDefinition for Pinged {
    const NAME: &'static str = "test.pinged";
    const KIND: EventKind = EventKind::Domain;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ponged {}

impl EventDefinition for Ponged {
    const NAME: &'static str = "test.ponged";
    const KIND: EventKind = EventKind::Integration;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Buzzed {
    pub tags: Vec<String>,
    pub level: Option<i32>,
}

impl EventDefinition for Buzzed {
    const NAME: &'static str = "test.buzzed.ephemeral";
    const KIND: EventKind = EventKind::Ephemeral;
}

#[derive(Debug, Clone, PartialEq)]
pub enum TestEvent {
    Pinged(Pinged),
    Ponged(Ponged),
    Buzzed(Buzzed),
}

impl Payload for TestEvent {
    fn event_name(&self) -> &'static str {
        match self {
            TestEvent::Pinged(_) => Pinged::NAME,
            TestEvent::Ponged(_) => Ponged::NAME,
            TestEvent::Buzzed(_) => Buzzed::NAME,
        }
    }

    fn kind(&self) -> EventKind {
        match self {
            TestEvent::Pinged(_) => Pinged::KIND,
            TestEvent::Ponged(_) => Ponged::KIND,
            TestEvent::Buzzed(_) => Buzzed::KIND,
        }
    }

    fn to_attributes(&self) -> Result<Attributes, CodecError> {
        match self {
            TestEvent::Pinged(e) => attributes_of(e),
            TestEvent::Ponged(e) => attributes_of(e),
            TestEvent::Buzzed(e) => attributes_of(e),
        }
    }
}

impl From<Pinged> for TestEvent {
    fn from(value: Pinged) -> Self {
        TestEvent::Pinged(value)
    }
}

impl From<Ponged> for TestEvent {
    fn from(value: Ponged) -> Self {
        TestEvent::Ponged(value)
    }
}

impl From<Buzzed> for TestEvent {
    fn from(value: Buzzed) -> Self {
        TestEvent::Buzzed(value)
    }
}

pub fn test_registry() -> TypeRegistry<TestEvent> {
    TypeRegistry::builder()
        .register::<Pinged>(TestEvent::Pinged)
        .register::<Ponged>(TestEvent::Ponged)
        .register::<Buzzed>(TestEvent::Buzzed)
        .build()
        .expect("test registry has unique names")
}
