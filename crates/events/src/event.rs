use chrono::{NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use snippetquiz_core::{AggregateId, EventId, UserId};

use crate::error::CodecError;

/// Event-specific payload fields, as carried in the envelope's `attributes`.
pub type Attributes = Map<String, JsonValue>;

/// Version carried by events that were never assigned one.
pub const UNSET_VERSION: i64 = -1;

/// Delivery class of an event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Durable, ordered per aggregate, replayable (projections).
    Domain,
    /// Durable, cross-context notification consumed by other services.
    Integration,
    /// Fire-and-forget, delivered only to currently connected listeners.
    Ephemeral,
}

impl EventKind {
    pub fn is_durable(self) -> bool {
        !matches!(self, EventKind::Ephemeral)
    }
}

/// A concrete event type with a stable wire name.
///
/// The serde representation of the type *is* its attribute map, so the type
/// must serialize to a JSON object (use `struct Foo {}` rather than a unit
/// struct for events without fields).
pub trait EventDefinition:
    Serialize + DeserializeOwned + Clone + core::fmt::Debug + PartialEq + Send + Sync + 'static
{
    /// Globally unique event name (e.g. "content_bank.created").
    const NAME: &'static str;

    const KIND: EventKind;
}

/// The tagged union of every event an application knows about.
///
/// Implemented by an enum with one variant per [`EventDefinition`]; dispatch
/// switches on [`Payload::kind`] instead of type tests.
pub trait Payload: Clone + core::fmt::Debug + PartialEq + Send + Sync + 'static {
    fn event_name(&self) -> &'static str;

    fn kind(&self) -> EventKind;

    fn to_attributes(&self) -> Result<Attributes, CodecError>;
}

/// Serialize an event definition into its attribute map.
pub fn attributes_of<E: EventDefinition>(event: &E) -> Result<Attributes, CodecError> {
    let value =
        serde_json::to_value(event).map_err(|e| CodecError::Serialization(e.to_string()))?;

    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(CodecError::invalid_attributes(
            E::NAME,
            format!("expected an object, found {other}"),
        )),
    }
}

/// Rebuild an event definition from an attribute map.
///
/// Keys that do not belong to `E` (such as `aggregate_id`/`user_id`) are
/// ignored.
pub fn definition_from<E: EventDefinition>(attributes: &Attributes) -> Result<E, CodecError> {
    serde_json::from_value(JsonValue::Object(attributes.clone()))
        .map_err(|e| CodecError::invalid_attributes(E::NAME, e.to_string()))
}

/// An event together with its envelope metadata.
///
/// Notes:
/// - `event_id` is assigned once at creation and never changes.
/// - `occurred_on` is the logical event time in UTC.
/// - `version` is [`UNSET_VERSION`] until a store assigns one.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<P> {
    event_id: EventId,
    aggregate_id: AggregateId,
    user_id: UserId,
    occurred_on: NaiveDateTime,
    version: i64,
    payload: P,
}

impl<P> Event<P> {
    /// Reassemble an event from already-known metadata (decoding, tests).
    pub fn from_parts(
        event_id: EventId,
        aggregate_id: AggregateId,
        user_id: UserId,
        occurred_on: NaiveDateTime,
        version: i64,
        payload: P,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            user_id,
            occurred_on,
            version,
            payload,
        }
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn occurred_on(&self) -> NaiveDateTime {
        self.occurred_on
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P: Payload> Event<P> {
    /// Create a brand-new event: fresh id, current UTC time, unset version.
    pub fn new(aggregate_id: AggregateId, user_id: UserId, payload: impl Into<P>) -> Self {
        Self {
            event_id: EventId::new(),
            aggregate_id,
            user_id,
            occurred_on: Utc::now().naive_utc(),
            version: UNSET_VERSION,
            payload: payload.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn event_name(&self) -> &'static str {
        self.payload.event_name()
    }
}
