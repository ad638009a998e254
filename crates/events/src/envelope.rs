//! Wire envelope codec.
//!
//! ```json
//! {
//!   "data": {
//!     "event_id": "<uuid>",
//!     "version": 0,
//!     "type": "content_bank.created",
//!     "occurred_on": "2024-01-02T03:04:05",
//!     "attributes": { "aggregate_id": "<uuid>", "user_id": "<uuid>", "...": "..." }
//!   },
//!   "meta": {}
//! }
//! ```
//!
//! `aggregate_id` and `user_id` travel inside `attributes`; everything else in
//! `attributes` belongs to the concrete event. Both names are reserved: an
//! event whose own fields use them cannot be encoded. `meta` is reserved and
//! always written empty.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use snippetquiz_core::{AggregateId, EventId, UserId};

use crate::error::CodecError;
use crate::event::{Attributes, Event, Payload, UNSET_VERSION};
use crate::registry::TypeRegistry;

/// `occurred_on` wire format: ISO-8601 local date-time, UTC, no offset.
pub const OCCURRED_ON_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const AGGREGATE_ID: &str = "aggregate_id";
const USER_ID: &str = "user_id";

#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    data: WireData,
    #[serde(default)]
    meta: Attributes,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireData {
    event_id: EventId,
    #[serde(default = "unset_version")]
    version: i64,
    #[serde(rename = "type")]
    event_type: String,
    occurred_on: String,
    #[serde(default)]
    attributes: Attributes,
}

fn unset_version() -> i64 {
    UNSET_VERSION
}

/// Serialize an event into its wire envelope.
///
/// Encoding needs no registry: any payload can be written, whether or not
/// this process is able to read it back.
pub fn encode<P: Payload>(event: &Event<P>) -> Result<String, CodecError> {
    let mut attributes = event.payload().to_attributes()?;
    if let Some(key) = [AGGREGATE_ID, USER_ID]
        .into_iter()
        .find(|key| attributes.contains_key(*key))
    {
        return Err(CodecError::invalid_attributes(
            event.event_name(),
            format!("{key} is reserved for the envelope"),
        ));
    }
    attributes.insert(
        AGGREGATE_ID.to_string(),
        JsonValue::String(event.aggregate_id().to_string()),
    );
    attributes.insert(
        USER_ID.to_string(),
        JsonValue::String(event.user_id().to_string()),
    );

    let envelope = WireEnvelope {
        data: WireData {
            event_id: event.event_id(),
            version: event.version(),
            event_type: event.event_name().to_string(),
            occurred_on: format_occurred_on(event.occurred_on()),
            attributes,
        },
        meta: Attributes::new(),
    };

    serde_json::to_string(&envelope).map_err(|e| CodecError::Serialization(e.to_string()))
}

pub fn format_occurred_on(occurred_on: NaiveDateTime) -> String {
    occurred_on.format(OCCURRED_ON_FORMAT).to_string()
}

/// Parse `occurred_on`. Offsets (e.g. a trailing `Z`) are accepted and
/// normalised to UTC.
pub fn parse_occurred_on(raw: &str) -> Result<NaiveDateTime, CodecError> {
    NaiveDateTime::parse_from_str(raw, OCCURRED_ON_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.naive_utc()))
        .map_err(|e| CodecError::MalformedEnvelope(format!("occurred_on {raw:?}: {e}")))
}

/// Envelope encoder/decoder bound to a type registry.
///
/// Decoding is late-bound: the envelope's `type` is resolved against whatever
/// the registry maps it to.
#[derive(Debug)]
pub struct EnvelopeCodec<P> {
    registry: Arc<TypeRegistry<P>>,
}

impl<P> Clone for EnvelopeCodec<P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<P: Payload> EnvelopeCodec<P> {
    pub fn new(registry: Arc<TypeRegistry<P>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry<P> {
        &self.registry
    }

    pub fn encode(&self, event: &Event<P>) -> Result<String, CodecError> {
        encode(event)
    }

    /// Decode a wire envelope.
    ///
    /// The `type` is resolved before any attribute is read, so an unknown type
    /// never yields a partially built event.
    pub fn decode(&self, raw: &str) -> Result<Event<P>, CodecError> {
        let envelope: WireEnvelope = serde_json::from_str(raw)
            .map_err(|e| CodecError::MalformedEnvelope(e.to_string()))?;
        let data = envelope.data;

        let decoder = self.registry.search(&data.event_type)?;

        let aggregate_id: AggregateId = read_id(&data.attributes, AGGREGATE_ID, &data.event_type)?;
        let user_id: UserId = read_id(&data.attributes, USER_ID, &data.event_type)?;
        let occurred_on = parse_occurred_on(&data.occurred_on)?;
        let payload = decoder.decode(&data.attributes)?;

        Ok(Event::from_parts(
            data.event_id,
            aggregate_id,
            user_id,
            occurred_on,
            data.version,
            payload,
        ))
    }
}

fn read_id<T>(attributes: &Attributes, key: &str, event_type: &str) -> Result<T, CodecError>
where
    T: core::str::FromStr<Err = snippetquiz_core::DomainError>,
{
    let raw = attributes
        .get(key)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| CodecError::invalid_attributes(event_type, format!("missing {key}")))?;

    raw.parse()
        .map_err(|e: snippetquiz_core::DomainError| {
            CodecError::invalid_attributes(event_type, e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Buzzed, Pinged, Ponged, TestEvent, test_registry};
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use serde_json::json;

    fn codec() -> EnvelopeCodec<TestEvent> {
        EnvelopeCodec::new(Arc::new(test_registry()))
    }

    fn pinged(count: u32, label: &str) -> Event<TestEvent> {
        Event::new(
            AggregateId::new(),
            UserId::new(),
            Pinged {
                count,
                label: label.to_string(),
            },
        )
    }

    #[test]
    fn encodes_the_documented_wire_shape() {
        let occurred_on = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        let event = Event::from_parts(
            EventId::new(),
            AggregateId::new(),
            UserId::new(),
            occurred_on,
            0,
            TestEvent::Pinged(Pinged {
                count: 3,
                label: "hello".to_string(),
            }),
        );

        let raw = encode(&event).unwrap();
        let value: JsonValue = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["meta"], json!({}));
        assert_eq!(value["data"]["type"], json!("test.pinged"));
        assert_eq!(value["data"]["version"], json!(0));
        assert_eq!(value["data"]["occurred_on"], json!("2024-01-02T03:04:05"));
        assert_eq!(value["data"]["event_id"], json!(event.event_id().to_string()));
        assert_eq!(
            value["data"]["attributes"],
            json!({
                "aggregate_id": event.aggregate_id().to_string(),
                "user_id": event.user_id().to_string(),
                "count": 3,
                "label": "hello",
            })
        );
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Shadowing(Attributes);

    impl Payload for Shadowing {
        fn event_name(&self) -> &'static str {
            "test.shadowing"
        }

        fn kind(&self) -> crate::event::EventKind {
            crate::event::EventKind::Domain
        }

        fn to_attributes(&self) -> Result<Attributes, CodecError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn payload_fields_may_not_shadow_envelope_ids() {
        for key in [AGGREGATE_ID, USER_ID] {
            let mut attributes = Attributes::new();
            attributes.insert(key.to_string(), json!(AggregateId::new().to_string()));
            let event: Event<Shadowing> =
                Event::new(AggregateId::new(), UserId::new(), Shadowing(attributes));

            let err = encode(&event).unwrap_err();

            assert_eq!(
                err,
                CodecError::invalid_attributes(
                    "test.shadowing",
                    format!("{key} is reserved for the envelope")
                )
            );
        }
    }

    #[test]
    fn decode_reverses_encode() {
        let codec = codec();
        let event = pinged(7, "bank").with_version(4);

        let decoded = codec.decode(&codec.encode(&event).unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn unknown_type_fails_without_reading_attributes() {
        let raw = json!({
            "data": {
                "event_id": EventId::new().to_string(),
                "version": 1,
                "type": "somebody_elses.event",
                "occurred_on": "2024-01-02T03:04:05",
                // Deliberately broken: an unknown type must win over bad attributes.
                "attributes": { "aggregate_id": "nope" }
            },
            "meta": {}
        })
        .to_string();

        let err = codec().decode(&raw).unwrap_err();
        assert_eq!(
            err,
            CodecError::UnknownEventType("somebody_elses.event".to_string())
        );
    }

    #[test]
    fn missing_version_and_meta_default() {
        let aggregate_id = AggregateId::new();
        let user_id = UserId::new();
        let raw = json!({
            "data": {
                "event_id": EventId::new().to_string(),
                "type": "test.ponged",
                "occurred_on": "2024-01-02T03:04:05.250",
                "attributes": {
                    "aggregate_id": aggregate_id.to_string(),
                    "user_id": user_id.to_string(),
                }
            }
        })
        .to_string();

        let event = codec().decode(&raw).unwrap();
        assert_eq!(event.version(), UNSET_VERSION);
        assert_eq!(event.aggregate_id(), aggregate_id);
        assert_eq!(event.payload(), &TestEvent::Ponged(Ponged {}));
        assert_eq!(
            format_occurred_on(event.occurred_on()),
            "2024-01-02T03:04:05.250"
        );
    }

    #[test]
    fn offsets_in_occurred_on_are_normalised() {
        let parsed = parse_occurred_on("2024-01-02T05:04:05+02:00").unwrap();
        assert_eq!(format_occurred_on(parsed), "2024-01-02T03:04:05");
    }

    #[test]
    fn garbage_is_a_malformed_envelope() {
        let err = codec().decode("{\"not\": \"an envelope\"}").unwrap_err();
        assert!(matches!(err, CodecError::MalformedEnvelope(_)));
    }

    #[test]
    fn missing_user_id_is_invalid_attributes() {
        let raw = json!({
            "data": {
                "event_id": EventId::new().to_string(),
                "type": "test.ponged",
                "occurred_on": "2024-01-02T03:04:05",
                "attributes": { "aggregate_id": AggregateId::new().to_string() }
            },
            "meta": {}
        })
        .to_string();

        let err = codec().decode(&raw).unwrap_err();
        assert_eq!(
            err,
            CodecError::invalid_attributes("test.ponged", "missing user_id")
        );
    }

    fn any_test_event() -> impl Strategy<Value = TestEvent> {
        prop_oneof![
            (any::<u32>(), ".{0,40}")
                .prop_map(|(count, label)| TestEvent::Pinged(Pinged { count, label })),
            Just(TestEvent::Ponged(Ponged {})),
            (proptest::collection::vec("[a-z]{1,12}", 0..5), proptest::option::of(any::<i32>()))
                .prop_map(|(tags, level)| TestEvent::Buzzed(Buzzed { tags, level })),
        ]
    }

    proptest! {
        /// Property: every registered event survives the wire unchanged.
        #[test]
        fn round_trip_preserves_every_field(
            payload in any_test_event(),
            version in -1i64..10_000,
            seconds in 0i64..4_000_000_000,
            nanos in 0u32..1_000_000_000,
        ) {
            let occurred_on = DateTime::<chrono::Utc>::from_timestamp(seconds, nanos).unwrap().naive_utc();
            let event = Event::from_parts(
                EventId::new(),
                AggregateId::new(),
                UserId::new(),
                occurred_on,
                version,
                payload,
            );

            let codec = codec();
            let decoded = codec.decode(&codec.encode(&event).unwrap()).unwrap();
            prop_assert_eq!(decoded, event);
        }
    }
}
