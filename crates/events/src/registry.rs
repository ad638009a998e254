//! Type registry: event name → decode closure.
//!
//! Built once at startup from an explicit registration list and read-only
//! afterwards. There is no runtime discovery; an event the binary was not built
//! with is simply unknown.

use std::collections::HashMap;

use crate::error::{CodecError, RegistryError};
use crate::event::{Attributes, EventDefinition, EventKind, definition_from};

type DecodeFn<P> = Box<dyn Fn(&Attributes) -> Result<P, CodecError> + Send + Sync>;

/// Registered decoder for a single event name.
pub struct Decoder<P> {
    event_name: &'static str,
    kind: EventKind,
    decode: DecodeFn<P>,
}

impl<P> Decoder<P> {
    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn decode(&self, attributes: &Attributes) -> Result<P, CodecError> {
        (self.decode)(attributes)
    }
}

impl<P> core::fmt::Debug for Decoder<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Decoder")
            .field("event_name", &self.event_name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Immutable map from wire event names to decoders.
pub struct TypeRegistry<P> {
    decoders: HashMap<&'static str, Decoder<P>>,
}

impl<P> TypeRegistry<P> {
    pub fn builder() -> TypeRegistryBuilder<P> {
        TypeRegistryBuilder::default()
    }

    /// Look up the decoder for `event_name`.
    pub fn search(&self, event_name: &str) -> Result<&Decoder<P>, CodecError> {
        self.decoders
            .get(event_name)
            .ok_or_else(|| CodecError::UnknownEventType(event_name.to_string()))
    }

    pub fn contains(&self, event_name: &str) -> bool {
        self.decoders.contains_key(event_name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.decoders.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

impl<P> core::fmt::Debug for TypeRegistry<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("events", &self.names())
            .finish()
    }
}

/// Collects registrations; duplicates are reported by [`TypeRegistryBuilder::build`].
pub struct TypeRegistryBuilder<P> {
    decoders: HashMap<&'static str, Decoder<P>>,
    duplicates: Vec<&'static str>,
}

impl<P> Default for TypeRegistryBuilder<P> {
    fn default() -> Self {
        Self {
            decoders: HashMap::new(),
            duplicates: Vec::new(),
        }
    }
}

impl<P: 'static> TypeRegistryBuilder<P> {
    /// Register a concrete event type, wrapping it into the application payload.
    pub fn register<E: EventDefinition>(self, wrap: fn(E) -> P) -> Self {
        self.register_fn(E::NAME, E::KIND, move |attributes| {
            definition_from::<E>(attributes).map(wrap)
        })
    }

    /// Register a hand-written decode closure under `event_name`.
    pub fn register_fn<F>(mut self, event_name: &'static str, kind: EventKind, decode: F) -> Self
    where
        F: Fn(&Attributes) -> Result<P, CodecError> + Send + Sync + 'static,
    {
        if self.decoders.contains_key(event_name) {
            self.duplicates.push(event_name);
            return self;
        }

        self.decoders.insert(
            event_name,
            Decoder {
                event_name,
                kind,
                decode: Box::new(decode),
            },
        );
        self
    }

    pub fn build(self) -> Result<TypeRegistry<P>, RegistryError> {
        if let Some(name) = self.duplicates.first() {
            return Err(RegistryError::DuplicateEventType(name.to_string()));
        }

        Ok(TypeRegistry {
            decoders: self.decoders,
        })
    }
}
