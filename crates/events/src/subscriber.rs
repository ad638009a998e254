//! Subscriber registry (who reacts to what).
//!
//! Two tables, both built once at startup:
//!
//! - **aggregate subscribers**: keyed by aggregate topic (e.g. `content-bank-aggregate`),
//!   invoked for every `Domain` event read from that topic.
//! - **integration subscribers**: keyed by event name (e.g. `auth.user.verified`),
//!   invoked for every `Integration` event with that name.
//!
//! Registration order is preserved and is the invocation order. Subscriber
//! names must be unique per key; the processed-event store tracks progress by
//! name. The registry is immutable after [`SubscriberRegistryBuilder::build`],
//! so it can be shared through an `Arc` without locking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::RegistryError;
use crate::event::Event;

/// Reacts to domain events of one aggregate topic (projections, mostly).
pub trait AggregateSubscriber<P>: Send + Sync {
    /// Stable name used in logs and by the processed-event store.
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }

    fn on(&self, event: &Event<P>) -> anyhow::Result<()>;
}

/// Reacts to one named integration event coming from another context.
pub trait IntegrationSubscriber<P>: Send + Sync {
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }

    fn on(&self, event: &Event<P>) -> anyhow::Result<()>;
}

impl<P, S> AggregateSubscriber<P> for Arc<S>
where
    S: AggregateSubscriber<P> + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn on(&self, event: &Event<P>) -> anyhow::Result<()> {
        (**self).on(event)
    }
}

impl<P, S> IntegrationSubscriber<P> for Arc<S>
where
    S: IntegrationSubscriber<P> + ?Sized,
{
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn on(&self, event: &Event<P>) -> anyhow::Result<()> {
        (**self).on(event)
    }
}

pub struct SubscriberRegistry<P> {
    aggregate: HashMap<String, Vec<Arc<dyn AggregateSubscriber<P>>>>,
    integration: HashMap<String, Vec<Arc<dyn IntegrationSubscriber<P>>>>,
}

impl<P> SubscriberRegistry<P> {
    pub fn builder() -> SubscriberRegistryBuilder<P> {
        SubscriberRegistryBuilder::default()
    }

    /// Subscribers for an aggregate topic, in registration order.
    pub fn aggregate_subscribers(&self, topic: &str) -> &[Arc<dyn AggregateSubscriber<P>>] {
        self.aggregate.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Subscribers for an integration event name, in registration order.
    pub fn integration_subscribers(
        &self,
        event_name: &str,
    ) -> &[Arc<dyn IntegrationSubscriber<P>>] {
        self.integration
            .get(event_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every topic the inbound consumer must subscribe to: aggregate topics
    /// plus integration event names, deduplicated.
    pub fn topics(&self) -> BTreeSet<String> {
        self.aggregate
            .keys()
            .chain(self.integration.keys())
            .cloned()
            .collect()
    }
}

impl<P> core::fmt::Debug for SubscriberRegistry<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let aggregate: HashMap<_, Vec<&'static str>> = self
            .aggregate
            .iter()
            .map(|(k, v)| (k.as_str(), v.iter().map(|s| s.name()).collect()))
            .collect();
        let integration: HashMap<_, Vec<&'static str>> = self
            .integration
            .iter()
            .map(|(k, v)| (k.as_str(), v.iter().map(|s| s.name()).collect()))
            .collect();

        f.debug_struct("SubscriberRegistry")
            .field("aggregate", &aggregate)
            .field("integration", &integration)
            .finish()
    }
}

pub struct SubscriberRegistryBuilder<P> {
    aggregate: HashMap<String, Vec<Arc<dyn AggregateSubscriber<P>>>>,
    integration: HashMap<String, Vec<Arc<dyn IntegrationSubscriber<P>>>>,
}

impl<P> Default for SubscriberRegistryBuilder<P> {
    fn default() -> Self {
        Self {
            aggregate: HashMap::new(),
            integration: HashMap::new(),
        }
    }
}

impl<P> SubscriberRegistryBuilder<P> {
    pub fn aggregate(
        mut self,
        topic: impl Into<String>,
        subscriber: Arc<dyn AggregateSubscriber<P>>,
    ) -> Self {
        self.aggregate
            .entry(topic.into())
            .or_default()
            .push(subscriber);
        self
    }

    pub fn integration(
        mut self,
        event_name: impl Into<String>,
        subscriber: Arc<dyn IntegrationSubscriber<P>>,
    ) -> Self {
        self.integration
            .entry(event_name.into())
            .or_default()
            .push(subscriber);
        self
    }

    /// Fails when two subscribers under the same key share a name.
    pub fn build(self) -> Result<SubscriberRegistry<P>, RegistryError> {
        for (key, subscribers) in &self.aggregate {
            ensure_unique_names(key, subscribers.iter().map(|s| s.name()))?;
        }
        for (key, subscribers) in &self.integration {
            ensure_unique_names(key, subscribers.iter().map(|s| s.name()))?;
        }

        Ok(SubscriberRegistry {
            aggregate: self.aggregate,
            integration: self.integration,
        })
    }
}

fn ensure_unique_names(
    key: &str,
    names: impl Iterator<Item = &'static str>,
) -> Result<(), RegistryError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(RegistryError::DuplicateSubscriber {
                key: key.to_string(),
                subscriber: name,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestEvent;

    struct Named(&'static str);

    impl AggregateSubscriber<TestEvent> for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn on(&self, _event: &Event<TestEvent>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl IntegrationSubscriber<TestEvent> for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn on(&self, _event: &Event<TestEvent>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn topics_are_the_deduplicated_union_of_both_tables() {
        let registry = SubscriberRegistry::<TestEvent>::builder()
            .aggregate("content-bank-aggregate", Arc::new(Named("a")))
            .aggregate("content-bank-aggregate", Arc::new(Named("b")))
            .aggregate("quiz-aggregate", Arc::new(Named("c")))
            .integration("auth.user.verified", Arc::new(Named("d")))
            .integration("quiz-aggregate", Arc::new(Named("e")))
            .build()
            .unwrap();

        let topics: Vec<_> = registry.topics().into_iter().collect();
        assert_eq!(
            topics,
            vec!["auth.user.verified", "content-bank-aggregate", "quiz-aggregate"]
        );
    }

    #[test]
    fn subscribers_keep_registration_order() {
        let registry = SubscriberRegistry::<TestEvent>::builder()
            .aggregate("t", Arc::new(Named("first")))
            .aggregate("t", Arc::new(Named("second")))
            .aggregate("t", Arc::new(Named("third")))
            .build()
            .unwrap();

        let names: Vec<_> = registry
            .aggregate_subscribers("t")
            .iter()
            .map(|s| s.name())
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn unknown_keys_yield_empty_slices() {
        let registry = SubscriberRegistry::<TestEvent>::builder().build().unwrap();

        assert!(registry.aggregate_subscribers("nope").is_empty());
        assert!(registry.integration_subscribers("nope").is_empty());
        assert!(registry.topics().is_empty());
    }

    #[test]
    fn duplicate_names_under_one_key_are_rejected() {
        let err = SubscriberRegistry::<TestEvent>::builder()
            .aggregate("t", Arc::new(Named("projection")))
            .aggregate("t", Arc::new(Named("projection")))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            RegistryError::DuplicateSubscriber {
                key: "t".to_string(),
                subscriber: "projection",
            }
        );

        let err = SubscriberRegistry::<TestEvent>::builder()
            .integration("auth.user.verified", Arc::new(Named("d")))
            .integration("auth.user.verified", Arc::new(Named("d")))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSubscriber { subscriber: "d", .. }));
    }

    #[test]
    fn same_name_under_different_keys_is_allowed() {
        let registry = SubscriberRegistry::<TestEvent>::builder()
            .aggregate("a", Arc::new(Named("projection")))
            .aggregate("b", Arc::new(Named("projection")))
            .integration("a", Arc::new(Named("projection")))
            .build()
            .unwrap();

        assert_eq!(registry.aggregate_subscribers("a").len(), 1);
        assert_eq!(registry.aggregate_subscribers("b").len(), 1);
    }

    #[test]
    fn default_name_is_the_type_name() {
        struct Anonymous;
        impl AggregateSubscriber<TestEvent> for Anonymous {
            fn on(&self, _event: &Event<TestEvent>) -> anyhow::Result<()> {
                Ok(())
            }
        }

        assert!(Anonymous.name().ends_with("Anonymous"));
    }
}
