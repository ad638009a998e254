//! In-memory transports for tests/dev.
//!
//! - [`InMemoryLog`]: a durable log with consumer-group offsets
//! - [`InMemoryPubSub`]: per-channel fan-out to live subscribers
//!
//! No IO, no async. Both keep what was sent so tests can assert on it, and
//! both can be told to fail sends to a given destination.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::time::{Duration, Instant};

use crate::bus::Subscription;
use crate::error::TransportError;
use crate::transport::{
    ConsumedRecord, DurableTransport, EphemeralTransport, LogConnector, LogConsumer,
};

#[derive(Debug, Default)]
struct LogState {
    records: Vec<ConsumedRecord>,
    committed: HashMap<String, usize>,
    failing_topics: HashSet<String>,
}

/// In-memory durable log.
///
/// A single global sequence across all topics, which is stricter than
/// per-key ordering. Offsets are committed per consumer group.
#[derive(Debug, Default)]
pub struct InMemoryLog {
    state: Mutex<LogState>,
    appended: Condvar,
    open_consumers: AtomicUsize,
}

impl InMemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send to `topic` fail.
    pub fn fail_topic(&self, topic: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_topics.insert(topic.into());
        }
    }

    /// Every record ever appended, in append order.
    pub fn records(&self) -> Vec<ConsumedRecord> {
        self.state
            .lock()
            .map(|state| state.records.clone())
            .unwrap_or_default()
    }

    pub fn records_for(&self, topic: &str) -> Vec<ConsumedRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.topic == topic)
            .collect()
    }

    /// Number of records `group` has committed (0 if it never committed).
    pub fn committed_offset(&self, group: &str) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.committed.get(group).copied())
            .unwrap_or(0)
    }

    /// Consumers connected and not yet closed.
    pub fn open_consumers(&self) -> usize {
        self.open_consumers.load(Ordering::SeqCst)
    }

    /// Connector for a consumer group on this log.
    pub fn connector(self: &Arc<Self>, group: impl Into<String>) -> InMemoryLogConnector {
        InMemoryLogConnector {
            log: Arc::clone(self),
            group: group.into(),
        }
    }
}

impl DurableTransport for InMemoryLog {
    fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), TransportError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TransportError::publish(topic, "log lock poisoned"))?;

        if state.failing_topics.contains(topic) {
            return Err(TransportError::publish(topic, "injected failure"));
        }

        state.records.push(ConsumedRecord {
            topic: topic.to_string(),
            key: Some(key.to_string()),
            payload: payload.to_string(),
        });
        self.appended.notify_all();
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryLogConnector {
    log: Arc<InMemoryLog>,
    group: String,
}

impl LogConnector for InMemoryLogConnector {
    type Consumer = InMemoryLogConsumer;

    fn connect(&self) -> Result<Self::Consumer, TransportError> {
        let position = self.log.committed_offset(&self.group);
        self.log.open_consumers.fetch_add(1, Ordering::SeqCst);

        Ok(InMemoryLogConsumer {
            log: Arc::clone(&self.log),
            group: self.group.clone(),
            topics: BTreeSet::new(),
            position,
            closed: false,
        })
    }
}

/// Consumer-group member reading an [`InMemoryLog`]. Starts from the group's
/// committed offset.
#[derive(Debug)]
pub struct InMemoryLogConsumer {
    log: Arc<InMemoryLog>,
    group: String,
    topics: BTreeSet<String>,
    position: usize,
    closed: bool,
}

impl LogConsumer for InMemoryLogConsumer {
    fn subscribe(&mut self, topics: &BTreeSet<String>) -> Result<(), TransportError> {
        self.topics = topics.clone();
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumedRecord>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut state = self
            .log
            .state
            .lock()
            .map_err(|_| TransportError::Poll("log lock poisoned".to_string()))?;

        while state.records.len() <= self.position {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            let (next, _) = self
                .log
                .appended
                .wait_timeout(state, remaining)
                .map_err(|_| TransportError::Poll("log lock poisoned".to_string()))?;
            state = next;
        }

        let batch = state.records[self.position..]
            .iter()
            .filter(|r| self.topics.contains(&r.topic))
            .cloned()
            .collect();
        self.position = state.records.len();
        Ok(batch)
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        let mut state = self
            .log
            .state
            .lock()
            .map_err(|_| TransportError::Commit("log lock poisoned".to_string()))?;
        state.committed.insert(self.group.clone(), self.position);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.open_consumers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Default)]
struct PubSubState {
    subscribers: HashMap<String, Vec<mpsc::Sender<String>>>,
    sent: Vec<(String, String)>,
    failing_channels: HashSet<String>,
}

/// In-memory pub/sub.
///
/// - Best-effort fan-out
/// - Messages sent to a channel nobody listens on are gone (but recorded)
#[derive(Debug, Default)]
pub struct InMemoryPubSub {
    state: Mutex<PubSubState>,
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, channel: impl Into<String>) -> Subscription<String> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still yields a subscription; it just never receives.
        if let Ok(mut state) = self.state.lock() {
            state.subscribers.entry(channel.into()).or_default().push(tx);
        }

        Subscription::new(rx)
    }

    pub fn fail_channel(&self, channel: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_channels.insert(channel.into());
        }
    }

    /// `(channel, payload)` for every successful send, in order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .map(|state| state.sent.clone())
            .unwrap_or_default()
    }
}

impl EphemeralTransport for InMemoryPubSub {
    fn send(&self, channel: &str, payload: &str) -> Result<(), TransportError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TransportError::publish(channel, "pubsub lock poisoned"))?;

        if state.failing_channels.contains(channel) {
            return Err(TransportError::publish(channel, "injected failure"));
        }

        state.sent.push((channel.to_string(), payload.to_string()));
        if let Some(subs) = state.subscribers.get_mut(channel) {
            // Drop any dead subscribers while publishing.
            subs.retain(|tx| tx.send(payload.to_string()).is_ok());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn consumer_reads_only_subscribed_topics() {
        let log = Arc::new(InMemoryLog::new());
        log.send("a", "k1", "one").unwrap();
        log.send("b", "k2", "two").unwrap();

        let mut consumer = log.connector("g").connect().unwrap();
        consumer.subscribe(&topics(&["a"])).unwrap();

        let batch = consumer.poll(Duration::from_millis(10)).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].payload, "one");
        assert_eq!(batch[0].key.as_deref(), Some("k1"));
    }

    #[test]
    fn uncommitted_records_are_redelivered_after_reconnect() {
        let log = Arc::new(InMemoryLog::new());
        let connector = log.connector("g");
        log.send("a", "k", "one").unwrap();

        let mut first = connector.connect().unwrap();
        first.subscribe(&topics(&["a"])).unwrap();
        assert_eq!(first.poll(Duration::from_millis(10)).unwrap().len(), 1);
        first.close();

        let mut second = connector.connect().unwrap();
        second.subscribe(&topics(&["a"])).unwrap();
        assert_eq!(second.poll(Duration::from_millis(10)).unwrap().len(), 1);
        second.commit().unwrap();
        second.close();

        assert_eq!(log.committed_offset("g"), 1);
        let mut third = connector.connect().unwrap();
        third.subscribe(&topics(&["a"])).unwrap();
        assert!(third.poll(Duration::from_millis(10)).unwrap().is_empty());
    }

    #[test]
    fn poll_wakes_up_when_a_record_arrives() {
        let log = Arc::new(InMemoryLog::new());
        let mut consumer = log.connector("g").connect().unwrap();
        consumer.subscribe(&topics(&["a"])).unwrap();

        let writer = Arc::clone(&log);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.send("a", "k", "late").unwrap();
        });

        let batch = consumer.poll(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn failing_topic_rejects_sends() {
        let log = InMemoryLog::new();
        log.fail_topic("a");

        let err = log.send("a", "k", "x").unwrap_err();
        assert!(matches!(err, TransportError::Publish { .. }));
        assert!(log.records().is_empty());
    }

    #[test]
    fn pubsub_fans_out_per_channel() {
        let pubsub = InMemoryPubSub::new();
        let one = pubsub.subscribe("c1");
        let two = pubsub.subscribe("c1");
        let other = pubsub.subscribe("c2");

        pubsub.send("c1", "hello").unwrap();

        assert_eq!(one.try_recv().unwrap(), "hello");
        assert_eq!(two.try_recv().unwrap(), "hello");
        assert!(other.try_recv().is_err());
        assert_eq!(pubsub.sent(), vec![("c1".to_string(), "hello".to_string())]);
    }

    #[test]
    fn open_consumers_tracks_close() {
        let log = Arc::new(InMemoryLog::new());
        let mut consumer = log.connector("g").connect().unwrap();
        assert_eq!(log.open_consumers(), 1);
        consumer.close();
        consumer.close();
        assert_eq!(log.open_consumers(), 0);
    }
}
