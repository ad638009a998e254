//! Event publishing abstraction (mechanics only).
//!
//! An [`EventBus`] takes a batch of freshly produced events for one aggregate
//! type and hands each of them to a transport. Which transport is decided by
//! [`route`], purely from the event's [`EventKind`]:
//!
//! - `Domain` / `Integration` → durable log (replayable, ordered per aggregate)
//! - `Ephemeral` → pub/sub (delivered only to currently connected listeners)
//!
//! ## Delivery Guarantees
//!
//! Publishing is **best effort per event**: a failed event is logged and
//! counted in the [`PublishReport`], and the rest of the batch still goes out.
//! There is no retry and no atomicity across the durable and ephemeral halves
//! of a batch. Durable consumers get at-least-once delivery and must be
//! idempotent.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::event::{Event, EventKind};

/// Destination class of an event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Durable,
    Ephemeral,
}

/// Routing decision for an event kind.
pub fn route(kind: EventKind) -> Route {
    match kind {
        EventKind::Domain | EventKind::Integration => Route::Durable,
        EventKind::Ephemeral => Route::Ephemeral,
    }
}

/// Outcome of publishing one batch.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Events handed to a transport successfully.
    pub published: usize,
    /// Events that failed to encode or send (already logged).
    pub failed: usize,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn merge(self, other: PublishReport) -> PublishReport {
        PublishReport {
            published: self.published + other.published,
            failed: self.failed + other.failed,
        }
    }

    pub fn record(&mut self, ok: bool) {
        if ok {
            self.published += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Publishes batches of events produced by one aggregate type.
///
/// `aggregate_type` is the durable topic (e.g. `content-bank-aggregate`) and
/// the first segment of ephemeral channel names. Publishing never fails as a
/// whole; per-event failures are reported through [`PublishReport`].
pub trait EventBus<P>: Send + Sync {
    fn publish(&self, aggregate_type: &str, events: &[Event<P>]) -> PublishReport;
}

impl<P, B> EventBus<P> for Arc<B>
where
    B: EventBus<P> + ?Sized,
{
    fn publish(&self, aggregate_type: &str, events: &[Event<P>]) -> PublishReport {
        (**self).publish(aggregate_type, events)
    }
}

/// A subscription to an in-process message stream.
///
/// ```ignore
/// let subscription = pubsub.subscribe("content-bank-aggregate:user-id:<uuid>");
///
/// loop {
///     match subscription.recv_timeout(Duration::from_secs(1)) {
///         Ok(payload) => render(payload),
///         Err(RecvTimeoutError::Timeout) => continue,
///         Err(RecvTimeoutError::Disconnected) => break,
///     }
/// }
/// ```
///
/// Designed for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything received so far, without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}
