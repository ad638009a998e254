use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use snippetquiz_events::{
    EnvelopeCodec, Event, EventKind, LogConnector, LogConsumer, Payload, SubscriberDispatchError,
    SubscriberRegistry, TransportError,
};

const WORKER_NAME: &str = "inbound-consumer";

/// Lifecycle of an [`InboundConsumer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConsumerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// What happened to a single consumed record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Subscribers were invoked; `failed` of them returned an error.
    Dispatched { delivered: usize, failed: usize },
    /// Decoded fine, but nobody subscribes to it.
    NoSubscribers,
    /// Could not be decoded (unknown type or malformed payload).
    Dropped,
    /// An event kind the consumer never dispatches.
    Skipped,
}

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to spawn consumer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            if j.join().is_err() {
                error!(worker = WORKER_NAME, "worker thread panicked");
            }
        }
    }
}

/// Decodes consumed records and fans them out to subscribers.
///
/// Holds no connection; the same dispatcher can be shared by a running worker
/// and by callers feeding records directly.
pub struct EventDispatcher<P> {
    codec: EnvelopeCodec<P>,
    subscribers: Arc<SubscriberRegistry<P>>,
}

impl<P: Payload> EventDispatcher<P> {
    pub fn new(codec: EnvelopeCodec<P>, subscribers: Arc<SubscriberRegistry<P>>) -> Self {
        Self { codec, subscribers }
    }

    pub fn subscribers(&self) -> &SubscriberRegistry<P> {
        &self.subscribers
    }

    pub fn topics(&self) -> BTreeSet<String> {
        self.subscribers.topics()
    }

    /// Handle one record read from `topic`.
    ///
    /// - `Domain` events go to the aggregate subscribers of `topic`
    /// - `Integration` events go to the subscribers of their event name
    /// - a failing or panicking subscriber never stops the others
    pub fn process_record(&self, topic: &str, payload: &str) -> DispatchOutcome {
        let event = match self.codec.decode(payload) {
            Ok(event) => event,
            Err(err) => {
                error!(topic, error = %err, "dropping undecodable record");
                return DispatchOutcome::Dropped;
            }
        };

        match event.kind() {
            EventKind::Domain => {
                let subscribers = self.subscribers.aggregate_subscribers(topic);
                let results = subscribers.iter().map(|s| (s.name(), guarded(|| s.on(&event))));
                fan_out(topic, &event, results)
            }
            EventKind::Integration => {
                let key = event.event_name();
                let subscribers = self.subscribers.integration_subscribers(key);
                let results = subscribers.iter().map(|s| (s.name(), guarded(|| s.on(&event))));
                fan_out(key, &event, results)
            }
            EventKind::Ephemeral => {
                warn!(
                    topic,
                    event_type = event.event_name(),
                    event_id = %event.event_id(),
                    "ephemeral event found on a durable topic; skipping"
                );
                DispatchOutcome::Skipped
            }
        }
    }
}

/// Run one subscriber, turning a panic into an error.
fn guarded(handle: impl FnOnce() -> anyhow::Result<()>) -> anyhow::Result<()> {
    match catch_unwind(AssertUnwindSafe(handle)) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(anyhow::anyhow!("subscriber panicked: {message}"))
        }
    }
}

fn fan_out<P, I>(key: &str, event: &Event<P>, results: I) -> DispatchOutcome
where
    P: Payload,
    I: ExactSizeIterator<Item = (&'static str, anyhow::Result<()>)>,
{
    if results.len() == 0 {
        info!(
            key,
            event_type = event.event_name(),
            event_id = %event.event_id(),
            "no subscribers for event"
        );
        return DispatchOutcome::NoSubscribers;
    }

    let (mut delivered, mut failed) = (0, 0);
    for (subscriber, result) in results {
        match result {
            Ok(()) => delivered += 1,
            Err(cause) => {
                failed += 1;
                let err = SubscriberDispatchError {
                    subscriber,
                    key: key.to_string(),
                    cause,
                };
                error!(
                    subscriber,
                    event_type = event.event_name(),
                    event_id = %event.event_id(),
                    aggregate_id = %event.aggregate_id(),
                    error = %err,
                    "subscriber failed"
                );
            }
        }
    }

    debug!(key, event_type = event.event_name(), delivered, failed, "event dispatched");
    DispatchOutcome::Dispatched { delivered, failed }
}

impl<P> core::fmt::Debug for EventDispatcher<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.subscribers)
            .finish_non_exhaustive()
    }
}

/// Reads the durable topics that have subscribers and dispatches each record.
///
/// - one connection and one worker thread per `start()`
/// - records are processed sequentially, then committed as a batch
/// - at-least-once: a crash between processing and commit redelivers the batch
pub struct InboundConsumer<C, P> {
    connector: C,
    dispatcher: Arc<EventDispatcher<P>>,
    poll_timeout: Duration,
    state: ConsumerState,
    worker: Option<WorkerHandle>,
}

impl<C, P> InboundConsumer<C, P>
where
    C: LogConnector,
    P: Payload,
{
    pub fn new(connector: C, dispatcher: Arc<EventDispatcher<P>>, poll_timeout: Duration) -> Self {
        Self {
            connector,
            dispatcher,
            poll_timeout,
            state: ConsumerState::Stopped,
            worker: None,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn dispatcher(&self) -> &EventDispatcher<P> {
        &self.dispatcher
    }

    pub fn process_record(&self, topic: &str, payload: &str) -> DispatchOutcome {
        self.dispatcher.process_record(topic, payload)
    }

    /// Connect, subscribe and spawn the worker. No-op when already running.
    pub fn start(&mut self) -> Result<(), ConsumerError> {
        if self.state != ConsumerState::Stopped {
            debug!(state = ?self.state, "consumer already started");
            return Ok(());
        }
        self.state = ConsumerState::Starting;

        match self.spawn_worker() {
            Ok(handle) => {
                self.worker = Some(handle);
                self.state = ConsumerState::Running;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to start inbound consumer");
                self.state = ConsumerState::Stopped;
                Err(err)
            }
        }
    }

    /// Signal the worker, join it and close the connection.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            self.state = ConsumerState::Stopped;
            return;
        };

        self.state = ConsumerState::Stopping;
        worker.shutdown();
        self.state = ConsumerState::Stopped;
        info!("inbound consumer stopped");
    }

    fn spawn_worker(&self) -> Result<WorkerHandle, ConsumerError> {
        let mut consumer = self.connector.connect()?;

        let topics = self.dispatcher.topics();
        let idle = topics.is_empty();
        if idle {
            warn!("no subscribers registered; inbound consumer will idle");
        } else if let Err(err) = consumer.subscribe(&topics) {
            consumer.close();
            return Err(err.into());
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let dispatcher = Arc::clone(&self.dispatcher);
        let poll_timeout = self.poll_timeout;

        let join = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || {
                if idle {
                    // Blocks until a shutdown signal or the handle is dropped.
                    let _ = shutdown_rx.recv();
                } else {
                    worker_loop(&mut consumer, &dispatcher, poll_timeout, &shutdown_rx);
                }
                consumer.close();
            })?;

        info!(topics = ?topics, "inbound consumer running");
        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

impl<C, P> Drop for InboundConsumer<C, P> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl<C, P> core::fmt::Debug for InboundConsumer<C, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InboundConsumer")
            .field("state", &self.state)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

fn worker_loop<L, P>(
    consumer: &mut L,
    dispatcher: &EventDispatcher<P>,
    poll_timeout: Duration,
    shutdown_rx: &mpsc::Receiver<()>,
) where
    L: LogConsumer,
    P: Payload,
{
    loop {
        // Shutdown check (non-blocking)
        if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }

        let records = match consumer.poll(poll_timeout) {
            Ok(records) => records,
            Err(err) => {
                error!(worker = WORKER_NAME, error = %err, "poll failed");
                if back_off(shutdown_rx, poll_timeout) {
                    break;
                }
                continue;
            }
        };

        if records.is_empty() {
            continue;
        }

        for record in &records {
            dispatcher.process_record(&record.topic, &record.payload);
        }

        if let Err(err) = consumer.commit() {
            error!(worker = WORKER_NAME, error = %err, records = records.len(), "commit failed");
            if back_off(shutdown_rx, poll_timeout) {
                break;
            }
        }
    }
}

/// Wait one interval. Returns `true` when shutdown was requested meanwhile.
fn back_off(shutdown_rx: &mpsc::Receiver<()>, interval: Duration) -> bool {
    !matches!(
        shutdown_rx.recv_timeout(interval),
        Err(RecvTimeoutError::Timeout)
    )
}
