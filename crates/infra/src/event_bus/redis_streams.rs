//! Redis Streams-backed durable log (at-least-once delivery).
//!
//! ## Mapping
//!
//! - **Topic** → one stream per topic, key `{prefix}{topic}`
//! - **Record** → stream entry with fields `key` (aggregate id) and `payload` (envelope JSON)
//! - **Consumer group** → one per deployment, created at id `0` with `MKSTREAM`
//! - **Commit** → `XACK` of every entry returned since the last commit
//!
//! A stream is totally ordered, which is stricter than the per-key ordering
//! the dispatch core needs.
//!
//! ## Redelivery
//!
//! On connect, a consumer first drains its own pending entry list (`XREADGROUP
//! ... 0`): entries it read in a previous life but never acknowledged. Only
//! once that list is empty does it switch to new entries (`>`).
//!
//! Entries that were trimmed or deleted after delivery come back without
//! fields. They are acknowledged as soon as they are read so the pending list
//! always shrinks.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use snippetquiz_events::{ConsumedRecord, DurableTransport, LogConnector, LogConsumer, TransportError};

use crate::config::DispatchConfig;

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";

/// Appends records to Redis streams with `XADD`.
#[derive(Debug, Clone)]
pub struct RedisStreamsTransport {
    client: Arc<redis::Client>,
    prefix: String,
}

impl RedisStreamsTransport {
    pub fn new(redis_url: impl AsRef<str>, prefix: impl Into<String>) -> Result<Self, TransportError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            prefix: prefix.into(),
        })
    }

    pub fn from_config(config: &DispatchConfig) -> Result<Self, TransportError> {
        Self::new(&config.redis_url, config.stream_prefix.clone())
    }
}

impl DurableTransport for RedisStreamsTransport {
    #[instrument(skip(self, payload), err)]
    fn send(&self, topic: &str, key: &str, payload: &str) -> Result<(), TransportError> {
        let stream = format!("{}{}", self.prefix, topic);

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let _: String = redis::cmd("XADD")
            .arg(&stream)
            .arg("*")
            .arg(KEY_FIELD)
            .arg(key)
            .arg(PAYLOAD_FIELD)
            .arg(payload)
            .query(&mut conn)
            .map_err(|e| TransportError::publish(&stream, format!("XADD failed: {e}")))?;

        Ok(())
    }
}

/// Opens [`RedisStreamsConsumer`]s for one consumer group.
#[derive(Debug, Clone)]
pub struct RedisStreamsConnector {
    client: Arc<redis::Client>,
    group: String,
    consumer: String,
    prefix: String,
    batch_size: usize,
}

impl RedisStreamsConnector {
    pub fn from_config(config: &DispatchConfig) -> Result<Self, TransportError> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            group: config.consumer_group.clone(),
            consumer: config.consumer_name.clone(),
            prefix: config.stream_prefix.clone(),
            batch_size: config.poll_batch_size,
        })
    }
}

impl LogConnector for RedisStreamsConnector {
    type Consumer = RedisStreamsConsumer;

    fn connect(&self) -> Result<Self::Consumer, TransportError> {
        let conn = self
            .client
            .get_connection()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(RedisStreamsConsumer {
            conn,
            group: self.group.clone(),
            consumer: self.consumer.clone(),
            prefix: self.prefix.clone(),
            batch_size: self.batch_size,
            streams: Vec::new(),
            draining_pending: true,
            unacked: HashMap::new(),
        })
    }
}

/// Consumer-group member reading one or more streams over a single
/// connection.
pub struct RedisStreamsConsumer {
    conn: redis::Connection,
    group: String,
    consumer: String,
    prefix: String,
    batch_size: usize,
    streams: Vec<String>,
    draining_pending: bool,
    unacked: HashMap<String, Vec<String>>,
}

impl core::fmt::Debug for RedisStreamsConsumer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStreamsConsumer")
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .field("streams", &self.streams)
            .field("draining_pending", &self.draining_pending)
            .finish_non_exhaustive()
    }
}

/// One entry of an `XREADGROUP` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StreamEntry {
    stream: String,
    id: String,
    fields: HashMap<String, String>,
}

impl RedisStreamsConsumer {
    /// Create the group on `stream` if it does not exist yet (idempotent).
    fn ensure_group(&mut self, stream: &str) -> Result<(), TransportError> {
        let created: redis::RedisResult<String> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(&self.group)
            .arg("0")
            .arg("MKSTREAM")
            .query(&mut self.conn);

        match created {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(TransportError::Connection(format!(
                "XGROUP CREATE {stream} {} failed: {e}",
                self.group
            ))),
        }
    }

    fn read_group(&mut self, id: &str, block: Option<Duration>) -> Result<Vec<StreamEntry>, TransportError> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(self.batch_size);
        if let Some(block) = block {
            // BLOCK 0 would mean "forever".
            cmd.arg("BLOCK").arg(block.as_millis().max(1) as u64);
        }
        cmd.arg("STREAMS").arg(&self.streams[..]);
        for _ in &self.streams {
            cmd.arg(id);
        }

        let reply: redis::Value = cmd
            .query(&mut self.conn)
            .map_err(|e| TransportError::Poll(format!("XREADGROUP failed: {e}")))?;

        parse_read_reply(reply)
    }
}

impl LogConsumer for RedisStreamsConsumer {
    fn subscribe(&mut self, topics: &BTreeSet<String>) -> Result<(), TransportError> {
        let streams: Vec<String> = topics.iter().map(|t| format!("{}{}", self.prefix, t)).collect();
        for stream in &streams {
            self.ensure_group(stream)?;
        }

        debug!(group = %self.group, consumer = %self.consumer, streams = ?streams, "subscribed to streams");
        self.streams = streams;
        self.draining_pending = true;
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Vec<ConsumedRecord>, TransportError> {
        if self.streams.is_empty() {
            std::thread::sleep(timeout);
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        if self.draining_pending {
            entries = self.read_group("0", None)?;
            if entries.is_empty() {
                debug!(group = %self.group, consumer = %self.consumer, "pending entries drained");
                self.draining_pending = false;
            }
        }
        if !self.draining_pending {
            entries = self.read_group(">", Some(timeout))?;
        }

        let batch = split_entries(&self.prefix, entries);
        for (stream, ids) in &batch.empty {
            warn!(stream = %stream, ids = ?ids, "acknowledging stream entries without payload");
            xack(&mut self.conn, &self.group, stream, ids)?;
        }
        for (stream, ids) in batch.consumed {
            self.unacked.entry(stream).or_default().extend(ids);
        }

        Ok(batch.records)
    }

    fn commit(&mut self) -> Result<(), TransportError> {
        for (stream, ids) in &self.unacked {
            xack(&mut self.conn, &self.group, stream, ids)?;
        }
        self.unacked.clear();
        Ok(())
    }

    fn close(&mut self) {
        if !self.unacked.is_empty() {
            debug!(group = %self.group, consumer = %self.consumer, "closing with unacknowledged entries");
        }
        self.unacked.clear();
        self.streams.clear();
    }
}

fn xack(
    conn: &mut redis::Connection,
    group: &str,
    stream: &str,
    ids: &[String],
) -> Result<(), TransportError> {
    if ids.is_empty() {
        return Ok(());
    }
    let _: u64 = redis::cmd("XACK")
        .arg(stream)
        .arg(group)
        .arg(ids)
        .query(conn)
        .map_err(|e| TransportError::Commit(format!("XACK {stream} failed: {e}")))?;
    Ok(())
}

/// Entries of one read, split by what the consumer must do with them.
#[derive(Debug, Default)]
struct EntryBatch {
    records: Vec<ConsumedRecord>,
    /// Ids to acknowledge on the next commit, per stream.
    consumed: HashMap<String, Vec<String>>,
    /// Ids of payload-less entries, acknowledged immediately.
    empty: HashMap<String, Vec<String>>,
}

fn split_entries(prefix: &str, entries: Vec<StreamEntry>) -> EntryBatch {
    let mut batch = EntryBatch::default();
    for mut entry in entries {
        let Some(payload) = entry.fields.remove(PAYLOAD_FIELD) else {
            batch.empty.entry(entry.stream).or_default().push(entry.id);
            continue;
        };

        batch.records.push(ConsumedRecord {
            topic: entry.stream.strip_prefix(prefix).unwrap_or(&entry.stream).to_string(),
            key: entry.fields.remove(KEY_FIELD),
            payload,
        });
        batch.consumed.entry(entry.stream).or_default().push(entry.id);
    }
    batch
}

fn text(value: &redis::Value) -> Option<String> {
    match value {
        redis::Value::Data(data) => Some(String::from_utf8_lossy(data).into_owned()),
        redis::Value::Status(s) => Some(s.clone()),
        _ => None,
    }
}

fn malformed(what: &str) -> TransportError {
    TransportError::Poll(format!("unexpected XREADGROUP reply: {what}"))
}

/// Parse `[[stream, [[id, [field, value, ...]], ...]], ...]` (or nil on
/// timeout).
fn parse_read_reply(reply: redis::Value) -> Result<Vec<StreamEntry>, TransportError> {
    let streams = match reply {
        redis::Value::Nil => return Ok(Vec::new()),
        redis::Value::Bulk(streams) => streams,
        _ => return Err(malformed("expected an array of streams")),
    };

    let mut entries = Vec::new();
    for stream in streams {
        let redis::Value::Bulk(parts) = stream else {
            return Err(malformed("stream is not an array"));
        };
        let [name, items] = parts.as_slice() else {
            return Err(malformed("stream is not a [name, entries] pair"));
        };
        let name = text(name).ok_or_else(|| malformed("stream name is not a string"))?;
        let redis::Value::Bulk(items) = items else {
            return Err(malformed("stream entries are not an array"));
        };

        for item in items {
            let redis::Value::Bulk(item) = item else {
                return Err(malformed("entry is not an array"));
            };
            let id = item
                .first()
                .and_then(text)
                .ok_or_else(|| malformed("entry id is not a string"))?;

            let mut fields = HashMap::new();
            if let Some(redis::Value::Bulk(pairs)) = item.get(1) {
                for pair in pairs.chunks(2) {
                    if let [field, value] = pair {
                        if let (Some(field), Some(value)) = (text(field), text(value)) {
                            fields.insert(field, value);
                        }
                    }
                }
            }

            entries.push(StreamEntry {
                stream: name.clone(),
                id,
                fields,
            });
        }
    }

    Ok(entries)
}
