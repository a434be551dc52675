//! Redis cache for external title lookups.
//!
//! The cache never fails a lookup: read errors are logged and reported as a
//! miss, and writes go through a background task. One multiplexed connection
//! is shared by readers and the writer, opened lazily with bounded timeouts
//! and dropped again after an error so the next call reconnects.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::EnrichedAnime;

/// How long a found title stays cached
pub const FOUND_TTL_SECS: u64 = 3600;
/// "No match" answers expire sooner so newly listed titles show up
pub const NO_MATCH_TTL_SECS: u64 = 600;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

fn lookup_key(title: &str) -> String {
    format!("lookup:{}", title.trim().to_lowercase())
}

fn ttl_for(entry: &Option<EnrichedAnime>) -> u64 {
    match entry {
        Some(_) => FOUND_TTL_SECS,
        None => NO_MATCH_TTL_SECS,
    }
}

/// Lazily opened connection shared by readers and the writer
struct SharedConnection {
    client: Client,
    slot: Mutex<Option<MultiplexedConnection>>,
}

impl SharedConnection {
    async fn get(&self) -> RedisResult<MultiplexedConnection> {
        let mut slot = self.slot.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(RESPONSE_TIMEOUT, CONNECT_TIMEOUT)
            .await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        self.slot.lock().await.take();
    }
}

struct PendingWrite {
    key: String,
    value: String,
    ttl: u64,
}

/// Cached `Option<EnrichedAnime>` per title; `None` records "no match"
#[derive(Clone)]
pub struct LookupCache {
    connection: Arc<SharedConnection>,
    writes: mpsc::UnboundedSender<PendingWrite>,
}

/// Owns the background writer; `flush` drains queued writes and waits for it
pub struct CacheWriter {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl CacheWriter {
    pub async fn flush(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Cache writer task ended abnormally");
        }
    }
}

impl LookupCache {
    /// Creates the cache and spawns its writer; no connection is opened yet
    pub fn new(client: Client) -> (Self, CacheWriter) {
        let connection = Arc::new(SharedConnection {
            client,
            slot: Mutex::new(None),
        });
        let (writes, queue) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let task = tokio::spawn(drain_writes(connection.clone(), queue, stop.clone()));

        (Self { connection, writes }, CacheWriter { stop, task })
    }

    /// Cached answer for `title`: `Some(None)` is a remembered "no match",
    /// `None` means nothing usable is cached (including Redis being down)
    pub async fn get(&self, title: &str) -> Option<Option<EnrichedAnime>> {
        let key = lookup_key(title);
        let raw = match self.read(&key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed; treating as a miss");
                self.connection.reset().await;
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    async fn read(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.connection.get().await?;
        conn.get(key).await
    }

    /// Queues the answer for `title`; found titles and misses get different TTLs
    pub fn put(&self, title: &str, entry: &Option<EnrichedAnime>) {
        let value = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let write = PendingWrite {
            key: lookup_key(title),
            value,
            ttl: ttl_for(entry),
        };
        if self.writes.send(write).is_err() {
            tracing::debug!(title = %title, "Cache writer stopped; write dropped");
        }
    }
}

async fn drain_writes(
    connection: Arc<SharedConnection>,
    mut queue: mpsc::UnboundedReceiver<PendingWrite>,
    stop: CancellationToken,
) {
    loop {
        let write = tokio::select! {
            Some(write) = queue.recv() => write,
            _ = stop.cancelled() => break,
        };
        store(&connection, write).await;
    }

    queue.close();
    let mut flushed = 0usize;
    while let Some(write) = queue.recv().await {
        store(&connection, write).await;
        flushed += 1;
    }
    tracing::info!(flushed, "Cache writer stopped");
}

async fn store(connection: &SharedConnection, write: PendingWrite) {
    let PendingWrite { key, value, ttl } = write;
    let result: RedisResult<()> = async {
        let mut conn = connection.get().await?;
        conn.set_ex(&key, value, ttl).await
    }
    .await;

    if let Err(e) = result {
        tracing::warn!(key = %key, error = %e, "Cache write failed");
        connection.reset().await;
    }
}
