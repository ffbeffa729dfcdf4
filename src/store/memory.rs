//! Two-tier in-process blob store
//!
//! The memory tier holds decoded artifacts up to a cost limit; the disk tier
//! holds the encoded bytes. "Disk" is a map here: the tier split exists so the
//! clear/limit surface behaves like a real cache, not to persist anything.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::traits::{BlobStore, FetchCompletion, FetchFailure};
use crate::decode::ImageDecoder;
use crate::error::{Error, Result};
use crate::transport::Fetcher;
use crate::types::{Artifact, Locator, StoredValue, TaskHandle};

/// Decoded artifacts, trimmed oldest-first when over the cost limit
#[derive(Default)]
struct MemoryTier {
    entries: HashMap<String, Artifact>,
    insertion_order: VecDeque<String>,
    cost: u64,
    cost_limit: Option<u64>,
}

impl MemoryTier {
    fn insert(&mut self, key: String, artifact: Artifact) {
        if let Some(previous) = self.entries.remove(&key) {
            self.cost -= previous.cost();
            self.insertion_order.retain(|k| k != &key);
        }
        self.cost += artifact.cost();
        self.insertion_order.push_back(key.clone());
        self.entries.insert(key, artifact);
        self.trim();
    }

    fn set_cost_limit(&mut self, limit: u64) {
        self.cost_limit = Some(limit);
        self.trim();
    }

    fn trim(&mut self) {
        let Some(limit) = self.cost_limit else {
            return;
        };
        while self.cost > limit {
            let Some(oldest) = self.insertion_order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.cost -= evicted.cost();
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
        self.cost = 0;
    }
}

struct Inner {
    memory: Mutex<MemoryTier>,
    disk: Mutex<HashMap<String, Vec<u8>>>,
    /// Cancellation tokens of fetches whose completion has not fired yet
    in_flight: Mutex<HashMap<TaskHandle, CancellationToken>>,
    next_handle: AtomicU64,
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn ImageDecoder>,
}

impl Inner {
    async fn fetch_decode_store(&self, key: &str) -> Result<Artifact> {
        let url = Locator::from(key).to_url()?;
        let bytes = self.fetcher.fetch(&url).await?;

        let decoder = self.decoder.clone();
        let (bytes, decoded) = tokio::task::spawn_blocking(move || {
            let decoded = decoder.decode(&bytes);
            (bytes, decoded)
        })
        .await
        .map_err(|e| Error::Other(format!("decode task failed: {e}")))?;
        let artifact = decoded?;

        self.disk.lock().await.insert(key.to_string(), bytes);
        self.memory
            .lock()
            .await
            .insert(key.to_string(), artifact.clone());
        Ok(artifact)
    }
}

/// In-process [`BlobStore`] over a [`Fetcher`] and an [`ImageDecoder`]
///
/// Every fetch runs on its own Tokio task with a [`CancellationToken`];
/// [`BlobStore::cancel`] trips the token and the completion fires with
/// [`FetchFailure::Cancelled`].
///
/// Cloning shares the same tiers.
#[derive(Clone)]
pub struct InMemoryBlobStore {
    inner: Arc<Inner>,
}

impl InMemoryBlobStore {
    /// Create an empty store
    pub fn new(fetcher: Arc<dyn Fetcher>, decoder: Arc<dyn ImageDecoder>) -> Self {
        Self {
            inner: Arc::new(Inner {
                memory: Mutex::new(MemoryTier::default()),
                disk: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
                fetcher,
                decoder,
            }),
        }
    }

    /// Seed the disk tier with encoded bytes
    pub async fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.inner.disk.lock().await.insert(key.into(), bytes);
    }

    /// Seed the memory tier with a decoded artifact
    pub async fn insert_decoded(&self, key: impl Into<String>, artifact: Artifact) {
        self.inner.memory.lock().await.insert(key.into(), artifact);
    }

    /// Number of entries in the memory tier
    pub async fn memory_len(&self) -> usize {
        self.inner.memory.lock().await.entries.len()
    }

    /// Total decoded bytes held by the memory tier
    pub async fn memory_cost(&self) -> u64 {
        self.inner.memory.lock().await.cost
    }

    /// Number of entries in the disk tier
    pub async fn disk_len(&self) -> usize {
        self.inner.disk.lock().await.len()
    }

    /// Number of fetches whose completion has not fired yet
    pub async fn in_flight_len(&self) -> usize {
        self.inner.in_flight.lock().await.len()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        if self.inner.memory.lock().await.entries.contains_key(key) {
            return Ok(true);
        }
        Ok(self.inner.disk.lock().await.contains_key(key))
    }

    async fn read(&self, key: &str) -> Result<Option<StoredValue>> {
        if let Some(artifact) = self.inner.memory.lock().await.entries.get(key) {
            return Ok(Some(StoredValue::Decoded(artifact.clone())));
        }
        let disk = self.inner.disk.lock().await;
        Ok(disk.get(key).map(|bytes| StoredValue::Raw(bytes.clone())))
    }

    async fn fetch_and_store(&self, key: &str, completion: FetchCompletion) -> Option<TaskHandle> {
        let handle = TaskHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        self.inner
            .in_flight
            .lock()
            .await
            .insert(handle, token.clone());

        let inner = self.inner.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tracing::debug!(key = %key, handle = %handle, "Fetch started");
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(FetchFailure::Cancelled),
                fetched = inner.fetch_decode_store(&key) => fetched.map_err(FetchFailure::Failed),
            };
            inner.in_flight.lock().await.remove(&handle);

            match &result {
                Ok(artifact) => tracing::debug!(
                    key = %key,
                    handle = %handle,
                    width = artifact.width(),
                    height = artifact.height(),
                    "Fetch stored"
                ),
                Err(failure) => {
                    tracing::debug!(key = %key, handle = %handle, error = %failure, "Fetch failed")
                }
            }
            completion.complete(result);
        });

        Some(handle)
    }

    async fn cancel(&self, handle: TaskHandle) {
        match self.inner.in_flight.lock().await.get(&handle) {
            Some(token) => token.cancel(),
            None => tracing::debug!(handle = %handle, "Cancel requested for finished fetch"),
        }
    }

    async fn set_memory_cost_limit(&self, bytes: u64) {
        self.inner.memory.lock().await.set_cost_limit(bytes);
    }

    async fn clear_all(&self) {
        self.inner.memory.lock().await.clear();
        self.inner.disk.lock().await.clear();
    }

    async fn clear_disk(&self) {
        self.inner.disk.lock().await.clear();
    }

    async fn clear_memory(&self) {
        self.inner.memory.lock().await.clear();
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
