//! Shared test helpers for creating FetchCoordinator instances in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::coordinator::FetchCoordinator;
use crate::decode::RasterDecoder;
use crate::error::{Result, StoreError};
use crate::store::{BlobStore, FetchCompletion, FetchResult};
use crate::types::{Artifact, StoredValue, TaskHandle};

/// How the scripted store answers for one key
#[derive(Clone)]
pub(crate) enum Script {
    /// Present in the cache with this value
    Cached(StoredValue),
    /// Existence check errors
    ProbeFails,
    /// Exists, but the read errors
    ReadFails,
    /// Exists, but is gone by the time it is read
    Vanishes,
    /// Miss; the fetch succeeds on the next tick
    Fetches(Artifact),
    /// Miss; the fetch succeeds after a delay unless cancelled
    FetchesAfter(Duration, Artifact),
    /// Miss; the fetch fails
    FetchFails,
    /// Miss; the store completes synchronously and issues no handle
    FetchesWithoutHandle(Artifact),
    /// Miss; the fetch only completes when cancelled
    UntilCancelled,
    /// Miss; the completion is held forever, even across cancel
    IgnoresCancel,
    /// Miss; the completion is dropped without firing
    DropsCompletion,
}

/// BlobStore whose answers are scripted per key
///
/// Keys without a script are misses whose fetch fails.
pub(crate) struct ScriptedBlobStore {
    scripts: HashMap<String, Script>,
    next_handle: AtomicU64,
    tokens: Mutex<HashMap<TaskHandle, CancellationToken>>,
    parked: Mutex<Vec<FetchCompletion>>,
    pub(crate) fetch_calls: AtomicUsize,
    pub(crate) cancelled: Mutex<Vec<TaskHandle>>,
    in_flight: Arc<AtomicUsize>,
    pub(crate) max_in_flight: Arc<AtomicUsize>,
    pub(crate) memory_limit: Mutex<Option<u64>>,
    pub(crate) maintenance: Mutex<Vec<&'static str>>,
}

impl ScriptedBlobStore {
    pub(crate) fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            next_handle: AtomicU64::new(1),
            tokens: Mutex::new(HashMap::new()),
            parked: Mutex::new(Vec::new()),
            fetch_calls: AtomicUsize::new(0),
            cancelled: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            memory_limit: Mutex::new(None),
            maintenance: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with(mut self, key: &str, script: Script) -> Self {
        self.scripts.insert(key.to_string(), script);
        self
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn cancelled(&self) -> Vec<TaskHandle> {
        self.cancelled.lock().unwrap().clone()
    }

    fn script(&self, key: &str) -> Script {
        self.scripts.get(key).cloned().unwrap_or(Script::FetchFails)
    }

    fn issue_handle(&self) -> (TaskHandle, CancellationToken) {
        let handle = TaskHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let token = CancellationToken::new();
        self.tokens.lock().unwrap().insert(handle, token.clone());
        (handle, token)
    }

    /// Fire `completion` after `delay`, or as cancelled if the token trips first
    fn complete_later(
        &self,
        token: CancellationToken,
        delay: Duration,
        completion: FetchCompletion,
        result: FetchResult,
    ) {
        let in_flight = self.in_flight.clone();
        let max_in_flight = self.max_in_flight.clone();
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    completion.cancelled();
                }
                _ = tokio::time::sleep(delay) => {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    completion.complete(result);
                }
            }
        });
    }
}

#[async_trait]
impl BlobStore for ScriptedBlobStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.script(key) {
            Script::Cached(_) | Script::ReadFails | Script::Vanishes => Ok(true),
            Script::ProbeFails => Err(StoreError::ExistsFailed {
                key: key.to_string(),
                reason: "index unavailable".to_string(),
            }
            .into()),
            _ => Ok(false),
        }
    }

    async fn read(&self, key: &str) -> Result<Option<StoredValue>> {
        match self.script(key) {
            Script::Cached(value) => Ok(Some(value)),
            Script::ReadFails => Err(StoreError::ReadFailed {
                key: key.to_string(),
                reason: "checksum mismatch".to_string(),
            }
            .into()),
            _ => Ok(None),
        }
    }

    async fn fetch_and_store(&self, key: &str, completion: FetchCompletion) -> Option<TaskHandle> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        match self.script(key) {
            Script::Fetches(artifact) => {
                let (handle, token) = self.issue_handle();
                self.complete_later(token, Duration::ZERO, completion, Ok(artifact));
                Some(handle)
            }
            Script::FetchesAfter(delay, artifact) => {
                let (handle, token) = self.issue_handle();
                self.complete_later(token, delay, completion, Ok(artifact));
                Some(handle)
            }
            Script::FetchesWithoutHandle(artifact) => {
                completion.succeed(artifact);
                None
            }
            Script::UntilCancelled => {
                let (handle, token) = self.issue_handle();
                tokio::spawn(async move {
                    token.cancelled().await;
                    completion.cancelled();
                });
                Some(handle)
            }
            Script::IgnoresCancel => {
                let (handle, _token) = self.issue_handle();
                self.parked.lock().unwrap().push(completion);
                Some(handle)
            }
            Script::DropsCompletion => {
                let (handle, _token) = self.issue_handle();
                drop(completion);
                Some(handle)
            }
            _ => {
                let (handle, token) = self.issue_handle();
                let failure = StoreError::FetchFailed {
                    key: key.to_string(),
                    reason: "connection reset".to_string(),
                };
                self.complete_later(token, Duration::ZERO, completion, Err(failure.into()));
                Some(handle)
            }
        }
    }

    async fn cancel(&self, handle: TaskHandle) {
        self.cancelled.lock().unwrap().push(handle);
        if let Some(token) = self.tokens.lock().unwrap().get(&handle) {
            token.cancel();
        }
    }

    async fn set_memory_cost_limit(&self, bytes: u64) {
        *self.memory_limit.lock().unwrap() = Some(bytes);
    }

    async fn clear_all(&self) {
        self.maintenance.lock().unwrap().push("all");
    }

    async fn clear_disk(&self) {
        self.maintenance.lock().unwrap().push("disk");
    }

    async fn clear_memory(&self) {
        self.maintenance.lock().unwrap().push("memory");
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A 1x1 artifact whose pixel bytes are all `tag`
pub(crate) fn artifact(tag: u8) -> Artifact {
    Artifact::new(1, 1, vec![tag; 4])
}

/// Build a coordinator over `store` with the default decoder
pub(crate) fn create_test_coordinator(
    store: Arc<ScriptedBlobStore>,
    config: Config,
) -> FetchCoordinator {
    FetchCoordinator::new(config, store, Arc::new(RasterDecoder::default())).unwrap()
}
