//! Core types for image-fetch

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::error::{Error, Result};

/// Identifier of a remote image (normally a URL)
///
/// The full string is the store key and the key of the result mapping.
/// Construction through `From` does not validate; use [`Locator::parse`] when
/// the input comes from outside the program.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    /// Create a locator without validation
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Parse and validate an absolute URL locator
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocator`] if the text is not an absolute URL
    /// or has no host.
    pub fn parse(locator: &str) -> Result<Self> {
        let url = Url::parse(locator).map_err(|e| Error::InvalidLocator {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() || url.host().is_none() {
            return Err(Error::InvalidLocator {
                locator: locator.to_string(),
                reason: "locator must be a hierarchical URL with a host".to_string(),
            });
        }
        Ok(Self(url.into()))
    }

    /// The key used for this locator in the blob store
    pub fn as_key(&self) -> &str {
        &self.0
    }

    /// Parse the locator as a URL
    pub fn to_url(&self) -> Result<Url> {
        Url::parse(&self.0).map_err(|e| Error::InvalidLocator {
            locator: self.0.clone(),
            reason: e.to_string(),
        })
    }
}

impl From<&str> for Locator {
    fn from(locator: &str) -> Self {
        Self(locator.to_string())
    }
}

impl From<String> for Locator {
    fn from(locator: String) -> Self {
        Self(locator)
    }
}

impl From<Url> for Locator {
    fn from(url: Url) -> Self {
        Self(url.into())
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded image
///
/// Pixels are RGBA8, row-major, shared behind an `Arc` so cloning an artifact
/// (e.g. from the memory tier into a result map) never copies pixel data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Artifact {
    /// Create an artifact from RGBA8 pixel data
    pub fn new(width: u32, height: u32, pixels: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA8 pixel buffer
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory cost of this artifact in bytes
    pub fn cost(&self) -> u64 {
        self.pixels.len() as u64
    }
}

/// A value held by a blob store
#[derive(Clone, Debug)]
pub enum StoredValue {
    /// Encoded image bytes, still to be decoded
    Raw(Vec<u8>),
    /// An already-decoded image
    Decoded(Artifact),
}

/// Handle to an in-flight fetch-and-store operation, used only for cancellation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(pub u64);

impl TaskHandle {
    /// Create a new TaskHandle
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskHandle {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Identifier of one `fetch_images` call, for events and logs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// Why a locator produced no entry in the result mapping
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Existence check or read from the store failed
    CacheRead,
    /// Network or fetch-and-store failure
    Fetch,
    /// Bytes could not be decoded into an image
    Decode,
    /// The fetch was cancelled
    Cancelled,
    /// The fetch did not complete within the unit timeout
    TimedOut,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::CacheRead => "cache_read",
            FailureKind::Fetch => "fetch",
            FailureKind::Decode => "decode",
            FailureKind::Cancelled => "cancelled",
            FailureKind::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Mapping from locator to decoded image
pub type ResultMap = HashMap<Locator, Artifact>;

/// Completed batch, handed to the caller exactly once
///
/// `success` is always `true`: per-locator failures are visible only as
/// missing keys in `results`, with the cause recorded in `failures`.
#[must_use]
#[derive(Clone, Debug)]
pub struct BatchOutcome {
    /// Always true once the batch has drained
    pub success: bool,
    /// `None` only when the request itself was empty
    pub results: Option<ResultMap>,
    /// Locators that produced no artifact, with the cause
    pub failures: HashMap<Locator, FailureKind>,
}

impl BatchOutcome {
    /// Outcome of an empty request: success with no result map at all
    pub(crate) fn empty_request() -> Self {
        Self {
            success: true,
            results: None,
            failures: HashMap::new(),
        }
    }

    pub(crate) fn completed(results: ResultMap, failures: HashMap<Locator, FailureKind>) -> Self {
        Self {
            success: true,
            results: Some(results),
            failures,
        }
    }

    /// Look up the artifact fetched for a locator
    pub fn get(&self, locator: &Locator) -> Option<&Artifact> {
        self.results.as_ref()?.get(locator)
    }

    /// Number of locators that produced an artifact
    pub fn len(&self) -> usize {
        self.results.as_ref().map_or(0, HashMap::len)
    }

    /// True if no artifact was produced (including an empty request)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into the `(success, results)` pair of the callback contract
    pub fn into_parts(self) -> (bool, Option<ResultMap>) {
        (self.success, self.results)
    }
}

/// Event emitted while batches run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A non-empty batch was accepted
    BatchStarted {
        /// Batch ID
        batch: BatchId,
        /// Number of units spawned (duplicates included)
        units: usize,
    },

    /// A locator was served from the store without fetching
    CacheHit {
        /// Batch ID
        batch: BatchId,
        /// Locator served
        locator: Locator,
    },

    /// A cache miss started a fetch-and-store
    FetchStarted {
        /// Batch ID
        batch: BatchId,
        /// Locator being fetched
        locator: Locator,
        /// Handle registered for cancellation, if the store issued one
        #[serde(skip_serializing_if = "Option::is_none")]
        handle: Option<TaskHandle>,
    },

    /// A fetch-and-store produced an artifact
    Fetched {
        /// Batch ID
        batch: BatchId,
        /// Locator fetched
        locator: Locator,
    },

    /// A locator produced no artifact
    LocatorFailed {
        /// Batch ID
        batch: BatchId,
        /// Locator that failed
        locator: Locator,
        /// Failure cause
        kind: FailureKind,
    },

    /// Every unit of a batch has finished
    BatchCompleted {
        /// Batch ID
        batch: BatchId,
        /// Distinct locators with an artifact
        succeeded: usize,
        /// Distinct locators without an artifact
        failed: usize,
    },

    /// Cancellation was requested for all registered fetches
    DownloadsCancelled {
        /// Number of handles cancelled
        count: usize,
    },
}
