//! Error types for image-fetch
//!
//! Errors never escape a batch: every per-locator failure is absorbed by the
//! coordinator and surfaces only as a missing key (plus a [`FailureKind`] in
//! [`BatchOutcome::failures`](crate::types::BatchOutcome)). The types here are
//! what collaborators return and what fallible construction reports.

use thiserror::Error;

use crate::types::FailureKind;

/// Result type alias for image-fetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for image-fetch
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.max_concurrent_units")
        key: Option<String>,
    },

    /// Blob store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Image bytes could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Locator is not an absolute URL
    #[error("invalid locator '{locator}': {reason}")]
    InvalidLocator {
        /// The rejected locator text
        locator: String,
        /// Why it was rejected
        reason: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Blob store errors (existence checks, reads, fetch-and-store)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Existence check could not be answered
    #[error("existence check failed for {key}: {reason}")]
    ExistsFailed {
        /// Store key that was probed
        key: String,
        /// The reason the probe failed
        reason: String,
    },

    /// Stored entry could not be read
    #[error("read failed for {key}: {reason}")]
    ReadFailed {
        /// Store key that was read
        key: String,
        /// The reason the read failed
        reason: String,
    },

    /// Entry reported present but was gone at read time
    #[error("entry for {key} vanished between existence check and read")]
    Vanished {
        /// Store key that vanished
        key: String,
    },

    /// Remote server answered with a non-success status
    #[error("HTTP {status} fetching {key}")]
    HttpStatus {
        /// Store key being fetched
        key: String,
        /// HTTP status code
        status: u16,
    },

    /// Fetch-and-store failed for another reason
    #[error("fetch failed for {key}: {reason}")]
    FetchFailed {
        /// Store key being fetched
        key: String,
        /// The reason the fetch failed
        reason: String,
    },
}

/// Image decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    /// No bytes to decode
    #[error("empty image data")]
    Empty,

    /// Bytes do not start with any supported image signature
    #[error("unrecognized image format")]
    UnknownFormat,

    /// Decoder rejected the bytes
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    /// Decoded image exceeds the configured pixel budget
    #[error("image {width}x{height} exceeds decode limit of {limit} pixels")]
    TooLarge {
        /// Decoded width
        width: u32,
        /// Decoded height
        height: u32,
        /// Maximum number of pixels allowed
        limit: u64,
    },
}

impl Error {
    /// Classify this error onto the per-locator failure taxonomy
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Error::Store(StoreError::ExistsFailed { .. })
            | Error::Store(StoreError::ReadFailed { .. })
            | Error::Store(StoreError::Vanished { .. }) => FailureKind::CacheRead,
            Error::Store(StoreError::HttpStatus { .. })
            | Error::Store(StoreError::FetchFailed { .. }) => FailureKind::Fetch,
            Error::Decode(_) => FailureKind::Decode,
            Error::Network(e) if e.is_timeout() => FailureKind::TimedOut,
            Error::Network(_) => FailureKind::Fetch,
            // Serialization only happens on the cache side
            Error::Serialization(_) => FailureKind::CacheRead,
            Error::Config { .. } | Error::InvalidLocator { .. } | Error::Other(_) => {
                FailureKind::Fetch
            }
        }
    }

    /// Shorthand for an [`Error::Config`] naming the offending key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
