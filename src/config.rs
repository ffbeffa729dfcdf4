//! Configuration types for image-fetch

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Per-batch fetch behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Upper bound on how long a unit waits for a fetch-and-store completion
    /// before cancelling it (None = wait for the store)
    ///
    /// A store whose `cancel` never fires the completion would otherwise hang
    /// the batch forever.
    #[serde(default, with = "optional_duration_serde")]
    pub unit_timeout: Option<Duration>,

    /// Maximum number of units running at once per batch (None = unbounded)
    #[serde(default)]
    pub max_concurrent_units: Option<usize>,

    /// HTTP request timeout for the bundled fetcher, in milliseconds in JSON
    /// (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent sent by the bundled fetcher
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Largest decoded image accepted, in pixels (default: 64 megapixels)
    #[serde(default = "default_max_decoded_pixels")]
    pub max_decoded_pixels: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            unit_timeout: None,
            max_concurrent_units: None,
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            max_decoded_pixels: default_max_decoded_pixels(),
        }
    }
}

/// Memory cache sizing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Edge length of the reference image the memory tier is sized for (default: 600)
    #[serde(default = "default_base_dimension")]
    pub base_dimension: u32,

    /// Display scale factor applied to the reference size (default: 2.0)
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dimension: default_base_dimension(),
            scale: default_scale(),
        }
    }
}

impl CacheConfig {
    /// Memory cost limit applied by `set_cache_limit`: `base_dimension² × scale`
    pub fn memory_cost_limit(&self) -> u64 {
        let base = u64::from(self.base_dimension);
        ((base * base) as f64 * self.scale) as u64
    }
}

/// Event channel settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventConfig {
    /// Broadcast buffer size; slower subscribers lag beyond this (default: 1000)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Main configuration for FetchCoordinator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch behaviour
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Memory cache sizing
    #[serde(default)]
    pub cache: CacheConfig,

    /// Event channel settings
    #[serde(default)]
    pub events: EventConfig,
}

impl Config {
    /// Parse a JSON configuration document, applying defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid key.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent_units == Some(0) {
            return Err(Error::config(
                "fetch.max_concurrent_units",
                "must be at least 1 when set",
            ));
        }
        if self.fetch.unit_timeout == Some(Duration::ZERO) {
            return Err(Error::config(
                "fetch.unit_timeout",
                "must be greater than zero when set",
            ));
        }
        if self.fetch.request_timeout == Duration::ZERO {
            return Err(Error::config(
                "fetch.request_timeout",
                "must be greater than zero",
            ));
        }
        if self.fetch.max_decoded_pixels == 0 {
            return Err(Error::config(
                "fetch.max_decoded_pixels",
                "must be greater than zero",
            ));
        }
        if !(self.cache.scale.is_finite() && self.cache.scale > 0.0) {
            return Err(Error::config(
                "cache.scale",
                format!("must be a positive number, got {}", self.cache.scale),
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(Error::config(
                "events.channel_capacity",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("image-fetch/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_decoded_pixels() -> u64 {
    64 * 1024 * 1024
}

fn default_base_dimension() -> u32 {
    600
}

fn default_scale() -> f64 {
    2.0
}

fn default_channel_capacity() -> usize {
    1000
}

// Duration serialization helper (milliseconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (milliseconds; unit timeouts are short)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
