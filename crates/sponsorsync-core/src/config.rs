//! Configuration types for the sponsor synchronization engine
//!
//! This module defines all configuration structures used throughout the workspace.

use serde::{Deserialize, Serialize};

/// Default upstream API base URL
pub const DEFAULT_BASE_URL: &str = "https://afdian.com/api/open";

/// Largest page the upstream sponsor query accepts
pub const MAX_PAGE_SIZE: usize = 100;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upstream API configuration
    pub upstream: UpstreamConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.upstream.validate()?;
        self.store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Upstream API configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Account id the requests are signed for
    pub user_id: String,

    /// Shared secret used for signing
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl UpstreamConfig {
    /// Create an upstream configuration with default URL and timeout
    pub fn new(user_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            api_token: api_token.into(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Validate the upstream configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.user_id.is_empty() {
            return Err(crate::Error::config("Upstream user_id cannot be empty"));
        }
        if self.api_token.is_empty() {
            return Err(crate::Error::config("Upstream API token cannot be empty"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Upstream base URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::new(String::new(), String::new())
    }
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("user_id", &self.user_id)
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// SQLite database file
    Sqlite {
        /// Path to the database file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Sqlite { path } if path.is_empty() => {
                Err(crate::Error::config("SQLite store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Records requested per upstream page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pause between consecutive page fetches (in milliseconds)
    ///
    /// Bounds the request rate against upstream. Set to 0 to disable.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    /// Interval between scheduled runs (in seconds)
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Key of the run metadata row written after each completed run
    #[serde(default = "default_metadata_key")]
    pub metadata_key: String,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(crate::Error::config(format!(
                "Page size must be between 1 and {}. Got: {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        if self.sync_interval_secs == 0 {
            return Err(crate::Error::config("Sync interval must be > 0"));
        }
        if self.metadata_key.is_empty() {
            return Err(crate::Error::config("Metadata key cannot be empty"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Set the inter-page delay
    pub fn with_page_delay_ms(mut self, page_delay_ms: u64) -> Self {
        self.page_delay_ms = page_delay_ms;
        self
    }

    /// Set the page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            sync_interval_secs: default_sync_interval_secs(),
            metadata_key: default_metadata_key(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_page_delay_ms() -> u64 {
    500
}

fn default_sync_interval_secs() -> u64 {
    300
}

fn default_metadata_key() -> String {
    "last_sync_time".to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upstream_limits() {
        let engine = EngineConfig::default();
        assert_eq!(engine.page_size, 100);
        assert_eq!(engine.page_delay_ms, 500);
        assert_eq!(engine.sync_interval_secs, 300);
        assert_eq!(engine.metadata_key, "last_sync_time");
        assert!(engine.validate().is_ok());

        let upstream = UpstreamConfig::new("uid", "token");
        assert_eq!(upstream.base_url, DEFAULT_BASE_URL);
        assert_eq!(upstream.request_timeout_secs, 30);
        assert!(upstream.validate().is_ok());
    }

    #[test]
    fn page_size_out_of_range_is_rejected() {
        assert!(EngineConfig::default().with_page_size(0).validate().is_err());
        assert!(EngineConfig::default().with_page_size(101).validate().is_err());
        assert!(EngineConfig::default().with_page_size(1).validate().is_ok());
    }

    #[test]
    fn missing_credentials_are_rejected() {
        assert!(UpstreamConfig::new("", "token").validate().is_err());
        assert!(UpstreamConfig::new("uid", "").validate().is_err());
        assert!(
            UpstreamConfig::new("uid", "token")
                .with_base_url("ftp://example.com")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn api_token_not_exposed_in_debug() {
        let upstream = UpstreamConfig::new("uid", "secret_token_12345");
        let debug_str = format!("{:?}", upstream);
        assert!(!debug_str.contains("secret_token_12345"));
        assert!(debug_str.contains("UpstreamConfig"));
    }

    #[test]
    fn store_config_deserializes_tagged() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"type":"sqlite","path":"/tmp/sponsors.db"}"#).unwrap();
        assert_eq!(config.type_name(), "sqlite");
        assert!(config.validate().is_ok());

        let empty = StoreConfig::Sqlite {
            path: String::new(),
        };
        assert!(empty.validate().is_err());
    }
}
