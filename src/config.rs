//! Configuration Module
//!
//! Handles loading the server configuration and the engine options from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_SLIDING_EXPIRATION};

// == Cache Options ==
/// Per-deployment options of a cache engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Minimum time between cleanup sweeps; the engine default when unset
    pub cleanup_interval: Option<Duration>,
    /// Sliding window given to writes that request no expiration
    pub default_sliding_expiration: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cleanup_interval: None,
            default_sliding_expiration: DEFAULT_SLIDING_EXPIRATION,
        }
    }
}

impl CacheOptions {
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    pub fn with_default_sliding_expiration(mut self, window: Duration) -> Self {
        self.default_sliding_expiration = window;
        self
    }

    /// The cleanup interval in effect.
    pub fn effective_cleanup_interval(&self) -> Duration {
        self.cleanup_interval.unwrap_or(DEFAULT_CLEANUP_INTERVAL)
    }
}

// == Server Config ==
/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend tag looked up in the backend registry
    pub backend: String,
    /// Database file used by the sqlite backend
    pub sqlite_path: PathBuf,
    /// Whether the memory backend compares keys ignoring ASCII case
    pub case_insensitive_keys: bool,
    /// Engine options
    pub cache: CacheOptions,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_BACKEND` - Backend tag (default: memory)
    /// - `SQLITE_PATH` - SQLite database file (default: cache.db)
    /// - `CASE_INSENSITIVE_KEYS` - Memory backend key comparison (default: false)
    /// - `DEFAULT_SLIDING_EXPIRATION` - Default sliding window in seconds (default: 1200)
    /// - `CLEANUP_INTERVAL` - Seconds between cleanup sweeps (default: engine default, 1800)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backend: env::var("CACHE_BACKEND")
                .ok()
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.backend),
            sqlite_path: env::var("SQLITE_PATH")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.sqlite_path),
            case_insensitive_keys: env::var("CASE_INSENSITIVE_KEYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.case_insensitive_keys),
            cache: CacheOptions {
                cleanup_interval: env::var("CLEANUP_INTERVAL")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs),
                default_sliding_expiration: env::var("DEFAULT_SLIDING_EXPIRATION")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_SLIDING_EXPIRATION),
            },
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            sqlite_path: PathBuf::from("cache.db"),
            case_insensitive_keys: false,
            cache: CacheOptions::default(),
            server_port: 3000,
        }
    }
}
