//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;

/// Response body for `GET /cache/:key`
#[derive(Debug, Clone, Serialize)]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value; invalid UTF-8 is replaced
    pub value: String,
}

impl GetResponse {
    pub fn new(key: impl Into<String>, value: &[u8]) -> Self {
        Self {
            key: key.into(),
            value: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

/// Acknowledges a write, refresh or removal of one key.
#[derive(Debug, Clone, Serialize)]
pub struct KeyResponse {
    /// Success message
    pub message: String,
    /// The key acted on
    pub key: String,
}

impl KeyResponse {
    pub fn set(key: impl Into<String>) -> Self {
        Self::new(key, "set")
    }

    pub fn refreshed(key: impl Into<String>) -> Self {
        Self::new(key, "refreshed")
    }

    pub fn removed(key: impl Into<String>) -> Self {
        Self::new(key, "removed")
    }

    fn new(key: impl Into<String>, action: &str) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' {}", key, action),
            key,
        }
    }
}

/// Response body for `POST /cleanup`
#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    /// Expired entries deleted by the sweep
    pub removed: usize,
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Backend tag serving the cache
    pub backend: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(backend: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            backend: backend.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Backend tag serving the cache
    pub backend: String,
    /// Server time, RFC 3339
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy(backend: impl Into<String>) -> Self {
        Self {
            status: "healthy",
            backend: backend.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
