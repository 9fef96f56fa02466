//! Cache Module
//!
//! Provides the context cache engine with sliding and absolute expiration over
//! pluggable relational stores.

use std::time::Duration;

mod clock;
mod distributed;
mod engine;
mod entry;
mod expiration;
mod memory;
mod sqlite;
mod stats;
mod store;
mod timestamp;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use distributed::DistributedCache;
pub use engine::ContextCache;
pub use entry::CacheEntry;
pub use expiration::{
    latest_expiration, refreshed_expiration, resolve_expiration, ExpirationFields, ExpirationInfo,
    ExpirationOptions,
};
pub use memory::{MemoryContext, MemoryStore};
pub use sqlite::{SqliteContext, SqliteStore};
pub use stats::CacheStats;
pub use store::{CacheContext, CacheStore};
pub use timestamp::Timestamp;

// == Public Constants ==
/// Maximum allowed key length in characters
pub const MAX_KEY_LENGTH: usize = 449;

/// Sliding window applied to writes that request no expiration
pub const DEFAULT_SLIDING_EXPIRATION: Duration = Duration::from_secs(20 * 60);

/// Minimum time between two cleanup sweeps unless configured otherwise
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30 * 60);
