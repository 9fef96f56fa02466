//! Background Tasks Module
//!
//! Contains the work that runs detached from cache callers.
//!
//! # Tasks
//! - Cleanup: throttled, traffic-triggered sweeps of expired cache entries

mod cleanup;

pub use cleanup::{spawn_sweep, CleanupScheduler};
