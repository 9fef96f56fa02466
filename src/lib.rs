//! Context Cache - a distributed cache over relational stores
//!
//! Sliding and absolute expiration, refresh-on-read and throttled background
//! cleanup, served over HTTP by a pluggable backend.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use backend::BackendRegistry;
pub use cache::{ContextCache, DistributedCache, ExpirationOptions};
pub use config::{CacheOptions, Config};
pub use error::{CacheError, Result};
