//! Backend Registry
//!
//! Maps configuration tags to factories that build a ready cache engine, so
//! the server picks its store at startup without knowing the concrete types.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::info;

use crate::cache::{ContextCache, DistributedCache, MemoryStore, SqliteStore};
use crate::config::Config;
use crate::error::{CacheError, Result};

/// Builds a cache engine from configuration.
pub type BackendFactory = fn(&Config) -> Result<Arc<dyn DistributedCache>>;

// == Backend Registry ==
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the `memory` and `sqlite` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", memory_backend);
        registry.register("sqlite", sqlite_backend);
        registry
    }

    /// Registers `factory` under `tag`, replacing any previous one.
    pub fn register(&mut self, tag: impl Into<String>, factory: BackendFactory) {
        self.factories.insert(tag.into().to_ascii_lowercase(), factory);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(&tag.to_ascii_lowercase())
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Builds the backend named by `config.backend`.
    pub fn build(&self, config: &Config) -> Result<Arc<dyn DistributedCache>> {
        let factory = self
            .factories
            .get(&config.backend.to_ascii_lowercase())
            .ok_or_else(|| CacheError::UnknownBackend(config.backend.clone()))?;

        let cache = factory(config)?;
        info!("Cache backend '{}' initialized", cache.backend());
        Ok(cache)
    }
}

fn memory_backend(config: &Config) -> Result<Arc<dyn DistributedCache>> {
    let store = MemoryStore::<DateTime<FixedOffset>>::new()
        .with_case_insensitive_keys(config.case_insensitive_keys);
    Ok(Arc::new(ContextCache::new(store, config.cache.clone())))
}

fn sqlite_backend(config: &Config) -> Result<Arc<dyn DistributedCache>> {
    let store = SqliteStore::open(&config.sqlite_path)?;
    Ok(Arc::new(ContextCache::new(store, config.cache.clone())))
}
