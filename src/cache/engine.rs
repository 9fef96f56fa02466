//! Context Cache Engine
//!
//! Get/set/refresh/remove over any [`CacheStore`], with sliding and absolute
//! expiration and traffic-triggered cleanup of expired rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cache::expiration::{refreshed_expiration, resolve_expiration};
use crate::cache::stats::StatsRecorder;
use crate::cache::{
    CacheContext, CacheEntry, CacheStats, CacheStore, Clock, ExpirationOptions, SystemClock,
    Timestamp, MAX_KEY_LENGTH,
};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep, CleanupScheduler};

// == Context Cache ==
/// A cache engine over a relational store.
///
/// Cheap to clone; clones share the store, the clock and the cleanup state.
/// Every operation has a blocking form and an `_async` form. The async forms
/// check their cancellation token before starting and run store I/O on
/// tokio's blocking pool.
pub struct ContextCache<S: CacheStore> {
    inner: Arc<Inner<S>>,
}

struct Inner<S: CacheStore> {
    store: S,
    clock: Arc<dyn Clock>,
    options: CacheOptions,
    cleanup: CleanupScheduler,
    stats: StatsRecorder,
}

impl<S: CacheStore> Clone for ContextCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CacheStore> ContextCache<S> {
    // == Constructors ==
    pub fn new(store: S, options: CacheOptions) -> Self {
        Self::with_clock(store, options, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, options: CacheOptions, clock: Arc<dyn Clock>) -> Self {
        let cleanup = CleanupScheduler::new(options.effective_cleanup_interval());
        Self {
            inner: Arc::new(Inner {
                store,
                clock,
                options,
                cleanup,
                stats: StatsRecorder::default(),
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn options(&self) -> &CacheOptions {
        &self.inner.options
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    /// When the last cleanup sweep was launched, `None` if never.
    pub fn last_cleanup(&self) -> Option<DateTime<Utc>> {
        self.inner.cleanup.last_cleanup()
    }

    /// Overrides the recorded launch time of the last sweep.
    pub fn set_last_cleanup(&self, at: Option<DateTime<Utc>>) {
        self.inner.cleanup.set_last_cleanup(at);
    }

    // == Get ==
    /// Returns the value stored under `key`, sliding its expiry forward.
    ///
    /// Absent and expired keys return `None` and are left untouched.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let value = self.inner.get(key)?;
        self.cleanup_if_necessary();
        Ok(value)
    }

    pub async fn get_async(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        ensure_not_cancelled(cancel)?;

        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        let value = task::spawn_blocking(move || inner.get(&key)).await??;

        self.cleanup_if_necessary();
        Ok(value)
    }

    // == Set ==
    /// Stores `value` under `key` with the requested expiration.
    ///
    /// The expiration is resolved before the store is touched, so an invalid
    /// one leaves any existing entry unchanged.
    pub fn set(&self, key: &str, value: &[u8], options: &ExpirationOptions) -> Result<()> {
        validate_key(key)?;
        self.inner.set(key, value.to_vec(), options)?;
        self.cleanup_if_necessary();
        Ok(())
    }

    pub async fn set_async(
        &self,
        key: &str,
        value: Vec<u8>,
        options: &ExpirationOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        validate_key(key)?;
        ensure_not_cancelled(cancel)?;

        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        let options = options.clone();
        task::spawn_blocking(move || inner.set(&key, value, &options)).await??;

        self.cleanup_if_necessary();
        Ok(())
    }

    // == Refresh ==
    /// Slides the expiry of `key` forward without reading its value.
    ///
    /// Absent and expired keys are ignored.
    pub fn refresh(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.inner.refresh(key)?;
        self.cleanup_if_necessary();
        Ok(())
    }

    pub async fn refresh_async(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        validate_key(key)?;
        ensure_not_cancelled(cancel)?;

        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        task::spawn_blocking(move || inner.refresh(&key)).await??;

        self.cleanup_if_necessary();
        Ok(())
    }

    // == Remove ==
    /// Deletes `key`. Removing an absent key is not an error.
    pub fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.inner.remove(key)?;
        self.cleanup_if_necessary();
        Ok(())
    }

    pub async fn remove_async(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        validate_key(key)?;
        ensure_not_cancelled(cancel)?;

        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        task::spawn_blocking(move || inner.remove(&key)).await??;

        self.cleanup_if_necessary();
        Ok(())
    }

    // == Cleanup ==
    /// Deletes every entry whose expiry is strictly before now.
    ///
    /// Returns the number of entries removed. Safe to run concurrently with
    /// itself and with ordinary traffic.
    pub fn remove_expired_entries(&self) -> Result<usize> {
        self.inner.remove_expired_entries()
    }

    pub async fn remove_expired_entries_async(&self) -> Result<usize> {
        let inner = Arc::clone(&self.inner);
        task::spawn_blocking(move || inner.remove_expired_entries()).await?
    }

    /// Launches a background sweep if the cleanup interval has elapsed since
    /// the last one. Never waits for the sweep.
    pub fn cleanup_if_necessary(&self) {
        let now = self.inner.clock.now();
        if !self.inner.cleanup.try_begin(now) {
            return;
        }

        trace!("Cleanup due at {}", now);
        let inner = Arc::clone(&self.inner);
        spawn_sweep(move || {
            if let Err(err) = inner.remove_expired_entries() {
                warn!(
                    "Cleanup of expired {} cache entries failed: {}",
                    inner.store.name(),
                    err
                );
            }
        });
    }
}

impl<S: CacheStore> Inner<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut ctx = self.store.create_context()?;

        let mut entry = match ctx.find(key)? {
            Some(entry) if !entry.is_expired(now) => entry,
            _ => {
                debug!("Cache miss for {}", key);
                self.stats.record_miss();
                return Ok(None);
            }
        };

        let written = self.refresh_entry(&mut ctx, &mut entry, now)?;
        ctx.commit()?;

        self.stats.record_refresh(written);
        self.stats.record_hit();
        Ok(Some(entry.value))
    }

    fn set(&self, key: &str, value: Vec<u8>, options: &ExpirationOptions) -> Result<()> {
        let info = resolve_expiration(
            options,
            self.clock.now(),
            self.options.default_sliding_expiration,
        )?;
        let mut ctx = self.store.create_context()?;

        match ctx.find(key)? {
            Some(mut entry) => {
                entry.value = value;
                entry.apply_expiration(&info);
                ctx.update(&entry)?;
            }
            None => {
                ctx.add(&CacheEntry::new(key, value, &info))?;
            }
        }
        ctx.commit()?;

        debug!("Stored {} until {}", key, info.expires);
        self.stats.record_set();
        Ok(())
    }

    fn refresh(&self, key: &str) -> Result<()> {
        let now = self.clock.now();
        let mut ctx = self.store.create_context()?;

        if let Some(mut entry) = ctx.find(key)? {
            if !entry.is_expired(now) {
                let written = self.refresh_entry(&mut ctx, &mut entry, now)?;
                if written {
                    ctx.commit()?;
                }
                self.stats.record_refresh(written);
            }
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut ctx = self.store.create_context()?;
        let removed = ctx.remove(key)?;
        ctx.commit()?;

        if removed > 0 {
            self.stats.record_removal();
        }
        Ok(())
    }

    fn remove_expired_entries(&self) -> Result<usize> {
        let now = S::Timestamp::from_instant(self.clock.now());
        let mut ctx = self.store.create_context()?;
        let removed = ctx.remove_expired(now)?;
        ctx.commit()?;

        self.stats.record_sweep(removed);
        if removed > 0 {
            info!("Cleanup: removed {} expired {} cache entries", removed, self.store.name());
        } else {
            debug!("Cleanup: no expired {} cache entries found", self.store.name());
        }
        Ok(removed)
    }

    /// Writes the refreshed expiry of `entry` into `ctx`, skipping the write
    /// when it would not change. Returns whether a write happened; the caller
    /// records it once the context commits.
    fn refresh_entry<C>(
        &self,
        ctx: &mut C,
        entry: &mut CacheEntry<S::Timestamp>,
        now: DateTime<Utc>,
    ) -> Result<bool>
    where
        C: CacheContext<Timestamp = S::Timestamp>,
    {
        let refreshed = refreshed_expiration(&entry.expiration_fields(), now);
        if refreshed == entry.expires_at_time.to_instant() {
            return Ok(false);
        }

        entry.expires_at_time = S::Timestamp::from_instant(refreshed);
        ctx.update(entry)?;
        Ok(true)
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidArgument("Key cannot be empty".to_string()));
    }
    if key.chars().count() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidArgument(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(CacheError::Cancelled);
    }
    Ok(())
}
