//! In-process cache store.
//!
//! Keeps rows in a `HashMap` behind one lock. A context holds the lock for its
//! whole lifetime, so contexts are serialized, and records an undo log so that
//! dropping it without committing restores the previous rows.

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};

use crate::cache::{CacheContext, CacheEntry, CacheStore, Timestamp};
use crate::error::{CacheError, Result};

type Rows<T> = HashMap<String, CacheEntry<T>>;

// == Memory Store ==
#[derive(Debug)]
pub struct MemoryStore<T: Timestamp> {
    rows: Mutex<Rows<T>>,
    case_insensitive: bool,
}

impl<T: Timestamp> MemoryStore<T> {
    /// Creates an empty store with case-sensitive keys.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            case_insensitive: false,
        }
    }

    /// Compare keys ignoring ASCII case, like SQLite's `NOCASE` collation.
    pub fn with_case_insensitive_keys(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Number of rows, expired ones included.
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }
}

impl<T: Timestamp> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Timestamp> CacheStore for MemoryStore<T> {
    type Timestamp = T;
    type Context<'a> = MemoryContext<'a, T>;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_context(&self) -> Result<MemoryContext<'_, T>> {
        Ok(MemoryContext {
            rows: self.rows.lock(),
            case_insensitive: self.case_insensitive,
            undo: Vec::new(),
        })
    }
}

// == Memory Context ==
pub struct MemoryContext<'a, T: Timestamp> {
    rows: MutexGuard<'a, Rows<T>>,
    case_insensitive: bool,
    /// Previous state of every key touched, oldest first.
    undo: Vec<(String, Option<CacheEntry<T>>)>,
}

impl<T: Timestamp> MemoryContext<'_, T> {
    fn key(&self, id: &str) -> String {
        if self.case_insensitive {
            id.to_ascii_lowercase()
        } else {
            id.to_string()
        }
    }

    fn record(&mut self, key: &str) {
        let previous = self.rows.get(key).cloned();
        self.undo.push((key.to_string(), previous));
    }
}

impl<T: Timestamp> CacheContext for MemoryContext<'_, T> {
    type Timestamp = T;

    fn find(&mut self, id: &str) -> Result<Option<CacheEntry<T>>> {
        let key = self.key(id);
        Ok(self.rows.get(&key).cloned())
    }

    fn add(&mut self, entry: &CacheEntry<T>) -> Result<usize> {
        let key = self.key(&entry.id);
        if self.rows.contains_key(&key) {
            return Err(CacheError::Internal(format!("Key already exists: {}", entry.id)));
        }
        self.record(&key);
        self.rows.insert(key, entry.clone());
        Ok(1)
    }

    fn update(&mut self, entry: &CacheEntry<T>) -> Result<usize> {
        let key = self.key(&entry.id);
        if !self.rows.contains_key(&key) {
            return Ok(0);
        }
        self.record(&key);
        if let Some(row) = self.rows.get_mut(&key) {
            // The stored id keeps the casing it was created with.
            row.value = entry.value.clone();
            row.absolute_expiration = entry.absolute_expiration;
            row.expires_at_time = entry.expires_at_time;
            row.sliding_expiration_in_seconds = entry.sliding_expiration_in_seconds;
        }
        Ok(1)
    }

    fn remove(&mut self, id: &str) -> Result<usize> {
        let key = self.key(id);
        if !self.rows.contains_key(&key) {
            return Ok(0);
        }
        self.record(&key);
        self.rows.remove(&key);
        Ok(1)
    }

    fn remove_expired(&mut self, now: T) -> Result<usize> {
        let expired: Vec<String> = self
            .rows
            .iter()
            .filter(|(_, entry)| entry.expires_at_time < now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.record(key);
            self.rows.remove(key);
        }

        Ok(expired.len())
    }

    fn commit(mut self) -> Result<()> {
        self.undo.clear();
        Ok(())
    }
}

impl<T: Timestamp> Drop for MemoryContext<'_, T> {
    fn drop(&mut self) {
        while let Some((key, previous)) = self.undo.pop() {
            match previous {
                Some(entry) => {
                    self.rows.insert(key, entry);
                }
                None => {
                    self.rows.remove(&key);
                }
            }
        }
    }
}
