//! Cache Store Module
//!
//! The contract the engine needs from a relational backend: a factory for
//! short-lived transactional contexts over the cache table.

use crate::cache::{CacheEntry, Timestamp};
use crate::error::Result;

// == Cache Store ==
/// A backend holding cache rows.
///
/// Every engine operation opens its own context and either commits it or
/// drops it. Dropping an uncommitted context discards its changes.
pub trait CacheStore: Send + Sync + 'static {
    /// How this backend represents instants.
    type Timestamp: Timestamp;

    type Context<'a>: CacheContext<Timestamp = Self::Timestamp>
    where
        Self: 'a;

    /// Short name used in logs, e.g. `"sqlite"`.
    fn name(&self) -> &'static str;

    /// Opens a new unit of work.
    fn create_context(&self) -> Result<Self::Context<'_>>;
}

// == Cache Context ==
/// A unit of work over the cache table.
///
/// Mutations report how many rows they touched.
pub trait CacheContext {
    type Timestamp: Timestamp;

    /// Looks up a row by key, honouring the backend's key collation.
    fn find(&mut self, id: &str) -> Result<Option<CacheEntry<Self::Timestamp>>>;

    /// Inserts a row that does not exist yet.
    fn add(&mut self, entry: &CacheEntry<Self::Timestamp>) -> Result<usize>;

    /// Rewrites value and expiration of an existing row.
    fn update(&mut self, entry: &CacheEntry<Self::Timestamp>) -> Result<usize>;

    /// Deletes a row by key.
    fn remove(&mut self, id: &str) -> Result<usize>;

    /// Deletes every row whose expiry is strictly before `now`.
    fn remove_expired(&mut self, now: Self::Timestamp) -> Result<usize>;

    /// Makes the changes durable.
    fn commit(self) -> Result<()>;
}
