//! Cache Entry Module
//!
//! Defines the row stored per cache key, generic over the store's timestamp type.

use chrono::{DateTime, Utc};

use crate::cache::expiration::{ExpirationFields, ExpirationInfo};
use crate::cache::Timestamp;

// == Cache Entry ==
/// One row of the cache table.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T: Timestamp> {
    /// The cache key
    pub id: String,
    /// The stored value
    pub value: Vec<u8>,
    /// Hard expiry ceiling, if any
    pub absolute_expiration: Option<T>,
    /// The expiry currently in effect
    pub expires_at_time: T,
    /// Sliding window applied on every successful read
    pub sliding_expiration_in_seconds: Option<i64>,
}

impl<T: Timestamp> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry whose expiration fields come from `info`.
    pub fn new(id: impl Into<String>, value: Vec<u8>, info: &ExpirationInfo) -> Self {
        let mut entry = Self {
            id: id.into(),
            value,
            absolute_expiration: None,
            expires_at_time: T::from_instant(info.expires),
            sliding_expiration_in_seconds: None,
        };
        entry.apply_expiration(info);
        entry
    }

    // == Apply Expiration ==
    /// Overwrites all three expiration fields.
    pub fn apply_expiration(&mut self, info: &ExpirationInfo) {
        self.absolute_expiration = info.absolute_expiration.map(T::from_instant);
        self.expires_at_time = T::from_instant(info.expires);
        self.sliding_expiration_in_seconds = info.sliding_expiration_in_seconds;
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry whose expiry equals `now` is still live; it expires strictly after.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at_time.to_instant()
    }

    /// The expiration fields as UTC instants.
    pub fn expiration_fields(&self) -> ExpirationFields {
        ExpirationFields {
            absolute_expiration: self.absolute_expiration.map(Timestamp::to_instant),
            expires_at_time: self.expires_at_time.to_instant(),
            sliding_expiration_in_seconds: self.sliding_expiration_in_seconds,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
    }

    fn entry(expires_at: DateTime<Utc>) -> CacheEntry<NaiveDateTime> {
        let info = ExpirationInfo {
            absolute_expiration: None,
            expires: expires_at,
            sliding_expiration_in_seconds: Some(60),
        };
        CacheEntry::new("key", b"value".to_vec(), &info)
    }

    #[test]
    fn test_entry_creation() {
        let entry = entry(now() + Duration::seconds(60));

        assert_eq!(entry.id, "key");
        assert_eq!(entry.value, b"value");
        assert_eq!(entry.expires_at_time.to_instant(), now() + Duration::seconds(60));
        assert_eq!(entry.sliding_expiration_in_seconds, Some(60));
        assert!(entry.absolute_expiration.is_none());
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = entry(now());

        assert!(!entry.is_expired(now()), "Entry should still be live at its expiry");
        assert!(entry.is_expired(now() + Duration::milliseconds(1)));
    }

    #[test]
    fn test_apply_expiration_clears_previous_fields() {
        let mut entry = entry(now());
        entry.apply_expiration(&ExpirationInfo {
            absolute_expiration: Some(now() + Duration::days(1)),
            expires: now() + Duration::days(1),
            sliding_expiration_in_seconds: None,
        });

        assert!(entry.sliding_expiration_in_seconds.is_none());
        assert_eq!(
            entry.expiration_fields().absolute_expiration,
            Some(now() + Duration::days(1))
        );
    }
}
