//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the expiration rules over arbitrary timings and
//! operation sequences.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};

use crate::cache::{
    refreshed_expiration, resolve_expiration, ContextCache, ExpirationFields, ExpirationOptions,
    ManualClock, MemoryStore, DEFAULT_SLIDING_EXPIRATION,
};
use crate::config::CacheOptions;
use crate::error::CacheError;

type AwareCache = ContextCache<MemoryStore<DateTime<FixedOffset>>>;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap()
}

fn cache() -> (AwareCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let cache = ContextCache::with_clock(MemoryStore::new(), CacheOptions::default(), clock.clone());
    cache.set_last_cleanup(Some(DateTime::<Utc>::MAX_UTC));
    (cache, clock)
}

// == Strategies ==
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,8}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Vec<u8> },
    Get { key: String },
    Remove { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), prop::collection::vec(any::<u8>(), 0..32))
            .prop_map(|(key, value)| CacheOp::Set { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // A refreshed expiry never passes the ceiling and never falls behind the
    // read time while the ceiling is still ahead.
    #[test]
    fn prop_refresh_stays_within_ceiling(
        ceiling_secs in 1i64..1_000_000,
        sliding_secs in 0i64..1_000_000,
        elapsed_fraction in 0.0f64..1.0,
    ) {
        let ceiling = start() + TimeDelta::seconds(ceiling_secs);
        let now = start() + TimeDelta::seconds((ceiling_secs as f64 * elapsed_fraction) as i64);
        let fields = ExpirationFields {
            absolute_expiration: Some(ceiling),
            expires_at_time: start() + TimeDelta::seconds(sliding_secs.min(ceiling_secs)),
            sliding_expiration_in_seconds: Some(sliding_secs),
        };

        let refreshed = refreshed_expiration(&fields, now);
        prop_assert!(refreshed <= ceiling);
        prop_assert!(refreshed >= now);
    }

    // Refreshing twice at the same instant lands on the same expiry.
    #[test]
    fn prop_refresh_is_idempotent(
        sliding_secs in 0i64..100_000,
        ceiling_secs in prop::option::of(1i64..100_000),
        elapsed in 0i64..100_000,
    ) {
        let now = start() + TimeDelta::seconds(elapsed);
        let mut fields = ExpirationFields {
            absolute_expiration: ceiling_secs.map(|s| start() + TimeDelta::seconds(s)),
            expires_at_time: start(),
            sliding_expiration_in_seconds: Some(sliding_secs),
        };

        fields.expires_at_time = refreshed_expiration(&fields, now);
        prop_assert_eq!(refreshed_expiration(&fields, now), fields.expires_at_time);
    }

    // Any literal absolute expiration at or before now is rejected.
    #[test]
    fn prop_past_absolute_rejected(offset_secs in 0i64..10_000_000) {
        let options = ExpirationOptions::new()
            .with_absolute_expiration(start() - TimeDelta::seconds(offset_secs));
        let result = resolve_expiration(&options, start(), DEFAULT_SLIDING_EXPIRATION);
        prop_assert!(matches!(result, Err(CacheError::InvalidExpiration(_))));
    }

    // The stored window is the requested one truncated to whole seconds.
    #[test]
    fn prop_sliding_seconds_truncated(millis in 0u64..10_000_000) {
        let options = ExpirationOptions::new()
            .with_sliding_expiration(Duration::from_millis(millis));
        let info = resolve_expiration(&options, start(), DEFAULT_SLIDING_EXPIRATION).unwrap();

        prop_assert_eq!(info.sliding_expiration_in_seconds, Some((millis / 1000) as i64));
        prop_assert_eq!(info.expires, start() + TimeDelta::milliseconds(millis as i64));
    }

    // A sliding entry read at least once per window stays alive indefinitely.
    #[test]
    fn prop_regular_reads_keep_entry_alive(
        window in 1u64..3_600,
        gaps in prop::collection::vec(0.0f64..=1.0, 1..20),
    ) {
        let (cache, clock) = cache();
        let options = ExpirationOptions::new().with_sliding_expiration(Duration::from_secs(window));
        cache.set("key", b"value", &options).unwrap();

        for gap in gaps {
            clock.advance(TimeDelta::seconds((window as f64 * gap) as i64));
            prop_assert_eq!(cache.get("key").unwrap(), Some(b"value".to_vec()));
        }
    }

    // Once the ceiling passes no amount of reading brings the entry back.
    #[test]
    fn prop_ceiling_is_final(
        ceiling in 1u64..3_600,
        window in 1u64..3_600,
        overshoot in 1i64..3_600,
    ) {
        let (cache, clock) = cache();
        let options = ExpirationOptions::new()
            .with_absolute_expiration_relative_to_now(Duration::from_secs(ceiling))
            .with_sliding_expiration(Duration::from_secs(window));
        cache.set("key", b"value", &options).unwrap();

        let mut elapsed = 0u64;
        while elapsed + window <= ceiling {
            elapsed += window;
            clock.advance(TimeDelta::seconds(window as i64));
            prop_assert!(cache.get("key").unwrap().is_some());
        }

        clock.set(start() + TimeDelta::seconds(ceiling as i64 + overshoot));
        prop_assert_eq!(cache.get("key").unwrap(), None);
    }

    // Without time passing, hits, misses and removals match a plain map.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (cache, _) = cache();
        let mut model: HashMap<String, Vec<u8>> = HashMap::new();
        let (mut hits, mut misses, mut sets, mut removals) = (0u64, 0u64, 0u64, 0u64);

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    cache.set(&key, &value, &ExpirationOptions::new()).unwrap();
                    model.insert(key, value);
                    sets += 1;
                }
                CacheOp::Get { key } => {
                    let got = cache.get(&key).unwrap();
                    prop_assert_eq!(got.as_ref(), model.get(&key));
                    if got.is_some() { hits += 1 } else { misses += 1 }
                }
                CacheOp::Remove { key } => {
                    cache.remove(&key).unwrap();
                    if model.remove(&key).is_some() {
                        removals += 1;
                    }
                }
            }
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);
        prop_assert_eq!(stats.sets, sets);
        prop_assert_eq!(stats.removals, removals);
        prop_assert_eq!(cache.store().len(), model.len());
    }

    // A sweep removes exactly the entries whose expiry is strictly past.
    #[test]
    fn prop_sweep_removes_strictly_expired(
        lifetimes in prop::collection::vec(1u64..1_000, 1..30),
        elapsed in 0u64..1_000,
    ) {
        let (cache, clock) = cache();
        for (i, lifetime) in lifetimes.iter().enumerate() {
            let options = ExpirationOptions::new()
                .with_absolute_expiration_relative_to_now(Duration::from_secs(*lifetime));
            cache.set(&i.to_string(), b"v", &options).unwrap();
        }

        clock.advance(TimeDelta::seconds(elapsed as i64));
        let expected = lifetimes.iter().filter(|l| **l < elapsed).count();
        prop_assert_eq!(cache.remove_expired_entries().unwrap(), expected);
        prop_assert_eq!(cache.store().len(), lifetimes.len() - expected);
    }
}
