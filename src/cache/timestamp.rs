//! Timestamp Representations
//!
//! Stores keep their timestamps either zone-less (implicitly UTC) or with an
//! explicit offset. The engine works on `DateTime<Utc>` and converts at the
//! store boundary.

use std::fmt::Debug;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// A store-native timestamp with a lossless UTC conversion pair.
pub trait Timestamp: Copy + Debug + PartialEq + PartialOrd + Send + Sync + 'static {
    fn to_instant(self) -> DateTime<Utc>;

    fn from_instant(instant: DateTime<Utc>) -> Self;
}

/// Zone-less timestamps, interpreted as UTC.
impl Timestamp for NaiveDateTime {
    fn to_instant(self) -> DateTime<Utc> {
        self.and_utc()
    }

    fn from_instant(instant: DateTime<Utc>) -> Self {
        instant.naive_utc()
    }
}

/// Offset-carrying timestamps. Written with a zero offset; any offset read
/// back compares by instant.
impl Timestamp for DateTime<FixedOffset> {
    fn to_instant(self) -> DateTime<Utc> {
        self.with_timezone(&Utc)
    }

    fn from_instant(instant: DateTime<Utc>) -> Self {
        instant.fixed_offset()
    }
}
