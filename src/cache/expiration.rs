//! Expiration Calculator
//!
//! Resolves the expiration a caller asks for into the three stored fields, and
//! recomputes the expiry of an existing entry when it is read.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{CacheError, Result};

/// Microseconds from the Unix epoch to 9999-12-31T23:59:59.999999Z.
const LATEST_EXPIRATION_MICROS: i64 = 253_402_300_799_999_999;

/// The latest instant an entry may expire at.
///
/// Stores keep four-digit years, so every expiry they hold orders correctly
/// as text.
pub fn latest_expiration() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::microseconds(LATEST_EXPIRATION_MICROS)
}

// == Expiration Options ==
/// The expiration requested for a single write.
///
/// All fields are optional and compose: a relative expiration overrides a
/// literal absolute one, and a sliding expiration decides the initial expiry
/// while the absolute one stays as the ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpirationOptions {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub absolute_expiration_relative_to_now: Option<Duration>,
    pub sliding_expiration: Option<Duration>,
}

impl ExpirationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    pub fn with_absolute_expiration_relative_to_now(mut self, after: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(after);
        self
    }

    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    fn is_empty(&self) -> bool {
        self.absolute_expiration.is_none()
            && self.absolute_expiration_relative_to_now.is_none()
            && self.sliding_expiration.is_none()
    }
}

// == Expiration Info ==
/// Resolved expiration, ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationInfo {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub expires: DateTime<Utc>,
    pub sliding_expiration_in_seconds: Option<i64>,
}

/// The expiration fields of a stored entry, as UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationFields {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub expires_at_time: DateTime<Utc>,
    pub sliding_expiration_in_seconds: Option<i64>,
}

// == Resolve ==
/// Resolves `options` against `now`.
///
/// When no expiration at all is requested, `default_sliding` becomes the
/// sliding window. Fails with [`CacheError::InvalidExpiration`] when a literal
/// absolute expiration is not strictly after `now`.
pub fn resolve_expiration(
    options: &ExpirationOptions,
    now: DateTime<Utc>,
    default_sliding: Duration,
) -> Result<ExpirationInfo> {
    let resolved = if options.is_empty() {
        ExpirationOptions::new().with_sliding_expiration(default_sliding)
    } else {
        options.clone()
    };

    let mut absolute_expiration = resolved.absolute_expiration;

    if let Some(relative) = resolved.absolute_expiration_relative_to_now {
        absolute_expiration = Some(add(now, relative)?);
    } else if let Some(absolute) = absolute_expiration {
        if absolute <= now {
            return Err(CacheError::InvalidExpiration(
                "The absolute expiration value must be in the future.".to_string(),
            ));
        }
        if absolute > latest_expiration() {
            return Err(CacheError::InvalidExpiration(format!(
                "The absolute expiration value must not be later than {}.",
                latest_expiration()
            )));
        }
    }

    let expires = match resolved.sliding_expiration {
        // The ceiling caps the first window as it caps every refreshed one.
        Some(sliding) => match absolute_expiration {
            Some(ceiling) => add(now, sliding).map_or(ceiling, |expires| expires.min(ceiling)),
            None => add(now, sliding)?,
        },
        // Non-empty options without sliding always carry an absolute value here.
        None => absolute_expiration.ok_or_else(|| {
            CacheError::Internal("absolute expiration missing without sliding".to_string())
        })?,
    };

    let sliding_expiration_in_seconds = match resolved.sliding_expiration {
        Some(sliding) => Some(seconds(sliding)?),
        None => None,
    };

    Ok(ExpirationInfo {
        absolute_expiration,
        expires,
        sliding_expiration_in_seconds,
    })
}

// == Refresh ==
/// Computes the expiry an entry should have after being read at `now`.
///
/// Entries without a sliding window keep their expiry. Entries whose ceiling is
/// within one window of `now` expire exactly at the ceiling.
pub fn refreshed_expiration(fields: &ExpirationFields, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(sliding_seconds) = fields.sliding_expiration_in_seconds else {
        return fields.expires_at_time;
    };

    let sliding = TimeDelta::try_seconds(sliding_seconds).unwrap_or(TimeDelta::MAX);

    if let Some(ceiling) = fields.absolute_expiration {
        if ceiling - now <= sliding {
            return ceiling;
        }
    }

    // Only reachable without a ceiling, or with one beyond the window.
    now.checked_add_signed(sliding)
        .map_or(latest_expiration(), |candidate| {
            candidate.min(latest_expiration())
        })
}

fn add(now: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .filter(|at| *at <= latest_expiration())
        .ok_or_else(|| {
            CacheError::InvalidExpiration(format!(
                "{:?} from {} is out of range",
                duration, now
            ))
        })
}

fn seconds(duration: Duration) -> Result<i64> {
    i64::try_from(duration.as_secs()).map_err(|_| {
        CacheError::InvalidExpiration(format!("{:?} is out of range", duration))
    })
}
