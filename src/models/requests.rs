//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Deserialize;

use crate::cache::ExpirationOptions;

/// Request body for `PUT /cache/:key`
///
/// Durations are whole seconds; the absolute expiration is an RFC 3339
/// instant with any offset.
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The value to store, as UTF-8 text
    pub value: String,
    #[serde(default)]
    pub absolute_expiration: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub absolute_expiration_relative_to_now: Option<u64>,
    #[serde(default)]
    pub sliding_expiration: Option<u64>,
}

impl SetRequest {
    /// The expiration requested by this body.
    pub fn expiration_options(&self) -> ExpirationOptions {
        ExpirationOptions {
            absolute_expiration: self
                .absolute_expiration
                .map(|at| at.with_timezone(&Utc)),
            absolute_expiration_relative_to_now: self
                .absolute_expiration_relative_to_now
                .map(Duration::from_secs),
            sliding_expiration: self.sliding_expiration.map(Duration::from_secs),
        }
    }
}
