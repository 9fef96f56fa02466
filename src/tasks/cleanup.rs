//! Expired Entry Cleanup
//!
//! Cleanup is driven by cache traffic instead of a timer: every operation asks
//! the scheduler whether a sweep is due, and at most one caller per interval
//! gets a yes and launches the sweep in the background.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

// == Cleanup Scheduler ==
/// Throttles cleanup sweeps to one per interval.
#[derive(Debug)]
pub struct CleanupScheduler {
    interval: TimeDelta,
    /// `None` until the first sweep is launched.
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
}

impl CleanupScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX),
            last_cleanup: Mutex::new(None),
        }
    }

    /// When the last sweep was launched.
    pub fn last_cleanup(&self) -> Option<DateTime<Utc>> {
        *self.last_cleanup.lock()
    }

    /// Overrides the launch time of the last sweep.
    ///
    /// A time far in the future suspends cleanup; `None` makes the next check
    /// launch a sweep.
    pub fn set_last_cleanup(&self, at: Option<DateTime<Utc>>) {
        *self.last_cleanup.lock() = at;
    }

    /// Returns `true` if a sweep is due at `now`, recording `now` as the
    /// launch time before releasing the lock.
    pub fn try_begin(&self, now: DateTime<Utc>) -> bool {
        let mut last_cleanup = self.last_cleanup.lock();

        if let Some(last) = *last_cleanup {
            if now.signed_duration_since(last) <= self.interval {
                return false;
            }
        }

        *last_cleanup = Some(now);
        true
    }
}

// == Sweep Launcher ==
/// Runs `sweep` detached from the caller.
///
/// Uses tokio's blocking pool when called from inside a runtime and a plain
/// thread otherwise. The caller never observes the outcome.
pub fn spawn_sweep<F>(sweep: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(sweep);
        }
        Err(_) => {
            if let Err(err) = thread::Builder::new()
                .name("cache-cleanup".to_string())
                .spawn(sweep)
            {
                warn!("Could not start cleanup thread: {}", err);
            }
        }
    }
    debug!("Cleanup sweep launched");
}
