//! Time source for computed variables.
//!
//! `$date`, `$datetime` and `$time` are evaluated on every read.  The store
//! asks a [`Clock`] for the current time and formats it with [`DateFormats`],
//! which keeps the store free of captured closures and lets tests pin time
//! with [`FixedClock`].

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};

/// Anything that can tell the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The real wall clock, in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Build from a local-time `DateTime`.
    pub fn at<Tz: TimeZone>(now: DateTime<Tz>) -> Self {
        Self::new(now.naive_local())
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `strftime`-style formats for the three computed variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormats {
    pub date: String,
    pub datetime: String,
    pub time: String,
}

impl Default for DateFormats {
    fn default() -> Self {
        Self {
            date: "%Y-%m-%d".to_owned(),
            datetime: "%Y-%m-%d %I:%M:%S %p".to_owned(),
            time: "%I:%M:%S %p".to_owned(),
        }
    }
}
