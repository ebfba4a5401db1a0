//! Time source used by validation and timestamping.

use chrono::{Local, NaiveDate, Utc};

/// Supplies the current calendar date and wall-clock timestamp.
pub trait Clock {
    /// Current local calendar date.
    fn today(&self) -> NaiveDate;
    /// Current time in epoch milliseconds.
    fn now_epoch_ms(&self) -> i64;
}

/// Clock backed by the host system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now_epoch_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock pinned to one date, for deterministic callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock {
    pub today: NaiveDate,
    pub now_epoch_ms: i64,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        let now_epoch_ms = today
            .and_hms_opt(12, 0, 0)
            .map_or(0, |moment| moment.and_utc().timestamp_millis());
        Self {
            today,
            now_epoch_ms,
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn now_epoch_ms(&self) -> i64 {
        self.now_epoch_ms
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn today(&self) -> NaiveDate {
        (**self).today()
    }

    fn now_epoch_ms(&self) -> i64 {
        (**self).now_epoch_ms()
    }
}
