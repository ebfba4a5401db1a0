//! Derived attendance metrics.
//!
//! Pure functions over stored hour values. Percentages are computed with
//! decimal arithmetic and rounded to 2 places (half-to-even).
//!
//! # Invariants
//! - Aggregates are hour-weighted: hours are summed first, then divided.
//!   They are never an average of per-record percentages.
//! - A zero hour denominator yields `0`, never an error.

use crate::model::attendance::AttendanceRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PERCENTAGE_DECIMAL_PLACES: u32 = 2;

/// `total_hours - absence_hours` for one record.
pub fn present_hours(record: &AttendanceRecord) -> Decimal {
    record.total_hours - record.absence_hours
}

/// Presence percentage for one record; `0` when the day has no hours.
pub fn presence_percentage(record: &AttendanceRecord) -> Decimal {
    percentage_of(present_hours(record), record.total_hours)
}

/// Hour-weighted presence percentage over a set of records.
///
/// Returns `0` for an empty set or when the summed total is zero.
pub fn aggregate_presence_percentage<'a, I>(records: I) -> Decimal
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    AttendanceTotals::from_records(records).presence_percentage()
}

/// `round(present / total * 100, 2)`, or `0` when `total` is zero.
pub fn percentage_of(present: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (present / total * Decimal::ONE_HUNDRED).round_dp(PERCENTAGE_DECIMAL_PLACES)
}

/// Summed hours over a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTotals {
    pub record_count: u64,
    pub total_hours: Decimal,
    pub absence_hours: Decimal,
}

impl AttendanceTotals {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a AttendanceRecord>,
    {
        records
            .into_iter()
            .fold(Self::default(), |mut totals, record| {
                totals.record_count += 1;
                totals.total_hours += record.total_hours;
                totals.absence_hours += record.absence_hours;
                totals
            })
    }

    pub fn present_hours(&self) -> Decimal {
        self.total_hours - self.absence_hours
    }

    pub fn presence_percentage(&self) -> Decimal {
        if self.record_count == 0 {
            return Decimal::ZERO;
        }
        percentage_of(self.present_hours(), self.total_hours)
    }
}
