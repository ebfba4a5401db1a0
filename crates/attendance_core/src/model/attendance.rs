//! Attendance record domain model and validator.
//!
//! # Responsibility
//! - Define the per-participant, per-day attendance record.
//! - Validate hour bounds, hour precision and record date before any write.
//!
//! # Invariants
//! - `absence_hours <= total_hours`.
//! - Both hour fields are within `0.00..=24.00` with at most 2 decimal places.
//! - `date` is never later than the validation-time calendar date.
//! - At most one record exists per `(participant_id, date)`; enforced by
//!   repositories and a storage-level unique index, not by `validate()`.

use crate::model::identity::IdentityId;
use crate::model::metrics;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for attendance records.
pub type AttendanceId = Uuid;

/// Upper bound for hours recorded on a single day.
pub const MAX_DAILY_HOURS: Decimal = Decimal::from_parts(2400, 0, 0, false, 2);
/// Maximum fractional digits kept for hour values.
pub const HOURS_DECIMAL_PLACES: u32 = 2;

pub const FIELD_TOTAL_HOURS: &str = "totalHours";
pub const FIELD_ABSENCE_HOURS: &str = "absenceHours";
pub const FIELD_DATE: &str = "date";

/// One day of attendance for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    /// Identity id of the owning participant profile.
    pub participant_id: IdentityId,
    pub date: NaiveDate,
    pub total_hours: Decimal,
    pub absence_hours: Decimal,
    pub note: Option<String>,
    /// Identity id of the creating admin profile; cleared if that admin is
    /// deleted.
    pub created_by: Option<IdentityId>,
    /// Epoch milliseconds, stamped on insert.
    pub created_at: i64,
    /// Epoch milliseconds, stamped on every write.
    pub updated_at: i64,
}

/// Caller-supplied fields for create, update and upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceDraft {
    pub participant_id: IdentityId,
    pub date: NaiveDate,
    pub total_hours: Decimal,
    pub absence_hours: Decimal,
    pub note: Option<String>,
}

impl AttendanceDraft {
    /// Draft with zero absence and no note.
    pub fn new(participant_id: IdentityId, date: NaiveDate, total_hours: Decimal) -> Self {
        Self {
            participant_id,
            date,
            total_hours,
            absence_hours: Decimal::ZERO,
            note: None,
        }
    }

    pub fn with_absence(mut self, absence_hours: Decimal) -> Self {
        self.absence_hours = absence_hours;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl AttendanceRecord {
    /// Creates an unsaved record from a draft with a generated stable ID.
    ///
    /// Does not validate; write paths call `validate()`.
    pub fn from_draft(draft: AttendanceDraft, created_by: Option<IdentityId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id: draft.participant_id,
            date: draft.date,
            total_hours: draft.total_hours,
            absence_hours: draft.absence_hours,
            note: normalize_note(draft.note),
            created_by,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Replaces the editable fields with the draft values.
    ///
    /// `id`, `created_by` and `created_at` are preserved.
    pub fn apply_draft(&mut self, draft: AttendanceDraft) {
        self.participant_id = draft.participant_id;
        self.date = draft.date;
        self.total_hours = draft.total_hours;
        self.absence_hours = draft.absence_hours;
        self.note = normalize_note(draft.note);
    }

    /// Validates record-local invariants against the given calendar date.
    ///
    /// # Errors
    /// - Hour fields out of range or too precise.
    /// - `absence_hours > total_hours`.
    /// - `date > today`.
    pub fn validate(&self, today: NaiveDate) -> Result<(), AttendanceValidationError> {
        validate_hours(FIELD_TOTAL_HOURS, self.total_hours)?;
        validate_hours(FIELD_ABSENCE_HOURS, self.absence_hours)?;

        if self.absence_hours > self.total_hours {
            return Err(AttendanceValidationError::AbsenceExceedsTotal {
                total_hours: self.total_hours,
                absence_hours: self.absence_hours,
            });
        }

        if self.date > today {
            return Err(AttendanceValidationError::FutureDate {
                date: self.date,
                today,
            });
        }

        Ok(())
    }

    /// Total minus absence hours.
    pub fn present_hours(&self) -> Decimal {
        metrics::present_hours(self)
    }

    /// Present hours as a percentage of total hours, rounded to 2 places.
    pub fn presence_percentage(&self) -> Decimal {
        metrics::presence_percentage(self)
    }
}

fn validate_hours(field: &'static str, value: Decimal) -> Result<(), AttendanceValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AttendanceValidationError::NegativeHours { field, value });
    }
    if value > MAX_DAILY_HOURS {
        return Err(AttendanceValidationError::ExceedsDailyCap { field, value });
    }
    if value.normalize().scale() > HOURS_DECIMAL_PLACES {
        return Err(AttendanceValidationError::TooPrecise { field, value });
    }
    Ok(())
}

fn normalize_note(note: Option<String>) -> Option<String> {
    note.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Converts an hour value into integer hundredths for storage.
///
/// Values are expected to be validated already; extra precision is rounded.
pub fn hours_to_hundredths(value: Decimal) -> i64 {
    let mut rounded = value.round_dp(HOURS_DECIMAL_PLACES);
    rounded.rescale(HOURS_DECIMAL_PLACES);
    rounded.mantissa() as i64
}

/// Converts stored integer hundredths back into an hour value.
pub fn hours_from_hundredths(value: i64) -> Decimal {
    Decimal::new(value, HOURS_DECIMAL_PLACES)
}

/// Field-level attendance validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceValidationError {
    NegativeHours {
        field: &'static str,
        value: Decimal,
    },
    ExceedsDailyCap {
        field: &'static str,
        value: Decimal,
    },
    TooPrecise {
        field: &'static str,
        value: Decimal,
    },
    AbsenceExceedsTotal {
        total_hours: Decimal,
        absence_hours: Decimal,
    },
    FutureDate {
        date: NaiveDate,
        today: NaiveDate,
    },
}

impl AttendanceValidationError {
    /// Caller-facing name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::NegativeHours { field, .. }
            | Self::ExceedsDailyCap { field, .. }
            | Self::TooPrecise { field, .. } => field,
            Self::AbsenceExceedsTotal { .. } => FIELD_ABSENCE_HOURS,
            Self::FutureDate { .. } => FIELD_DATE,
        }
    }
}

impl Display for AttendanceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeHours { value, .. } => {
                write!(f, "hours cannot be negative (got {value})")
            }
            Self::ExceedsDailyCap { value, .. } => {
                write!(f, "hours cannot exceed {MAX_DAILY_HOURS} per day (got {value})")
            }
            Self::TooPrecise { value, .. } => write!(
                f,
                "hours allow at most {HOURS_DECIMAL_PLACES} decimal places (got {value})"
            ),
            Self::AbsenceExceedsTotal { .. } => {
                write!(f, "absence hours cannot exceed total hours")
            }
            Self::FutureDate { .. } => write!(f, "future attendance cannot be recorded"),
        }
    }
}

impl Error for AttendanceValidationError {}

#[cfg(test)]
mod tests {
    use super::{
        hours_from_hundredths, hours_to_hundredths, AttendanceDraft, AttendanceRecord,
        AttendanceValidationError, FIELD_ABSENCE_HOURS, FIELD_DATE, FIELD_TOTAL_HOURS,
    };
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).expect("valid date")
    }

    fn hours(value: &str) -> Decimal {
        Decimal::from_str(value).expect("valid decimal literal")
    }

    fn record(total: &str, absence: &str) -> AttendanceRecord {
        AttendanceRecord::from_draft(
            AttendanceDraft::new(Uuid::new_v4(), today(), hours(total)).with_absence(hours(absence)),
            None,
        )
    }

    #[test]
    fn accepts_boundary_values() {
        record("24.00", "24.00").validate(today()).expect("cap is inclusive");
        record("0", "0").validate(today()).expect("zero day is valid");
        record("7.50", "0.25").validate(today()).expect("two decimals are valid");
    }

    #[test]
    fn absence_above_total_names_absence_field() {
        let err = record("4", "5").validate(today()).expect_err("absence > total");
        assert!(matches!(err, AttendanceValidationError::AbsenceExceedsTotal { .. }));
        assert_eq!(err.field(), FIELD_ABSENCE_HOURS);
        assert_eq!(err.to_string(), "absence hours cannot exceed total hours");
    }

    #[test]
    fn future_date_is_rejected() {
        let mut tomorrow = record("8", "0");
        tomorrow.date = today().succ_opt().expect("next day");
        let err = tomorrow.validate(today()).expect_err("future date");
        assert_eq!(err.field(), FIELD_DATE);
        assert_eq!(err.to_string(), "future attendance cannot be recorded");
    }

    #[test]
    fn rejects_negative_over_cap_and_over_precise_hours() {
        let err = record("-1", "0").validate(today()).unwrap_err();
        assert!(matches!(err, AttendanceValidationError::NegativeHours { .. }));
        assert_eq!(err.field(), FIELD_TOTAL_HOURS);

        let err = record("24.01", "0").validate(today()).unwrap_err();
        assert!(matches!(err, AttendanceValidationError::ExceedsDailyCap { .. }));

        let err = record("8", "0.125").validate(today()).unwrap_err();
        assert!(matches!(err, AttendanceValidationError::TooPrecise { .. }));
        assert_eq!(err.field(), FIELD_ABSENCE_HOURS);
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        record("8.000", "1.5000").validate(today()).expect("normalized scale is 1");
    }

    #[test]
    fn hundredths_conversion_is_exact() {
        assert_eq!(hours_to_hundredths(hours("7.5")), 750);
        assert_eq!(hours_to_hundredths(hours("0.05")), 5);
        assert_eq!(hours_from_hundredths(1225), hours("12.25"));
    }

    #[test]
    fn blank_note_is_dropped() {
        let draft = AttendanceDraft::new(Uuid::new_v4(), today(), hours("8")).with_note("   ");
        assert_eq!(AttendanceRecord::from_draft(draft, None).note, None);
    }
}
