//! Attendance use-case service.
//!
//! # Responsibility
//! - Provide authorized create/upsert/update/delete/read/list entry points.
//! - Stamp new records with the creating admin profile.
//! - Shape records into views carrying present hours and presence percentage.
//! - Compute the population summary for administrators.
//!
//! # Invariants
//! - Only administrators mutate records; participants only read their own.
//! - Reads outside the caller's scope report `NotFound`.
//! - Summary figures are hour-weighted (sum, then divide).

use crate::model::attendance::{AttendanceDraft, AttendanceId, AttendanceRecord};
use crate::model::identity::IdentityId;
use crate::model::metrics::AttendanceTotals;
use crate::policy::access::{Caller, Operation, Resource, Scope};
use crate::repo::attendance_repo::{AttendanceListQuery, AttendanceRepository};
use crate::repo::profile_repo::ProfileRepository;
use crate::repo::Entity;
use crate::service::{ServiceError, ServiceResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

/// Caller-facing record projection with derived metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceView {
    pub id: AttendanceId,
    pub participant_id: IdentityId,
    pub participant_first_name: String,
    pub participant_last_name: String,
    pub date: NaiveDate,
    pub total_hours: Decimal,
    pub absence_hours: Decimal,
    pub present_hours: Decimal,
    pub presence_percentage: Decimal,
    pub note: Option<String>,
    pub created_by: Option<IdentityId>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Population-wide totals, visible to administrators only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total_records: u64,
    pub total_hours: Decimal,
    pub total_absence_hours: Decimal,
    pub present_hours: Decimal,
    pub average_presence_percentage: Decimal,
}

impl From<AttendanceTotals> for AttendanceSummary {
    fn from(totals: AttendanceTotals) -> Self {
        Self {
            total_records: totals.record_count,
            total_hours: totals.total_hours,
            total_absence_hours: totals.absence_hours,
            present_hours: totals.present_hours(),
            average_presence_percentage: totals.presence_percentage(),
        }
    }
}

/// Optional list filters; scope is derived from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub participant_id: Option<IdentityId>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Result of an upsert-by-key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub record: AttendanceView,
    /// `true` when a new record was inserted.
    pub created: bool,
}

/// Attendance service facade over repository implementations.
pub struct AttendanceService<A: AttendanceRepository, P: ProfileRepository> {
    records: A,
    profiles: P,
}

impl<A: AttendanceRepository, P: ProfileRepository> AttendanceService<A, P> {
    pub fn new(records: A, profiles: P) -> Self {
        Self { records, profiles }
    }

    /// Creates one record; administrators only.
    ///
    /// # Errors
    /// - `Authorization` for participants.
    /// - `Validation` / `Uniqueness` / `NotFound` from the write path.
    pub fn create_record(
        &self,
        caller: Caller,
        draft: AttendanceDraft,
    ) -> ServiceResult<AttendanceView> {
        caller.authorize(Resource::Attendance, Operation::Create)?;

        let created_by = self.creating_admin(caller)?;
        let record = AttendanceRecord::from_draft(draft, created_by);
        let id = self.records.create_record(&record)?;
        self.read_back(id, "created record not found in read-back")
    }

    /// Creates or updates the record keyed by `(participant, date)`.
    pub fn upsert_record(
        &self,
        caller: Caller,
        draft: AttendanceDraft,
    ) -> ServiceResult<UpsertOutcome> {
        caller.authorize(Resource::Attendance, Operation::Create)?;
        caller.authorize(Resource::Attendance, Operation::Update)?;

        match self.records.find_by_key(draft.participant_id, draft.date)? {
            Some(mut existing) => {
                existing.apply_draft(draft);
                self.records.update_record(&existing)?;
                Ok(UpsertOutcome {
                    record: self.read_back(existing.id, "upserted record not found in read-back")?,
                    created: false,
                })
            }
            None => {
                let created_by = self.creating_admin(caller)?;
                let record = AttendanceRecord::from_draft(draft, created_by);
                let id = self.records.create_record(&record)?;
                Ok(UpsertOutcome {
                    record: self.read_back(id, "upserted record not found in read-back")?,
                    created: true,
                })
            }
        }
    }

    /// Replaces the editable fields of an existing record.
    pub fn update_record(
        &self,
        caller: Caller,
        id: AttendanceId,
        draft: AttendanceDraft,
    ) -> ServiceResult<AttendanceView> {
        caller.authorize(Resource::Attendance, Operation::Update)?;

        let mut record = self.visible_record(caller, id)?;
        record.apply_draft(draft);
        self.records.update_record(&record)?;
        self.read_back(id, "updated record not found in read-back")
    }

    /// Deletes one record; administrators only.
    pub fn delete_record(&self, caller: Caller, id: AttendanceId) -> ServiceResult<()> {
        caller.authorize(Resource::Attendance, Operation::Delete)?;

        let record = self.visible_record(caller, id)?;
        self.records.delete_record(record.id)?;
        Ok(())
    }

    /// Gets one record visible to the caller.
    pub fn get_record(&self, caller: Caller, id: AttendanceId) -> ServiceResult<AttendanceView> {
        caller.authorize(Resource::Attendance, Operation::Read)?;

        let record = self.visible_record(caller, id)?;
        self.to_view(record, &mut HashMap::new())
    }

    /// Lists records visible to the caller, newest date first.
    pub fn list_records(
        &self,
        caller: Caller,
        filter: &RecordFilter,
    ) -> ServiceResult<Vec<AttendanceView>> {
        caller.authorize(Resource::Attendance, Operation::List)?;

        let query = AttendanceListQuery {
            scope: caller.scope(Resource::Attendance),
            participant_id: filter.participant_id,
            date_from: filter.date_from,
            date_to: filter.date_to,
            limit: filter.limit,
            offset: filter.offset,
        };
        let mut names = HashMap::new();
        self.records
            .list_records(&query)?
            .into_iter()
            .map(|record| self.to_view(record, &mut names))
            .collect()
    }

    /// Population summary over every record; administrators only.
    pub fn summary(&self, caller: Caller) -> ServiceResult<AttendanceSummary> {
        caller.authorize(Resource::Summary, Operation::Read)?;

        let totals = self.records.totals(caller.scope(Resource::Summary), None)?;
        Ok(AttendanceSummary::from(totals))
    }

    fn creating_admin(&self, caller: Caller) -> ServiceResult<Option<IdentityId>> {
        Ok(self
            .profiles
            .get_admin(caller.identity_id(), Scope::All)?
            .map(|entry| entry.profile.identity_id))
    }

    fn visible_record(&self, caller: Caller, id: AttendanceId) -> ServiceResult<AttendanceRecord> {
        self.records
            .get_record(id, caller.scope(Resource::Attendance))?
            .filter(|record| caller.can_read(record))
            .ok_or_else(|| ServiceError::not_found(Entity::Attendance, Some(id)))
    }

    fn read_back(&self, id: AttendanceId, details: &'static str) -> ServiceResult<AttendanceView> {
        let record = self
            .records
            .get_record(id, Scope::All)?
            .ok_or(ServiceError::InconsistentState(details))?;
        self.to_view(record, &mut HashMap::new())
    }

    fn to_view(
        &self,
        record: AttendanceRecord,
        names: &mut HashMap<IdentityId, (String, String)>,
    ) -> ServiceResult<AttendanceView> {
        let (first_name, last_name) = match names.get(&record.participant_id) {
            Some(cached) => cached.clone(),
            None => {
                let entry = self
                    .profiles
                    .get_participant(record.participant_id, Scope::All)?
                    .ok_or(ServiceError::InconsistentState(
                        "attendance record without participant profile",
                    ))?;
                let name = (entry.identity.first_name, entry.identity.last_name);
                names.insert(record.participant_id, name.clone());
                name
            }
        };

        Ok(AttendanceView {
            id: record.id,
            participant_id: record.participant_id,
            participant_first_name: first_name,
            participant_last_name: last_name,
            date: record.date,
            total_hours: record.total_hours,
            absence_hours: record.absence_hours,
            present_hours: record.present_hours(),
            presence_percentage: record.presence_percentage(),
            note: record.note,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
