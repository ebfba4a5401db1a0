//! Participant profile use-case service.
//!
//! # Responsibility
//! - List and fetch participant profiles within the caller's scope.
//! - Report per-participant attendance statistics.
//! - Let administrators edit bio and enrollment status.

use crate::model::identity::{Identity, IdentityId};
use crate::model::metrics::AttendanceTotals;
use crate::policy::access::{Caller, Operation, Resource, Scope};
use crate::repo::attendance_repo::AttendanceRepository;
use crate::repo::profile_repo::{ParticipantEntry, ProfileRepository};
use crate::repo::Entity;
use crate::service::{ServiceError, ServiceResult};
use rust_decimal::Decimal;
use serde::Serialize;

/// Caller-facing participant projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub identity: Identity,
    pub bio: Option<String>,
    pub active: bool,
    /// Hour-weighted over every record of the participant.
    pub presence_percentage: Decimal,
}

/// Attendance statistics for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantStats {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub total_days: u64,
    pub total_hours: Decimal,
    pub total_absence_hours: Decimal,
    pub present_hours: Decimal,
    pub presence_percentage: Decimal,
}

/// Partial update for a participant profile. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantUpdate {
    /// `Some(None)` clears the bio.
    pub bio: Option<Option<String>>,
    pub active: Option<bool>,
}

/// Participant service facade over repository implementations.
pub struct ParticipantService<P: ProfileRepository, A: AttendanceRepository> {
    profiles: P,
    records: A,
}

impl<P: ProfileRepository, A: AttendanceRepository> ParticipantService<P, A> {
    pub fn new(profiles: P, records: A) -> Self {
        Self { profiles, records }
    }

    /// Lists participants visible to the caller.
    pub fn list_participants(&self, caller: Caller) -> ServiceResult<Vec<ParticipantView>> {
        caller.authorize(Resource::ParticipantProfile, Operation::List)?;

        self.profiles
            .list_participants(caller.scope(Resource::ParticipantProfile))?
            .into_iter()
            .map(|entry| self.to_view(entry))
            .collect()
    }

    /// Gets one participant visible to the caller.
    pub fn get_participant(&self, caller: Caller, id: IdentityId) -> ServiceResult<ParticipantView> {
        caller.authorize(Resource::ParticipantProfile, Operation::Read)?;

        let entry = self.visible_entry(caller, id)?;
        self.to_view(entry)
    }

    /// The caller's own participant profile.
    pub fn me(&self, caller: Caller) -> ServiceResult<ParticipantView> {
        caller.authorize(Resource::ParticipantProfile, Operation::Read)?;
        let entry = self
            .profiles
            .get_participant(caller.identity_id(), caller.scope(Resource::ParticipantProfile))?
            .ok_or_else(|| ServiceError::not_found(Entity::ParticipantProfile, None))?;
        self.to_view(entry)
    }

    /// Personal data plus attendance totals for one participant.
    pub fn stats(&self, caller: Caller, id: IdentityId) -> ServiceResult<ParticipantStats> {
        caller.authorize(Resource::ParticipantProfile, Operation::Read)?;

        let entry = self.visible_entry(caller, id)?;
        let totals = self.totals_for(id)?;
        Ok(ParticipantStats {
            first_name: entry.identity.first_name,
            last_name: entry.identity.last_name,
            email: entry.identity.email,
            total_days: totals.record_count,
            total_hours: totals.total_hours,
            total_absence_hours: totals.absence_hours,
            present_hours: totals.present_hours(),
            presence_percentage: totals.presence_percentage(),
        })
    }

    /// Edits bio and enrollment status; administrators only.
    pub fn update_participant(
        &self,
        caller: Caller,
        id: IdentityId,
        update: ParticipantUpdate,
    ) -> ServiceResult<ParticipantView> {
        caller.authorize(Resource::ParticipantProfile, Operation::Update)?;

        let mut entry = self.visible_entry(caller, id)?;
        if !caller.can_write(&entry.profile) {
            return Err(ServiceError::not_found(Entity::ParticipantProfile, Some(id)));
        }
        if let Some(bio) = update.bio {
            entry.profile.bio = bio
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
        }
        if let Some(active) = update.active {
            entry.profile.active = active;
        }
        self.profiles.update_participant_profile(&entry.profile)?;

        let refreshed = self
            .profiles
            .get_participant(id, Scope::All)?
            .ok_or(ServiceError::InconsistentState(
                "updated participant not found in read-back",
            ))?;
        self.to_view(refreshed)
    }

    fn visible_entry(&self, caller: Caller, id: IdentityId) -> ServiceResult<ParticipantEntry> {
        self.profiles
            .get_participant(id, caller.scope(Resource::ParticipantProfile))?
            .filter(|entry| caller.can_read(&entry.profile))
            .ok_or_else(|| ServiceError::not_found(Entity::ParticipantProfile, Some(id)))
    }

    fn totals_for(&self, id: IdentityId) -> ServiceResult<AttendanceTotals> {
        Ok(self.records.totals(Scope::All, Some(id))?)
    }

    fn to_view(&self, entry: ParticipantEntry) -> ServiceResult<ParticipantView> {
        let totals = self.totals_for(entry.profile.identity_id)?;
        Ok(ParticipantView {
            identity: entry.identity,
            bio: entry.profile.bio,
            active: entry.profile.active,
            presence_percentage: totals.presence_percentage(),
        })
    }
}
