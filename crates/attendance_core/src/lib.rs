//! Core domain logic for attendance tracking.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attendance::{
    AttendanceDraft, AttendanceId, AttendanceRecord, AttendanceValidationError, MAX_DAILY_HOURS,
};
pub use model::clock::{Clock, FixedClock, SystemClock};
pub use model::identity::{Identity, IdentityId, IdentityValidationError, Role};
pub use model::metrics::AttendanceTotals;
pub use model::profile::{AdminProfile, ParticipantProfile};
pub use policy::access::{AccessError, Caller, Scope};
pub use repo::attendance_repo::SqliteAttendanceRepository;
pub use repo::identity_repo::SqliteIdentityRepository;
pub use repo::profile_repo::SqliteProfileRepository;
pub use repo::{RepoError, RepoResult};
pub use service::admin_service::{AdminProfileService, AdminUpdate};
pub use service::attendance_service::{
    AttendanceService, AttendanceSummary, AttendanceView, RecordFilter, UpsertOutcome,
};
pub use service::identity_service::IdentityService;
pub use service::participant_service::{
    ParticipantService, ParticipantStats, ParticipantUpdate, ParticipantView,
};
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
