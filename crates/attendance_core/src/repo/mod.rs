//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths validate the model before any SQL mutation, so the same
//!   rules hold for callers that bypass the service layer.
//! - Storage-level uniqueness violations surface as `RepoError::Duplicate`,
//!   even when they slip past the pre-check.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::attendance::AttendanceValidationError;
use crate::model::identity::{IdentityId, IdentityValidationError};
use crate::policy::access::Scope;
use chrono::NaiveDate;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod attendance_repo;
pub mod identity_repo;
pub mod profile_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Natural key that already exists in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateKey {
    Username(String),
    Profile(IdentityId),
    Attendance {
        participant_id: IdentityId,
        date: NaiveDate,
    },
}

impl Display for DuplicateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username(username) => write!(f, "username `{username}` is already taken"),
            Self::Profile(id) => write!(f, "identity {id} already has a profile"),
            Self::Attendance {
                participant_id,
                date,
            } => write!(
                f,
                "attendance for participant {participant_id} on {date} already exists"
            ),
        }
    }
}

/// Entity kinds used in not-found reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Identity,
    AdminProfile,
    ParticipantProfile,
    Attendance,
}

impl Entity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::AdminProfile => "admin profile",
            Self::ParticipantProfile => "participant profile",
            Self::Attendance => "attendance record",
        }
    }
}

/// Repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(AttendanceValidationError),
    IdentityValidation(IdentityValidationError),
    Duplicate(DuplicateKey),
    NotFound { entity: Entity, id: Uuid },
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::IdentityValidation(err) => write!(f, "{err}"),
            Self::Duplicate(key) => write!(f, "{key}"),
            Self::NotFound { entity, id } => write!(f, "{} not found: {id}", entity.as_str()),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::IdentityValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Duplicate(_) | Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<AttendanceValidationError> for RepoError {
    fn from(value: AttendanceValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<IdentityValidationError> for RepoError {
    fn from(value: IdentityValidationError) -> Self {
        Self::IdentityValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Maps a unique-constraint failure to `Duplicate(key)`, other errors to `Db`.
fn map_unique_violation(err: rusqlite::Error, key: impl FnOnce() -> DuplicateKey) -> RepoError {
    let db_error = DbError::Sqlite(err);
    if db_error.is_unique_violation() {
        RepoError::Duplicate(key())
    } else {
        RepoError::Db(db_error)
    }
}

/// Appends a scope filter on `owner_column` to a `WHERE` clause under
/// construction.
fn push_scope(sql: &mut String, bind_values: &mut Vec<Value>, scope: Scope, owner_column: &str) {
    match scope {
        Scope::All => {}
        Scope::OwnedBy(id) => {
            sql.push_str(&format!(" AND {owner_column} = ?"));
            bind_values.push(Value::Text(id.to_string()));
        }
        Scope::Nothing => sql.push_str(" AND 0 = 1"),
    }
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
