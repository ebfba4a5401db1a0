//! Core use-case services.
//!
//! # Responsibility
//! - Authorize every call through the access policy before touching storage.
//! - Orchestrate repository calls into use-case level APIs.
//! - Shape read results into caller-facing views with derived metrics.
//!
//! # Invariants
//! - Service APIs never bypass repository validation/persistence contracts.
//! - Rows outside the caller's scope are reported as `NotFound`.

use crate::policy::access::AccessError;
use crate::repo::{DuplicateKey, Entity, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod admin_service;
pub mod attendance_service;
pub mod identity_service;
pub mod participant_service;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Caller-facing error taxonomy for use-case APIs.
#[derive(Debug)]
pub enum ServiceError {
    /// Field-level input problem; the caller can correct and retry.
    Validation {
        field: &'static str,
        message: String,
    },
    /// Natural key already taken; the caller may update instead.
    Uniqueness(DuplicateKey),
    /// Target is absent or outside the caller's scope.
    NotFound { entity: Entity, id: Option<Uuid> },
    /// Role-level denial for an action.
    Authorization(AccessError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
    /// Storage-layer failure.
    Repo(RepoError),
}

impl ServiceError {
    /// Stable machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Uniqueness(_) => "uniqueness_error",
            Self::NotFound { .. } => "not_found",
            Self::Authorization(_) => "forbidden",
            Self::InconsistentState(_) | Self::Repo(_) => "internal_error",
        }
    }

    pub(crate) fn not_found(entity: Entity, id: Option<Uuid>) -> Self {
        Self::NotFound { entity, id }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation { field, message } => write!(f, "{field}: {message}"),
            Self::Uniqueness(key) => write!(f, "{key}"),
            Self::NotFound {
                entity,
                id: Some(id),
            } => write!(f, "{} not found: {id}", entity.as_str()),
            Self::NotFound { entity, id: None } => write!(f, "{} not found", entity.as_str()),
            Self::Authorization(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Authorization(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation {
                field: err.field(),
                message: err.to_string(),
            },
            RepoError::IdentityValidation(err) => Self::Validation {
                field: err.field(),
                message: err.to_string(),
            },
            RepoError::Duplicate(key) => Self::Uniqueness(key),
            RepoError::NotFound { entity, id } => Self::not_found(entity, Some(id)),
            other => Self::Repo(other),
        }
    }
}

impl From<AccessError> for ServiceError {
    fn from(value: AccessError) -> Self {
        Self::Authorization(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::from(value))
    }
}
