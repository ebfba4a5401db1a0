//! Access policy over caller roles.
//!
//! The caller is a tagged variant over the two roles; every entry point asks
//! the same questions (`authorize`, `scope`, `can_read`, `can_write`) instead
//! of inspecting the role itself.

use crate::model::attendance::AttendanceRecord;
use crate::model::identity::{Identity, IdentityId, Role};
use crate::model::profile::{AdminProfile, ParticipantProfile};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Authenticated caller performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Caller {
    Admin(IdentityId),
    Participant(IdentityId),
}

/// Resource family an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Attendance,
    ParticipantProfile,
    AdminProfile,
    Identity,
    /// Population-wide attendance summary.
    Summary,
}

/// Operation requested on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    List,
    Read,
    Create,
    Update,
    Delete,
}

/// Row visibility applied while building a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every row.
    All,
    /// Only rows whose participant owner is this identity.
    OwnedBy(IdentityId),
    /// No rows at all.
    Nothing,
}

impl Scope {
    /// Whether a row owned by `owner` is visible in this scope.
    pub fn admits(self, owner: Option<IdentityId>) -> bool {
        match self {
            Self::All => true,
            Self::OwnedBy(id) => owner == Some(id),
            Self::Nothing => false,
        }
    }
}

/// Objects that may belong to a participant.
pub trait ParticipantOwned {
    /// Identity id of the owning participant, if any.
    fn participant_owner(&self) -> Option<IdentityId>;
}

impl ParticipantOwned for AttendanceRecord {
    fn participant_owner(&self) -> Option<IdentityId> {
        Some(self.participant_id)
    }
}

impl ParticipantOwned for ParticipantProfile {
    fn participant_owner(&self) -> Option<IdentityId> {
        Some(self.identity_id)
    }
}

impl ParticipantOwned for AdminProfile {
    fn participant_owner(&self) -> Option<IdentityId> {
        None
    }
}

impl Caller {
    /// Builds a caller from a resolved identity.
    pub fn from_identity(identity: &Identity) -> Self {
        match identity.role {
            Role::Admin => Self::Admin(identity.id),
            Role::Participant => Self::Participant(identity.id),
        }
    }

    pub fn identity_id(self) -> IdentityId {
        match self {
            Self::Admin(id) | Self::Participant(id) => id,
        }
    }

    pub fn role(self) -> Role {
        match self {
            Self::Admin(_) => Role::Admin,
            Self::Participant(_) => Role::Participant,
        }
    }

    /// Role-level check for an operation on a resource family.
    ///
    /// # Errors
    /// - `AccessError::Forbidden` when the role may never perform it.
    pub fn authorize(self, resource: Resource, operation: Operation) -> Result<(), AccessError> {
        let allowed = match self {
            Self::Admin(_) => true,
            Self::Participant(_) => matches!(
                (resource, operation),
                (
                    Resource::Attendance | Resource::ParticipantProfile | Resource::AdminProfile,
                    Operation::List | Operation::Read
                )
            ),
        };

        if allowed {
            return Ok(());
        }

        warn!(
            "event=access_denied module=policy status=error role={} resource={:?} operation={:?}",
            self.role(),
            resource,
            operation
        );
        Err(AccessError::Forbidden {
            role: self.role(),
            resource,
            operation,
        })
    }

    /// Rows of `resource` this caller may see.
    pub fn scope(self, resource: Resource) -> Scope {
        match self {
            Self::Admin(_) => Scope::All,
            Self::Participant(id) => match resource {
                Resource::Attendance | Resource::ParticipantProfile => Scope::OwnedBy(id),
                Resource::AdminProfile | Resource::Identity | Resource::Summary => Scope::Nothing,
            },
        }
    }

    /// Owner-or-admin check for reading one object.
    pub fn can_read(self, object: &impl ParticipantOwned) -> bool {
        match self {
            Self::Admin(_) => true,
            Self::Participant(id) => object.participant_owner() == Some(id),
        }
    }

    /// Write check for one object; participants never write.
    pub fn can_write(self, _object: &impl ParticipantOwned) -> bool {
        matches!(self, Self::Admin(_))
    }
}

/// Authorization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    Forbidden {
        role: Role,
        resource: Resource,
        operation: Operation,
    },
    /// The identity exists but may not log in.
    Inactive(IdentityId),
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden {
                role,
                resource,
                operation,
            } => write!(
                f,
                "role {role} may not perform {operation:?} on {resource:?}"
            ),
            Self::Inactive(id) => write!(f, "identity {id} is not active"),
        }
    }
}

impl Error for AccessError {}
