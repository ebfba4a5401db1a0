//! Role profiles attached one-to-one to an identity.

use crate::model::identity::{Identity, IdentityId, IdentityValidationError, Role};
use serde::{Deserialize, Serialize};

/// Administrator extension record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProfile {
    /// Owning identity; also the profile key.
    pub identity_id: IdentityId,
    pub reserved_area_access: bool,
    pub note: Option<String>,
}

impl AdminProfile {
    pub fn new(identity_id: IdentityId) -> Self {
        Self {
            identity_id,
            reserved_area_access: true,
            note: None,
        }
    }

    /// Checks the owning identity carries the administrator role.
    pub fn validate_owner(owner: &Identity) -> Result<(), IdentityValidationError> {
        require_role(owner, Role::Admin)
    }
}

/// Participant extension record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    /// Owning identity; also the profile key.
    pub identity_id: IdentityId,
    pub bio: Option<String>,
    /// Program enrollment status, not login capability.
    pub active: bool,
}

impl ParticipantProfile {
    pub fn new(identity_id: IdentityId) -> Self {
        Self {
            identity_id,
            bio: None,
            active: true,
        }
    }

    /// Checks the owning identity carries the participant role.
    pub fn validate_owner(owner: &Identity) -> Result<(), IdentityValidationError> {
        require_role(owner, Role::Participant)
    }
}

fn require_role(owner: &Identity, expected: Role) -> Result<(), IdentityValidationError> {
    if owner.role == expected {
        Ok(())
    } else {
        Err(IdentityValidationError::RoleMismatch {
            expected,
            actual: owner.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AdminProfile, ParticipantProfile};
    use crate::model::identity::{Identity, IdentityValidationError, Role};

    #[test]
    fn profiles_require_matching_role() {
        let admin = Identity::new("admin1", "admin1@example.com", "Laura", "Bianchi", Role::Admin);
        AdminProfile::validate_owner(&admin).expect("admin owner accepted");

        let err = ParticipantProfile::validate_owner(&admin).expect_err("role mismatch");
        assert_eq!(
            err,
            IdentityValidationError::RoleMismatch {
                expected: Role::Participant,
                actual: Role::Admin,
            }
        );
    }

    #[test]
    fn defaults_grant_access_and_enrollment() {
        let id = uuid::Uuid::new_v4();
        assert!(AdminProfile::new(id).reserved_area_access);
        assert!(ParticipantProfile::new(id).active);
    }
}
