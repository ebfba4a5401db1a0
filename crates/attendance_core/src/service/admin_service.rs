//! Admin profile use-case service.

use crate::model::identity::IdentityId;
use crate::policy::access::{Caller, Operation, Resource, Scope};
use crate::repo::profile_repo::{AdminEntry, ProfileRepository};
use crate::repo::Entity;
use crate::service::{ServiceError, ServiceResult};

/// Partial update for an admin profile. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminUpdate {
    pub reserved_area_access: Option<bool>,
    /// `Some(None)` clears the note.
    pub note: Option<Option<String>>,
}

/// Admin profile service facade over a profile repository.
pub struct AdminProfileService<P: ProfileRepository> {
    profiles: P,
}

impl<P: ProfileRepository> AdminProfileService<P> {
    pub fn new(profiles: P) -> Self {
        Self { profiles }
    }

    /// Lists administrator profiles.
    ///
    /// Participants may ask but their scope admits no admin rows, so they
    /// receive an empty list.
    pub fn list_admins(&self, caller: Caller) -> ServiceResult<Vec<AdminEntry>> {
        caller.authorize(Resource::AdminProfile, Operation::List)?;
        Ok(self
            .profiles
            .list_admins(caller.scope(Resource::AdminProfile))?)
    }

    /// The caller's own admin profile.
    pub fn me(&self, caller: Caller) -> ServiceResult<AdminEntry> {
        caller.authorize(Resource::AdminProfile, Operation::Read)?;
        self.profiles
            .get_admin(caller.identity_id(), caller.scope(Resource::AdminProfile))?
            .ok_or_else(|| ServiceError::not_found(Entity::AdminProfile, None))
    }

    /// Edits reserved-area access and note; administrators only.
    pub fn update_admin(
        &self,
        caller: Caller,
        id: IdentityId,
        update: AdminUpdate,
    ) -> ServiceResult<AdminEntry> {
        caller.authorize(Resource::AdminProfile, Operation::Update)?;

        let mut entry = self
            .profiles
            .get_admin(id, caller.scope(Resource::AdminProfile))?
            .ok_or_else(|| ServiceError::not_found(Entity::AdminProfile, Some(id)))?;
        if let Some(access) = update.reserved_area_access {
            entry.profile.reserved_area_access = access;
        }
        if let Some(note) = update.note {
            entry.profile.note = note
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
        }
        self.profiles.update_admin_profile(&entry.profile)?;

        self.profiles
            .get_admin(id, Scope::All)?
            .ok_or(ServiceError::InconsistentState(
                "updated admin profile not found in read-back",
            ))
    }
}
