//! Identity registration and caller resolution.
//!
//! # Responsibility
//! - Register identities together with their role profile.
//! - Resolve a username into an authorized `Caller`.
//! - Offer administrators identity maintenance (list/update/delete).
//!
//! # Invariants
//! - Identity and profile are written in one IMMEDIATE transaction; a
//!   failure on either leaves nothing behind.
//! - Inactive identities never become callers.

use crate::model::clock::{Clock, SystemClock};
use crate::model::identity::{Identity, IdentityId, Role};
use crate::model::profile::{AdminProfile, ParticipantProfile};
use crate::policy::access::{AccessError, Caller, Operation, Resource, Scope};
use crate::repo::identity_repo::{IdentityRepository, SqliteIdentityRepository};
use crate::repo::profile_repo::{
    AdminEntry, ParticipantEntry, ProfileRepository, SqliteProfileRepository,
};
use crate::repo::Entity;
use crate::service::{ServiceError, ServiceResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// Identity service bound to one connection.
pub struct IdentityService<'conn, C: Clock = SystemClock> {
    conn: &'conn mut Connection,
    clock: C,
}

impl<'conn> IdentityService<'conn, SystemClock> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self::with_clock(conn, SystemClock)
    }
}

impl<'conn, C: Clock> IdentityService<'conn, C> {
    pub fn with_clock(conn: &'conn mut Connection, clock: C) -> Self {
        Self { conn, clock }
    }

    /// Creates an administrator identity and its admin profile.
    ///
    /// # Errors
    /// - `Validation` when `identity` is malformed or not an admin.
    /// - `Uniqueness` when the username is taken.
    pub fn register_admin(
        &mut self,
        identity: Identity,
        reserved_area_access: bool,
        note: Option<String>,
    ) -> ServiceResult<AdminEntry> {
        let profile = AdminProfile {
            identity_id: identity.id,
            reserved_area_access,
            note: normalize_text(note),
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        SqliteIdentityRepository::with_clock(&tx, &self.clock).create_identity(&identity)?;
        let profiles = SqliteProfileRepository::new(&tx);
        profiles.create_admin_profile(&profile)?;
        let entry = profiles
            .get_admin(identity.id, Scope::All)?
            .ok_or(ServiceError::InconsistentState(
                "registered admin not found in read-back",
            ))?;
        tx.commit()?;

        info!(
            "event=identity_register module=service status=ok role=admin identity_id={}",
            entry.identity.id
        );
        Ok(entry)
    }

    /// Creates a participant identity and its participant profile.
    pub fn register_participant(
        &mut self,
        identity: Identity,
        bio: Option<String>,
    ) -> ServiceResult<ParticipantEntry> {
        let profile = ParticipantProfile {
            identity_id: identity.id,
            bio: normalize_text(bio),
            active: true,
        };

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        SqliteIdentityRepository::with_clock(&tx, &self.clock).create_identity(&identity)?;
        let profiles = SqliteProfileRepository::new(&tx);
        profiles.create_participant_profile(&profile)?;
        let entry = profiles
            .get_participant(identity.id, Scope::All)?
            .ok_or(ServiceError::InconsistentState(
                "registered participant not found in read-back",
            ))?;
        tx.commit()?;

        info!(
            "event=identity_register module=service status=ok role=participant identity_id={}",
            entry.identity.id
        );
        Ok(entry)
    }

    /// Loads an active identity by username and turns it into a caller.
    ///
    /// # Errors
    /// - `NotFound` for unknown usernames.
    /// - `Authorization(Inactive)` when the identity may not log in.
    pub fn resolve_caller(&self, username: &str) -> ServiceResult<Caller> {
        let identity = self
            .identities()
            .find_by_username(username)?
            .ok_or_else(|| ServiceError::not_found(Entity::Identity, None))?;
        if !identity.is_active {
            return Err(AccessError::Inactive(identity.id).into());
        }
        Ok(Caller::from_identity(&identity))
    }

    /// Lists identities, optionally of one role; administrators only.
    pub fn list_identities(&self, caller: Caller, role: Option<Role>) -> ServiceResult<Vec<Identity>> {
        caller.authorize(Resource::Identity, Operation::List)?;
        Ok(self.identities().list_identities(role)?)
    }

    /// Rewrites identity fields; administrators only.
    ///
    /// # Errors
    /// - `Validation` (field `role`) when changing the role of an identity
    ///   that already owns a profile.
    pub fn update_identity(&self, caller: Caller, identity: &Identity) -> ServiceResult<Identity> {
        caller.authorize(Resource::Identity, Operation::Update)?;

        let identities = self.identities();
        identities.update_identity(identity)?;
        identities
            .get_identity(identity.id)?
            .ok_or(ServiceError::InconsistentState(
                "updated identity not found in read-back",
            ))
    }

    /// Deletes an identity with its profile and owned records.
    ///
    /// Records created by a deleted administrator keep existing with no creator.
    pub fn delete_identity(&self, caller: Caller, id: IdentityId) -> ServiceResult<()> {
        caller.authorize(Resource::Identity, Operation::Delete)?;

        self.identities().delete_identity(id)?;
        info!(
            "event=identity_delete module=service status=ok identity_id={}",
            id
        );
        Ok(())
    }

    fn identities(&self) -> SqliteIdentityRepository<'_, &C> {
        SqliteIdentityRepository::with_clock(&*self.conn, &self.clock)
    }
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
