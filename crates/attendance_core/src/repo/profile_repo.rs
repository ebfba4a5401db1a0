//! Role profile repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist admin and participant profiles keyed by identity id.
//! - Check the owning identity carries the matching role before insert.
//!
//! # Invariants
//! - At most one profile of each kind per identity (primary key).
//! - Participant listings honour the caller scope at query construction.

use super::{bool_to_int, map_unique_violation, parse_bool, parse_uuid, push_scope};
use super::{DuplicateKey, Entity, RepoError, RepoResult};
use crate::model::identity::{Identity, IdentityId};
use crate::model::profile::{AdminProfile, ParticipantProfile};
use crate::policy::access::Scope;
use crate::repo::identity_repo::{
    parse_identity_columns, IdentityRepository, SqliteIdentityRepository,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

/// Participant profile joined with its owning identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantEntry {
    pub identity: Identity,
    pub profile: ParticipantProfile,
}

/// Admin profile joined with its owning identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminEntry {
    pub identity: Identity,
    pub profile: AdminProfile,
}

/// Repository interface for role profiles.
pub trait ProfileRepository {
    fn create_admin_profile(&self, profile: &AdminProfile) -> RepoResult<()>;
    fn update_admin_profile(&self, profile: &AdminProfile) -> RepoResult<()>;
    fn get_admin(&self, id: IdentityId, scope: Scope) -> RepoResult<Option<AdminEntry>>;
    fn list_admins(&self, scope: Scope) -> RepoResult<Vec<AdminEntry>>;
    fn create_participant_profile(&self, profile: &ParticipantProfile) -> RepoResult<()>;
    fn update_participant_profile(&self, profile: &ParticipantProfile) -> RepoResult<()>;
    fn get_participant(&self, id: IdentityId, scope: Scope)
        -> RepoResult<Option<ParticipantEntry>>;
    fn list_participants(&self, scope: Scope) -> RepoResult<Vec<ParticipantEntry>>;
}

/// SQLite-backed profile repository.
pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_owner(&self, id: IdentityId) -> RepoResult<Identity> {
        SqliteIdentityRepository::new(self.conn)
            .get_identity(id)?
            .ok_or(RepoError::NotFound {
                entity: Entity::Identity,
                id,
            })
    }
}

const ADMIN_SELECT_SQL: &str = "SELECT
    i.id, i.username, i.email, i.first_name, i.last_name, i.role, i.is_active,
    i.created_at, i.updated_at,
    p.reserved_area_access, p.note
FROM admin_profiles p
INNER JOIN identities i ON i.id = p.identity_id
WHERE 1 = 1";

const PARTICIPANT_SELECT_SQL: &str = "SELECT
    i.id, i.username, i.email, i.first_name, i.last_name, i.role, i.is_active,
    i.created_at, i.updated_at,
    p.bio, p.active
FROM participant_profiles p
INNER JOIN identities i ON i.id = p.identity_id
WHERE 1 = 1";

const PROFILE_ORDER_SQL: &str =
    " ORDER BY i.last_name COLLATE NOCASE ASC, i.first_name COLLATE NOCASE ASC, i.id ASC";

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn create_admin_profile(&self, profile: &AdminProfile) -> RepoResult<()> {
        let owner = self.load_owner(profile.identity_id)?;
        AdminProfile::validate_owner(&owner)?;

        self.conn
            .execute(
                "INSERT INTO admin_profiles (identity_id, reserved_area_access, note)
                 VALUES (?1, ?2, ?3);",
                params![
                    profile.identity_id.to_string(),
                    bool_to_int(profile.reserved_area_access),
                    profile.note.as_deref(),
                ],
            )
            .map_err(|err| map_unique_violation(err, || DuplicateKey::Profile(profile.identity_id)))?;
        Ok(())
    }

    fn update_admin_profile(&self, profile: &AdminProfile) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE admin_profiles
             SET reserved_area_access = ?1, note = ?2
             WHERE identity_id = ?3;",
            params![
                bool_to_int(profile.reserved_area_access),
                profile.note.as_deref(),
                profile.identity_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Entity::AdminProfile,
                id: profile.identity_id,
            });
        }
        Ok(())
    }

    fn get_admin(&self, id: IdentityId, scope: Scope) -> RepoResult<Option<AdminEntry>> {
        let mut sql = String::from(ADMIN_SELECT_SQL);
        let mut bind_values = vec![Value::Text(id.to_string())];
        sql.push_str(" AND p.identity_id = ?");
        // Admin profiles have no participant owner; only `Scope::All` sees them.
        if scope != Scope::All {
            push_scope(&mut sql, &mut bind_values, Scope::Nothing, "p.identity_id");
        }

        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_row(params_from_iter(bind_values), |row| Ok(parse_admin_row(row)))
            .optional()?
            .transpose()
    }

    fn list_admins(&self, scope: Scope) -> RepoResult<Vec<AdminEntry>> {
        let mut sql = String::from(ADMIN_SELECT_SQL);
        let mut bind_values = Vec::new();
        if scope != Scope::All {
            push_scope(&mut sql, &mut bind_values, Scope::Nothing, "p.identity_id");
        }
        sql.push_str(PROFILE_ORDER_SQL);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut admins = Vec::new();
        while let Some(row) = rows.next()? {
            admins.push(parse_admin_row(row)?);
        }
        Ok(admins)
    }

    fn create_participant_profile(&self, profile: &ParticipantProfile) -> RepoResult<()> {
        let owner = self.load_owner(profile.identity_id)?;
        ParticipantProfile::validate_owner(&owner)?;

        self.conn
            .execute(
                "INSERT INTO participant_profiles (identity_id, bio, active)
                 VALUES (?1, ?2, ?3);",
                params![
                    profile.identity_id.to_string(),
                    profile.bio.as_deref(),
                    bool_to_int(profile.active),
                ],
            )
            .map_err(|err| map_unique_violation(err, || DuplicateKey::Profile(profile.identity_id)))?;
        Ok(())
    }

    fn update_participant_profile(&self, profile: &ParticipantProfile) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE participant_profiles
             SET bio = ?1, active = ?2
             WHERE identity_id = ?3;",
            params![
                profile.bio.as_deref(),
                bool_to_int(profile.active),
                profile.identity_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Entity::ParticipantProfile,
                id: profile.identity_id,
            });
        }
        Ok(())
    }

    fn get_participant(
        &self,
        id: IdentityId,
        scope: Scope,
    ) -> RepoResult<Option<ParticipantEntry>> {
        let mut sql = String::from(PARTICIPANT_SELECT_SQL);
        let mut bind_values = vec![Value::Text(id.to_string())];
        sql.push_str(" AND p.identity_id = ?");
        push_scope(&mut sql, &mut bind_values, scope, "p.identity_id");

        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_row(params_from_iter(bind_values), |row| {
            Ok(parse_participant_row(row))
        })
        .optional()?
        .transpose()
    }

    fn list_participants(&self, scope: Scope) -> RepoResult<Vec<ParticipantEntry>> {
        let mut sql = String::from(PARTICIPANT_SELECT_SQL);
        let mut bind_values = Vec::new();
        push_scope(&mut sql, &mut bind_values, scope, "p.identity_id");
        sql.push_str(PROFILE_ORDER_SQL);

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut participants = Vec::new();
        while let Some(row) = rows.next()? {
            participants.push(parse_participant_row(row)?);
        }
        Ok(participants)
    }
}

fn parse_admin_row(row: &Row<'_>) -> RepoResult<AdminEntry> {
    let identity = parse_identity_columns(row)?;
    let id_text: String = row.get("id")?;
    let profile = AdminProfile {
        identity_id: parse_uuid(&id_text, "admin_profiles.identity_id")?,
        reserved_area_access: parse_bool(
            row.get("reserved_area_access")?,
            "admin_profiles.reserved_area_access",
        )?,
        note: row.get("note")?,
    };
    Ok(AdminEntry { identity, profile })
}

fn parse_participant_row(row: &Row<'_>) -> RepoResult<ParticipantEntry> {
    let identity = parse_identity_columns(row)?;
    let id_text: String = row.get("id")?;
    let profile = ParticipantProfile {
        identity_id: parse_uuid(&id_text, "participant_profiles.identity_id")?,
        bio: row.get("bio")?,
        active: parse_bool(row.get("active")?, "participant_profiles.active")?,
    };
    Ok(ParticipantEntry { identity, profile })
}
