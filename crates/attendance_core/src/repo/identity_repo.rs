//! Identity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over the `identities` table.
//! - Keep role immutable once the identity owns a role profile.
//!
//! # Invariants
//! - Write paths call `Identity::validate()` before SQL mutations.
//! - Deleting an identity cascades to its profiles (and, through the
//!   participant profile, to its attendance records).

use super::{bool_to_int, map_unique_violation, parse_bool, parse_uuid};
use super::{DuplicateKey, Entity, RepoError, RepoResult};
use crate::model::clock::{Clock, SystemClock};
use crate::model::identity::{Identity, IdentityId, IdentityValidationError, Role};
use rusqlite::{params, Connection, OptionalExtension, Row};

const IDENTITY_SELECT_SQL: &str = "SELECT
    id,
    username,
    email,
    first_name,
    last_name,
    role,
    is_active,
    created_at,
    updated_at
FROM identities";

/// Repository interface for identity CRUD operations.
pub trait IdentityRepository {
    fn create_identity(&self, identity: &Identity) -> RepoResult<IdentityId>;
    fn update_identity(&self, identity: &Identity) -> RepoResult<()>;
    fn get_identity(&self, id: IdentityId) -> RepoResult<Option<Identity>>;
    fn find_by_username(&self, username: &str) -> RepoResult<Option<Identity>>;
    fn list_identities(&self, role: Option<Role>) -> RepoResult<Vec<Identity>>;
    fn delete_identity(&self, id: IdentityId) -> RepoResult<()>;
}

/// SQLite-backed identity repository.
pub struct SqliteIdentityRepository<'conn, C: Clock = SystemClock> {
    conn: &'conn Connection,
    clock: C,
}

impl<'conn> SqliteIdentityRepository<'conn, SystemClock> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_clock(conn, SystemClock)
    }
}

impl<'conn, C: Clock> SqliteIdentityRepository<'conn, C> {
    pub fn with_clock(conn: &'conn Connection, clock: C) -> Self {
        Self { conn, clock }
    }

    fn has_profile(&self, id: IdentityId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM admin_profiles WHERE identity_id = ?1)
                 OR EXISTS(SELECT 1 FROM participant_profiles WHERE identity_id = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl<C: Clock> IdentityRepository for SqliteIdentityRepository<'_, C> {
    fn create_identity(&self, identity: &Identity) -> RepoResult<IdentityId> {
        identity.validate()?;

        let username = identity.username.trim();
        let now = self.clock.now_epoch_ms();
        self.conn
            .execute(
                "INSERT INTO identities (
                    id,
                    username,
                    email,
                    first_name,
                    last_name,
                    role,
                    is_active,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
                params![
                    identity.id.to_string(),
                    username,
                    identity.email.trim(),
                    identity.first_name.trim(),
                    identity.last_name.trim(),
                    identity.role.as_str(),
                    bool_to_int(identity.is_active),
                    now,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || DuplicateKey::Username(username.to_string()))
            })?;

        Ok(identity.id)
    }

    fn update_identity(&self, identity: &Identity) -> RepoResult<()> {
        identity.validate()?;

        let stored = self
            .get_identity(identity.id)?
            .ok_or(RepoError::NotFound {
                entity: Entity::Identity,
                id: identity.id,
            })?;
        if stored.role != identity.role && self.has_profile(identity.id)? {
            return Err(IdentityValidationError::RoleLocked {
                current: stored.role,
                requested: identity.role,
            }
            .into());
        }

        let username = identity.username.trim();
        self.conn
            .execute(
                "UPDATE identities
                 SET
                    username = ?1,
                    email = ?2,
                    first_name = ?3,
                    last_name = ?4,
                    role = ?5,
                    is_active = ?6,
                    updated_at = ?7
                 WHERE id = ?8;",
                params![
                    username,
                    identity.email.trim(),
                    identity.first_name.trim(),
                    identity.last_name.trim(),
                    identity.role.as_str(),
                    bool_to_int(identity.is_active),
                    self.clock.now_epoch_ms(),
                    identity.id.to_string(),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || DuplicateKey::Username(username.to_string()))
            })?;

        Ok(())
    }

    fn get_identity(&self, id: IdentityId) -> RepoResult<Option<Identity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{IDENTITY_SELECT_SQL} WHERE id = ?1;"))?;
        stmt.query_row([id.to_string()], |row| Ok(parse_identity_columns(row)))
            .optional()?
            .transpose()
    }

    fn find_by_username(&self, username: &str) -> RepoResult<Option<Identity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{IDENTITY_SELECT_SQL} WHERE username = ?1;"))?;
        stmt.query_row([username.trim()], |row| Ok(parse_identity_columns(row)))
            .optional()?
            .transpose()
    }

    fn list_identities(&self, role: Option<Role>) -> RepoResult<Vec<Identity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{IDENTITY_SELECT_SQL}
             WHERE (?1 IS NULL OR role = ?1)
             ORDER BY last_name COLLATE NOCASE ASC, first_name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([role.map(Role::as_str)])?;
        let mut identities = Vec::new();
        while let Some(row) = rows.next()? {
            identities.push(parse_identity_columns(row)?);
        }
        Ok(identities)
    }

    fn delete_identity(&self, id: IdentityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM identities WHERE id = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Entity::Identity,
                id,
            });
        }
        Ok(())
    }
}

/// Parses identity columns from a row selected with the `identities` column names.
pub(crate) fn parse_identity_columns(row: &Row<'_>) -> RepoResult<Identity> {
    let id_text: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in identities.role"))
    })?;

    Ok(Identity {
        id: parse_uuid(&id_text, "identities.id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        role,
        is_active: parse_bool(row.get("is_active")?, "identities.is_active")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
