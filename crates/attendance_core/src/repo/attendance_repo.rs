//! Attendance repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and aggregate queries over `attendance_records`.
//! - Enforce the record validator and the `(participant, date)` key on every
//!   write, whoever the caller is.
//!
//! # Invariants
//! - Write paths call `AttendanceRecord::validate()` with the clock's date
//!   before any SQL mutation.
//! - The existence pre-check is advisory; the UNIQUE index is authoritative
//!   and its violations map to `RepoError::Duplicate`.
//! - Lists are sorted by `date DESC, id ASC`.

use super::{map_unique_violation, parse_uuid, push_scope};
use super::{DuplicateKey, Entity, RepoError, RepoResult};
use crate::model::attendance::{
    hours_from_hundredths, hours_to_hundredths, AttendanceId, AttendanceRecord,
};
use crate::model::clock::{Clock, SystemClock};
use crate::model::identity::IdentityId;
use crate::model::metrics::AttendanceTotals;
use crate::policy::access::Scope;
use chrono::NaiveDate;
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    participant_id,
    date,
    total_hundredths,
    absence_hundredths,
    note,
    created_by,
    created_at,
    updated_at
FROM attendance_records
WHERE 1 = 1";

const RECORDS_DEFAULT_LIMIT: u32 = 100;
const RECORDS_LIMIT_MAX: u32 = 500;

/// Filter and pagination options for listing records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceListQuery {
    /// Caller visibility, applied before any other filter.
    pub scope: Scope,
    pub participant_id: Option<IdentityId>,
    /// Inclusive lower date bound.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub date_to: Option<NaiveDate>,
    /// Maximum rows to return. Defaults to 100 and clamps to 500.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl AttendanceListQuery {
    /// Unfiltered query within `scope`.
    pub fn scoped(scope: Scope) -> Self {
        Self {
            scope,
            participant_id: None,
            date_from: None,
            date_to: None,
            limit: None,
            offset: 0,
        }
    }
}

/// Repository interface for attendance records.
pub trait AttendanceRepository {
    fn create_record(&self, record: &AttendanceRecord) -> RepoResult<AttendanceId>;
    fn update_record(&self, record: &AttendanceRecord) -> RepoResult<()>;
    fn get_record(&self, id: AttendanceId, scope: Scope) -> RepoResult<Option<AttendanceRecord>>;
    fn find_by_key(
        &self,
        participant_id: IdentityId,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>>;
    fn list_records(&self, query: &AttendanceListQuery) -> RepoResult<Vec<AttendanceRecord>>;
    fn delete_record(&self, id: AttendanceId) -> RepoResult<()>;
    /// Summed hours over every visible record, optionally for one participant.
    fn totals(&self, scope: Scope, participant_id: Option<IdentityId>)
        -> RepoResult<AttendanceTotals>;
}

/// SQLite-backed attendance repository.
pub struct SqliteAttendanceRepository<'conn, C: Clock = SystemClock> {
    conn: &'conn Connection,
    clock: C,
}

impl<'conn> SqliteAttendanceRepository<'conn, SystemClock> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_clock(conn, SystemClock)
    }
}

impl<'conn, C: Clock> SqliteAttendanceRepository<'conn, C> {
    pub fn with_clock(conn: &'conn Connection, clock: C) -> Self {
        Self { conn, clock }
    }

    fn ensure_participant_exists(&self, participant_id: IdentityId) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM participant_profiles WHERE identity_id = ?1);",
            [participant_id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 1 {
            Ok(())
        } else {
            Err(RepoError::NotFound {
                entity: Entity::ParticipantProfile,
                id: participant_id,
            })
        }
    }

    fn ensure_key_free(&self, record: &AttendanceRecord) -> RepoResult<()> {
        match self.find_by_key(record.participant_id, record.date)? {
            Some(existing) if existing.id != record.id => {
                Err(RepoError::Duplicate(duplicate_key(record)))
            }
            _ => Ok(()),
        }
    }
}

impl<C: Clock> AttendanceRepository for SqliteAttendanceRepository<'_, C> {
    fn create_record(&self, record: &AttendanceRecord) -> RepoResult<AttendanceId> {
        record.validate(self.clock.today())?;
        self.ensure_participant_exists(record.participant_id)?;
        self.ensure_key_free(record)?;

        let now = self.clock.now_epoch_ms();
        self.conn
            .execute(
                "INSERT INTO attendance_records (
                    id,
                    participant_id,
                    date,
                    total_hundredths,
                    absence_hundredths,
                    note,
                    created_by,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
                params![
                    record.id.to_string(),
                    record.participant_id.to_string(),
                    record.date,
                    hours_to_hundredths(record.total_hours),
                    hours_to_hundredths(record.absence_hours),
                    record.note.as_deref(),
                    record.created_by.map(|id| id.to_string()),
                    now,
                ],
            )
            .map_err(|err| map_unique_violation(err, || duplicate_key(record)))?;

        info!(
            "event=attendance_create module=repo status=ok record_id={} date={}",
            record.id, record.date
        );
        Ok(record.id)
    }

    fn update_record(&self, record: &AttendanceRecord) -> RepoResult<()> {
        record.validate(self.clock.today())?;
        self.ensure_participant_exists(record.participant_id)?;
        self.ensure_key_free(record)?;

        let changed = self
            .conn
            .execute(
                "UPDATE attendance_records
                 SET
                    participant_id = ?1,
                    date = ?2,
                    total_hundredths = ?3,
                    absence_hundredths = ?4,
                    note = ?5,
                    updated_at = ?6
                 WHERE id = ?7;",
                params![
                    record.participant_id.to_string(),
                    record.date,
                    hours_to_hundredths(record.total_hours),
                    hours_to_hundredths(record.absence_hours),
                    record.note.as_deref(),
                    self.clock.now_epoch_ms(),
                    record.id.to_string(),
                ],
            )
            .map_err(|err| map_unique_violation(err, || duplicate_key(record)))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Entity::Attendance,
                id: record.id,
            });
        }

        info!(
            "event=attendance_update module=repo status=ok record_id={} date={}",
            record.id, record.date
        );
        Ok(())
    }

    fn get_record(&self, id: AttendanceId, scope: Scope) -> RepoResult<Option<AttendanceRecord>> {
        let mut sql = format!("{RECORD_SELECT_SQL} AND id = ?");
        let mut bind_values = vec![Value::Text(id.to_string())];
        push_scope(&mut sql, &mut bind_values, scope, "participant_id");

        let mut stmt = self.conn.prepare(&sql)?;
        stmt.query_row(params_from_iter(bind_values), |row| Ok(parse_record_row(row)))
            .optional()?
            .transpose()
    }

    fn find_by_key(
        &self,
        participant_id: IdentityId,
        date: NaiveDate,
    ) -> RepoResult<Option<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL} AND participant_id = ?1 AND date = ?2;"
        ))?;
        stmt.query_row(params![participant_id.to_string(), date], |row| {
            Ok(parse_record_row(row))
        })
        .optional()?
        .transpose()
    }

    fn list_records(&self, query: &AttendanceListQuery) -> RepoResult<Vec<AttendanceRecord>> {
        let mut sql = String::from(RECORD_SELECT_SQL);
        let mut bind_values: Vec<Value> = Vec::new();
        push_scope(&mut sql, &mut bind_values, query.scope, "participant_id");
        push_filters(
            &mut sql,
            &mut bind_values,
            query.participant_id,
            query.date_from,
            query.date_to,
        );

        sql.push_str(" ORDER BY date DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_record_limit(
            query.limit,
        ))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn delete_record(&self, id: AttendanceId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM attendance_records WHERE id = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: Entity::Attendance,
                id,
            });
        }

        info!("event=attendance_delete module=repo status=ok record_id={id}");
        Ok(())
    }

    fn totals(
        &self,
        scope: Scope,
        participant_id: Option<IdentityId>,
    ) -> RepoResult<AttendanceTotals> {
        let mut sql = String::from(
            "SELECT
                COUNT(*),
                COALESCE(SUM(total_hundredths), 0),
                COALESCE(SUM(absence_hundredths), 0)
             FROM attendance_records
             WHERE 1 = 1",
        );
        let mut bind_values: Vec<Value> = Vec::new();
        push_scope(&mut sql, &mut bind_values, scope, "participant_id");
        push_filters(&mut sql, &mut bind_values, participant_id, None, None);

        let (count, total, absence): (i64, i64, i64) =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;

        let record_count = u64::try_from(count).map_err(|_| {
            RepoError::InvalidData(format!("negative record count `{count}` in aggregate"))
        })?;
        Ok(AttendanceTotals {
            record_count,
            total_hours: hours_from_hundredths(total),
            absence_hours: hours_from_hundredths(absence),
        })
    }
}

/// Normalizes list limit according to the listing contract.
pub fn normalize_record_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => RECORDS_DEFAULT_LIMIT,
        Some(value) if value > RECORDS_LIMIT_MAX => RECORDS_LIMIT_MAX,
        Some(value) => value,
    }
}

fn push_filters(
    sql: &mut String,
    bind_values: &mut Vec<Value>,
    participant_id: Option<IdentityId>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
) {
    if let Some(participant_id) = participant_id {
        sql.push_str(" AND participant_id = ?");
        bind_values.push(Value::Text(participant_id.to_string()));
    }
    if let Some(date_from) = date_from {
        sql.push_str(" AND date >= ?");
        bind_values.push(Value::Text(date_from.format("%Y-%m-%d").to_string()));
    }
    if let Some(date_to) = date_to {
        sql.push_str(" AND date <= ?");
        bind_values.push(Value::Text(date_to.format("%Y-%m-%d").to_string()));
    }
}

fn duplicate_key(record: &AttendanceRecord) -> DuplicateKey {
    DuplicateKey::Attendance {
        participant_id: record.participant_id,
        date: record.date,
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<AttendanceRecord> {
    let id_text: String = row.get("id")?;
    let participant_text: String = row.get("participant_id")?;
    let created_by = match row.get::<_, Option<String>>("created_by")? {
        Some(value) => Some(parse_uuid(&value, "attendance_records.created_by")?),
        None => None,
    };

    let record = AttendanceRecord {
        id: parse_uuid(&id_text, "attendance_records.id")?,
        participant_id: parse_uuid(&participant_text, "attendance_records.participant_id")?,
        date: row.get("date")?,
        total_hours: hours_from_hundredths(row.get("total_hundredths")?),
        absence_hours: hours_from_hundredths(row.get("absence_hundredths")?),
        note: row.get("note")?,
        created_by,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };

    // Hour invariants only; a stored date never becomes invalid later.
    record.validate(NaiveDate::MAX).map_err(|err| {
        RepoError::InvalidData(format!("attendance record {}: {err}", record.id))
    })?;
    Ok(record)
}
