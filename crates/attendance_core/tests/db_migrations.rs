use attendance_core::db::migrations::latest_version;
use attendance_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "identities");
    assert_table_exists(&conn, "admin_profiles");
    assert_table_exists(&conn, "participant_profiles");
    assert_table_exists(&conn, "attendance_records");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("attendance.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "attendance_records");
}

#[test]
fn connections_enforce_foreign_keys() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let orphan = conn.execute(
        "INSERT INTO participant_profiles (identity_id, bio, active)
         VALUES ('00000000-0000-0000-0000-000000000000', NULL, 1);",
        [],
    );
    assert!(orphan.is_err(), "profile without identity must be rejected");
}

#[test]
fn attendance_table_checks_hour_ranges() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO identities (id, username, email, first_name, last_name, role, is_active, created_at, updated_at)
         VALUES ('p-1', 'p1', 'p1@example.com', 'Paola', 'Verdi', 'participant', 1, 0, 0);
         INSERT INTO participant_profiles (identity_id, bio, active) VALUES ('p-1', NULL, 1);",
    )
    .unwrap();

    let insert = |id: &str, date: &str, total: i64, absence: i64| {
        conn.execute(
            "INSERT INTO attendance_records (
                id, participant_id, date, total_hundredths, absence_hundredths,
                note, created_by, created_at, updated_at
             ) VALUES (?1, 'p-1', ?2, ?3, ?4, NULL, NULL, 0, 0);",
            rusqlite::params![id, date, total, absence],
        )
    };

    insert("r-1", "2024-03-01", 800, 200).unwrap();
    assert!(insert("r-2", "2024-03-02", 2401, 0).is_err(), "over 24 hours");
    assert!(insert("r-3", "2024-03-03", 400, 500).is_err(), "absence over total");
    assert!(insert("r-4", "2024-03-04", -100, 0).is_err(), "negative total");

    let duplicate = insert("r-5", "2024-03-01", 600, 0).unwrap_err();
    assert!(DbError::from(duplicate).is_unique_violation());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
