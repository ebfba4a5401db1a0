use attendance_core::db::open_db_in_memory;
use attendance_core::repo::identity_repo::IdentityRepository;
use attendance_core::repo::DuplicateKey;
use attendance_core::{
    AttendanceDraft, AttendanceService, Caller, FixedClock, Identity, IdentityService,
    ParticipantService, ParticipantUpdate, Role, ServiceError, SqliteAttendanceRepository,
    SqliteIdentityRepository, SqliteProfileRepository,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::Connection;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn admin_identity(username: &str) -> Identity {
    Identity::new(
        username,
        format!("{username}@example.com"),
        "Laura",
        "Bianchi",
        Role::Admin,
    )
}

fn participant_identity(username: &str) -> Identity {
    Identity::new(
        username,
        format!("{username}@example.com"),
        "Mario",
        "Rossi",
        Role::Participant,
    )
}

#[test]
fn registration_creates_identity_and_profile_together() {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));

    let admin = identities
        .register_admin(admin_identity("laura"), false, Some("  front desk ".into()))
        .unwrap();
    assert!(!admin.profile.reserved_area_access);
    assert_eq!(admin.profile.note.as_deref(), Some("front desk"));
    assert_eq!(admin.identity.created_at, FixedClock::new(today()).now_epoch_ms);

    let participant = identities
        .register_participant(participant_identity("mario"), Some("   ".into()))
        .unwrap();
    assert!(participant.profile.active);
    assert_eq!(participant.profile.bio, None);
    drop(identities);

    assert_eq!(count(&conn, "identities"), 2);
    assert_eq!(count(&conn, "admin_profiles"), 1);
    assert_eq!(count(&conn, "participant_profiles"), 1);
}

#[test]
fn failed_profile_insert_rolls_back_identity() {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));

    let err = identities
        .register_admin(participant_identity("mario"), true, None)
        .unwrap_err();
    match err {
        ServiceError::Validation { field, .. } => assert_eq!(field, "role"),
        other => panic!("unexpected error: {other:?}"),
    }
    drop(identities);

    assert_eq!(count(&conn, "identities"), 0);
    assert_eq!(count(&conn, "admin_profiles"), 0);
}

#[test]
fn duplicate_username_is_uniqueness_error() {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));
    identities
        .register_participant(participant_identity("mario"), None)
        .unwrap();

    let err = identities
        .register_admin(admin_identity("mario"), true, None)
        .unwrap_err();
    assert_eq!(err.kind(), "uniqueness_error");
    assert!(matches!(
        err,
        ServiceError::Uniqueness(DuplicateKey::Username(ref name)) if name == "mario"
    ));
    drop(identities);

    assert_eq!(count(&conn, "identities"), 1);
    assert_eq!(count(&conn, "admin_profiles"), 0);
}

#[test]
fn malformed_identity_fields_are_field_errors() {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));

    let mut bad_email = participant_identity("mario");
    bad_email.email = "not-an-address".to_string();
    match identities.register_participant(bad_email, None).unwrap_err() {
        ServiceError::Validation { field, .. } => assert_eq!(field, "email"),
        other => panic!("unexpected error: {other:?}"),
    }

    let mut blank_name = participant_identity("mario");
    blank_name.last_name = "  ".to_string();
    match identities.register_participant(blank_name, None).unwrap_err() {
        ServiceError::Validation { field, .. } => assert_eq!(field, "lastName"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn role_is_locked_once_a_profile_exists() {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));
    let admin = identities
        .register_admin(admin_identity("laura"), true, None)
        .unwrap();
    let participant = identities
        .register_participant(participant_identity("mario"), None)
        .unwrap();

    let mut promoted = participant.identity.clone();
    promoted.role = Role::Admin;
    match identities
        .update_identity(Caller::Admin(admin.identity.id), &promoted)
        .unwrap_err()
    {
        ServiceError::Validation { field, message } => {
            assert_eq!(field, "role");
            assert!(message.contains("once a profile exists"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mut renamed = participant.identity.clone();
    renamed.first_name = "Marco".to_string();
    let updated = identities
        .update_identity(Caller::Admin(admin.identity.id), &renamed)
        .unwrap();
    assert_eq!(updated.full_name(), "Marco Rossi");
    assert_eq!(updated.role, Role::Participant);
}

#[test]
fn role_may_change_before_any_profile_exists() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteIdentityRepository::new(&conn);
    let mut identity = participant_identity("floating");
    repo.create_identity(&identity).unwrap();

    identity.role = Role::Admin;
    repo.update_identity(&identity).unwrap();
    assert_eq!(
        repo.get_identity(identity.id).unwrap().unwrap().role,
        Role::Admin
    );
}

#[test]
fn participant_stats_are_hour_weighted() {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));
    let admin = Caller::from_identity(
        &identities
            .register_admin(admin_identity("laura"), true, None)
            .unwrap()
            .identity,
    );
    let mario = identities
        .register_participant(participant_identity("mario"), None)
        .unwrap()
        .identity;
    drop(identities);

    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::with_clock(&conn, FixedClock::new(today())),
        SqliteProfileRepository::new(&conn),
    );
    for (day, total, absence) in [(1, 8, 0), (2, 6, 3)] {
        attendance
            .create_record(
                admin,
                AttendanceDraft::new(
                    mario.id,
                    NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                    Decimal::from(total),
                )
                .with_absence(Decimal::from(absence)),
            )
            .unwrap();
    }

    let participants = ParticipantService::new(
        SqliteProfileRepository::new(&conn),
        SqliteAttendanceRepository::with_clock(&conn, FixedClock::new(today())),
    );
    let stats = participants.stats(admin, mario.id).unwrap();
    assert_eq!(stats.first_name, "Mario");
    assert_eq!(stats.email, "mario@example.com");
    assert_eq!(stats.total_days, 2);
    assert_eq!(stats.total_hours, Decimal::from(14));
    assert_eq!(stats.total_absence_hours, Decimal::from(3));
    assert_eq!(stats.present_hours, Decimal::from(11));
    assert_eq!(stats.presence_percentage, "78.57".parse::<Decimal>().unwrap());

    let listed = participants.list_participants(admin).unwrap();
    assert_eq!(listed[0].presence_percentage, stats.presence_percentage);

    let own = participants
        .stats(Caller::Participant(mario.id), mario.id)
        .unwrap();
    assert_eq!(own, stats);
}

#[test]
fn admin_updates_participant_bio_and_enrollment() {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));
    let admin = Caller::from_identity(
        &identities
            .register_admin(admin_identity("laura"), true, None)
            .unwrap()
            .identity,
    );
    let mario = identities
        .register_participant(participant_identity("mario"), Some("first bio".into()))
        .unwrap()
        .identity;
    drop(identities);

    let participants = ParticipantService::new(
        SqliteProfileRepository::new(&conn),
        SqliteAttendanceRepository::with_clock(&conn, FixedClock::new(today())),
    );
    let updated = participants
        .update_participant(
            admin,
            mario.id,
            ParticipantUpdate {
                bio: Some(None),
                active: Some(false),
            },
        )
        .unwrap();
    assert_eq!(updated.bio, None);
    assert!(!updated.active);
    // Enrollment status is not login capability.
    assert!(updated.identity.is_active);

    let json = serde_json::to_value(&updated).unwrap();
    assert_eq!(json["identity"]["firstName"], "Mario");
    assert_eq!(json["presencePercentage"], 0.0);
}
