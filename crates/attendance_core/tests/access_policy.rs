use attendance_core::db::open_db_in_memory;
use attendance_core::repo::identity_repo::IdentityRepository;
use attendance_core::{
    AccessError, AdminProfileService, AttendanceDraft, AttendanceService, Caller, FixedClock,
    Identity, IdentityService, ParticipantService, ParticipantUpdate, RecordFilter, Role,
    ServiceError, SqliteAttendanceRepository, SqliteIdentityRepository, SqliteProfileRepository,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rusqlite::Connection;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn day(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, n).unwrap()
}

struct World {
    conn: Connection,
    admin: Caller,
    alice: Caller,
    bob: Caller,
}

fn participant(username: &str, first: &str) -> Identity {
    Identity::new(
        username,
        format!("{username}@example.com"),
        first,
        "Example",
        Role::Participant,
    )
}

fn world() -> World {
    let mut conn = open_db_in_memory().unwrap();
    let mut identities = IdentityService::with_clock(&mut conn, FixedClock::new(today()));
    let admin = identities
        .register_admin(
            Identity::new("boss", "boss@example.com", "Ada", "Admin", Role::Admin),
            true,
            None,
        )
        .unwrap();
    let alice = identities
        .register_participant(participant("alice", "Alice"), None)
        .unwrap();
    let bob = identities
        .register_participant(participant("bob", "Bob"), None)
        .unwrap();

    let world = World {
        conn,
        admin: Caller::from_identity(&admin.identity),
        alice: Caller::from_identity(&alice.identity),
        bob: Caller::from_identity(&bob.identity),
    };

    let attendance = attendance_service(&world.conn);
    let seeded = [
        (world.alice, day(1), 0),
        (world.alice, day(2), 2),
        (world.bob, day(1), 4),
    ];
    for (who, date, absence) in seeded {
        attendance
            .create_record(
                world.admin,
                AttendanceDraft::new(who.identity_id(), date, Decimal::from(8))
                    .with_absence(Decimal::from(absence)),
            )
            .unwrap();
    }
    world
}

fn attendance_service(
    conn: &Connection,
) -> AttendanceService<SqliteAttendanceRepository<'_, FixedClock>, SqliteProfileRepository<'_>> {
    AttendanceService::new(
        SqliteAttendanceRepository::with_clock(conn, FixedClock::new(today())),
        SqliteProfileRepository::new(conn),
    )
}

fn participant_service(
    conn: &Connection,
) -> ParticipantService<SqliteProfileRepository<'_>, SqliteAttendanceRepository<'_, FixedClock>> {
    ParticipantService::new(
        SqliteProfileRepository::new(conn),
        SqliteAttendanceRepository::with_clock(conn, FixedClock::new(today())),
    )
}

fn is_forbidden(err: &ServiceError) -> bool {
    matches!(
        err,
        ServiceError::Authorization(AccessError::Forbidden { .. })
    )
}

#[test]
fn participant_lists_only_own_records() {
    let w = world();
    let service = attendance_service(&w.conn);

    let own = service.list_records(w.alice, &RecordFilter::default()).unwrap();
    assert_eq!(own.len(), 2);
    assert!(own
        .iter()
        .all(|view| view.participant_id == w.alice.identity_id()));

    // Filtering for someone else narrows inside the caller scope, never widens it.
    let filter = RecordFilter {
        participant_id: Some(w.bob.identity_id()),
        ..RecordFilter::default()
    };
    assert!(service.list_records(w.alice, &filter).unwrap().is_empty());

    let everything = service
        .list_records(w.admin, &RecordFilter::default())
        .unwrap();
    assert_eq!(everything.len(), 3);
}

#[test]
fn foreign_records_look_missing_to_participants() {
    let w = world();
    let service = attendance_service(&w.conn);
    let bobs = service
        .list_records(w.bob, &RecordFilter::default())
        .unwrap()
        .remove(0);

    let err = service.get_record(w.alice, bobs.id).unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let own = service.get_record(w.bob, bobs.id).unwrap();
    assert_eq!(own.presence_percentage, Decimal::from(50));
}

#[test]
fn participants_cannot_mutate_or_summarize() {
    let w = world();
    let service = attendance_service(&w.conn);
    let own = service
        .list_records(w.alice, &RecordFilter::default())
        .unwrap()
        .remove(0);
    let draft = AttendanceDraft::new(w.alice.identity_id(), day(3), Decimal::from(8));

    let create = service.create_record(w.alice, draft.clone()).unwrap_err();
    assert!(is_forbidden(&create));
    assert_eq!(create.kind(), "forbidden");
    assert!(is_forbidden(
        &service.update_record(w.alice, own.id, draft.clone()).unwrap_err()
    ));
    assert!(is_forbidden(&service.upsert_record(w.alice, draft).unwrap_err()));
    assert!(is_forbidden(&service.delete_record(w.alice, own.id).unwrap_err()));
    assert!(is_forbidden(&service.summary(w.alice).unwrap_err()));

    // Nothing changed.
    assert_eq!(
        service
            .list_records(w.admin, &RecordFilter::default())
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn participant_profiles_are_scoped_to_self() {
    let w = world();
    let service = participant_service(&w.conn);

    let visible = service.list_participants(w.alice).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].identity.username, "alice");

    assert!(matches!(
        service.get_participant(w.alice, w.bob.identity_id()),
        Err(ServiceError::NotFound { .. })
    ));
    assert!(matches!(
        service.stats(w.alice, w.bob.identity_id()),
        Err(ServiceError::NotFound { .. })
    ));
    assert_eq!(service.list_participants(w.admin).unwrap().len(), 2);

    let me = service.me(w.alice).unwrap();
    assert_eq!(me.identity.id, w.alice.identity_id());

    let update = ParticipantUpdate {
        active: Some(false),
        ..ParticipantUpdate::default()
    };
    assert!(is_forbidden(
        &service
            .update_participant(w.alice, w.alice.identity_id(), update)
            .unwrap_err()
    ));
}

#[test]
fn admin_directory_is_hidden_from_participants() {
    let w = world();
    let service = AdminProfileService::new(SqliteProfileRepository::new(&w.conn));
    assert!(service.list_admins(w.alice).unwrap().is_empty());
    assert_eq!(service.list_admins(w.admin).unwrap().len(), 1);
}

#[test]
fn identity_management_is_admin_only() {
    let mut w = world();
    let alice = w.alice;
    let bob_id = w.bob.identity_id();
    let admin = w.admin;
    let identities = IdentityService::with_clock(&mut w.conn, FixedClock::new(today()));

    assert!(is_forbidden(
        &identities.list_identities(alice, None).unwrap_err()
    ));
    assert!(is_forbidden(
        &identities.delete_identity(alice, bob_id).unwrap_err()
    ));
    assert_eq!(
        identities
            .list_identities(admin, Some(Role::Participant))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn callers_resolve_from_active_usernames_only() {
    let mut w = world();
    let alice_id = w.alice.identity_id();
    {
        let identities = IdentityService::with_clock(&mut w.conn, FixedClock::new(today()));
        assert_eq!(identities.resolve_caller("alice").unwrap(), Caller::Participant(alice_id));
        assert!(matches!(
            identities.resolve_caller("nobody"),
            Err(ServiceError::NotFound { id: None, .. })
        ));
    }

    let repo = SqliteIdentityRepository::new(&w.conn);
    let mut alice = repo.get_identity(alice_id).unwrap().unwrap();
    alice.is_active = false;
    repo.update_identity(&alice).unwrap();

    let identities = IdentityService::with_clock(&mut w.conn, FixedClock::new(today()));
    match identities.resolve_caller("alice").unwrap_err() {
        ServiceError::Authorization(AccessError::Inactive(id)) => assert_eq!(id, alice_id),
        other => panic!("unexpected error: {other:?}"),
    }
}
