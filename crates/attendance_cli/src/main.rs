//! Command-line front end for the attendance core.
//!
//! # Responsibility
//! - Load configuration, start logging and open the database.
//! - Resolve `--as <username>` into a caller and dispatch one command.
//! - Print results as JSON; failures go to stderr with a non-zero exit code.
//!
//! # Invariants
//! - Every command except `init` and the first administrator registration
//!   runs as a resolved, active identity.

use attendance_core::db::migrations::latest_version;
use attendance_core::policy::access::{Operation, Resource};
use attendance_core::repo::attendance_repo::AttendanceRepository;
use attendance_core::repo::identity_repo::IdentityRepository;
use attendance_core::repo::profile_repo::ProfileRepository;
use attendance_core::{
    init_logging, open_db, AdminProfileService, AdminUpdate, AttendanceDraft, AttendanceService, Caller,
    ConfigError, CoreConfig, DbError, Identity, IdentityService, ParticipantService,
    ParticipantUpdate, RecordFilter, Role, ServiceError, SqliteAttendanceRepository,
    SqliteIdentityRepository, SqliteProfileRepository,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::info;
use rust_decimal::Decimal;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file; overrides configuration and environment.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Username of the identity performing the command.
    #[arg(long = "as", global = true, value_name = "USERNAME")]
    as_user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or migrate the database.
    Init,
    /// Register an administrator.
    RegisterAdmin {
        #[command(flatten)]
        identity: IdentityArgs,
        #[arg(long)]
        no_reserved_area: bool,
        #[arg(long)]
        note: Option<String>,
    },
    /// Register a participant.
    RegisterParticipant {
        #[command(flatten)]
        identity: IdentityArgs,
        #[arg(long)]
        bio: Option<String>,
    },
    /// List identities.
    Identities {
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
    },
    /// Delete an identity with its profile and records.
    DeleteIdentity { id: Uuid },
    #[command(flatten)]
    Caller(CallerCommand),
}

/// Commands that only read or write through the attendance services.
#[derive(Subcommand, Debug)]
enum CallerCommand {
    /// Create an attendance record, or update it in place with `--upsert`.
    Record {
        #[arg(long)]
        participant: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        total: Decimal,
        #[arg(long, default_value_t = Decimal::ZERO)]
        absence: Decimal,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        upsert: bool,
    },
    /// Change fields of an existing record.
    Update {
        id: Uuid,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        total: Option<Decimal>,
        #[arg(long)]
        absence: Option<Decimal>,
        #[arg(long, conflicts_with = "clear_note")]
        note: Option<String>,
        #[arg(long)]
        clear_note: bool,
    },
    /// Delete a record.
    Delete { id: Uuid },
    /// Show one record.
    Get { id: Uuid },
    /// List records, newest date first.
    List {
        #[arg(long)]
        participant: Option<Uuid>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Population summary.
    Summary,
    /// List participants.
    Participants,
    /// Show one participant.
    Participant { id: Uuid },
    /// Attendance statistics for one participant.
    Stats { id: Uuid },
    /// Edit a participant's bio or enrollment status.
    SetParticipant {
        id: Uuid,
        #[arg(long, conflicts_with = "clear_bio")]
        bio: Option<String>,
        #[arg(long)]
        clear_bio: bool,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Edit an administrator's reserved-area access or note.
    SetAdmin {
        id: Uuid,
        #[arg(long)]
        reserved_area: Option<bool>,
        #[arg(long, conflicts_with = "clear_note")]
        note: Option<String>,
        #[arg(long)]
        clear_note: bool,
    },
    /// List administrators.
    Admins,
    /// Show the caller's own profile.
    Me,
}

#[derive(Args, Debug)]
struct IdentityArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
}

impl IdentityArgs {
    fn into_identity(self, role: Role) -> Identity {
        Identity::new(
            self.username,
            self.email,
            self.first_name,
            self.last_name,
            role,
        )
    }
}

fn parse_role(value: &str) -> Result<Role, String> {
    Role::parse(value).ok_or_else(|| format!("unknown role `{value}`; expected admin|participant"))
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Db(DbError),
    Service(ServiceError),
    Output(serde_json::Error),
    MissingCaller,
}

impl CliError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Db(_) => "internal_error",
            Self::Service(err) => err.kind(),
            Self::Output(_) => "internal_error",
            Self::MissingCaller => "unauthenticated",
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "cannot render output: {err}"),
            Self::MissingCaller => f.write_str("this command needs --as <username>"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ServiceError> for CliError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<attendance_core::RepoError> for CliError {
    fn from(value: attendance_core::RepoError) -> Self {
        Self::Service(value.into())
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).and_then(|output| {
        serde_json::to_string_pretty(&output).map_err(CliError::Output)
    }) {
        Ok(text) => {
            println!("{text}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error kind={} message={}", err.kind(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<Value, CliError> {
    let mut config = CoreConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    if let Some(dir) = config.logging.dir.as_deref() {
        if let Err(err) = init_logging(&config.logging.level, dir) {
            eprintln!("warning: file logging disabled: {err}");
        }
    }

    let mut conn = open_db(&config.database.path)?;
    let caller = match cli.as_user.as_deref() {
        Some(username) => Some(IdentityService::new(&mut conn).resolve_caller(username)?),
        None => None,
    };

    match cli.command {
        Command::Init => Ok(json!({
            "dbPath": config.database.path,
            "schemaVersion": latest_version(),
        })),
        Command::RegisterAdmin {
            identity,
            no_reserved_area,
            note,
        } => {
            ensure_may_register(&conn, caller, Role::Admin)?;
            let entry = IdentityService::new(&mut conn).register_admin(
                identity.into_identity(Role::Admin),
                !no_reserved_area,
                note,
            )?;
            to_json(&entry)
        }
        Command::RegisterParticipant { identity, bio } => {
            ensure_may_register(&conn, caller, Role::Participant)?;
            let entry = IdentityService::new(&mut conn)
                .register_participant(identity.into_identity(Role::Participant), bio)?;
            to_json(&entry)
        }
        Command::Identities { role } => {
            let caller = caller.ok_or(CliError::MissingCaller)?;
            to_json(&IdentityService::new(&mut conn).list_identities(caller, role)?)
        }
        Command::DeleteIdentity { id } => {
            let caller = caller.ok_or(CliError::MissingCaller)?;
            IdentityService::new(&mut conn).delete_identity(caller, id)?;
            Ok(json!({ "deleted": id }))
        }
        Command::Caller(command) => {
            run_as(&conn, caller.ok_or(CliError::MissingCaller)?, command)
        }
    }
}

fn run_as(conn: &Connection, caller: Caller, command: CallerCommand) -> Result<Value, CliError> {
    let attendance = AttendanceService::new(
        SqliteAttendanceRepository::new(conn),
        SqliteProfileRepository::new(conn),
    );
    let participants = ParticipantService::new(
        SqliteProfileRepository::new(conn),
        SqliteAttendanceRepository::new(conn),
    );
    let admins = AdminProfileService::new(SqliteProfileRepository::new(conn));

    match command {
        CallerCommand::Record {
            participant,
            date,
            total,
            absence,
            note,
            upsert,
        } => {
            let mut draft = AttendanceDraft::new(participant, date, total).with_absence(absence);
            if let Some(note) = note {
                draft = draft.with_note(note);
            }
            if upsert {
                let outcome = attendance.upsert_record(caller, draft)?;
                Ok(json!({ "created": outcome.created, "record": to_json(&outcome.record)? }))
            } else {
                to_json(&attendance.create_record(caller, draft)?)
            }
        }
        CallerCommand::Update {
            id,
            date,
            total,
            absence,
            note,
            clear_note,
        } => {
            let current = attendance.get_record(caller, id)?;
            let draft = AttendanceDraft {
                participant_id: current.participant_id,
                date: date.unwrap_or(current.date),
                total_hours: total.unwrap_or(current.total_hours),
                absence_hours: absence.unwrap_or(current.absence_hours),
                note: if clear_note { None } else { note.or(current.note) },
            };
            to_json(&attendance.update_record(caller, id, draft)?)
        }
        CallerCommand::Delete { id } => {
            attendance.delete_record(caller, id)?;
            Ok(json!({ "deleted": id }))
        }
        CallerCommand::Get { id } => to_json(&attendance.get_record(caller, id)?),
        CallerCommand::List {
            participant,
            from,
            to,
            limit,
            offset,
        } => {
            let filter = RecordFilter {
                participant_id: participant,
                date_from: from,
                date_to: to,
                limit,
                offset,
            };
            to_json(&attendance.list_records(caller, &filter)?)
        }
        CallerCommand::Summary => to_json(&attendance.summary(caller)?),
        CallerCommand::Participants => to_json(&participants.list_participants(caller)?),
        CallerCommand::Participant { id } => to_json(&participants.get_participant(caller, id)?),
        CallerCommand::Stats { id } => to_json(&participants.stats(caller, id)?),
        CallerCommand::SetParticipant {
            id,
            bio,
            clear_bio,
            active,
        } => {
            let update = ParticipantUpdate {
                bio: if clear_bio { Some(None) } else { bio.map(Some) },
                active,
            };
            to_json(&participants.update_participant(caller, id, update)?)
        }
        CallerCommand::SetAdmin {
            id,
            reserved_area,
            note,
            clear_note,
        } => {
            let update = AdminUpdate {
                reserved_area_access: reserved_area,
                note: if clear_note { Some(None) } else { note.map(Some) },
            };
            to_json(&admins.update_admin(caller, id, update)?)
        }
        CallerCommand::Admins => to_json(&admins.list_admins(caller)?),
        CallerCommand::Me => own_profile(&participants, &admins, caller),
    }
}

/// The caller's own profile, whichever kind it holds.
fn own_profile<P, A, Q>(
    participants: &ParticipantService<P, A>,
    admins: &AdminProfileService<Q>,
    caller: Caller,
) -> Result<Value, CliError>
where
    P: ProfileRepository,
    A: AttendanceRepository,
    Q: ProfileRepository,
{
    match participants.me(caller) {
        Ok(view) => to_json(&view),
        Err(ServiceError::NotFound { .. }) => to_json(&admins.me(caller)?),
        Err(err) => Err(err.into()),
    }
}

/// Registration needs an administrator caller. An empty database accepts
/// one caller-less administrator registration so it can be bootstrapped.
fn ensure_may_register(
    conn: &Connection,
    caller: Option<Caller>,
    role: Role,
) -> Result<(), CliError> {
    match caller {
        Some(caller) => {
            caller
                .authorize(Resource::Identity, Operation::Create)
                .map_err(ServiceError::from)?;
            Ok(())
        }
        None if role != Role::Admin => Err(CliError::MissingCaller),
        None => {
            if SqliteIdentityRepository::new(conn)
                .list_identities(None)?
                .is_empty()
            {
                info!("event=identity_bootstrap module=cli status=ok");
                Ok(())
            } else {
                Err(CliError::MissingCaller)
            }
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    serde_json::to_value(value).map_err(CliError::Output)
}
