//! Matterflow CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: load `matterflow.toml` (or `--config` /
//!    `MATTERFLOW_CONFIG`) and validate it.
//! 2. **Wire observability**: `tracing-subscriber` with a JSON or pretty
//!    layer and, when configured, an OpenTelemetry OTLP exporter. Every span
//!    and event emitted by the workspace crates flows through it.
//! 3. **Construct infrastructure**: the SQLite store, the platform client or
//!    its local stand-ins, and the [`engine::CoordinationEngine`] over them.
//! 4. **Dispatch one command** and print its result as JSON on stdout.

mod commands;
mod config;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use coordination::{
    AssignmentRole, FirmId, MatterId, MeetingId, MeetingKind, PartyId, PipelineId, StageId,
    TaskId, TaskStatus, Timestamp, UserId,
};

#[derive(Debug, Parser)]
#[command(name = "matterflow", version, about = "Legal matter coordination engine")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, env = config::ENV_MATTERFLOW_CONFIG)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// The staff user performing a mutating command.
#[derive(Debug, Args)]
struct Acting {
    #[arg(long, env = "MATTERFLOW_ACTOR", value_parser = user_id)]
    actor: UserId,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or migrate the database and seed the catalog.
    Init,
    /// Record a newly intaken matter.
    Intake {
        #[arg(long, value_parser = firm_id)]
        firm: FirmId,
        #[arg(long, value_parser = pipeline_id)]
        pipeline: PipelineId,
    },
    /// Move a matter to a stage of its pipeline.
    Transition {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
        #[arg(value_parser = stage_id)]
        stage: StageId,
        #[command(flatten)]
        acting: Acting,
    },
    /// Show how far a matter is through its pipeline.
    Progress {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
    },
    /// Create the tasks a stage's templates call for.
    Materialize {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
        #[arg(value_parser = stage_id)]
        stage: StageId,
        #[command(flatten)]
        acting: Acting,
    },
    /// Set a task's status.
    TaskStatus {
        #[arg(value_parser = task_id)]
        task: TaskId,
        #[arg(value_parser = task_status)]
        status: TaskStatus,
        #[command(flatten)]
        acting: Acting,
    },
    /// Open a meeting negotiation on behalf of an external party.
    RequestMeeting {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
        #[arg(long, value_parser = user_id)]
        internal_party: UserId,
        #[arg(long, value_parser = party_id)]
        external_party: PartyId,
        #[arg(long, value_parser = meeting_kind)]
        kind: MeetingKind,
        /// Proposed start, RFC 3339.
        #[arg(long, value_parser = timestamp)]
        start: Timestamp,
        #[arg(long)]
        location: Option<String>,
        #[command(flatten)]
        acting: Acting,
    },
    /// Confirm a requested meeting.
    AcceptMeeting {
        #[arg(value_parser = meeting_id)]
        meeting: MeetingId,
        /// Confirmed start, RFC 3339. Defaults to the proposed start.
        #[arg(long, value_parser = timestamp)]
        start: Option<Timestamp>,
        #[arg(long)]
        video_link: Option<String>,
        #[arg(long)]
        duration_minutes: Option<i64>,
        #[command(flatten)]
        acting: Acting,
    },
    /// Counter-propose a new start for a meeting.
    RescheduleMeeting {
        #[arg(value_parser = meeting_id)]
        meeting: MeetingId,
        #[arg(long, value_parser = timestamp)]
        start: Timestamp,
        #[arg(long, default_value = "")]
        note: String,
        #[command(flatten)]
        acting: Acting,
    },
    CancelMeeting {
        #[arg(value_parser = meeting_id)]
        meeting: MeetingId,
        #[command(flatten)]
        acting: Acting,
    },
    /// Mark an accepted meeting as held.
    CompleteMeeting {
        #[arg(value_parser = meeting_id)]
        meeting: MeetingId,
        #[command(flatten)]
        acting: Acting,
    },
    /// Assign or, without `--user`, clear a role on a matter.
    Assign {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
        #[arg(long, value_parser = assignment_role)]
        role: AssignmentRole,
        #[arg(long, value_parser = user_id)]
        user: Option<UserId>,
        #[command(flatten)]
        acting: Acting,
    },
    /// Show who currently holds a role.
    Assignee {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
        #[arg(long, value_parser = assignment_role)]
        role: AssignmentRole,
    },
    Close {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
        #[command(flatten)]
        acting: Acting,
    },
    /// Print a matter's history, newest first.
    Timeline {
        #[arg(value_parser = matter_id)]
        matter: MatterId,
    },
}

// ---------------------------------------------------------------------------
// Argument parsers
// ---------------------------------------------------------------------------

fn parsed<T>(value: Option<T>, what: &str, raw: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("'{raw}' is not a valid {what}"))
}

fn matter_id(raw: &str) -> Result<MatterId, String> {
    parsed(MatterId::parse(raw), "matter id", raw)
}

fn task_id(raw: &str) -> Result<TaskId, String> {
    parsed(TaskId::parse(raw), "task id", raw)
}

fn meeting_id(raw: &str) -> Result<MeetingId, String> {
    parsed(MeetingId::parse(raw), "meeting id", raw)
}

fn user_id(raw: &str) -> Result<UserId, String> {
    parsed(UserId::new(raw), "user id", raw)
}

fn firm_id(raw: &str) -> Result<FirmId, String> {
    parsed(FirmId::new(raw), "firm id", raw)
}

fn party_id(raw: &str) -> Result<PartyId, String> {
    parsed(PartyId::new(raw), "party id", raw)
}

fn pipeline_id(raw: &str) -> Result<PipelineId, String> {
    parsed(PipelineId::new(raw), "pipeline id", raw)
}

fn stage_id(raw: &str) -> Result<StageId, String> {
    parsed(StageId::new(raw), "stage id", raw)
}

fn timestamp(raw: &str) -> Result<Timestamp, String> {
    parsed(Timestamp::parse_rfc3339(raw), "RFC 3339 timestamp", raw)
}

fn task_status(raw: &str) -> Result<TaskStatus, String> {
    parsed(TaskStatus::parse(raw), "task status", raw)
}

fn meeting_kind(raw: &str) -> Result<MeetingKind, String> {
    parsed(MeetingKind::parse(raw), "meeting kind", raw)
}

fn assignment_role(raw: &str) -> Result<AssignmentRole, String> {
    parsed(AssignmentRole::parse(raw), "role", raw)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn mutating_commands_take_the_actor() {
        let cli = Cli::try_parse_from([
            "matterflow",
            "transition",
            "6f1c3aa2-3c55-4a53-9f53-3ad3a7b0e7a1",
            "intake",
            "--actor",
            "cm-1",
        ])
        .unwrap();
        let Command::Transition { stage, acting, .. } = cli.command else {
            panic!("parsed {:?}", cli.command);
        };
        assert_eq!(stage.as_str(), "intake");
        assert_eq!(acting.actor.as_str(), "cm-1");
    }

    #[test]
    fn malformed_ids_are_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["matterflow", "timeline", "not-a-uuid"]).unwrap_err();
        assert!(err.to_string().contains("not a valid matter id"), "{err}");
    }

    #[test]
    fn assign_without_user_clears_the_role() {
        let cli = Cli::try_parse_from([
            "matterflow",
            "assign",
            "6f1c3aa2-3c55-4a53-9f53-3ad3a7b0e7a1",
            "--role",
            "case_manager",
            "--actor",
            "cm-1",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Assign { role: AssignmentRole::CaseManager, user: None, .. }
        ));
    }
}
