//! Wires the infrastructure for one invocation and runs the chosen command.

use std::sync::Arc;

use anyhow::Context;
use coordination::{
    Acceptance, Authorizer, CoordinationError, Matter, MeetingRequest, NotificationHook,
    PipelineCatalog, Timestamp,
};
use engine::{retry_on_conflict, CoordinationEngine};
use platform::{AllowAllAuthorizer, HttpPlatformClient, TracingNotifier};
use serde::Serialize;
use serde_json::json;
use store::SqliteStore;

use crate::config::{self, MatterflowConfig};
use crate::{telemetry, Cli, Command};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = config::resolve_path(cli.config);
    let config = config::load_from_path(&path)?;
    let _telemetry = telemetry::init(&config.telemetry)?;
    tracing::debug!(config = %path.display(), "configuration loaded");

    let store = Arc::new(
        SqliteStore::open(&config.database.path, config.busy_timeout())
            .with_context(|| format!("failed to open {}", config.database.path.display()))?,
    );

    if matches!(cli.command, Command::Init) {
        seed(&store, &config).await?;
        return print(&json!({
            "database": config.database.path,
            "schema_version": store.schema_version().await?,
            "pipelines": config.catalog.pipelines.len(),
            "templates": config.catalog.templates.len(),
        }));
    }
    if !config.catalog.pipelines.is_empty() {
        seed(&store, &config).await?;
    }

    let (authorizer, notifier) = platform_ports(&config)?;
    let engine = CoordinationEngine::new(
        store.clone(),
        store.clone(),
        authorizer,
        notifier,
        config.engine_settings(),
    );
    let outcome = dispatch(cli.command, &engine, &store).await;
    engine.drain_notifications().await;
    outcome
}

async fn seed(store: &SqliteStore, config: &MatterflowConfig) -> anyhow::Result<()> {
    let pipelines = config.pipelines()?;
    store
        .seed_catalog(&pipelines, config.templates())
        .await
        .context("failed to seed the catalog")
}

fn platform_ports(
    config: &MatterflowConfig,
) -> anyhow::Result<(Arc<dyn Authorizer>, Arc<dyn NotificationHook>)> {
    match config.platform_settings()? {
        Some(settings) => {
            let client = Arc::new(HttpPlatformClient::new(settings)?);
            let authorizer: Arc<dyn Authorizer> = client.clone();
            let notifier: Arc<dyn NotificationHook> = client;
            Ok((authorizer, notifier))
        }
        None => {
            tracing::debug!("no platform configured; allowing all actors");
            let authorizer: Arc<dyn Authorizer> = Arc::new(AllowAllAuthorizer);
            let notifier: Arc<dyn NotificationHook> = Arc::new(TracingNotifier);
            Ok((authorizer, notifier))
        }
    }
}

async fn dispatch(
    command: Command,
    engine: &CoordinationEngine,
    store: &SqliteStore,
) -> anyhow::Result<()> {
    let retry = engine.settings().retry;
    match command {
        Command::Init => Ok(()),
        Command::Intake { firm, pipeline } => {
            if store.pipeline(&pipeline).await?.is_none() {
                return Err(CoordinationError::configuration(format!(
                    "pipeline '{pipeline}' is not in the catalog"
                ))
                .into());
            }
            let matter = Matter::from_intake(firm, pipeline, Timestamp::now());
            store.insert_matter(&matter).await?;
            tracing::info!(matter_id = %matter.id, "matter intaken");
            print(&matter)
        }
        Command::Transition {
            matter,
            stage,
            acting,
        } => {
            let updated = retry_on_conflict(&retry, || {
                engine.transition(matter, &stage, &acting.actor)
            })
            .await?;
            print(&updated)
        }
        Command::Progress { matter } => {
            let progress = engine.progress(matter).await?;
            print(&json!({ "matter_id": matter, "progress": progress }))
        }
        Command::Materialize {
            matter,
            stage,
            acting,
        } => {
            let created = retry_on_conflict(&retry, || {
                engine.materialize_for_stage(matter, &stage, &acting.actor)
            })
            .await?;
            print(&created)
        }
        Command::TaskStatus {
            task,
            status,
            acting,
        } => {
            let updated = retry_on_conflict(&retry, || {
                engine.update_task_status(task, status, &acting.actor)
            })
            .await?;
            print(&updated)
        }
        Command::RequestMeeting {
            matter,
            internal_party,
            external_party,
            kind,
            start,
            location,
            acting,
        } => {
            let request = MeetingRequest {
                internal_party,
                external_party,
                kind,
                proposed_start: start,
                location,
            };
            let meeting = retry_on_conflict(&retry, || {
                engine.request_meeting(matter, request.clone(), &acting.actor)
            })
            .await?;
            print(&meeting)
        }
        Command::AcceptMeeting {
            meeting,
            start,
            video_link,
            duration_minutes,
            acting,
        } => {
            let acceptance = Acceptance {
                confirmed_start: start,
                video_link,
                duration_minutes,
            };
            let accepted = retry_on_conflict(&retry, || {
                engine.accept_meeting(meeting, acceptance.clone(), &acting.actor)
            })
            .await?;
            print(&accepted)
        }
        Command::RescheduleMeeting {
            meeting,
            start,
            note,
            acting,
        } => {
            let rescheduled = retry_on_conflict(&retry, || {
                engine.reschedule_meeting(meeting, start, &note, &acting.actor)
            })
            .await?;
            print(&rescheduled)
        }
        Command::CancelMeeting { meeting, acting } => {
            let cancelled = retry_on_conflict(&retry, || {
                engine.cancel_meeting(meeting, &acting.actor)
            })
            .await?;
            print(&cancelled)
        }
        Command::CompleteMeeting { meeting, acting } => {
            let completed = retry_on_conflict(&retry, || {
                engine.complete_meeting(meeting, &acting.actor)
            })
            .await?;
            print(&completed)
        }
        Command::Assign {
            matter,
            role,
            user,
            acting,
        } => {
            let updated = retry_on_conflict(&retry, || {
                engine.assign(matter, role, user.clone(), &acting.actor)
            })
            .await?;
            print(&updated)
        }
        Command::Assignee { matter, role } => {
            let assignee = engine.current_assignee(matter, role).await?;
            print(&json!({ "matter_id": matter, "role": role, "assignee": assignee }))
        }
        Command::Close { matter, acting } => {
            let closed = retry_on_conflict(&retry, || {
                engine.close_matter(matter, &acting.actor)
            })
            .await?;
            print(&closed)
        }
        Command::Timeline { matter } => print(&engine.timeline(matter).await?),
    }
}

fn print<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
