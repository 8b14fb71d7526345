//! Subcommand handlers
//!
//! Every remote call goes through the API worker; the handlers only wait on
//! the event channel for the result tagged with their request ID.

use std::error::Error;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use verdict::client::Clients;
use verdict::http::FileSource;
use verdict::models::{TaskRef, UpdateStatus, UploadPlan};
use verdict::parsers::{parse_changeset_comment, parse_task_url};
use verdict::session::{SessionState, ValidationSession};
use verdict::worker::{ApiCommand, ApiEvent, ApiResult, ApiWorker, WorkerError};

type CommandResult = Result<(), Box<dyn Error + Send + Sync>>;

pub struct Runner {
    worker: ApiWorker,
    events: mpsc::UnboundedReceiver<ApiEvent>,
}

impl Runner {
    pub fn start(clients: Clients) -> Result<Self, WorkerError> {
        let (worker, events) = ApiWorker::spawn(clients)?;
        Ok(Self { worker, events })
    }

    /// Send a command and wait for its own result
    async fn call(&mut self, command: ApiCommand) -> Result<ApiResult, WorkerError> {
        let id = self.worker.send(command)?;

        while let Some(event) = self.events.recv().await {
            if event.id == id {
                return Ok(event.result);
            }
            debug!(id = event.id, "Dropping stale result");
        }

        Err(WorkerError::Stopped)
    }

    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

fn unexpected(result: ApiResult) -> Box<dyn Error + Send + Sync> {
    format!("unexpected worker result: {:?}", result).into()
}

pub async fn users(runner: &mut Runner) -> CommandResult {
    let users = match runner.call(ApiCommand::FetchUsers).await? {
        ApiResult::Users(result) => result?,
        other => return Err(unexpected(other)),
    };

    for user in &users {
        println!("{}\t{}\t{}", user.osm_username, user.settlement, user.user_id);
    }
    info!(count = users.len(), "Listed users");
    Ok(())
}

pub async fn lookup_user(runner: &mut Runner, args: crate::cli::LookupUserArgs) -> CommandResult {
    let command = ApiCommand::LookupUser {
        username: args.username.clone(),
    };
    match runner.call(command).await? {
        ApiResult::UserId(result) => println!("{}\t{}", args.username, result?),
        other => return Err(unexpected(other)),
    }
    Ok(())
}

pub async fn task(runner: &mut Runner, args: crate::cli::TaskArgs) -> CommandResult {
    let source = args.source;
    let task_ref = if let Some(url) = source.url {
        parse_task_url(&url).ok_or_else(|| format!("no project/task in URL '{}'", url))?
    } else if let Some(comment) = source.comment {
        parse_changeset_comment(&comment)
            .ok_or_else(|| format!("no #hotosm-project tag in '{}'", comment))?
    } else {
        TaskRef {
            project_id: source.project.ok_or("missing --project")?,
            task_id: args.task,
        }
    };

    let task_id = task_ref
        .task_id
        .ok_or_else(|| format!("project {} given without a task ID", task_ref.project_id))?;

    let command = ApiCommand::FetchTask {
        project_id: task_ref.project_id,
        task_id,
    };
    let task = match runner.call(command).await? {
        ApiResult::Task(result) => result?,
        other => return Err(unexpected(other)),
    };

    println!(
        "project {} task {}: {} (mapper: {})",
        task.project_id,
        task.task_id,
        task.status,
        task.mapper_username.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

pub async fn check_update(runner: &mut Runner) -> CommandResult {
    let status = match runner.call(ApiCommand::CheckUpdate).await? {
        ApiResult::Update(result) => result?,
        other => return Err(unexpected(other)),
    };

    match status {
        UpdateStatus::UpToDate { current, latest } => {
            println!("Up to date (running {}, latest {})", current, latest);
        }
        UpdateStatus::Available(release) => {
            println!("Update available: {} ({})", release.version, release.name);
            if let Some(url) = release.download_url {
                println!("Download: {}", url);
            }
            if !release.notes.is_empty() {
                println!("\n{}", release.notes);
            }
        }
    }
    Ok(())
}

/// Drive a full validation session: load users, fill the payload, submit,
/// then optionally upload the exported file.
pub async fn submit(runner: &mut Runner, args: crate::cli::SubmitArgs) -> CommandResult {
    let mut session = ValidationSession::new(&args.validator);

    session.begin_refresh()?;
    runner.call(ApiCommand::FetchUsers).await?.apply_to(&mut session);
    expect_state(&session, SessionState::UsersLoaded)?;

    let mapper = session
        .users()
        .iter()
        .find(|u| u.osm_username == args.mapper)
        .cloned();
    match mapper {
        Some(user) => session.select_mapper(&user),
        None => {
            warn!(mapper = %args.mapper, "Mapper not in user directory");
            session.set_mapper_username(&args.mapper);
        }
    }

    if let Some(source) = &args.task_source {
        let task_ref = parse_task_url(source).or_else(|| parse_changeset_comment(source));
        match task_ref {
            Some(TaskRef {
                project_id,
                task_id: Some(task_id),
            }) => {
                let result = runner
                    .call(ApiCommand::FetchTask {
                        project_id,
                        task_id,
                    })
                    .await?;
                if let ApiResult::Task(Err(e)) = &result {
                    warn!(error = %e, "Task lookup failed, keeping given values");
                }
                result.apply_to(&mut session);
            }
            _ => warn!(source = %source, "No task reference found"),
        }
    }

    if let Some(task_id) = &args.task_id {
        session.set_task_id(task_id);
    }
    if let Some(settlement) = &args.settlement {
        session.set_settlement(settlement);
    }
    if let Some(date) = &args.date {
        session.set_date(date)?;
    }
    session.set_total_buildings(args.total_buildings);
    for (error_type, count) in &args.errors {
        session.set_error_count(*error_type, *count);
    }
    session.set_status(args.status);
    session.set_comments(&args.comments);

    // There is no map layer here; isolation only checks the export exists
    session.begin_isolation()?;
    let isolation = match &args.file {
        Some(path) if !path.is_file() => Err(format!("{} is not a file", path.display())),
        _ => Ok(()),
    };
    session.finish_isolation(isolation)?;
    expect_state(&session, SessionState::Isolated)?;

    let payload = session.begin_submission()?;
    if let Some(message) = session.message() {
        warn!("{}", message);
    }

    runner
        .call(ApiCommand::Submit(payload))
        .await?
        .apply_to(&mut session);
    expect_state(&session, SessionState::Submitted)?;

    if let Some(receipt) = session.receipt() {
        println!(
            "Recorded validation log {} ({} validated by {})",
            receipt.log_id, receipt.mapper_name, receipt.validator_name
        );
    }

    if let Some(path) = args.file {
        let file_name = file_name(&path);
        let plan = session.prepare_upload(file_name, FileSource::Path(path))?;
        runner
            .call(ApiCommand::Upload(plan))
            .await?
            .apply_to(&mut session);

        match session.drive_url() {
            Some(url) => println!("Uploaded to {}", url),
            None => return Err(session_failure(&session, "upload failed")),
        }
    }

    session.export()?;
    Ok(())
}

pub async fn upload(runner: &mut Runner, args: crate::cli::UploadArgs) -> CommandResult {
    let plan = UploadPlan {
        log_id: args.log_id,
        mapper_username: args.mapper,
        validator_username: args.validator,
        mapper_user_id: None,
        validator_user_id: None,
        file_name: file_name(&args.file),
        file: FileSource::Path(args.file),
        task_id: args.task_id,
        settlement: args.settlement,
    };

    match runner.call(ApiCommand::Upload(plan)).await? {
        ApiResult::Uploaded(result) => println!("Uploaded to {}", result?),
        other => return Err(unexpected(other)),
    }
    Ok(())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export.osm".to_string())
}

fn expect_state(session: &ValidationSession, expected: SessionState) -> CommandResult {
    if session.state() == expected {
        Ok(())
    } else {
        Err(session_failure(session, "session did not advance"))
    }
}

fn session_failure(session: &ValidationSession, fallback: &str) -> Box<dyn Error + Send + Sync> {
    session.message().unwrap_or(fallback).to_string().into()
}
