//! Network worker
//!
//! Remote calls run on a dedicated thread hosting a current-thread Tokio
//! runtime, so the caller's thread never blocks on the network. Commands go
//! in on one channel; results come back on a single-consumer channel, each
//! tagged with the [`RequestId`] returned by [`ApiWorker::send`]. A caller
//! that no longer cares about a request simply ignores its ID.

pub mod runner;

use std::io;
use std::thread::JoinHandle;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::client::Clients;
use crate::models::{
    SubmissionPayload, SubmissionReceipt, TaskInfo, UpdateStatus, UploadPlan, UserRecord,
};
use crate::outcome::ApiError;
use crate::session::ValidationSession;

pub type RequestId = u64;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to start API worker: {0}")]
    Spawn(#[from] io::Error),

    #[error("API worker has stopped")]
    Stopped,
}

/// A remote call to run on the worker
#[derive(Debug, Clone)]
pub enum ApiCommand {
    FetchUsers,
    LookupUser { username: String },
    FetchTask { project_id: i64, task_id: i64 },
    Submit(SubmissionPayload),
    Upload(UploadPlan),
    CheckUpdate,
}

impl ApiCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ApiCommand::FetchUsers => "fetch_users",
            ApiCommand::LookupUser { .. } => "lookup_user",
            ApiCommand::FetchTask { .. } => "fetch_task",
            ApiCommand::Submit(_) => "submit",
            ApiCommand::Upload(_) => "upload",
            ApiCommand::CheckUpdate => "check_update",
        }
    }
}

/// Outcome of one [`ApiCommand`]
#[derive(Debug, Clone)]
pub enum ApiResult {
    Users(Result<Vec<UserRecord>, ApiError>),
    UserId(Result<i64, ApiError>),
    Task(Result<TaskInfo, ApiError>),
    Submitted(Result<SubmissionReceipt, ApiError>),
    Uploaded(Result<String, ApiError>),
    Update(Result<UpdateStatus, ApiError>),
}

impl ApiResult {
    pub fn is_ok(&self) -> bool {
        match self {
            ApiResult::Users(r) => r.is_ok(),
            ApiResult::UserId(r) => r.is_ok(),
            ApiResult::Task(r) => r.is_ok(),
            ApiResult::Submitted(r) => r.is_ok(),
            ApiResult::Uploaded(r) => r.is_ok(),
            ApiResult::Update(r) => r.is_ok(),
        }
    }

    /// Hand a result to the session that asked for it.
    ///
    /// Returns `false` for results the session has no use for (user ID
    /// lookups, update checks, failed or late task lookups).
    pub fn apply_to(self, session: &mut ValidationSession) -> bool {
        match self {
            ApiResult::Users(result) => session.finish_refresh(result),
            ApiResult::Submitted(result) => session.finish_submission(result),
            ApiResult::Uploaded(result) => session.finish_upload(result),
            ApiResult::Task(Ok(task)) => return session.apply_task_info(&task),
            ApiResult::Task(Err(_)) | ApiResult::UserId(_) | ApiResult::Update(_) => return false,
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct ApiEvent {
    pub id: RequestId,
    pub result: ApiResult,
}

/// Handle to the worker thread
pub struct ApiWorker {
    commands: Option<mpsc::UnboundedSender<(RequestId, ApiCommand)>>,
    next_id: RequestId,
    thread: Option<JoinHandle<()>>,
}

impl ApiWorker {
    /// Start the worker thread. Results arrive on the returned receiver.
    pub fn spawn(clients: Clients) -> Result<(Self, mpsc::UnboundedReceiver<ApiEvent>), WorkerError> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let thread = std::thread::Builder::new()
            .name("verdict-api".to_string())
            .spawn(move || runtime.block_on(runner::run(clients, command_rx, event_tx)))?;

        info!("API worker thread started");

        Ok((
            Self {
                commands: Some(command_tx),
                next_id: 1,
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    /// Queue a command; its result will carry the returned ID
    pub fn send(&mut self, command: ApiCommand) -> Result<RequestId, WorkerError> {
        let id = self.next_id;
        let sender = self.commands.as_ref().ok_or(WorkerError::Stopped)?;

        debug!(id, command = command.name(), "Queueing command");
        sender.send((id, command)).map_err(|_| WorkerError::Stopped)?;

        self.next_id += 1;
        Ok(id)
    }

    /// Stop accepting commands and wait for the in-flight call to finish
    pub fn shutdown(mut self) {
        self.commands.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("API worker thread panicked");
            }
        }
        info!("API worker thread stopped");
    }
}

impl Drop for ApiWorker {
    fn drop(&mut self) {
        // Closing the channel lets the thread exit after its current call
        self.commands.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN_ID;
    use crate::session::SessionState;

    #[test]
    fn test_command_names() {
        assert_eq!(ApiCommand::FetchUsers.name(), "fetch_users");
        assert_eq!(
            ApiCommand::FetchTask { project_id: 1, task_id: 2 }.name(),
            "fetch_task"
        );
    }

    #[test]
    fn test_apply_users_result() {
        let mut session = ValidationSession::new("val");
        session.begin_refresh().unwrap();

        let result = ApiResult::Users(Ok(vec![UserRecord {
            osm_username: "ana".into(),
            settlement: String::new(),
            user_id: UNKNOWN_ID,
        }]));
        assert!(result.is_ok());
        assert!(result.apply_to(&mut session));
        assert_eq!(session.state(), SessionState::UsersLoaded);
    }

    #[test]
    fn test_apply_skips_task_result_after_export() {
        let mut session = ValidationSession::new("val");
        session.begin_refresh().unwrap();
        session.finish_refresh(Ok(Vec::new()));
        session.begin_isolation().unwrap();
        session.finish_isolation(Ok(())).unwrap();
        session.set_mapper_username("ana");
        session.set_total_buildings(3);
        session.begin_submission().unwrap();
        session.finish_submission(Ok(SubmissionReceipt {
            log_id: 5,
            mapper_name: "ana".into(),
            validator_name: "val".into(),
        }));
        session.export().unwrap();

        let result = ApiResult::Task(Ok(TaskInfo {
            project_id: 1,
            task_id: 2,
            mapper_username: Some("eve".into()),
            status: "MAPPED".into(),
        }));
        assert!(!result.apply_to(&mut session));
        assert_eq!(session.payload().mapper_username, "ana");
        assert_eq!(session.payload().task_id, "");
    }

    #[test]
    fn test_apply_ignores_update_results() {
        let mut session = ValidationSession::new("val");
        let result = ApiResult::Update(Err(ApiError::Transport("offline".into())));
        assert!(!result.is_ok());
        assert!(!result.apply_to(&mut session));
        assert_eq!(session.state(), SessionState::Idle);
    }
}
