//! Command loop run on the worker thread

use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ApiCommand, ApiEvent, ApiResult, RequestId};
use crate::client::Clients;

/// Execute commands one at a time until either channel closes
pub async fn run(
    clients: Clients,
    mut commands: mpsc::UnboundedReceiver<(RequestId, ApiCommand)>,
    events: mpsc::UnboundedSender<ApiEvent>,
) {
    info!("API worker running");

    while let Some((id, command)) = commands.recv().await {
        let name = command.name();
        let started = Instant::now();

        let result = execute(&clients, command).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if result.is_ok() {
            debug!(id, command = name, elapsed_ms, "Command completed");
        } else {
            warn!(id, command = name, elapsed_ms, "Command failed");
        }

        if events.send(ApiEvent { id, result }).is_err() {
            debug!(id, "Event receiver dropped, stopping worker");
            break;
        }
    }

    info!("API worker finished");
}

/// Run a single command against the clients
pub async fn execute(clients: &Clients, command: ApiCommand) -> ApiResult {
    match command {
        ApiCommand::FetchUsers => ApiResult::Users(clients.validation.fetch_users().await),
        ApiCommand::LookupUser { username } => {
            ApiResult::UserId(clients.validation.lookup_user_id(&username).await)
        }
        ApiCommand::FetchTask {
            project_id,
            task_id,
        } => ApiResult::Task(clients.tasking.fetch_task(project_id, task_id).await),
        ApiCommand::Submit(payload) => {
            ApiResult::Submitted(clients.validation.submit_validation(&payload).await)
        }
        ApiCommand::Upload(plan) => ApiResult::Uploaded(clients.validation.upload_plan(plan).await),
        ApiCommand::CheckUpdate => ApiResult::Update(clients.updates.check().await),
    }
}
