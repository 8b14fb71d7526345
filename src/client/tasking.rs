use tracing::info;

use crate::http::{Endpoint, HttpClient};
use crate::models::TaskInfo;
use crate::outcome::ApiError;
use crate::parsers;

/// Client for the Tasking Manager API
#[derive(Debug, Clone)]
pub struct TaskingManagerClient {
    http: HttpClient,
    base_url: String,
}

impl TaskingManagerClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Task status and mapper for one task
    pub async fn fetch_task(&self, project_id: i64, task_id: i64) -> Result<TaskInfo, ApiError> {
        let endpoint = Endpoint::new(
            &self.base_url,
            format!("/projects/{}/tasks/{}/", project_id, task_id),
        );

        let body = self.http.get(&endpoint, &[]).await.into_result()?;
        let task = parsers::parse_task_info(&body, project_id, task_id)?;

        info!(
            project_id,
            task_id,
            status = %task.status,
            mapper = ?task.mapper_username,
            "Fetched task"
        );
        Ok(task)
    }
}
