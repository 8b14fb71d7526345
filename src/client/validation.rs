use tracing::{debug, info};

use crate::http::{Endpoint, HttpClient};
use crate::models::{SubmissionPayload, SubmissionReceipt, UploadPlan, UploadRequest, UserRecord};
use crate::outcome::ApiError;
use crate::parsers;

/// Client for the validation backend (user directory, logs, uploads)
#[derive(Debug, Clone)]
pub struct ValidationClient {
    http: HttpClient,
    base_url: String,
}

impl ValidationClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Active, non-manager users (`GET /users`)
    pub async fn fetch_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        let endpoint = Endpoint::new(&self.base_url, "/users")
            .query("exclude_managers", "true")
            .query("status", "Active");

        let body = self.http.get(&endpoint, &[]).await.into_result()?;
        let users = parsers::parse_user_list(&body)?;

        info!(count = users.len(), "Fetched user directory");
        Ok(users)
    }

    /// Resolve a username to its backend user ID (`GET /api/users`)
    pub async fn lookup_user_id(&self, username: &str) -> Result<i64, ApiError> {
        let endpoint = Endpoint::new(&self.base_url, "/api/users")
            .query("osm_username", username)
            .query("exclude_managers", "true");

        let body = match self.http.get(&endpoint, &[]).await.into_result() {
            Ok(body) => body,
            Err(e) if e.is_not_found() => {
                return Err(ApiError::BusinessRule(format!(
                    "no user_id for username '{}'",
                    username
                )));
            }
            Err(e) => return Err(e),
        };

        let user_id = parsers::parse_user_id(&body, username)?;
        debug!(username, user_id, "Resolved user ID");
        Ok(user_id)
    }

    /// Record a validation verdict (`POST /api/validation-log`)
    pub async fn submit_validation(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, ApiError> {
        let endpoint = Endpoint::new(&self.base_url, "/api/validation-log");
        let body = payload.to_json()?;

        let response = self.http.post_json(&endpoint, body, &[]).await.into_result()?;
        let receipt = parsers::parse_receipt(&response)?;

        info!(
            log_id = receipt.log_id,
            mapper = %payload.mapper_username,
            status = ?payload.status,
            "Validation log recorded"
        );
        Ok(receipt)
    }

    /// Upload an exported OSM file (`POST /api/upload-osm`), returning its drive URL
    pub async fn upload(&self, request: &UploadRequest) -> Result<String, ApiError> {
        let endpoint = Endpoint::new(&self.base_url, "/api/upload-osm");

        let response = self
            .http
            .post_multipart(&endpoint, request.to_form())
            .await
            .into_result()?;
        let url = parsers::parse_drive_url(&response)?;

        info!(log_id = request.validation_log_id, %url, "File uploaded");
        Ok(url)
    }

    /// Resolve any unknown user IDs, then upload
    pub async fn upload_plan(&self, plan: UploadPlan) -> Result<String, ApiError> {
        let mapper_user_id = match plan.mapper_user_id {
            Some(id) => id,
            None => self.lookup_user_id(&plan.mapper_username).await?,
        };
        let validator_user_id = match plan.validator_user_id {
            Some(id) => id,
            None => self.lookup_user_id(&plan.validator_username).await?,
        };

        let request = UploadRequest::new(
            plan.file_name,
            plan.file,
            plan.log_id,
            mapper_user_id,
            validator_user_id,
        )?
        .task_id(plan.task_id)
        .settlement(plan.settlement);

        self.upload(&request).await
    }
}
