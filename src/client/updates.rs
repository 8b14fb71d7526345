use tracing::info;

use crate::http::{Endpoint, HttpClient};
use crate::models::{ReleaseInfo, UpdateStatus};
use crate::outcome::ApiError;
use crate::parsers;
use crate::version;

/// Checks a GitHub-style release feed for a newer version
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    http: HttpClient,
    api_base: String,
    repository: String,
    current_version: String,
    asset_extension: String,
}

impl UpdateChecker {
    pub fn new(
        http: HttpClient,
        api_base: impl Into<String>,
        repository: impl Into<String>,
        current_version: impl Into<String>,
        asset_extension: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            repository: repository.into(),
            current_version: current_version.into(),
            asset_extension: asset_extension.into(),
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    /// `GET /repos/{org}/{repo}/releases/latest`
    pub async fn latest_release(&self) -> Result<ReleaseInfo, ApiError> {
        let endpoint = Endpoint::new(
            &self.api_base,
            format!("/repos/{}/releases/latest", self.repository),
        );

        let body = self.http.get(&endpoint, &[]).await.into_result()?;
        parsers::parse_release(&body, &self.asset_extension)
    }

    pub async fn check(&self) -> Result<UpdateStatus, ApiError> {
        let release = self.latest_release().await?;

        if version::is_newer(&release.version, &self.current_version) {
            info!(
                current = %self.current_version,
                latest = %release.version,
                "Update available"
            );
            Ok(UpdateStatus::Available(release))
        } else {
            info!(current = %self.current_version, "Up to date");
            Ok(UpdateStatus::UpToDate {
                current: self.current_version.clone(),
                latest: release.version,
            })
        }
    }
}
