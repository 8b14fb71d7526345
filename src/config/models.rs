use crate::http::HttpConfig;
use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub tasking_manager: TaskingManagerConfig,
    #[serde(default)]
    pub updates: UpdatesConfig,
    #[serde(default)]
    pub http: HttpSettings,
}

/// Validation backend (user directory, validation logs, uploads)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

/// Tasking Manager API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskingManagerConfig {
    #[serde(default = "default_tasking_manager_url")]
    pub base_url: String,
}

impl Default for TaskingManagerConfig {
    fn default() -> Self {
        Self {
            base_url: default_tasking_manager_url(),
        }
    }
}

fn default_tasking_manager_url() -> String {
    "https://tasking-manager-production-api.hotosm.org/api/v2".to_string()
}

/// Release feed used by the update check
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdatesConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// `org/repo`
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default = "default_current_version")]
    pub current_version: String,
    /// Extension of the release asset to offer for download
    #[serde(default = "default_asset_extension")]
    pub asset_extension: String,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            repository: default_repository(),
            current_version: default_current_version(),
            asset_extension: default_asset_extension(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_repository() -> String {
    "hotosm/validation-tools".to_string()
}

fn default_current_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_asset_extension() -> String {
    ".jar".to_string()
}

/// Transport settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    /// Applies to small JSON calls
    #[serde(default = "default_read_timeout")]
    pub read_timeout: HumanDuration,
    /// Applies to file uploads
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            upload_timeout: default_upload_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_read_timeout() -> HumanDuration {
    HumanDuration::from_secs(15)
}

fn default_upload_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_user_agent() -> String {
    HttpConfig::default().user_agent
}

impl From<&HttpSettings> for HttpConfig {
    fn from(settings: &HttpSettings) -> Self {
        HttpConfig {
            connect_timeout: settings.connect_timeout.as_duration(),
            read_timeout: settings.read_timeout.as_duration(),
            upload_timeout: settings.upload_timeout.as_duration(),
            user_agent: settings.user_agent.clone(),
        }
    }
}
