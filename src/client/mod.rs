//! Remote API clients
//!
//! Clients hold a shared [`HttpClient`] and their base URL, nothing else.
//! Each method runs one request chain (build, send, classify, parse) and
//! returns a typed result.

mod tasking;
mod updates;
mod validation;

pub use tasking::TaskingManagerClient;
pub use updates::UpdateChecker;
pub use validation::ValidationClient;

use std::sync::Arc;

use crate::config::Config;
use crate::http::{HttpClient, HttpConfig};
use crate::observability::Metrics;
use crate::outcome::ApiError;

/// The three clients, sharing one connection pool
#[derive(Debug, Clone)]
pub struct Clients {
    pub validation: ValidationClient,
    pub tasking: TaskingManagerClient,
    pub updates: UpdateChecker,
    pub metrics: Arc<Metrics>,
}

impl Clients {
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let http = HttpClient::new(HttpConfig::from(&config.http))?;

        let metrics = http.metrics();

        Ok(Self {
            validation: ValidationClient::new(http.clone(), &config.backend.base_url),
            tasking: TaskingManagerClient::new(http.clone(), &config.tasking_manager.base_url),
            updates: UpdateChecker::new(
                http,
                &config.updates.api_base,
                &config.updates.repository,
                &config.updates.current_version,
                &config.updates.asset_extension,
            ),
            metrics,
        })
    }
}
