use super::models::Config;
use crate::version::VersionTag;
use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is not a valid http(s) URL: '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("updates.repository must look like 'org/repo', got '{0}'")]
    InvalidRepository(String),

    #[error("updates.current_version '{value}' is not a version: {reason}")]
    InvalidCurrentVersion { value: String, reason: String },

    #[error("http.user_agent must not be empty")]
    EmptyUserAgent,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_urls(config)?;
    validate_timeouts(config)?;
    validate_updates(config)?;
    Ok(())
}

fn validate_urls(config: &Config) -> Result<(), ValidationError> {
    let urls = [
        ("backend.base_url", &config.backend.base_url),
        ("tasking_manager.base_url", &config.tasking_manager.base_url),
        ("updates.api_base", &config.updates.api_base),
    ];

    for (field, value) in urls {
        let valid = Url::parse(value)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);

        if !valid {
            return Err(ValidationError::InvalidUrl {
                field,
                value: value.clone(),
            });
        }
    }

    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("http.connect_timeout", config.http.connect_timeout),
        ("http.read_timeout", config.http.read_timeout),
        ("http.upload_timeout", config.http.upload_timeout),
    ];

    for (field, timeout) in timeouts {
        if timeout.is_zero() {
            return Err(ValidationError::ZeroTimeout { field });
        }
    }

    if config.http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    Ok(())
}

fn validate_updates(config: &Config) -> Result<(), ValidationError> {
    let repository = &config.updates.repository;
    let well_formed = repository
        .split_once('/')
        .is_some_and(|(org, repo)| !org.is_empty() && !repo.is_empty() && !repo.contains('/'));

    if !well_formed {
        return Err(ValidationError::InvalidRepository(repository.clone()));
    }

    config
        .updates
        .current_version
        .parse::<VersionTag>()
        .map_err(|e| ValidationError::InvalidCurrentVersion {
            value: config.updates.current_version.clone(),
            reason: e.to_string(),
        })?;

    Ok(())
}
