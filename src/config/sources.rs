use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "VERDICT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/verdict.toml";
const ENV_PREFIX: &str = "VERDICT";
const ENV_SEPARATOR: &str = "__";

/// Read `.env`, then layer `config/verdict.toml` (or the file named by
/// `VERDICT_CONFIG`) and `VERDICT__*` variables over the struct defaults
pub fn load() -> Result<Config, ConfigError> {
    // A missing .env is normal
    let _ = dotenvy::dotenv();

    load_from_sources(config_path(env::var(CONFIG_ENV_VAR).ok()))
}

/// `VERDICT_CONFIG` when set and non-blank, otherwise `config/verdict.toml`
fn config_path(from_env: Option<String>) -> PathBuf {
    from_env
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Layer one TOML file, if present, and `VERDICT__*` variables over the defaults
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!(path = %config_path.display(), "Loading verdict configuration");
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            path = %config_path.display(),
            "No configuration file, using defaults and VERDICT__* overrides"
        );
    }

    // VERDICT__BACKEND__BASE_URL -> backend.base_url
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
