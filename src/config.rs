use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE: &str = "swimwatch.json";
pub const API_URL_ENV: &str = "SWIMWATCH_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub health_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Where the latest live frame is written, if anywhere
    pub frame_output: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            health_interval_secs: DEFAULT_HEALTH_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            frame_output: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn normalize_api_url(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Load the config from `path`, or `swimwatch.json` in the working directory.
///
/// A missing file yields defaults. A file that does not parse is copied to
/// `*.json.bak` and defaults are used instead.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    match serde_json::from_str::<AppConfig>(&raw) {
        Ok(mut config) => {
            normalize_config(&mut config);
            tracing::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(e) => {
            let backup = path.with_extension("json.bak");
            tracing::warn!(
                "Config {} is invalid ({}), backing up to {} and using defaults",
                path.display(),
                e,
                backup.display()
            );
            let _ = fs::copy(&path, backup);
            Ok(AppConfig::default())
        }
    }
}

/// Apply overrides in precedence order: environment, then explicit value.
pub fn apply_overrides(config: &mut AppConfig, env_api_url: Option<String>, cli_api_url: Option<String>) {
    if let Some(url) = env_api_url.filter(|u| !u.trim().is_empty()) {
        config.api_url = normalize_api_url(&url);
    }
    if let Some(url) = cli_api_url.filter(|u| !u.trim().is_empty()) {
        config.api_url = normalize_api_url(&url);
    }
}

pub fn env_api_url() -> Option<String> {
    std::env::var(API_URL_ENV).ok()
}

fn normalize_config(config: &mut AppConfig) {
    config.api_url = normalize_api_url(&config.api_url);
    if config.health_interval_secs == 0 {
        config.health_interval_secs = DEFAULT_HEALTH_INTERVAL_SECS;
    }
    if config.request_timeout_secs == 0 {
        config.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
    }
}
