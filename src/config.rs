#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;

use crate::quota::CredentialSource;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const API_KEY_PREFIX: &str = "YOUTUBE_API_KEY";
pub const DEFAULT_QUOTA_LIMIT: u64 = 10_000;
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_DATABASE_PATH: &str = "youtube.db";

/// Tunables for the collector, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub quota_limit: u64,
    pub rate_limit_delay: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub api_base: String,
    pub database_path: PathBuf,
    pub env_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quota_limit: DEFAULT_QUOTA_LIMIT,
            rate_limit_delay: Duration::from_millis(DEFAULT_RATE_LIMIT_DELAY_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            api_base: DEFAULT_API_BASE.to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            env_path: PathBuf::from(DEFAULT_ENV_PATH),
        }
    }
}

/// Values supplied on the command line; each one beats env and file values.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub quota_limit: Option<u64>,
    pub max_retries: Option<u32>,
    pub api_base: Option<String>,
    pub database_path: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(&env_path)?;
    build_settings_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<Settings> {
    let parsed = |key: &str| lookup_value(key, file_vars, &env_lookup);
    let number = |key: &str| parsed(key).and_then(|value| value.parse::<u64>().ok());

    let quota_limit = overrides
        .quota_limit
        .or_else(|| number("YT_QUOTA_LIMIT"))
        .unwrap_or(DEFAULT_QUOTA_LIMIT);
    if quota_limit == 0 {
        bail!("quota limit must be greater than zero");
    }
    let max_retries = overrides
        .max_retries
        .or_else(|| parsed("YT_MAX_RETRIES").and_then(|value| value.parse::<u32>().ok()))
        .unwrap_or(DEFAULT_MAX_RETRIES);
    if max_retries == 0 {
        bail!("max retries must be at least 1");
    }
    let rate_limit_delay = number("YT_RATE_LIMIT_DELAY_MS").unwrap_or(DEFAULT_RATE_LIMIT_DELAY_MS);
    let retry_delay = number("YT_RETRY_DELAY_MS").unwrap_or(DEFAULT_RETRY_DELAY_MS);
    let request_timeout =
        number("YT_REQUEST_TIMEOUT_SECS").unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    let api_base = overrides
        .api_base
        .and_then(|value| {
            let trimmed = value.trim().trim_end_matches('/').to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        })
        .or_else(|| parsed("YT_API_BASE").map(|value| value.trim_end_matches('/').to_string()))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let database_path = overrides
        .database_path
        .or_else(|| parsed("YT_DATABASE_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

    Ok(Settings {
        quota_limit,
        rate_limit_delay: Duration::from_millis(rate_limit_delay),
        max_retries,
        retry_delay: Duration::from_millis(retry_delay),
        request_timeout: Duration::from_secs(request_timeout.max(1)),
        api_base,
        database_path,
        env_path: overrides
            .env_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_PATH)),
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| {
        file_vars
            .get(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

/// `YOUTUBE_API_KEY1`, `YOUTUBE_API_KEY2`, ...
pub fn credential_key_name(index: usize) -> String {
    format!("{API_KEY_PREFIX}{index}")
}

/// Resolves numbered API keys from the process environment, falling back to
/// the dotenv file. The file is re-read on every probe so keys appended while
/// a long run is in progress become available to rotation.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    env_path: PathBuf,
}

impl EnvCredentials {
    pub fn new(env_path: impl Into<PathBuf>) -> Self {
        Self {
            env_path: env_path.into(),
        }
    }
}

impl CredentialSource for EnvCredentials {
    fn credential(&self, index: usize) -> Option<String> {
        let key = credential_key_name(index);
        let file_vars = match read_env_file(&self.env_path) {
            Ok(vars) => vars,
            Err(err) => {
                warn!(path = %self.env_path.display(), "could not read env file: {err:#}");
                HashMap::new()
            }
        };
        lookup_value(&key, &file_vars, &env_var_string)
    }
}
