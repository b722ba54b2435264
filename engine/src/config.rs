use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs};

use recover_types::SecretString;
use thiserror::Error;

use crate::flow::FlowSettings;

pub const CONFIG_PATH_ENV: &str = "RECOVER_CONFIG";
pub const API_URL_ENV: &str = "RECOVER_API_URL";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

#[derive(Debug, Default, Deserialize)]
pub struct RecoverConfig {
    pub api: Option<ApiConfig>,
    pub flow: Option<FlowConfig>,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Permit plain `http://` base URLs (local development servers).
    #[serde(default)]
    pub allow_insecure_http: bool,
    /// Bearer token sent with every request. Supports `${ENV_VAR}`.
    pub auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FlowConfig {
    pub cooldown_secs: Option<u32>,
    pub min_password_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// Effective retry tunables after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryValues {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

/// Replace `${VAR}` references with the variable's value (empty if unset).
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + end_rel];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + end_rel + 1..];
    }

    out.push_str(rest);
    out
}

impl RecoverConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read config");
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Ok(Some(config))
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to parse config");
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Base URL of the recovery API. `RECOVER_API_URL` wins over the file.
    #[must_use]
    pub fn base_url(&self) -> Option<String> {
        self.base_url_with(env::var(API_URL_ENV).ok())
    }

    fn base_url_with(&self, env_override: Option<String>) -> Option<String> {
        env_override
            .or_else(|| {
                self.api
                    .as_ref()
                    .and_then(|api| api.base_url.as_deref())
                    .map(expand_env_vars)
            })
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
    }

    #[must_use]
    pub fn timeout_secs(&self) -> u64 {
        self.api
            .as_ref()
            .and_then(|api| api.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    #[must_use]
    pub fn allow_insecure_http(&self) -> bool {
        self.api.as_ref().is_some_and(|api| api.allow_insecure_http)
    }

    #[must_use]
    pub fn auth_token(&self) -> Option<SecretString> {
        let raw = self.api.as_ref()?.auth_token.as_deref()?;
        let token = expand_env_vars(raw);
        let token = token.trim();
        (!token.is_empty()).then(|| SecretString::new(token.to_string()))
    }

    #[must_use]
    pub fn flow_settings(&self) -> FlowSettings {
        let defaults = FlowSettings::default();
        let flow = self.flow.as_ref();
        FlowSettings {
            cooldown_secs: flow
                .and_then(|f| f.cooldown_secs)
                .unwrap_or(defaults.cooldown_secs),
            min_password_len: flow
                .and_then(|f| f.min_password_len)
                .unwrap_or(defaults.min_password_len)
                .max(1),
        }
    }

    #[must_use]
    pub fn retry(&self) -> RetryValues {
        let retry = self.retry.as_ref();
        let initial_delay_ms = retry
            .and_then(|r| r.initial_delay_ms)
            .unwrap_or(DEFAULT_INITIAL_DELAY_MS);
        RetryValues {
            max_retries: retry
                .and_then(|r| r.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            initial_delay_ms,
            max_delay_ms: retry
                .and_then(|r| r.max_delay_ms)
                .unwrap_or(DEFAULT_MAX_DELAY_MS)
                .max(initial_delay_ms),
        }
    }
}

/// `$RECOVER_CONFIG`, else `~/.recover/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".recover").join("config.toml"))
}
