use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::Limit;
use crate::error::SearchError;

pub const API_URL_ENV: &str = "FILE_SEARCH_API_URL";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const LOCAL_CONFIG_FILE: &str = "job-file-search.json";

/// Strips surrounding whitespace and every trailing slash.
pub fn normalize_base_url(raw: &str) -> &str {
    raw.trim().trim_end_matches('/')
}

/// Base URL of the file search API, always without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ApiEndpoint(String);

impl ApiEndpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for ApiEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ApiEndpoint {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_base_url(value);
        if normalized.is_empty() {
            return Err(SearchError::InvalidEndpoint(value.to_string()));
        }
        let url = reqwest::Url::parse(normalized)
            .map_err(|err| SearchError::InvalidEndpoint(format!("{value}: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SearchError::InvalidEndpoint(format!(
                "{value}: scheme must be http or https"
            )));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: ApiEndpoint,
    pub timeout: Duration,
    pub download_dir: Utf8PathBuf,
    pub default_limit: Limit,
}

/// Values that outrank the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub env_api_url: Option<String>,
    pub cli_api_url: Option<String>,
}

impl ConfigOverrides {
    pub fn from_env(cli_api_url: Option<String>) -> Self {
        Self {
            env_api_url: std::env::var(API_URL_ENV).ok(),
            cli_api_url,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SearchError> {
        let config = match path {
            Some(path) => Self::read(PathBuf::from(path))?,
            None => match Self::implicit_path() {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "loading config");
                    Self::read(path)?
                }
                None => Config::default(),
            },
        };
        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SearchError> {
        let raw_url = overrides
            .cli_api_url
            .or_else(|| overrides.env_api_url.filter(|url| !url.trim().is_empty()))
            .or(config.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let endpoint = raw_url.parse::<ApiEndpoint>()?;

        let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let download_dir = Utf8PathBuf::from(config.download_dir.unwrap_or_else(|| ".".to_string()));
        let default_limit = config
            .limit
            .map(Limit::new)
            .transpose()?
            .unwrap_or_default();

        Ok(ResolvedConfig {
            endpoint,
            timeout,
            download_dir,
            default_limit,
        })
    }

    fn read(path: PathBuf) -> Result<Config, SearchError> {
        let content = fs::read_to_string(&path).map_err(|_| SearchError::ConfigRead(path.clone()))?;
        serde_json::from_str(&content).map_err(|err| SearchError::ConfigParse(err.to_string()))
    }

    fn implicit_path() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("", "", "job-file-search")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|path| path.exists())
    }
}
