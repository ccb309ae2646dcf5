//! eams.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::duration::parse_duration;
use crate::types::Target;

/// Environment variable that overrides `client.cookie`.
pub const COOKIE_ENV: &str = "EAMS_COOKIE";

pub const DEFAULT_BASE_URL: &str = "https://byyt.ecnu.edu.cn/course-selection-api/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while loading `eams.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid duration for `{field}`: {value:?}")]
    InvalidDuration { field: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EamsConfig {
    pub client: Option<ClientConfig>,
    pub robber: Option<RobberConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobberConfig {
    pub interval: Option<String>,
    pub max_retries: Option<u32>,
    pub poll_interval: Option<String>,
    pub poll_timeout: Option<String>,
    pub student_id: Option<i64>,
    pub turn_id: Option<i64>,
}

impl EamsConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EamsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every duration string up front so a typo fails at load time
    /// instead of in the middle of a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let client = self.client();
        client.timeout()?;
        let robber = self.robber();
        robber.interval()?;
        robber.poll_interval()?;
        robber.poll_timeout()?;
        Ok(())
    }

    pub fn client(&self) -> ClientConfig {
        self.client.clone().unwrap_or_default()
    }

    pub fn robber(&self) -> RobberConfig {
        self.robber.clone().unwrap_or_default()
    }

    /// Scaffold an eams.toml with one placeholder target.
    pub fn scaffold() -> Self {
        EamsConfig {
            client: Some(ClientConfig {
                base_url: Some(DEFAULT_BASE_URL.to_string()),
                timeout: Some("30s".to_string()),
                cookie: None,
                user_agent: None,
                headers: None,
            }),
            robber: Some(RobberConfig {
                interval: Some("1s".to_string()),
                max_retries: Some(DEFAULT_MAX_RETRIES),
                poll_interval: Some("200ms".to_string()),
                poll_timeout: Some("5s".to_string()),
                student_id: None,
                turn_id: None,
            }),
            targets: vec![Target::new(123456, 0, 1)],
        }
    }
}

impl ClientConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        duration_field("client.timeout", self.timeout.as_deref(), DEFAULT_TIMEOUT)
    }

    /// Cookie header value, preferring `EAMS_COOKIE` over the file.
    pub fn cookie(&self) -> Option<String> {
        self.cookie_with_env(std::env::var(COOKIE_ENV).ok())
    }

    fn cookie_with_env(&self, env: Option<String>) -> Option<String> {
        env.filter(|c| !c.trim().is_empty())
            .or_else(|| self.cookie.clone())
            .filter(|c| !c.trim().is_empty())
    }
}

impl RobberConfig {
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        duration_field("robber.interval", self.interval.as_deref(), DEFAULT_INTERVAL)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        duration_field(
            "robber.poll_interval",
            self.poll_interval.as_deref(),
            DEFAULT_POLL_INTERVAL,
        )
    }

    pub fn poll_timeout(&self) -> Result<Duration, ConfigError> {
        duration_field(
            "robber.poll_timeout",
            self.poll_timeout.as_deref(),
            DEFAULT_POLL_TIMEOUT,
        )
    }
}

fn duration_field(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => parse_duration(v).ok_or_else(|| ConfigError::InvalidDuration {
            field,
            value: v.to_string(),
        }),
    }
}
