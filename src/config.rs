use std::env;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::bg_task::Schedule;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{key} is not a valid URL: {value}")]
    InvalidUrl { key: &'static str, value: String },
    #[error("{key} has an invalid value: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where and how the leaderboard page is scraped.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub user_agent: String,
}

impl ScraperConfig {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = non_empty("STEAMCHARTS_BASE_URL", base_url.into())?;
        let user_agent = non_empty("STEAMCHARTS_USER_AGENT", user_agent.into())?;
        ensure_url("STEAMCHARTS_BASE_URL", &base_url)?;
        Ok(Self { base_url, user_agent })
    }
}

/// Storage backend that receives relayed snapshots.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub games_endpoint: String,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, games_endpoint: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = non_empty("BACKEND_BASE_URL", base_url.into())?;
        let games_endpoint = non_empty("BACKEND_GAMES_ENDPOINT", games_endpoint.into())?;
        ensure_url("BACKEND_BASE_URL", &base_url)?;
        Ok(Self { base_url, games_endpoint })
    }

    /// `{base_url}{games_endpoint}` with exactly one slash between them.
    pub fn games_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.games_endpoint.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub scraper: ScraperConfig,
    pub backend: BackendConfig,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origin: String,
    pub schedule: Schedule,
    pub run_on_startup: bool,
    pub swagger_enabled: bool,
    pub http_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::Missing(key));

        let scraper = ScraperConfig::new(
            required("STEAMCHARTS_BASE_URL")?,
            required("STEAMCHARTS_USER_AGENT")?,
        )?;
        let backend = BackendConfig::new(
            required("BACKEND_BASE_URL")?,
            required("BACKEND_GAMES_ENDPOINT")?,
        )?;

        let server_host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let server_port = parse_or("SERVER_PORT", lookup("SERVER_PORT"), 3000u16)?;
        let cors_allowed_origin = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "http://localhost:4200".to_string());

        let schedule = match lookup("COLLECTOR_INTERVAL_SECS") {
            None => Schedule::Hourly,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Schedule::Every(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "COLLECTOR_INTERVAL_SECS",
                        value: raw,
                    })
                }
            },
        };

        let run_on_startup = parse_or("COLLECTOR_RUN_ON_STARTUP", lookup("COLLECTOR_RUN_ON_STARTUP"), false)?;
        let swagger_enabled = parse_or("SWAGGER_ENABLED", lookup("SWAGGER_ENABLED"), true)?;
        let http_timeout = Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", lookup("HTTP_TIMEOUT_SECS"), 30u64)?);

        Ok(Self {
            scraper,
            backend,
            server_host,
            server_port,
            cors_allowed_origin,
            schedule,
            run_on_startup,
            swagger_enabled,
            http_timeout,
        })
    }
}

fn non_empty(key: &'static str, value: String) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(key));
    }
    Ok(trimmed.to_string())
}

fn ensure_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(|_| ()).map_err(|_| ConfigError::InvalidUrl {
        key,
        value: value.to_string(),
    })
}

fn parse_or<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
    }
}
