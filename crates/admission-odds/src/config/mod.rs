use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::admission::alerts::{DEFAULT_CHANGE_THRESHOLD, DEFAULT_COOLDOWN_MINUTES};
use crate::workflows::admission::extractor::DEFAULT_MIN_TURNOVER_SAMPLES;
use crate::workflows::admission::recompute::{
    RecomputePolicy, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_VALIDITY_DAYS,
};
use crate::workflows::admission::scoring::{ScoringConfig, ScoringConfigError};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub odds: OddsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let scoring = match env::var("APP_SCORING_CONFIG") {
            Ok(path) if !path.trim().is_empty() => {
                ScoringConfig::from_json_path(PathBuf::from(path.trim()))?
            }
            _ => ScoringConfig::default(),
        };

        let odds = OddsConfig {
            scoring,
            recompute: RecomputePolicy {
                validity_days: parse_var(
                    "ODDS_CACHE_VALIDITY_DAYS",
                    DEFAULT_CACHE_VALIDITY_DAYS,
                )?,
                batch_size: parse_var("ODDS_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            },
            min_turnover_samples: parse_var(
                "ODDS_MIN_TURNOVER_SAMPLES",
                DEFAULT_MIN_TURNOVER_SAMPLES,
            )?,
            alert_threshold: parse_var("ODDS_ALERT_THRESHOLD", DEFAULT_CHANGE_THRESHOLD)?,
            alert_cooldown_minutes: parse_var(
                "ODDS_ALERT_COOLDOWN_MINUTES",
                DEFAULT_COOLDOWN_MINUTES,
            )?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            odds,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Scoring constants and the recompute/alert policy around them.
#[derive(Debug, Clone)]
pub struct OddsConfig {
    pub scoring: ScoringConfig,
    pub recompute: RecomputePolicy,
    pub min_turnover_samples: usize,
    pub alert_threshold: f64,
    pub alert_cooldown_minutes: i64,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { name: &'static str },
    Scoring(ScoringConfigError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name } => write!(f, "{name} must be a valid number"),
            ConfigError::Scoring(err) => write!(f, "APP_SCORING_CONFIG rejected: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::Scoring(err) => Some(err),
        }
    }
}

impl From<ScoringConfigError> for ConfigError {
    fn from(value: ScoringConfigError) -> Self {
        Self::Scoring(value)
    }
}
