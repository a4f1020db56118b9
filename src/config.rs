//! Command-line and environment configuration.
//!
//! Every flag can also come from the environment; `main` loads `.env` with
//! `dotenvy` before parsing, so a local `.env` file works too.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use regex::Regex;

use crate::api::{AppConfig, LimiterSettings};
use crate::infrastructure::{ConfigurationError, PoolSettings, RepositoryConfig, StorageMode};

/// Deployment environment reported by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        })
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "movie-catalog-api", version, about = "Movie catalog JSON API")]
pub struct Config {
    /// API server port.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Environment (development|staging|production).
    #[arg(long = "env", env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Storage backend (in_memory|postgres). Defaults to postgres when a DSN is set.
    #[arg(long, env = "STORAGE_MODE", value_parser = StorageMode::from_str)]
    pub storage_mode: Option<StorageMode>,

    /// PostgreSQL DSN.
    #[arg(long, env = "GREENLIGHT_DB_DSN")]
    pub db_dsn: Option<String>,

    /// PostgreSQL max open connections.
    #[arg(long, env = "DB_MAX_OPEN_CONNS", default_value_t = 25)]
    pub db_max_open_conns: u32,

    /// PostgreSQL max idle connections.
    #[arg(long, env = "DB_MAX_IDLE_CONNS", default_value_t = 25)]
    pub db_max_idle_conns: u32,

    /// PostgreSQL max connection idle time.
    #[arg(
        long,
        env = "DB_MAX_IDLE_TIME",
        default_value = "15m",
        value_parser = parse_duration
    )]
    pub db_max_idle_time: Duration,

    /// Apply pending migrations at startup.
    #[arg(long, env = "DB_MIGRATE")]
    pub db_migrate: bool,

    /// Rate limiter maximum requests per second.
    #[arg(long, env = "LIMITER_RPS", default_value_t = 2.0)]
    pub limiter_rps: f64,

    /// Rate limiter maximum burst.
    #[arg(long, env = "LIMITER_BURST", default_value_t = 4)]
    pub limiter_burst: u32,

    /// Enable rate limiter.
    #[arg(long, env = "LIMITER_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub limiter_enabled: bool,

    /// Log format (text|json).
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Tokio worker threads (default: logical CPU count).
    #[arg(long, env = "WORKER_THREADS")]
    pub worker_threads: Option<NonZeroUsize>,
}

impl Config {
    /// Storage settings for `RepositoryFactory`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if postgres is selected without a DSN or
    /// the pool allows no connections.
    pub fn repository_config(&self) -> Result<RepositoryConfig, ConfigurationError> {
        let dsn = self.db_dsn.as_deref().unwrap_or_default();
        let storage_mode = self.storage_mode.unwrap_or(if dsn.trim().is_empty() {
            StorageMode::InMemory
        } else {
            StorageMode::Postgres
        });

        RepositoryConfig::builder()
            .storage_mode(storage_mode)
            .database_url(dsn)
            .pool(PoolSettings {
                max_open_conns: self.db_max_open_conns,
                max_idle_conns: self.db_max_idle_conns,
                max_idle_time: self.db_max_idle_time,
            })
            .run_migrations(self.db_migrate)
            .build()
    }

    /// Token bucket settings.
    #[must_use]
    pub const fn limiter_settings(&self) -> LimiterSettings {
        LimiterSettings {
            rps: self.limiter_rps,
            burst: self.limiter_burst,
            enabled: self.limiter_enabled,
        }
    }

    /// Settings visible to handlers.
    #[must_use]
    pub fn app_config(&self) -> AppConfig {
        AppConfig {
            environment: self.environment.to_string(),
        }
    }
}

// =============================================================================
// Duration Parsing
// =============================================================================

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?<value>\d+(?:\.\d*)?|\.\d+)(?<unit>ns|us|µs|ms|s|m|h)")
        .expect("duration pattern is a valid regex")
});

/// Parses durations such as `15m`, `1h30m`, `2.5s` or `500ms`.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidDuration` if `input` is empty, has text
/// between the parts, or uses an unknown unit.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn parse_duration(input: &str) -> Result<Duration, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidDuration(input.to_string());
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.is_empty() {
        return Err(invalid());
    }

    let mut consumed = 0;
    let mut nanos = 0.0_f64;
    for captures in DURATION_PART.captures_iter(input) {
        let whole = captures.get(0).ok_or_else(invalid)?;
        if whole.start() != consumed {
            return Err(invalid());
        }
        consumed = whole.end();

        let value: f64 = captures["value"].parse().map_err(|_| invalid())?;
        let nanos_per_unit = match &captures["unit"] {
            "h" => 3.6e12,
            "m" => 6e10,
            "s" => 1e9,
            "ms" => 1e6,
            "us" | "µs" => 1e3,
            _ => 1.0,
        };
        nanos += value * nanos_per_unit;
    }

    if consumed != input.len() || !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

// =============================================================================
// Tests
// =============================================================================
