//! Process configuration read from environment variables.

use std::time::Duration;

use thiserror::Error;

use crate::pool::PoolConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:commit-ledger.db";
pub const DEFAULT_RATE_LIMIT: u32 = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Errors from configuration loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TCP port the HTTP server listens on.
    pub port: u16,

    /// Shared webhook secret. Empty disables verification.
    pub webhook_secret: String,

    /// sqlx SQLite connection URL.
    pub database_url: String,

    pub workers: usize,
    pub queue_size: usize,

    /// Requests each client IP may make per `rate_limit_window`.
    pub rate_limit: u32,
    pub rate_limit_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: DEFAULT_PORT,
            webhook_secret: String::new(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            workers: PoolConfig::DEFAULT_WORKERS,
            queue_size: PoolConfig::DEFAULT_QUEUE_SIZE,
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Recognized variables: `PORT`, `WEBHOOK_SECRET` (or the older
    /// `GITLAB_WEBHOOK_SECRET`), `DATABASE_URL`, `WORKER_POOL_WORKERS`,
    /// `WORKER_POOL_QUEUE_SIZE`, `RATE_LIMIT_LIMIT` and `RATE_LIMIT_WINDOW`.
    /// Values that do not parse fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let config = Config {
            port: parse_or(&lookup, "PORT", defaults.port),
            webhook_secret: lookup("WEBHOOK_SECRET")
                .filter(|secret| !secret.is_empty())
                .or_else(|| lookup("GITLAB_WEBHOOK_SECRET"))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL")
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.database_url),
            workers: parse_or(&lookup, "WORKER_POOL_WORKERS", defaults.workers),
            queue_size: parse_or(&lookup, "WORKER_POOL_QUEUE_SIZE", defaults.queue_size),
            rate_limit: parse_or(&lookup, "RATE_LIMIT_LIMIT", defaults.rate_limit),
            rate_limit_window: lookup("RATE_LIMIT_WINDOW")
                .and_then(|raw| parse_duration(&raw))
                .filter(|window| !window.is_zero())
                .unwrap_or(defaults.rate_limit_window),
        };

        if config.workers == 0 {
            return Err(ConfigError::Zero("WORKER_POOL_WORKERS"));
        }
        if config.queue_size == 0 {
            return Err(ConfigError::Zero("WORKER_POOL_QUEUE_SIZE"));
        }
        if config.rate_limit == 0 {
            return Err(ConfigError::Zero("RATE_LIMIT_LIMIT"));
        }
        Ok(config)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.workers, self.queue_size)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> T {
    lookup(name)
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Parses durations such as `90s`, `1m` or `1h30m`. Units are `ms`, `s`,
/// `m` and `h`; every number needs a unit.
fn parse_duration(raw: &str) -> Option<Duration> {
    let mut rest = raw.trim();
    if rest.is_empty() {
        return None;
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            _ => return None,
        };
        rest = &rest[unit_len..];
        total = total.checked_add(part)?;
    }
    Some(total)
}
