//! Layered application configuration.
//!
//! Built-in defaults, then an optional `stockanalyzer.toml`, then
//! `STOCKANALYZER__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::market::MarketCalendar;
use crate::Result;

pub const DEFAULT_CONFIG_FILE: &str = "stockanalyzer.toml";
const ENV_PREFIX: &str = "STOCKANALYZER";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub calendar: CalendarConfig,
    pub ranking: RankingConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Session boundaries: one daily cutoff per market in a reference timezone
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA zone the cutoffs are expressed in
    pub timezone: String,
    /// Market used for unknown codes
    pub default_market: String,
    /// Market code -> `HH:MM`
    pub cutoffs: HashMap<String, String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "Asia/Kolkata".to_string(),
            default_market: "IN".to_string(),
            cutoffs: HashMap::from([
                ("IN".to_string(), "16:00".to_string()),
                ("US".to_string(), "05:00".to_string()),
            ]),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Symbols fetched concurrently per batch
    pub batch_size: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { batch_size: 10 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query2.finance.yahoo.com".to_string(),
            requests_per_minute: 60,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Snapshot storage. Postgres wins over Redis; neither means in-memory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "stockanalyzer=info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (if it exists) and the environment
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, config::ConfigError> {
        let defaults = AppConfig::default();

        let mut builder = config::Config::builder()
            .set_default("calendar.timezone", defaults.calendar.timezone)?
            .set_default("calendar.default_market", defaults.calendar.default_market)?
            .set_default("ranking.batch_size", defaults.ranking.batch_size as i64)?
            .set_default("provider.base_url", defaults.provider.base_url)?
            .set_default(
                "provider.requests_per_minute",
                defaults.provider.requests_per_minute as i64,
            )?
            .set_default("provider.timeout_secs", defaults.provider.timeout_secs as i64)?
            .set_default("provider.max_retries", defaults.provider.max_retries as i64)?
            .set_default("logging.filter", defaults.logging.filter)?;

        for (market, cutoff) in defaults.calendar.cutoffs {
            builder = builder.set_default(format!("calendar.cutoffs.{}", market), cutoff)?;
        }

        builder
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn load_default() -> std::result::Result<Self, config::ConfigError> {
        Self::load(DEFAULT_CONFIG_FILE)
    }

    pub fn calendar(&self) -> Result<MarketCalendar> {
        MarketCalendar::from_config(&self.calendar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.calendar.timezone, "Asia/Kolkata");
        assert_eq!(config.calendar.cutoffs["IN"], "16:00");
        assert_eq!(config.calendar.cutoffs["US"], "05:00");
        assert_eq!(config.ranking.batch_size, 10);
        assert_eq!(config.provider.max_retries, 3);
        assert!(config.storage.database_url.is_none());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load("does-not-exist.toml").unwrap();
        assert_eq!(config.ranking.batch_size, 10);
        assert_eq!(config.provider.requests_per_minute, 60);
        assert!(config.calendar().is_ok());
    }
}
