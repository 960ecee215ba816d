//! Process configuration read from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | unset |
//! | `STOCKROOM_LOW_STOCK_THRESHOLD` | `10` |
//! | `STOCKROOM_MAX_CONFLICT_RETRIES` | `64` |
//! | `STOCKROOM_PUSH_DOWN_LOW_STOCK` | `true` |
//! | `STOCKROOM_LOG_FORMAT` | `json` |
//! | `STOCKROOM_LOG_LEVEL` | `info` |

use core::str::FromStr;

use thiserror::Error;

use stockroom_inventory::DEFAULT_LOW_STOCK_THRESHOLD;
use stockroom_observability::{LogConfig, LogFormat};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const LOW_STOCK_THRESHOLD: &str = "STOCKROOM_LOW_STOCK_THRESHOLD";
pub const MAX_CONFLICT_RETRIES: &str = "STOCKROOM_MAX_CONFLICT_RETRIES";
pub const PUSH_DOWN_LOW_STOCK: &str = "STOCKROOM_PUSH_DOWN_LOW_STOCK";
pub const LOG_FORMAT: &str = "STOCKROOM_LOG_FORMAT";
pub const LOG_LEVEL: &str = "STOCKROOM_LOG_LEVEL";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: String, value: String },

    #[error("missing required setting {0}")]
    Missing(String),
}

/// Tunables of the stock adjuster and aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub default_low_stock_threshold: i64,
    /// Extra attempts after a compare-and-swap conflict before giving up.
    pub max_conflict_retries: u32,
    /// Let the repository filter low-stock products in storage.
    pub push_down_low_stock: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            max_conflict_retries: 64,
            push_down_low_stock: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub ledger: LedgerConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = LedgerConfig::default();

        let default_low_stock_threshold = match get(LOW_STOCK_THRESHOLD) {
            Some(raw) => {
                let value: i64 = parse(LOW_STOCK_THRESHOLD, &raw)?;
                if value < 0 {
                    return Err(invalid(LOW_STOCK_THRESHOLD, &raw));
                }
                value
            }
            None => defaults.default_low_stock_threshold,
        };

        let max_conflict_retries = match get(MAX_CONFLICT_RETRIES) {
            Some(raw) => parse(MAX_CONFLICT_RETRIES, &raw)?,
            None => defaults.max_conflict_retries,
        };

        let push_down_low_stock = match get(PUSH_DOWN_LOW_STOCK) {
            Some(raw) => parse_bool(PUSH_DOWN_LOW_STOCK, &raw)?,
            None => defaults.push_down_low_stock,
        };

        let mut log = LogConfig::default();
        if let Some(raw) = get(LOG_FORMAT) {
            log.format = raw
                .parse::<LogFormat>()
                .map_err(|_| invalid(LOG_FORMAT, &raw))?;
        }
        if let Some(raw) = get(LOG_LEVEL) {
            log.level = raw.trim().to_string();
        }

        Ok(Self {
            database_url: get(DATABASE_URL),
            ledger: LedgerConfig {
                default_low_stock_threshold,
                max_conflict_retries,
                push_down_low_stock,
            },
            log,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing(DATABASE_URL.to_string()))
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}
