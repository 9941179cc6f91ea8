//! Configuration module for the recorder

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{RecorderError, Result};

const DEFAULT_SYMBOL: &str = "btcusdt";
const DEFAULT_WS_ENDPOINT: &str = "wss://stream.binance.com:9443/stream";
const DEFAULT_OUTPUT_PATH: &str = "data/market_data.csv";
const DEFAULT_DURATION_SECS: u64 = 60;
const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines for log aggregation
    #[default]
    Json,
    /// Human-readable format
    Pretty,
}

impl FromStr for LogFormat {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(RecorderError::ConfigError(format!(
                "unknown log format: {}",
                other
            ))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Trading symbol to record, lowercase (e.g., "btcusdt")
    pub symbol: String,

    /// Combined-stream WebSocket endpoint
    pub ws_endpoint: String,

    /// CSV file the event log is written to
    pub output_path: PathBuf,

    /// Capture duration in seconds
    pub duration_secs: u64,

    /// Log a progress line every this many events (0 disables)
    pub progress_interval: u64,

    /// Port for the health/metrics server; disabled when unset
    pub health_port: Option<u16>,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let symbol = lookup("SYMBOL")
            .unwrap_or_else(|| DEFAULT_SYMBOL.to_string())
            .trim()
            .to_lowercase();
        if symbol.is_empty() {
            return Err(RecorderError::ConfigError(
                "SYMBOL must not be empty".to_string(),
            ));
        }

        Ok(Self {
            symbol,
            ws_endpoint: lookup("WS_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_WS_ENDPOINT.to_string()),
            output_path: lookup("OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            duration_secs: parse_or(&lookup, "DURATION_SECS", DEFAULT_DURATION_SECS)?,
            progress_interval: parse_or(&lookup, "PROGRESS_INTERVAL", DEFAULT_PROGRESS_INTERVAL)?,
            health_port: lookup("HEALTH_PORT")
                .map(|raw| parse_value("HEALTH_PORT", &raw))
                .transpose()?,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::default())?,
        })
    }

    /// Capture duration budget
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            ws_endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            duration_secs: DEFAULT_DURATION_SECS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            health_port: None,
            log_format: LogFormat::default(),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| RecorderError::ConfigError(format!("invalid {} {:?}: {}", key, raw, e)))
}
