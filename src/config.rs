//! Configuration management for Gridwatch
//!
//! Configuration comes from environment variables, validated up front.
//! A missing or malformed variable is the only fatal error class in the
//! system: the process refuses to start rather than run half-configured.

use crate::error::{GridwatchError, Result};
use std::time::Duration;

/// Environment variables that must be present
const REQUIRED_VARS: &[&str] = &[
    "PORT",
    "SENSOR_BASE_URL",
    "SENSOR_TOKEN",
    "SENSOR_ENTITY",
    "SENSOR_POLL_INTERVAL",
    "OUTAGE_BASE_URL",
    "OUTAGE_REGION",
    "OUTAGE_CITY",
    "OUTAGE_STREET",
    "OUTAGE_BUILDING",
    "OUTAGE_POLL_INTERVAL",
    "HISTORY_FILE_PATH",
    "HISTORY_WINDOW",
];

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Web server binding configuration
    pub web: WebConfig,

    /// Smart-home sensor source (live grid on/off state)
    pub sensor: SensorConfig,

    /// Utility-provider source (announced outage windows)
    pub outage: OutageConfig,

    /// History ledger persistence and retention
    pub history: HistoryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// IANA timezone all timestamps are produced in
    pub timezone: String,
}

/// Web server binding parameters
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Bind host
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Smart-home sensor endpoint parameters
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Base URL of the smart-home API
    pub base_url: String,

    /// Bearer token for the smart-home API
    pub token: String,

    /// Entity id of the grid sensor
    pub entity: String,

    /// Regular poll interval
    pub poll_interval: Duration,
}

impl SensorConfig {
    /// Full URL of the sensor state endpoint
    pub fn state_url(&self) -> String {
        format!("{}/api/states/{}", self.base_url, self.entity)
    }
}

/// Utility-provider endpoint and address parameters
#[derive(Debug, Clone)]
pub struct OutageConfig {
    /// Base URL of the provider API
    pub base_url: String,

    /// Region identifier
    pub region: String,

    /// City name
    pub city: String,

    /// Street name
    pub street: String,

    /// Building number; looked up as a key in the provider response
    pub building: String,

    /// Regular poll interval
    pub poll_interval: Duration,
}

impl OutageConfig {
    /// Full URL of the provider status endpoint (address goes in the query)
    pub fn status_url(&self) -> String {
        format!("{}/api/status", self.base_url)
    }
}

/// History ledger parameters
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Path of the persisted history file
    pub file_path: String,

    /// Retention window; closed intervals older than this are evicted
    pub window: Duration,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional log directory or file path for the daily rolling file
    pub file: Option<String>,

    /// Emit JSON lines instead of human-readable text
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: None,
            json_format: false,
        }
    }
}

impl Config {
    /// Load configuration from process environment variables
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// All missing required variables are collected and reported together so
    /// an operator fixes the environment in one pass.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|&key| lookup(key).map_or(true, |v| v.is_empty()))
            .collect();
        if !missing.is_empty() {
            return Err(GridwatchError::config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let get = |key: &str| -> String { lookup(key).unwrap_or_default() };

        let port: u16 = get("PORT")
            .parse()
            .map_err(|_| GridwatchError::validation("PORT", "not a valid TCP port"))?;

        let config = Self {
            web: WebConfig {
                host: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
            },
            sensor: SensorConfig {
                base_url: get("SENSOR_BASE_URL"),
                token: get("SENSOR_TOKEN"),
                entity: get("SENSOR_ENTITY"),
                poll_interval: parse_duration_var("SENSOR_POLL_INTERVAL", &get("SENSOR_POLL_INTERVAL"))?,
            },
            outage: OutageConfig {
                base_url: get("OUTAGE_BASE_URL"),
                region: get("OUTAGE_REGION"),
                city: get("OUTAGE_CITY"),
                street: get("OUTAGE_STREET"),
                building: get("OUTAGE_BUILDING"),
                poll_interval: parse_duration_var("OUTAGE_POLL_INTERVAL", &get("OUTAGE_POLL_INTERVAL"))?,
            },
            history: HistoryConfig {
                file_path: get("HISTORY_FILE_PATH"),
                window: parse_duration_var("HISTORY_WINDOW", &get("HISTORY_WINDOW"))?,
            },
            logging: LoggingConfig {
                level: lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
                file: lookup("LOG_FILE").filter(|v| !v.is_empty()),
                json_format: lookup("LOG_JSON").map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true")),
            },
            timezone: lookup("TIMEZONE").unwrap_or_else(|| "Europe/Kyiv".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.sensor.poll_interval.is_zero() {
            return Err(GridwatchError::validation(
                "SENSOR_POLL_INTERVAL",
                "must be greater than zero",
            ));
        }
        if self.outage.poll_interval.is_zero() {
            return Err(GridwatchError::validation(
                "OUTAGE_POLL_INTERVAL",
                "must be greater than zero",
            ));
        }
        if self.history.window.is_zero() {
            return Err(GridwatchError::validation(
                "HISTORY_WINDOW",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Human-readable monitored address, shown on the status page
    pub fn address(&self) -> String {
        format!(
            "{}, {}, {}",
            self.outage.city, self.outage.street, self.outage.building
        )
    }
}

fn parse_duration_var(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        GridwatchError::validation(key, &format!("invalid duration '{}': {}", value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("PORT", "8080"),
            ("SENSOR_BASE_URL", "http://ha.local:8123"),
            ("SENSOR_TOKEN", "secret"),
            ("SENSOR_ENTITY", "binary_sensor.grid"),
            ("SENSOR_POLL_INTERVAL", "30s"),
            ("OUTAGE_BASE_URL", "https://outages.example.com"),
            ("OUTAGE_REGION", "kyiv"),
            ("OUTAGE_CITY", "Kyiv"),
            ("OUTAGE_STREET", "Khreshchatyk"),
            ("OUTAGE_BUILDING", "12"),
            ("OUTAGE_POLL_INTERVAL", "5m"),
            ("HISTORY_FILE_PATH", "/var/lib/gridwatch/history.json"),
            ("HISTORY_WINDOW", "24h"),
        ])
    }

    fn load(env: &HashMap<&str, &str>) -> Result<Config> {
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn loads_complete_environment() {
        let cfg = load(&full_env()).unwrap();
        assert_eq!(cfg.web.port, 8080);
        assert_eq!(cfg.sensor.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.outage.poll_interval, Duration::from_secs(300));
        assert_eq!(cfg.history.window, Duration::from_secs(86_400));
        assert_eq!(cfg.timezone, "Europe/Kyiv");
        assert_eq!(
            cfg.sensor.state_url(),
            "http://ha.local:8123/api/states/binary_sensor.grid"
        );
        assert_eq!(
            cfg.outage.status_url(),
            "https://outages.example.com/api/status"
        );
        assert_eq!(cfg.address(), "Kyiv, Khreshchatyk, 12");
    }

    #[test]
    fn collects_all_missing_variables() {
        let mut env = full_env();
        env.remove("PORT");
        env.remove("SENSOR_TOKEN");
        env.remove("HISTORY_WINDOW");
        let err = load(&env).unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("PORT"));
        assert!(msg.contains("SENSOR_TOKEN"));
        assert!(msg.contains("HISTORY_WINDOW"));
    }

    #[test]
    fn rejects_bad_duration() {
        let mut env = full_env();
        env.insert("SENSOR_POLL_INTERVAL", "sometimes");
        assert!(load(&env).is_err());
    }

    #[test]
    fn rejects_zero_window() {
        let mut env = full_env();
        env.insert("HISTORY_WINDOW", "0s");
        assert!(load(&env).is_err());
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut env = full_env();
        env.insert("SENSOR_TOKEN", "");
        let err = load(&env).unwrap_err();
        assert!(format!("{}", err).contains("SENSOR_TOKEN"));
    }
}
