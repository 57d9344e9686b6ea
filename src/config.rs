use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LOCATIONS: i64 = 50;
pub const MIN_MAX_LOCATIONS: i64 = 1;
pub const MAX_MAX_LOCATIONS: i64 = 500;

/// Clamps a requested window size into `[1, 500]`.
pub fn clamp_max_locations(requested: i64) -> u32 {
    // Bounded above by 500, so the cast is lossless.
    requested.clamp(MIN_MAX_LOCATIONS, MAX_MAX_LOCATIONS) as u32
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Table holding location records
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Retrieval window size before clamping
    #[serde(default = "default_max_locations")]
    pub max_locations: i64,

    /// HTTP listen host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    "sqlite://shipment-tracking.db".to_string()
}

fn default_table_name() -> String {
    "test-shipment-trips".to_string()
}

fn default_max_locations() -> i64 {
    DEFAULT_MAX_LOCATIONS
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("TRACKING"))
            .build()?
            .try_deserialize()
    }

    /// The retrieval window after clamping.
    pub fn window(&self) -> u32 {
        clamp_max_locations(self.max_locations)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
