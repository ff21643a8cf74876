//! Application configuration.
//!
//! Configuration is read once from the environment at process start and then
//! shared read-only by every request handler.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default upload size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Default ClickHouse HTTP interface port.
pub const DEFAULT_CLICKHOUSE_PORT: u16 = 8123;

/// Service-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the service (used in logs and health responses).
    pub service_name: String,
    /// Address the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Directory uploaded and exported files are written to.
    pub upload_dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_upload_size: u64,
    /// Fallback ClickHouse settings for requests that carry no connection config.
    pub clickhouse: ClickHouseDefaults,
}

/// ClickHouse connection defaults.
#[derive(Debug, Clone)]
pub struct ClickHouseDefaults {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// Server-side `max_execution_time` setting, in seconds.
    pub max_execution_time: u64,
    /// Client-side connect timeout, in seconds.
    pub timeout_secs: u64,
}

/// Slack granted on top of `max_execution_time` before the client gives up.
const RESPONSE_GRACE_SECS: u64 = 5;

impl ClickHouseDefaults {
    /// Overall client timeout for one statement.
    ///
    /// Never shorter than the server-side execution ceiling, so the server
    /// always gets to report its own timeout first.
    pub fn request_timeout(&self) -> Duration {
        let secs = self
            .max_execution_time
            .saturating_add(RESPONSE_GRACE_SECS)
            .max(self.timeout_secs);
        Duration::from_secs(secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClickHouseDefaults {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_CLICKHOUSE_PORT,
            database: "default".to_string(),
            user: "default".to_string(),
            password: "password".to_string(),
            max_execution_time: 60,
            timeout_secs: 30,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "transfer-service".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            upload_dir: PathBuf::from("uploads"),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            clickhouse: ClickHouseDefaults::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the environment for the named service.
    ///
    /// Missing or unparseable variables fall back to their defaults.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let ch = ClickHouseDefaults::default();

        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT")
                .or_else(|| parsed(&lookup, "SERVER_PORT"))
                .unwrap_or(defaults.port),
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_size: parsed(&lookup, "MAX_UPLOAD_SIZE")
                .unwrap_or(defaults.max_upload_size),
            clickhouse: ClickHouseDefaults {
                host: lookup("CLICKHOUSE_HOST").unwrap_or(ch.host),
                port: parsed(&lookup, "CLICKHOUSE_PORT").unwrap_or(ch.port),
                database: lookup("CLICKHOUSE_DATABASE").unwrap_or(ch.database),
                user: lookup("CLICKHOUSE_USER").unwrap_or(ch.user),
                password: lookup("CLICKHOUSE_PASSWORD").unwrap_or(ch.password),
                max_execution_time: parsed(&lookup, "CLICKHOUSE_MAX_EXECUTION_TIME")
                    .unwrap_or(ch.max_execution_time),
                timeout_secs: parsed(&lookup, "CLICKHOUSE_TIMEOUT_SECS")
                    .unwrap_or(ch.timeout_secs),
            },
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
