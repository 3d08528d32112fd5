// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Runtime worker threads. Connections are all served from the
    /// `LocalSet` on the main thread; the workers only run the runtime's
    /// timers and I/O driver.
    pub workers: Option<usize>,
}

/// Result storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding `<year>-<nanos>.json` result files
    pub data_path: String,
}

/// Upstream query service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Cloud project billed for the query (from `GOOGLE_CLOUD_PROJECT`)
    pub project_id: String,
    /// BigQuery REST base URL
    pub endpoint: String,
    /// Metadata server URL used to mint access tokens
    pub token_url: String,
    /// Static bearer token, bypasses the metadata server when set
    #[serde(default)]
    pub access_token: Option<String>,
    /// Upper bound for a whole query, including result paging
    pub timeout_secs: u64,
}

/// Lowest severity written to the logs
///
/// Ordered so that a more verbose level compares greater.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[serde(alias = "warning")]
    Warn,
    Info,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `error`, `warn` or `info`; any other value fails config loading
    pub level: LogLevel,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Only toggles HTTP keep-alive: 0 disables it, any other value enables
    /// it. Idle keep-alive connections are closed by the connection timeout.
    pub keep_alive_timeout: u64,
    /// Connections live at most `max(read_timeout, write_timeout)` seconds
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

/// Values supplied on the command line or by the process environment.
/// They take precedence over the config file and `BLS_*` variables.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub listen_port: Option<u16>,
    pub data_path: Option<String>,
    pub project_id: Option<String>,
}
