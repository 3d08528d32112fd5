// Configuration module entry point
// Loads layered configuration and holds the shared application state

mod state;
mod types;

use std::net::SocketAddr;
use std::time::Duration;

// Re-export public types
pub use state::AppState;
pub use types::{Config, LogLevel, Overrides, QueryConfig};

/// Environment variable naming the cloud project used for queries
pub const PROJECT_ENV_VAR: &str = "GOOGLE_CLOUD_PROJECT";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest precedence first: built-in defaults, the optional
    /// config file, `BLS_<SECTION>__<KEY>` environment variables, `overrides`.
    pub fn load_from(config_path: &str, overrides: &Overrides) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("BLS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("storage.data_path", "data")?
            .set_default("query.project_id", "")?
            .set_default("query.endpoint", "https://bigquery.googleapis.com/bigquery/v2")?
            .set_default(
                "query.token_url",
                "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token",
            )?
            .set_default("query.timeout_secs", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 120)?
            .set_default("performance.write_timeout", 120)?
            .set_default("http.server_name", "bls-query-server")?
            .set_default("http.max_body_size", 65_536)?
            .set_override_option("server.port", overrides.listen_port.map(i64::from))?
            .set_override_option("storage.data_path", overrides.data_path.clone())?
            .set_override_option("query.project_id", overrides.project_id.clone())?
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        if cfg.query.project_id.trim().is_empty() {
            return Err(config::ConfigError::Message(format!(
                "{PROJECT_ENV_VAR} environment variable must be set."
            )));
        }
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    /// Lifetime bound for a single client connection
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(std::cmp::max(
            self.performance.read_timeout,
            self.performance.write_timeout,
        ))
    }

    pub const fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSING_FILE: &str = "this-config-file-does-not-exist";

    #[test]
    fn test_defaults_with_project() {
        let overrides = Overrides {
            project_id: Some("test_project".to_string()),
            ..Overrides::default()
        };
        let cfg = Config::load_from(MISSING_FILE, &overrides).unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.storage.data_path, "data");
        assert_eq!(cfg.query.project_id, "test_project");
        assert_eq!(cfg.query.timeout_secs, 60);
        assert!(cfg.query.access_token.is_none());
        assert_eq!(cfg.logging.access_log_format, "combined");
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = Overrides {
            listen_port: Some(9090),
            data_path: Some("/tmp/results".to_string()),
            project_id: Some("p".to_string()),
        };
        let cfg = Config::load_from(MISSING_FILE, &overrides).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.storage.data_path, "/tmp/results");
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 9090);
    }

    #[test]
    fn test_missing_project_is_rejected() {
        let overrides = Overrides {
            project_id: Some("  ".to_string()),
            ..Overrides::default()
        };
        let err = Config::load_from(MISSING_FILE, &overrides).unwrap_err();
        assert!(err.to_string().contains(PROJECT_ENV_VAR));
    }

    #[test]
    fn test_connection_timeout_uses_larger_value() {
        let overrides = Overrides {
            project_id: Some("p".to_string()),
            ..Overrides::default()
        };
        let mut cfg = Config::load_from(MISSING_FILE, &overrides).unwrap();
        cfg.performance.read_timeout = 5;
        cfg.performance.write_timeout = 9;
        assert_eq!(cfg.connection_timeout(), Duration::from_secs(9));
    }

    #[test]
    fn test_log_level_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let base = dir.path().join("server");
        let overrides = Overrides {
            project_id: Some("p".to_string()),
            ..Overrides::default()
        };

        std::fs::write(base.with_extension("toml"), "[logging]\nlevel = \"warn\"\n").unwrap();
        let cfg = Config::load_from(base.to_str().unwrap(), &overrides).unwrap();
        assert_eq!(cfg.logging.level, LogLevel::Warn);
        assert!(LogLevel::Error < LogLevel::Warn && LogLevel::Warn < LogLevel::Info);

        std::fs::write(base.with_extension("toml"), "[logging]\nlevel = \"verbose\"\n").unwrap();
        assert!(Config::load_from(base.to_str().unwrap(), &overrides).is_err());
    }
}
