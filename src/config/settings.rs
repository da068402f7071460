//! Process settings from environment variables.

use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub entity_config_path: PathBuf,
    pub bind_addr: String,
    pub max_connections: u32,
    /// Applied to every session; None leaves the server default.
    pub statement_timeout: Option<Duration>,
    pub auto_migrate: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup (env in production, a map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/entity_query".into());
        let entity_config_path = get("ENTITY_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config/entities.json"));
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".into());
        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Settings(format!("DB_MAX_CONNECTIONS: '{}' is not a number", v)))?,
            None => 5,
        };
        let statement_timeout = match get("STATEMENT_TIMEOUT_MS") {
            Some(v) => Some(Duration::from_millis(v.parse().map_err(|_| {
                ConfigError::Settings(format!("STATEMENT_TIMEOUT_MS: '{}' is not a number", v))
            })?)),
            None => None,
        };
        let auto_migrate = match get("AUTO_MIGRATE").as_deref() {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => return Err(ConfigError::Settings(format!("AUTO_MIGRATE: '{}' is not a boolean", v))),
        };
        Ok(Settings {
            database_url,
            entity_config_path,
            bind_addr,
            max_connections,
            statement_timeout,
            auto_migrate,
        })
    }
}
