//! Configuration management
//!
//! Layered configuration: TOML config file, then environment overrides
//! (`DATABASE_URL`, `HOST`, `PORT`, `KB_BUSY_TIMEOUT_MS`), then CLI flags.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// SQLite store settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// SQLite store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    /// Upper bound on waiting for a locked store before failing as retryable
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8020
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/knowledge.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)
                    .context("Failed to read config file")?;
                toml::from_str(&contents).context("Failed to parse config file")?
            }
            _ => Config::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides on top of file/default values
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.path = PathBuf::from(strip_sqlite_scheme(&url));
        }
        if let Ok(host) = std::env::var("HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .context("PORT must be a number between 1 and 65535")?;
        }
        if let Ok(ms) = std::env::var("KB_BUSY_TIMEOUT_MS") {
            self.database.busy_timeout_ms = ms
                .parse()
                .context("KB_BUSY_TIMEOUT_MS must be a number of milliseconds")?;
        }
        Ok(())
    }
}

/// Accept both a bare path and a `sqlite://` style connection string
fn strip_sqlite_scheme(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

/// Get the configuration file path
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("knowledge-base").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8020);
        assert_eq!(config.database.path, PathBuf::from("./data/knowledge.db"));
        assert_eq!(config.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str("[server]\nport = 9000\n").unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_strip_sqlite_scheme() {
        assert_eq!(strip_sqlite_scheme("./data/knowledge.db"), "./data/knowledge.db");
        assert_eq!(strip_sqlite_scheme("sqlite:./data/knowledge.db"), "./data/knowledge.db");
        assert_eq!(strip_sqlite_scheme("sqlite:///var/lib/kb.db"), "/var/lib/kb.db");
    }
}
