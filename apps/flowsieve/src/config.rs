//! # Server Configuration
//!
//! Layered, later layers win:
//!
//! 1. built-in defaults
//! 2. optional TOML file (`--config flowsieve.toml`)
//! 3. `FLOWSIEVE_*` environment variables
//! 4. command-line flags (applied by the CLI)
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 8080
//! data_dir = "data"
//! database = "flowsieve.redb"
//! backend = "redb"
//! workers = 4
//! lease_ttl_secs = 1800
//! ```

use flowsieve_core::primitives::DEFAULT_LEASE_TTL_SECS;
use flowsieve_core::{DurableCache, FlowError, MemoryDurableCache, RedbCache};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Where finished results are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process memory; results are lost on restart.
    Memory,
    /// redb database file at `database`.
    Redb,
}

impl FromStr for Backend {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            other => Err(FlowError::invalid(format!(
                "unknown backend '{}' (expected memory or redb)",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory"),
            Self::Redb => f.write_str("redb"),
        }
    }
}

/// Settings of the server and the CLI commands sharing its stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory OCEL files are resolved in.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Durable cache database file (redb backend).
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Maximum number of jobs running at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds before a pending job's lease expires; `0` disables expiry.
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_database() -> PathBuf {
    PathBuf::from("flowsieve.redb")
}

fn default_backend() -> Backend {
    Backend::Redb
}

fn default_workers() -> usize {
    4
}

fn default_lease_ttl() -> u64 {
    DEFAULT_LEASE_TTL_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            database: default_database(),
            backend: default_backend(),
            workers: default_workers(),
            lease_ttl_secs: default_lease_ttl(),
        }
    }
}

impl ServerConfig {
    /// Defaults, overlaid with `file` when given, then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, FlowError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FlowError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, FlowError> {
        toml::from_str(text).map_err(|e| FlowError::invalid(format!("config: {}", e)))
    }

    /// Overlay `FLOWSIEVE_*` variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), FlowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("FLOWSIEVE_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("FLOWSIEVE_PORT") {
            self.port = parse_var("FLOWSIEVE_PORT", &port)?;
        }
        if let Some(dir) = lookup("FLOWSIEVE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(database) = lookup("FLOWSIEVE_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(backend) = lookup("FLOWSIEVE_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(workers) = lookup("FLOWSIEVE_WORKERS") {
            self.workers = parse_var("FLOWSIEVE_WORKERS", &workers)?;
        }
        if let Some(ttl) = lookup("FLOWSIEVE_LEASE_TTL_SECS") {
            self.lease_ttl_secs = parse_var("FLOWSIEVE_LEASE_TTL_SECS", &ttl)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.workers == 0 {
            return Err(FlowError::invalid("workers must be at least 1"));
        }
        if self.host.is_empty() {
            return Err(FlowError::invalid("host must not be empty"));
        }
        Ok(())
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open the durable cache of the configured backend.
    pub fn open_durable(&self) -> Result<Arc<dyn DurableCache>, FlowError> {
        match self.backend {
            Backend::Memory => Ok(Arc::new(MemoryDurableCache::new())),
            Backend::Redb => {
                tracing::debug!(path = %self.database.display(), "opening redb cache");
                Ok(Arc::new(RedbCache::open(&self.database)?))
            }
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, FlowError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| FlowError::invalid(format!("{}={}: {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ServerConfig::from_toml_str("port = 9000\nbackend = \"memory\"\n")
            .expect("parse");
        assert_eq!(config.port, 9000);
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.lease_ttl_secs, DEFAULT_LEASE_TTL_SECS);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(ServerConfig::from_toml_str("colour = \"blue\"").is_err());
    }

    #[test]
    fn env_overrides_file() {
        let mut config = ServerConfig::from_toml_str("port = 9000\nworkers = 2").expect("parse");
        let vars = BTreeMap::from([
            ("FLOWSIEVE_PORT", "7000"),
            ("FLOWSIEVE_BACKEND", "Redb"),
            ("FLOWSIEVE_LEASE_TTL_SECS", "0"),
        ]);
        config
            .apply_env(|name| vars.get(name).map(|v| v.to_string()))
            .expect("env");

        assert_eq!(config.port, 7000);
        assert_eq!(config.workers, 2);
        assert_eq!(config.backend, Backend::Redb);
        assert_eq!(config.lease_ttl_secs, 0);
    }

    #[test]
    fn malformed_env_value_is_an_error() {
        let mut config = ServerConfig::default();
        let result = config.apply_env(|name| (name == "FLOWSIEVE_PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(FlowError::InvalidInput(_))));
    }

    #[test]
    fn zero_workers_rejected() {
        let config = ServerConfig {
            workers: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        assert_eq!(ServerConfig::default().bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn redb_backend_persists_to_database_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let config = ServerConfig {
            database: temp.path().join("cache.redb"),
            ..ServerConfig::default()
        };
        let durable = config.open_durable().expect("open");
        assert_eq!(durable.len().expect("len"), 0);
        assert!(config.database.exists());
    }
}
