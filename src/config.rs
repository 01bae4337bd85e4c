//! Server configuration
//!
//! Values are layered, lowest priority first: built-in defaults, an optional
//! YAML file (`--config`), then command-line flags and their environment
//! variables. The result is built once at startup and shared read-only.

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default listen address, all interfaces on the fixed port.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:4221";

/// Command-line interface of the `ember` binary.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "ember")]
#[command(about = "Minimal HTTP/1.1 server with gzip and a file store")]
pub struct Cli {
    /// Directory served under /files/
    #[arg(long, env = "EMBER_DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "EMBER_LISTEN")]
    pub listen: Option<String>,

    /// Optional YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Deadline for a whole connection, request read through response write
    #[arg(long = "connection-timeout-ms")]
    pub connection_timeout_ms: Option<u64>,

    /// How long shutdown waits for in-flight connections
    #[arg(long = "drain-timeout-ms")]
    pub drain_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub files: FilesConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub connection_timeout_ms: u64,
    pub drain_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            connection_timeout_ms: 30_000,
            drain_timeout_ms: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// Root of the `/files/` store.
///
/// An empty path resolves names against the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub directory: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let mut cfg = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply(cli);
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    fn apply(&mut self, cli: Cli) {
        if let Some(directory) = cli.directory {
            self.files.directory = directory;
        }
        if let Some(listen) = cli.listen {
            self.server.listen_addr = listen;
        }
        if let Some(ms) = cli.connection_timeout_ms {
            self.server.connection_timeout_ms = ms;
        }
        if let Some(ms) = cli.drain_timeout_ms {
            self.server.drain_timeout_ms = ms;
        }
    }
}
