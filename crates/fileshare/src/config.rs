//! Environment-sourced server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use pathindex::SNAPSHOT_FILE_NAME;

pub const DEFAULT_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Directory exposed over HTTP.
    pub server_dir: PathBuf,
    /// Directory holding the index snapshot.
    pub index_dir: PathBuf,
    pub address: IpAddr,
    pub port: u16,
}

impl ServerConfig {
    /// Reads the configuration from the process environment, loading a
    /// `.env` file from the working directory first if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`.
    ///
    /// Recognized keys: `SERVER_DIR` (default: current directory),
    /// `SERVER_INDEX` (default: `SERVER_DIR`), `ADDRESS`, `PORT`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let server_dir = match lookup("SERVER_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };
        let index_dir = lookup("SERVER_INDEX")
            .map(PathBuf::from)
            .unwrap_or_else(|| server_dir.clone());

        let address = match lookup("ADDRESS") {
            Some(raw) => raw.trim().parse::<IpAddr>().map_err(|error| {
                ConfigError::Invalid {
                    key: "ADDRESS",
                    value: raw.clone(),
                    reason: error.to_string(),
                }
            })?,
            None => DEFAULT_ADDRESS,
        };
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|error| {
                ConfigError::Invalid {
                    key: "PORT",
                    value: raw.clone(),
                    reason: error.to_string(),
                }
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            server_dir,
            index_dir,
            address,
            port,
        })
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.index_dir.join(SNAPSHOT_FILE_NAME)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}
