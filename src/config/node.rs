//! The node's own TOML configuration.
//!
//! The lifecycle manager only needs a handful of values from it: enough to
//! validate that an install will produce a node that can start, to derive the
//! admin status URL, and to size the unit's stop timeout. Everything else is
//! carried through untouched so the rendered file keeps every table the
//! operator wrote.
//!
//! ```toml
//! [identity]
//! key_file = "/etc/piri/service.pem"
//!
//! [repo]
//! data_dir = "/var/lib/piri"
//!
//! [server]
//! host = "localhost"
//! port = 3000
//! shutdown_timeout_secs = 30
//! ```

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_SHUTDOWN_BUDGET, PROVING_STATUS_PATH,
};
use crate::core::PiriError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub identity: IdentityConfig,
    pub repo: RepoConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Tables this tool does not interpret.
    #[serde(flatten)]
    pub extra: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub key_file: PathBuf,
    #[serde(flatten)]
    pub extra: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub data_dir: PathBuf,
    #[serde(flatten)]
    pub extra: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Graceful shutdown budget of the node, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub extra: toml::Table,
}

fn default_host() -> String {
    DEFAULT_SERVER_HOST.to_string()
}

const fn default_port() -> u16 {
    DEFAULT_SERVER_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: None,
            extra: toml::Table::new(),
        }
    }
}

impl NodeConfig {
    /// Parse and validate TOML content. `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str) -> Result<Self, PiriError> {
        let config: Self = toml::from_str(content).map_err(|e| PiriError::ConfigError {
            message: format!("{origin}: {e}"),
        })?;
        config.validate(origin)?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read node config from {}", path.display()))?;
        Ok(Self::parse(&content, &path.display().to_string())?)
    }

    fn validate(&self, origin: &str) -> Result<(), PiriError> {
        let require = |field: &str, path: &Path| -> Result<(), PiriError> {
            if path.as_os_str().is_empty() {
                return Err(PiriError::ConfigError {
                    message: format!("{origin}: {field} is required"),
                });
            }
            if !path.is_absolute() {
                return Err(PiriError::ConfigError {
                    message: format!("{origin}: {field} must be an absolute path, got {}", path.display()),
                });
            }
            Ok(())
        };
        require("identity.key_file", &self.identity.key_file)?;
        require("repo.data_dir", &self.repo.data_dir)?;

        if self.server.host.trim().is_empty() {
            return Err(PiriError::ConfigError {
                message: format!("{origin}: server.host is empty"),
            });
        }
        if self.server.port == 0 {
            return Err(PiriError::ConfigError {
                message: format!("{origin}: server.port must be non-zero"),
            });
        }
        Ok(())
    }

    /// TOML for `<root>/etc/piri-config.toml`.
    pub fn render(&self) -> Result<String, PiriError> {
        toml::to_string_pretty(self).map_err(|e| PiriError::ConfigError {
            message: format!("failed to render node config: {e}"),
        })
    }

    /// URL of the node's proving status endpoint.
    ///
    /// A wildcard bind address is queried over loopback.
    pub fn status_url(&self) -> String {
        let host = self.server.host.trim();
        let host = match host.parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() => "127.0.0.1".to_string(),
            Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
            _ => host.to_string(),
        };
        format!("http://{host}:{}{PROVING_STATUS_PATH}", self.server.port)
    }

    pub fn shutdown_budget(&self) -> Duration {
        self.server
            .shutdown_timeout_secs
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_SHUTDOWN_BUDGET, Duration::from_secs)
    }
}
