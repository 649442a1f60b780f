//! Configuration for the Fakeblok binaries.
//!
//! Read from `~/.fakeblok/config.toml`. Every section and field is optional;
//! command-line flags override whatever the file provides.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const fn default_server_port() -> u16 {
    5000
}

const fn default_world_side() -> u16 {
    10_000
}

const fn default_square_size() -> u16 {
    1000
}

const fn default_registration_port() -> u16 {
    5001
}

const fn default_list_port() -> u16 {
    5002
}

const fn default_health_check_interval_ms() -> u64 {
    5000
}

const fn default_max_failed_pings() -> u32 {
    3
}

const fn default_max_connections() -> usize {
    64
}

const fn default_request_timeout_ms() -> u64 {
    150
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FakeblokConfig {
    pub server: Option<ServerConfig>,
    pub registry: Option<RegistryConfig>,
    pub client: Option<ClientConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// `[server]`: the authoritative game server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_world_side")]
    pub world_width: u16,
    #[serde(default = "default_world_side")]
    pub world_height: u16,
    #[serde(default = "default_square_size")]
    pub square_size: u16,
    /// Name announced to the game list.
    pub name: Option<String>,
    /// Game list registration endpoint. Registration is skipped when unset.
    pub registry_addr: Option<SocketAddr>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            world_width: default_world_side(),
            world_height: default_world_side(),
            square_size: default_square_size(),
            name: None,
            registry_addr: None,
            max_connections: default_max_connections(),
        }
    }
}

/// `[registry]`: the game list.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default = "default_registration_port")]
    pub registration_port: u16,
    #[serde(default = "default_list_port")]
    pub list_port: u16,
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
    /// Consecutive failed pings before a game is dropped.
    #[serde(default = "default_max_failed_pings")]
    pub max_failed_pings: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl RegistryConfig {
    #[must_use]
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registration_port: default_registration_port(),
            list_port: default_list_port(),
            health_check_interval_ms: default_health_check_interval_ms(),
            max_failed_pings: default_max_failed_pings(),
            max_connections: default_max_connections(),
        }
    }
}

/// `[client]`: the terminal client and list tool.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub server_addr: Option<SocketAddr>,
    /// Per-call deadline for gameplay requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ClientConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl FakeblokConfig {
    /// Load from the default location. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    /// Load from an explicit path. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file");
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {}", path.display(), source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {}", path.display(), source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Directory holding the config file and logs.
    #[must_use]
    pub fn dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".fakeblok"))
    }

    #[must_use]
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn registry(&self) -> RegistryConfig {
        self.registry.clone().unwrap_or_default()
    }

    #[must_use]
    pub fn client(&self) -> ClientConfig {
        self.client.clone().unwrap_or_default()
    }
}

fn config_path() -> Option<PathBuf> {
    FakeblokConfig::dir().map(|dir| dir.join("config.toml"))
}
