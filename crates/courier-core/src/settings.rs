use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::paths::default_known_hosts;

pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_PORT: u16 = 22;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("remote host must not be empty")]
    EmptyHost,
    #[error("remote username must not be empty")]
    EmptyUsername,
    #[error("remote port must not be 0")]
    ZeroPort,
    #[error("poll interval must be at least 1 second")]
    ZeroInterval,
    #[error("read settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse settings {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Reject hosts whose key is not in this OpenSSH known_hosts file.
    KnownHosts(PathBuf),
    /// Accept any host key. Only reachable through an explicit opt-out.
    AcceptAny,
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        Self::KnownHosts(default_known_hosts())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub host: String,
    pub username: String,
    pub port: u16,
    #[serde(skip)]
    pub password: Zeroizing<String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            port: DEFAULT_PORT,
            password: Zeroizing::default(),
        }
    }
}

impl std::fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Agent configuration, built once at startup and handed to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub remote: RemoteSettings,
    pub root: PathBuf,
    pub interval_secs: u64,
    pub host_key: HostKeyPolicy,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            remote: RemoteSettings::default(),
            root: PathBuf::from("."),
            interval_secs: DEFAULT_INTERVAL_SECS,
            host_key: HostKeyPolicy::default(),
        }
    }
}

impl AgentSettings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let data = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.remote.host.trim().is_empty() {
            return Err(SettingsError::EmptyHost);
        }
        if self.remote.username.trim().is_empty() {
            return Err(SettingsError::EmptyUsername);
        }
        if self.remote.port == 0 {
            return Err(SettingsError::ZeroPort);
        }
        if self.interval_secs == 0 {
            return Err(SettingsError::ZeroInterval);
        }
        Ok(())
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }
}
