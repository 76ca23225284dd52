use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ssh::host_key_verification::KnownHostsVerifier;
use crate::ssh::keys::read_private_keys;
use crate::ssh::session::{AuthMethod, SessionConfig};

/// Tunnel settings, read from a TOML file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSettings {
    /// Bound on TCP connect and on the SSH handshake + authentication
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// russh background keepalive; 0 disables it
    #[serde(default)]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,
    /// known_hosts file; `~/` is expanded. Defaults to `~/.ssh/known_hosts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<String>,
    /// Idle timeout for pooled HTTP connections; 0 keeps them until closed
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,
    /// Private key files offered for public-key auth; `~/` is expanded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identity_files: Vec<String>,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_inactivity_timeout() -> u64 {
    3600
}

fn default_pool_idle_timeout() -> u64 {
    90
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            keepalive_interval_secs: 0,
            inactivity_timeout_secs: default_inactivity_timeout(),
            known_hosts: None,
            pool_idle_timeout_secs: default_pool_idle_timeout(),
            identity_files: Vec::new(),
        }
    }
}

impl TunnelSettings {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Write to `path`, creating its parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(ConfigError::CreateDir)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The known_hosts file host keys are checked against.
    pub fn known_hosts_path(&self) -> Option<PathBuf> {
        match &self.known_hosts {
            Some(path) => Some(super::paths::expand_tilde(path)),
            None => super::paths::ssh_known_hosts_file(),
        }
    }

    pub fn pool_idle_timeout(&self) -> Option<Duration> {
        match self.pool_idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Public-key methods for the `identity_files` that load. Keys that
    /// fail to load are logged and left out.
    pub fn identity_auth(&self) -> Vec<AuthMethod> {
        let paths: Vec<PathBuf> = self
            .identity_files
            .iter()
            .map(|path| super::paths::expand_tilde(path))
            .collect();
        read_private_keys(&paths)
    }

    /// Base session configuration verifying against [`known_hosts_path`](Self::known_hosts_path).
    pub fn session_config(&self, auth: Vec<AuthMethod>) -> Result<SessionConfig, ConfigError> {
        let known_hosts = self.known_hosts_path().ok_or(ConfigError::NoKnownHosts)?;

        let mut config = SessionConfig::new(Arc::new(KnownHostsVerifier::new(known_hosts)))
            .with_timeout(Duration::from_secs(self.connect_timeout_secs));
        config.auth = auth;
        config.keepalive_interval = match self.keepalive_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        config.inactivity_timeout = Some(Duration::from_secs(self.inactivity_timeout_secs));
        Ok(config)
    }
}
