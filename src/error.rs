use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create config directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Could not determine known_hosts location")]
    NoKnownHosts,
}

/// Errors surfaced by sessions, tunnels and the streams dialed through them
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Connection failed to {host}:{port}: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timeout connecting to {0}")]
    Timeout(String),

    #[error("Host key verification failed: {0}")]
    HostKeyVerification(String),

    #[error("Channel error: {0}")]
    Channel(String),

    /// The session transport is gone (remote hung up, session task ended).
    #[error("SSH session closed by remote end")]
    EndOfStream,

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("TLS dialing through the tunnel is not implemented")]
    TlsNotImplemented,

    #[error("Key file error: {0}")]
    KeyFile(String),

    #[error("SSH agent error: {0}")]
    Agent(String),

    #[error("russh error: {0}")]
    Russh(String),
}

impl TunnelError {
    /// True when the error means the underlying session can no longer carry traffic.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TunnelError::EndOfStream)
    }
}

impl From<russh::Error> for TunnelError {
    fn from(err: russh::Error) -> Self {
        match err {
            russh::Error::Disconnect | russh::Error::HUP | russh::Error::SendError => {
                TunnelError::EndOfStream
            }
            russh::Error::IO(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                TunnelError::EndOfStream
            }
            other => TunnelError::Russh(other.to_string()),
        }
    }
}
