//! Dial TCP and Unix-socket streams through pooled SSH sessions.
//!
//! A [`SessionPool`] hands out one [`TunnelClient`] per
//! [`ConnectionIdentity`] (host, port, username, password). Each client owns
//! a single SSH session, created on first use, and multiplexes every stream
//! it dials over that session. When a stream-open finds the session dead, the
//! client reconnects and retries once.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sshtunnel::{ConnectionIdentity, KnownHostsVerifier, SessionConfig, SessionPool};
//!
//! # async fn run() -> Result<(), sshtunnel::TunnelError> {
//! let pool = SessionPool::new(SessionConfig::new(Arc::new(KnownHostsVerifier::new(
//!     "/home/ops/.ssh/known_hosts",
//! ))));
//! let client = pool.get_client(&ConnectionIdentity::with_credentials(
//!     "bastion.example.com", 22, "ops", "secret",
//! ));
//! let stream = client.dial("tcp", "db.internal:5432").await?;
//! # drop(stream);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod ssh;
pub mod tunnel_log;

pub use config::TunnelSettings;
pub use error::{ConfigError, TunnelError};
pub use ssh::{
    AcceptAnyHostKey, AuthMethod, ConnectionIdentity, HostKey, HostKeyVerifier, HttpClient,
    KnownHostsVerifier, SessionConfig, SessionPool, TunnelClient, TunneledStream, load_key_file,
    read_private_keys,
};
