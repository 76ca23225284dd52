//! Session configuration and the seam between the tunnel core and the SSH
//! transport.
//!
//! [`SessionConnector`] dials and authenticates a session; [`TunnelSession`]
//! is what the core needs from a live one: open a forwarded stream, send a
//! keepalive and close it. The russh-backed implementation lives in
//! [`super::client`].

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use russh::keys::{Certificate, PrivateKey};
use secrecy::SecretString;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::TunnelError;

use super::host_key_verification::HostKeyVerifier;
use super::identity::ConnectionIdentity;

/// One way of proving who we are to the server
#[derive(Clone)]
pub enum AuthMethod {
    /// Password authentication; the secret is only exposed at the auth call
    Password(SecretString),
    /// Public key authentication with an already-loaded key
    PublicKey(Arc<PrivateKey>),
    /// Keys held by the running ssh-agent (`SSH_AUTH_SOCK`)
    Agent,
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::Password(_) => "password",
            AuthMethod::PublicKey(_) => "publickey",
            AuthMethod::Agent => "agent",
        }
    }
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.debug_tuple("Password").field(&"[REDACTED]").finish(),
            AuthMethod::PublicKey(_) => f.debug_tuple("PublicKey").field(&"[KEY]").finish(),
            AuthMethod::Agent => f.debug_struct("Agent").finish(),
        }
    }
}

/// Everything needed to establish one SSH session.
///
/// The pool keeps a base copy and hands each client its own clone with the
/// identity's credentials merged in.
#[derive(Clone)]
pub struct SessionConfig {
    pub user: String,
    pub auth: Vec<AuthMethod>,
    pub host_key_verifier: Arc<dyn HostKeyVerifier>,
    /// Bound on TCP connect and on the SSH handshake + authentication
    pub timeout: Duration,
    /// russh background keepalive; `None` disables it
    pub keepalive_interval: Option<Duration>,
    pub inactivity_timeout: Option<Duration>,
}

impl SessionConfig {
    pub fn new(host_key_verifier: Arc<dyn HostKeyVerifier>) -> Self {
        Self {
            user: String::new(),
            auth: Vec::new(),
            host_key_verifier,
            timeout: Duration::from_secs(10),
            keepalive_interval: None,
            inactivity_timeout: Some(Duration::from_secs(3600)),
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_auth(mut self, method: AuthMethod) -> Self {
        self.auth.push(method);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Copy of this config carrying the identity's credentials.
    ///
    /// Password auth is only appended when the identity names a user; an
    /// identity with a password but no username authenticates with the base
    /// methods alone.
    pub fn for_identity(&self, identity: &ConnectionIdentity) -> Self {
        let mut config = self.clone();
        if !identity.username.is_empty() {
            config.user = identity.username.clone();
            config.auth.push(AuthMethod::Password(SecretString::from(
                identity.password.clone(),
            )));
        }
        config
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("user", &self.user)
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .field("inactivity_timeout", &self.inactivity_timeout)
            .finish_non_exhaustive()
    }
}

/// Destination of a forwarded stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

impl Target {
    /// Parse a `(network, address)` pair as handed to a dialer.
    ///
    /// `tcp`, `tcp4` and `tcp6` take `host:port`; `unix` takes a socket path
    /// on the remote host.
    pub fn parse(network: &str, address: &str) -> Result<Self, TunnelError> {
        match network {
            "tcp" | "tcp4" | "tcp6" => {
                let (host, port) = split_host_port(address)?;
                Ok(Target::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            "unix" => {
                if address.is_empty() {
                    return Err(TunnelError::InvalidAddress {
                        address: address.to_string(),
                        reason: "empty socket path".to_string(),
                    });
                }
                Ok(Target::Unix {
                    path: address.to_string(),
                })
            }
            other => Err(TunnelError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Target::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Target::Unix { path } => f.write_str(path),
        }
    }
}

/// Split `host:port`, stripping brackets from IPv6 literals.
pub(crate) fn split_host_port(address: &str) -> Result<(&str, u16), TunnelError> {
    let invalid = |reason: &str| TunnelError::InvalidAddress {
        address: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;
    let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    Ok((host, port))
}

/// A freshly established session plus anything learned while verifying it
pub struct Established<S> {
    pub session: S,
    pub certificate: Option<Certificate>,
}

/// A live, multiplexed SSH session
pub trait TunnelSession: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new forwarded channel to `target`.
    fn open_stream(
        &self,
        target: &Target,
    ) -> impl Future<Output = Result<Self::Stream, TunnelError>> + Send;

    /// Send a keepalive request that expects no reply.
    fn send_keepalive(&self) -> impl Future<Output = Result<(), TunnelError>> + Send;

    /// Best-effort disconnect.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Dials and authenticates sessions
pub trait SessionConnector: Send + Sync + 'static {
    type Session: TunnelSession;

    fn connect(
        &self,
        identity: &ConnectionIdentity,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<Established<Self::Session>, TunnelError>> + Send;
}
