use std::sync::Arc;

use parking_lot::Mutex;
use russh::client::{self, AuthResult, Config, Handle, Msg};
use russh::keys::{HashAlg, PrivateKey, PrivateKeyWithHashAlg};
use russh::{ChannelStream, Disconnect};
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::TunnelError;
use crate::tunnel_log;

use super::handler::ClientHandler;
use super::identity::ConnectionIdentity;
use super::session::{
    AuthMethod, Established, SessionConfig, SessionConnector, Target, TunnelSession,
};

/// Dials real SSH servers over TCP with russh
#[derive(Debug, Clone, Copy, Default)]
pub struct RusshConnector;

impl RusshConnector {
    pub fn new() -> Self {
        Self
    }

    fn russh_config(config: &SessionConfig) -> Arc<Config> {
        Arc::new(Config {
            inactivity_timeout: config.inactivity_timeout,
            // Treat zero as "no keepalive" to avoid immediate timeout
            keepalive_interval: config.keepalive_interval.filter(|d| !d.is_zero()),
            keepalive_max: 3,
            ..Default::default()
        })
    }

    async fn establish(
        &self,
        identity: &ConnectionIdentity,
        config: &SessionConfig,
        stream: TcpStream,
    ) -> Result<Established<RusshSession>, TunnelError> {
        let remote = stream.peer_addr().map_err(|e| TunnelError::ConnectionFailed {
            host: identity.host.clone(),
            port: identity.port,
            reason: e.to_string(),
        })?;

        let certificate = Arc::new(Mutex::new(None));
        let handler = ClientHandler::new(
            identity.host_port(),
            remote,
            config.host_key_verifier.clone(),
            certificate.clone(),
        );

        let mut handle = client::connect_stream(Self::russh_config(config), stream, handler)
            .await
            .map_err(|e| match e {
                TunnelError::HostKeyVerification(_) => e,
                other => TunnelError::ConnectionFailed {
                    host: identity.host.clone(),
                    port: identity.port,
                    reason: other.to_string(),
                },
            })?;

        authenticate(&mut handle, identity, config).await?;

        let certificate = certificate.lock().take();
        Ok(Established {
            session: RusshSession { handle },
            certificate,
        })
    }
}

impl SessionConnector for RusshConnector {
    type Session = RusshSession;

    async fn connect(
        &self,
        identity: &ConnectionIdentity,
        config: &SessionConfig,
    ) -> Result<Established<RusshSession>, TunnelError> {
        let addr = identity.host_port();

        let stream = timeout(config.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TunnelError::Timeout(addr.clone()))?
            .map_err(|e| TunnelError::ConnectionFailed {
                host: identity.host.clone(),
                port: identity.port,
                reason: e.to_string(),
            })?;

        match timeout(config.timeout, self.establish(identity, config, stream)).await {
            Ok(result) => result,
            Err(_) => Err(TunnelError::Timeout(addr)),
        }
    }
}

/// Try each configured method in order until the server accepts one.
async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    identity: &ConnectionIdentity,
    config: &SessionConfig,
) -> Result<(), TunnelError> {
    let who = identity.to_string();
    let username = config.user.as_str();

    if config.auth.is_empty() {
        return Err(TunnelError::AuthenticationFailed(
            "no authentication methods configured".to_string(),
        ));
    }

    let mut last_error = None;
    for method in &config.auth {
        tunnel_log::log_auth_attempt(&who, method.name());

        let result = match method {
            // Use expose_secret() only at the point of authentication
            AuthMethod::Password(password) => handle
                .authenticate_password(username, password.expose_secret())
                .await
                .map_err(|e| TunnelError::AuthenticationFailed(e.to_string())),
            AuthMethod::PublicKey(key) => handle
                .authenticate_publickey(username, key_with_hash(key))
                .await
                .map_err(|e| TunnelError::AuthenticationFailed(e.to_string())),
            AuthMethod::Agent => authenticate_with_agent(handle, username).await,
        };

        match result {
            Ok(result) if result.success() => {
                tunnel_log::log_auth_success(&who, method.name());
                return Ok(());
            }
            Ok(_) => {
                let reason = "Authentication rejected by server";
                tunnel_log::log_auth_failure(&who, method.name(), reason);
                last_error = Some(TunnelError::AuthenticationFailed(reason.to_string()));
            }
            Err(e) => {
                tunnel_log::log_auth_failure(&who, method.name(), &e.to_string());
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        TunnelError::AuthenticationFailed("no authentication methods configured".to_string())
    }))
}

/// RSA keys sign with SHA-512; other key types use their native algorithm.
fn key_with_hash(key: &Arc<PrivateKey>) -> PrivateKeyWithHashAlg {
    let hash_alg = if key.algorithm().is_rsa() {
        Some(HashAlg::Sha512)
    } else {
        None
    };
    PrivateKeyWithHashAlg::new(key.clone(), hash_alg)
}

#[cfg(unix)]
async fn authenticate_with_agent(
    handle: &mut Handle<ClientHandler>,
    username: &str,
) -> Result<AuthResult, TunnelError> {
    let agent_path = std::env::var("SSH_AUTH_SOCK").map_err(|_| {
        TunnelError::Agent("SSH_AUTH_SOCK not set - is ssh-agent running?".to_string())
    })?;

    let stream = tokio::net::UnixStream::connect(&agent_path)
        .await
        .map_err(|e| TunnelError::Agent(format!("Failed to connect to SSH agent: {}", e)))?;

    let mut agent = russh::keys::agent::client::AgentClient::connect(stream);

    let identities = agent
        .request_identities()
        .await
        .map_err(|e| TunnelError::Agent(format!("Failed to get identities: {}", e)))?;

    if identities.is_empty() {
        return Err(TunnelError::Agent(
            "No identities found in SSH agent".to_string(),
        ));
    }

    for identity in identities {
        let hash_alg = if identity.algorithm().is_rsa() {
            Some(HashAlg::Sha512)
        } else {
            None
        };

        match handle
            .authenticate_publickey_with(username, identity, hash_alg, &mut agent)
            .await
        {
            Ok(result) if result.success() => return Ok(result),
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("Agent key failed: {}", e);
                continue;
            }
        }
    }

    Err(TunnelError::Agent(
        "No agent key accepted by server".to_string(),
    ))
}

#[cfg(not(unix))]
async fn authenticate_with_agent(
    _handle: &mut Handle<ClientHandler>,
    _username: &str,
) -> Result<AuthResult, TunnelError> {
    Err(TunnelError::Agent(
        "ssh-agent is only supported on unix".to_string(),
    ))
}

/// An authenticated russh session
pub struct RusshSession {
    handle: Handle<ClientHandler>,
}

impl TunnelSession for RusshSession {
    type Stream = ChannelStream<Msg>;

    async fn open_stream(&self, target: &Target) -> Result<ChannelStream<Msg>, TunnelError> {
        let channel = match target {
            Target::Tcp { host, port } => {
                self.handle
                    .channel_open_direct_tcpip(host.clone(), u32::from(*port), "127.0.0.1", 0)
                    .await?
            }
            Target::Unix { path } => {
                self.handle
                    .channel_open_direct_streamlocal(path.clone())
                    .await?
            }
        };
        Ok(channel.into_stream())
    }

    async fn send_keepalive(&self) -> Result<(), TunnelError> {
        self.handle.send_keepalive(false).await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("SSH disconnect failed: {}", e);
        }
    }
}
