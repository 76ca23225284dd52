use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use russh::keys::Certificate;
use tokio::sync::Mutex;

use crate::error::TunnelError;
use crate::tunnel_log;

use super::http::{self, HttpClient, PooledClient};
use super::identity::ConnectionIdentity;
use super::session::{SessionConfig, SessionConnector, Target, TunnelSession};
use super::stream::TunneledStream;

/// Stream type handed out by a [`TunnelClient`] built on connector `C`.
pub type TunnelStream<C> =
    TunneledStream<<<C as SessionConnector>::Session as TunnelSession>::Stream>;

struct ClientState<S> {
    session: Option<Arc<S>>,
    certificate: Option<Certificate>,
}

/// Owns the single SSH session for one [`ConnectionIdentity`].
///
/// The session is dialed lazily on the first [`dial`](Self::dial). All
/// connects, dials and reconnects for the identity are serialized behind one
/// lock, so concurrent dials never race to create a second session.
pub struct TunnelClient<C: SessionConnector> {
    identity: ConnectionIdentity,
    config: SessionConfig,
    connector: Arc<C>,
    state: Mutex<ClientState<C::Session>>,
    http: Arc<RwLock<PooledClient<C>>>,
    pool_idle_timeout: Option<Duration>,
    this: Weak<Self>,
}

impl<C: SessionConnector> TunnelClient<C> {
    pub(crate) fn new(
        identity: ConnectionIdentity,
        config: SessionConfig,
        connector: Arc<C>,
        pool_idle_timeout: Option<Duration>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this: &Weak<Self>| Self {
            identity,
            config,
            connector,
            state: Mutex::new(ClientState {
                session: None,
                certificate: None,
            }),
            http: Arc::new(RwLock::new(http::build_http_client(
                this.clone(),
                pool_idle_timeout,
            ))),
            pool_idle_timeout,
            this: this.clone(),
        })
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    /// This client's copy of the session configuration.
    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a session handle is currently held.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    /// Certificate presented by the server on the most recent connect that had one.
    pub async fn host_certificate(&self) -> Option<Certificate> {
        self.state.lock().await.certificate.clone()
    }

    /// Establish the session now rather than on the first dial.
    ///
    /// Does nothing if a session is already held.
    pub async fn connect(&self) -> Result<(), TunnelError> {
        let mut state = self.state.lock().await;
        if state.session.is_none() {
            let session = self.establish(&mut state).await?;
            state.session = Some(session);
        }
        Ok(())
    }

    /// Send a keepalive on the current session.
    ///
    /// `false` when no session is held. A `true` answer is only a snapshot.
    pub async fn is_alive(&self) -> bool {
        let state = self.state.lock().await;
        match &state.session {
            Some(session) => answers_keepalive(session.as_ref()).await,
            None => false,
        }
    }

    /// Open a stream to `address` through this identity's session.
    ///
    /// Connects first if no session is held. If the first stream-open fails
    /// with end-of-stream, or fails and the session no longer answers a
    /// keepalive, the session is dropped, reconnected and the open retried
    /// exactly once. Any other failure is returned unchanged.
    pub async fn dial(
        &self,
        network: &str,
        address: &str,
    ) -> Result<TunnelStream<C>, TunnelError> {
        let target = Target::parse(network, address)?;
        let identity = self.identity.to_string();

        let mut state = self.state.lock().await;
        let mut retried = false;

        loop {
            let session = match &state.session {
                Some(session) => Arc::clone(session),
                None => {
                    let session = self.establish(&mut state).await?;
                    state.session = Some(Arc::clone(&session));
                    session
                }
            };

            let err = match session.open_stream(&target).await {
                Ok(stream) => {
                    tracing::debug!(
                        identity = %identity,
                        address = %address,
                        "Tunneled stream opened"
                    );
                    return Ok(TunneledStream::new(stream, network, address));
                }
                Err(e) => e,
            };

            let broken = !retried
                && (err.is_end_of_stream() || !answers_keepalive(session.as_ref()).await);
            if !broken {
                tracing::warn!(
                    identity = %identity,
                    address = %address,
                    error = %err,
                    "Tunneled stream failed"
                );
                return Err(err);
            }

            // ssh connection broken
            tunnel_log::log_session_dead(&identity, address, &err.to_string());
            state.session = None;
            session.close().await;
            self.close_idle_connections();
            retried = true;
        }
    }

    /// HTTP client whose connections are dialed through this tunnel.
    pub fn http_client(&self) -> HttpClient<C> {
        HttpClient::new(self.http.clone())
    }

    /// Drop idle pooled HTTP connections.
    ///
    /// The connection pool is replaced with a fresh one. Every [`HttpClient`]
    /// handle, including ones obtained earlier, sends its next request
    /// through the new pool.
    pub fn close_idle_connections(&self) {
        *self.http.write() = http::build_http_client(self.this.clone(), self.pool_idle_timeout);
    }

    async fn establish(
        &self,
        state: &mut ClientState<C::Session>,
    ) -> Result<Arc<C::Session>, TunnelError> {
        let identity = self.identity.to_string();
        tracing::debug!("Connecting SSH session for {}", identity);

        match self.connector.connect(&self.identity, &self.config).await {
            Ok(established) => {
                if let Some(cert) = established.certificate {
                    state.certificate = Some(cert);
                }
                tunnel_log::log_session_established(&identity);
                Ok(Arc::new(established.session))
            }
            Err(e) => {
                tunnel_log::log_session_failed(&identity, &e.to_string());
                Err(e)
            }
        }
    }
}

impl<C: SessionConnector> fmt::Debug for TunnelClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelClient")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

async fn answers_keepalive<S: TunnelSession>(session: &S) -> bool {
    match session.send_keepalive().await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("SSH keepalive failed: {}", e);
            false
        }
    }
}
