use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::TunnelSettings;
use crate::error::ConfigError;

use super::client::RusshConnector;
use super::identity::ConnectionIdentity;
use super::session::{AuthMethod, SessionConfig, SessionConnector};
use super::tunnel::TunnelClient;

/// Default idle timeout for pooled HTTP connections
pub const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// One [`TunnelClient`] per [`ConnectionIdentity`], created on first request.
///
/// Clients are never evicted; the pool lives as long as its owner. Getting a
/// client does no I/O, the SSH session is dialed on the client's first use.
pub struct SessionPool<C: SessionConnector = RusshConnector> {
    clients: Mutex<HashMap<ConnectionIdentity, Arc<TunnelClient<C>>>>,
    config: SessionConfig,
    connector: Arc<C>,
    pool_idle_timeout: Option<Duration>,
}

impl SessionPool<RusshConnector> {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_connector(config, RusshConnector::new())
    }

    /// Pool built from a settings file: timeouts, known_hosts, HTTP idle
    /// timeout, and `auth` followed by the keys in `identity_files`.
    pub fn from_settings(
        settings: &TunnelSettings,
        auth: Vec<AuthMethod>,
    ) -> Result<Self, ConfigError> {
        Self::from_settings_with_connector(settings, auth, RusshConnector::new())
    }
}

impl<C: SessionConnector> SessionPool<C> {
    pub fn with_connector(config: SessionConfig, connector: C) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            config,
            connector: Arc::new(connector),
            pool_idle_timeout: Some(DEFAULT_POOL_IDLE_TIMEOUT),
        }
    }

    pub fn from_settings_with_connector(
        settings: &TunnelSettings,
        mut auth: Vec<AuthMethod>,
        connector: C,
    ) -> Result<Self, ConfigError> {
        auth.extend(settings.identity_auth());
        let config = settings.session_config(auth)?;
        Ok(Self::with_connector(config, connector)
            .with_pool_idle_timeout(settings.pool_idle_timeout()))
    }

    /// Idle timeout for the HTTP connection pool of clients created from now on.
    pub fn with_pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// The client for `identity`, creating it if this is the first request.
    ///
    /// Every call with an equal identity returns the same client.
    pub fn get_client(&self, identity: &ConnectionIdentity) -> Arc<TunnelClient<C>> {
        let mut clients = self.clients.lock();
        if let Some(client) = clients.get(identity) {
            return client.clone();
        }

        tracing::debug!("Creating tunnel client for {}", identity);
        let client = TunnelClient::new(
            identity.clone(),
            self.config.for_identity(identity),
            self.connector.clone(),
            self.pool_idle_timeout,
        );
        clients.insert(identity.clone(), client.clone());
        client
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Identities that currently have a client.
    pub fn identities(&self) -> Vec<ConnectionIdentity> {
        self.clients.lock().keys().cloned().collect()
    }

    /// The base configuration clients are derived from.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<C: SessionConnector> std::fmt::Debug for SessionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("clients", &self.len())
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .finish_non_exhaustive()
    }
}
