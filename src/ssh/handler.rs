use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use russh::client::Handler;
use russh::keys::{Certificate, PublicKey};

use crate::error::TunnelError;

use super::host_key_verification::{HostKey, HostKeyVerifier, verify_host_key};

/// russh client handler that routes host key checks through a [`HostKeyVerifier`]
pub struct ClientHandler {
    /// `host:port` as dialed
    hostname: String,
    remote: SocketAddr,
    verifier: Arc<dyn HostKeyVerifier>,
    /// Certificate captured during verification, read back after the handshake
    certificate: Arc<Mutex<Option<Certificate>>>,
}

impl ClientHandler {
    pub fn new(
        hostname: String,
        remote: SocketAddr,
        verifier: Arc<dyn HostKeyVerifier>,
        certificate: Arc<Mutex<Option<Certificate>>>,
    ) -> Self {
        Self {
            hostname,
            remote,
            verifier,
            certificate,
        }
    }

    async fn check(&self, key: HostKey) -> Result<bool, TunnelError> {
        let hostname = self.hostname.clone();
        let remote = self.remote;
        let verifier = self.verifier.clone();

        // known_hosts lookups touch the filesystem
        let verified = tokio::task::spawn_blocking(move || {
            verify_host_key(verifier.as_ref(), &hostname, remote, &key)
        })
        .await
        .map_err(|e| TunnelError::HostKeyVerification(format!("Host key check failed: {}", e)))??;

        if let Some(cert) = verified.certificate {
            *self.certificate.lock() = Some(cert);
        }
        Ok(true)
    }
}

impl Handler for ClientHandler {
    type Error = TunnelError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let key = HostKey::PublicKey(server_public_key.clone());
        async move { self.check(key).await }
    }
}
