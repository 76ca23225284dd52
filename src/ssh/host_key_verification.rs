//! Host key verification for tunnel sessions.
//!
//! The base verifier is supplied once, in the pool's [`SessionConfig`], and
//! every client the pool creates runs it through [`verify_host_key`], which
//! returns the certificate the server presented, if any.
//!
//! [`SessionConfig`]: super::session::SessionConfig

use std::net::SocketAddr;
use std::path::PathBuf;

use russh::keys::{self, Certificate, HashAlg, PublicKey};

use crate::error::TunnelError;
use crate::tunnel_log;

use super::session::split_host_port;

/// Key material presented by a server during the handshake
#[derive(Debug, Clone)]
pub enum HostKey {
    PublicKey(PublicKey),
    Certificate(Box<Certificate>),
}

impl HostKey {
    /// The raw public key; for a certificate, the key it certifies.
    pub fn public_key(&self) -> PublicKey {
        match self {
            HostKey::PublicKey(key) => key.clone(),
            HostKey::Certificate(cert) => PublicKey::from(cert.public_key().clone()),
        }
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        match self {
            HostKey::PublicKey(_) => None,
            HostKey::Certificate(cert) => Some(cert.as_ref()),
        }
    }

    pub fn fingerprint(&self) -> String {
        self.public_key().fingerprint(HashAlg::Sha256).to_string()
    }
}

/// Outcome of a successful verification
#[derive(Debug, Clone, Default)]
pub struct Verified {
    pub certificate: Option<Certificate>,
}

/// Decides whether a server's host key is trusted.
///
/// `hostname` is the dialed `host:port`, `remote` the resolved peer address.
pub trait HostKeyVerifier: Send + Sync {
    fn verify(
        &self,
        hostname: &str,
        remote: SocketAddr,
        key: &HostKey,
    ) -> Result<(), TunnelError>;
}

impl<F> HostKeyVerifier for F
where
    F: Fn(&str, SocketAddr, &HostKey) -> Result<(), TunnelError> + Send + Sync,
{
    fn verify(
        &self,
        hostname: &str,
        remote: SocketAddr,
        key: &HostKey,
    ) -> Result<(), TunnelError> {
        self(hostname, remote, key)
    }
}

/// Run the configured verifier and capture a presented certificate.
pub fn verify_host_key(
    verifier: &dyn HostKeyVerifier,
    hostname: &str,
    remote: SocketAddr,
    key: &HostKey,
) -> Result<Verified, TunnelError> {
    let fingerprint = key.fingerprint();

    if let Err(e) = verifier.verify(hostname, remote, key) {
        tunnel_log::log_host_key_rejected(hostname, &fingerprint, &e.to_string());
        return Err(e);
    }
    tunnel_log::log_host_key_verified(hostname, &fingerprint);

    let certificate = key.certificate().cloned();
    if let Some(cert) = &certificate {
        tunnel_log::log_host_certificate_captured(hostname, cert.key_id(), cert.serial());
    }

    Ok(Verified { certificate })
}

/// Checks host keys against an OpenSSH known_hosts file
#[derive(Debug, Clone)]
pub struct KnownHostsVerifier {
    path: PathBuf,
}

impl KnownHostsVerifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl HostKeyVerifier for KnownHostsVerifier {
    fn verify(
        &self,
        hostname: &str,
        _remote: SocketAddr,
        key: &HostKey,
    ) -> Result<(), TunnelError> {
        let (host, port) = split_host_port(hostname)?;
        let public_key = key.public_key();

        match keys::check_known_hosts_path(host, port, &public_key, &self.path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(TunnelError::HostKeyVerification(format!(
                "{} is not in {}",
                hostname,
                self.path.display()
            ))),
            Err(keys::Error::KeyChanged { line }) => {
                Err(TunnelError::HostKeyVerification(format!(
                    "host key for {} changed (known_hosts line {})",
                    hostname, line
                )))
            }
            Err(e) => Err(TunnelError::HostKeyVerification(format!(
                "cannot check {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}

/// Trusts every host key. Only for tests and closed lab networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAnyHostKey;

impl HostKeyVerifier for AcceptAnyHostKey {
    fn verify(
        &self,
        hostname: &str,
        _remote: SocketAddr,
        key: &HostKey,
    ) -> Result<(), TunnelError> {
        tracing::warn!(
            "Accepting unverified host key {} for {}",
            key.fingerprint(),
            hostname
        );
        Ok(())
    }
}
