//! Private key files as authentication methods.

use std::path::Path;
use std::sync::Arc;

use russh::keys::PrivateKey;

use crate::error::TunnelError;

use super::session::AuthMethod;

/// Load an unencrypted OpenSSH or PEM private key from `path`.
pub fn load_key_file(path: &Path) -> Result<PrivateKey, TunnelError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        TunnelError::KeyFile(format!("Cannot read key file {}: {}", path.display(), e))
    })?;

    // A .pub file handed over by mistake
    let first_line = content.lines().next().unwrap_or("");
    if first_line.starts_with("ssh-") || first_line.starts_with("ecdsa-") {
        return Err(TunnelError::KeyFile(format!(
            "File {} contains a public key, not a private key",
            path.display()
        )));
    }

    if !first_line.starts_with("-----BEGIN") {
        return Err(TunnelError::KeyFile(format!(
            "File {} does not appear to be an SSH private key",
            path.display()
        )));
    }

    russh::keys::load_secret_key(path, None).map_err(|e| {
        TunnelError::KeyFile(format!("Failed to load key {}: {}", path.display(), e))
    })
}

/// Public-key auth methods for every key in `paths` that loads.
///
/// A key that cannot be loaded is logged and skipped, so one stale entry
/// does not take the others down with it.
pub fn read_private_keys<P: AsRef<Path>>(paths: &[P]) -> Vec<AuthMethod> {
    let mut methods = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        match load_key_file(path) {
            Ok(key) => {
                tracing::debug!(path = %path.display(), "Loaded private key");
                methods.push(AuthMethod::PublicKey(Arc::new(key)));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unable to load private key");
            }
        }
    }
    methods
}
