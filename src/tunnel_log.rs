//! Structured security events for SSH sessions.
//!
//! Every event is emitted with `target: "security"` so that session, host key
//! and authentication activity can be filtered independently of debug
//! chatter. Per-stream traffic is logged on the crate's own target.
//!
//! # Example
//!
//! ```bash
//! RUST_LOG=security=info,sshtunnel=warn ./your-app
//! ```

use tracing::{info, warn};

/// An SSH session to `identity` came up.
pub fn log_session_established(identity: &str) {
    info!(
        target: "security",
        event = "session_established",
        identity = %identity,
        "SSH connection established"
    );
}

/// Connecting (or authenticating) to `identity` failed.
pub fn log_session_failed(identity: &str, reason: &str) {
    warn!(
        target: "security",
        event = "session_failed",
        identity = %identity,
        reason = %reason,
        "SSH connection failed"
    );
}

/// A session was judged dead and is about to be replaced.
pub fn log_session_dead(identity: &str, address: &str, reason: &str) {
    warn!(
        target: "security",
        event = "session_dead",
        identity = %identity,
        address = %address,
        reason = %reason,
        "SSH connection broken, reconnecting"
    );
}

pub fn log_host_key_verified(host: &str, fingerprint: &str) {
    info!(
        target: "security",
        event = "host_key_verified",
        host = %host,
        fingerprint = %fingerprint,
        "Host key verified"
    );
}

pub fn log_host_key_rejected(host: &str, fingerprint: &str, reason: &str) {
    warn!(
        target: "security",
        event = "host_key_rejected",
        host = %host,
        fingerprint = %fingerprint,
        reason = %reason,
        "Host key rejected"
    );
}

pub fn log_host_certificate_captured(host: &str, key_id: &str, serial: u64) {
    info!(
        target: "security",
        event = "host_certificate_captured",
        host = %host,
        key_id = %key_id,
        serial = serial,
        "Host presented a certificate"
    );
}

/// Log an SSH authentication attempt.
pub fn log_auth_attempt(identity: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_attempt",
        identity = %identity,
        method = %method,
        "SSH authentication attempt"
    );
}

pub fn log_auth_success(identity: &str, method: &str) {
    info!(
        target: "security",
        event = "auth_success",
        identity = %identity,
        method = %method,
        "SSH authentication succeeded"
    );
}

pub fn log_auth_failure(identity: &str, method: &str, reason: &str) {
    warn!(
        target: "security",
        event = "auth_failure",
        identity = %identity,
        method = %method,
        reason = %reason,
        "SSH authentication failed"
    );
}
