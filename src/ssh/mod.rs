//! SSH sessions and the streams tunneled through them.

pub mod client;
pub mod connection_pool;
pub mod handler;
pub mod host_key_verification;
pub mod http;
pub mod identity;
pub mod keys;
pub mod session;
pub mod stream;
pub mod tunnel;

pub use client::{RusshConnector, RusshSession};
pub use connection_pool::SessionPool;
pub use host_key_verification::{
    AcceptAnyHostKey, HostKey, HostKeyVerifier, KnownHostsVerifier, Verified, verify_host_key,
};
pub use http::{HttpClient, TunnelConnector};
pub use identity::ConnectionIdentity;
pub use keys::{load_key_file, read_private_keys};
pub use session::{AuthMethod, Established, SessionConfig, SessionConnector, Target, TunnelSession};
pub use stream::TunneledStream;
pub use tunnel::{TunnelClient, TunnelStream};
