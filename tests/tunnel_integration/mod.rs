//! Tunnel integration tests
//!
//! Everything here runs against a scripted in-memory SSH transport, so no
//! server is needed.
//!
//! ```bash
//! cargo test --test tunnel_integration
//! ```

pub mod fixtures;

mod http_tests;
mod pool_tests;
mod settings_tests;
