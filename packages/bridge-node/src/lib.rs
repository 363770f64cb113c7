//! Bridge Node - Library interface
//!
//! Re-exports internal modules for use by the binaries and integration tests.

pub mod config;
pub mod feed;
pub mod logging;
pub mod redact;
pub mod server;
