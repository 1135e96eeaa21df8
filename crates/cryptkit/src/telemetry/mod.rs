//! Structured logging setup.
//!
//! # Logging invariants
//!
//! - **No key, nonce or plaintext material** may appear in any span attribute or log field.
//!   Only algorithm names, categories, resolution tiers and lengths are logged.
//! - The filter is taken from `RUST_LOG`, falling back to the level passed by the caller.

pub mod init;

pub use init::init_tracing;
