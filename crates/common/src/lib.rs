//! Error taxonomy and envelope wire formats shared across `cryptkit` crates.

pub mod error;
pub mod protocol;

pub use error::CryptError;
pub use protocol::{DataFrame, EnvelopeFlags, EnvelopeType, TamperFrame, FORMAT_VERSION};
