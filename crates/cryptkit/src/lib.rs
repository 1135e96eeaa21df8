//! `cryptkit`: algorithm selection policy and tamper-evident envelopes.
//!
//! Layers, leaves first:
//! 1. [`fallback`]: ordered candidate lists per [`Category`] and the probe-cached search.
//! 2. [`params`]: explicit → default → fallback resolution of each call parameter.
//! 3. [`key`]: key stretching and nonce derivation.
//! 4. [`dispatch`] over [`crypto`]: resolved names → constructed primitives.
//! 5. [`envelope`] and [`tamper`]: versioned data envelopes and their authenticated wrappers.
//! 6. [`CryptKit`]: one configured instance exposing every operation.
//!
//! ```
//! use cryptkit::{CryptKit, Data, Params};
//!
//! let mut kit = CryptKit::new();
//! kit.defaults_mut().set_key("correct horse battery staple")?;
//!
//! let sealed = kit.tamper_proof(&Data::from("hello"), &Params::new())?;
//! assert_eq!(kit.thaw(&sealed, &Params::new())?, Data::from("hello"));
//! # Ok::<(), cryptkit::CryptError>(())
//! ```

pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod envelope;
pub mod fallback;
pub mod key;
pub mod kit;
pub mod params;
pub mod tamper;
pub mod telemetry;

pub use common::{CryptError, DataFrame, EnvelopeFlags, EnvelopeType, TamperFrame, FORMAT_VERSION};
pub use config::Defaults;
pub use envelope::Data;
pub use fallback::{Category, FallbackLists, FallbackResolver, Probe, ProbeCache, Strategy};
pub use key::SecretBytes;
pub use kit::CryptKit;
pub use params::{Params, Resolved, Tier};
pub use tamper::Verdict;
