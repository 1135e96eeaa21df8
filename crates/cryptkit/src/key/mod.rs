//! Key and nonce derivation.
//!
//! A user key is a passphrase of any length. Unless a literal key is requested it is
//! stretched with BLAKE3 in key-derivation mode to exactly the length the primitive needs.

pub mod material;

use common::CryptError;
use tracing::debug;
use uuid::Uuid;

pub use material::SecretBytes;

use crate::crypto::{CipherSpec, ModeKind};
use crate::params::{Params, Resolver};

/// BLAKE3 context for key stretching. Changing it changes every derived key.
const KEY_CONTEXT: &str = "cryptkit 2024-01 key stretching";

/// Stretch `key` to exactly `len` bytes.
pub fn stretch(key: &[u8], len: usize) -> SecretBytes {
    let mut hasher = blake3::Hasher::new_derive_key(KEY_CONTEXT);
    hasher.update(key);
    let mut out = vec![0u8; len];
    hasher.finalize_xof().fill(&mut out);
    SecretBytes::new(out)
}

/// Key length for `kind` over `cipher`.
///
/// Explicit size, else the mode's own length, else the cipher's native key length, else its
/// block length, else the cipher's fallback length.
pub fn cipher_key_len(
    explicit: Option<usize>,
    kind: ModeKind,
    cipher: Option<&CipherSpec>,
) -> usize {
    explicit
        .or(kind.fixed_key_len())
        .or_else(|| cipher.and_then(|c| c.key_len))
        .or_else(|| cipher.and_then(|c| c.block_len))
        .or_else(|| cipher.map(|c| c.fallback_key_len))
        .unwrap_or(32)
}

/// Return the call's key verbatim when a literal key is requested, else stretch it to `len()`.
///
/// `len` is only evaluated when stretching.
///
/// # Errors
///
/// - [`CryptError::MissingParameter`] (`"key"`) if neither the call nor the defaults hold a key.
/// - Whatever `len` returns.
pub fn derive_key_with(
    resolver: &Resolver<'_>,
    params: &Params,
    len: impl FnOnce() -> Result<usize, CryptError>,
) -> Result<SecretBytes, CryptError> {
    let key = resolver
        .key(params)
        .ok_or_else(|| CryptError::MissingParameter("key".into()))?;
    if resolver.literal_key(params) {
        return Ok(key.clone());
    }
    let len = len()?;
    debug!(len, "stretching key");
    Ok(stretch(key.as_bytes(), len))
}

/// Nonce for an authenticated mode: the call's, else the default, else a fresh UUIDv4.
pub fn derive_nonce(resolver: &Resolver<'_>, params: &Params) -> Vec<u8> {
    params
        .nonce
        .as_deref()
        .filter(|n| !n.is_empty())
        .or_else(|| resolver.defaults.nonce())
        .map(<[u8]>::to_vec)
        .unwrap_or_else(|| Uuid::new_v4().as_bytes().to_vec())
}
