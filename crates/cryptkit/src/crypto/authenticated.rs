//! AEAD handles: a keyed AEAD bound to a single nonce.

use aead::{generic_array::GenericArray, Aead, AeadCore, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use cipher::KeyInit;
use common::CryptError;

use super::{CipherHandle, ModeKind};

/// Context string for projecting a caller nonce onto a mode's fixed nonce size.
const NONCE_CONTEXT: &str = "cryptkit 2024-01 aead nonce projection";

struct AeadHandle<A: AeadCore> {
    aead: A,
    nonce: Nonce<A>,
    name: &'static str,
}

impl<A> CipherHandle for AeadHandle<A>
where
    A: Aead + Send,
{
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptError> {
        self.aead
            .encrypt(&self.nonce, plaintext)
            .map_err(|_| CryptError::EncryptionFailed(format!("{} refused the input", self.name)))
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptError> {
        self.aead
            .decrypt(&self.nonce, ciphertext)
            .map_err(|_| CryptError::TamperDetected(format!("{} tag mismatch", self.name)))
    }
}

/// Build an AEAD handle for `A`, keyed with `key` and bound to `nonce`.
///
/// A nonce whose length does not match the mode is projected onto the right size with a
/// BLAKE3 XOF, so the same caller nonce always selects the same mode nonce.
///
/// # Errors
///
/// Returns [`CryptError::InvalidKeyLength`] if `key` does not fit `A`.
pub fn aead_handle<A>(
    name: &'static str,
    key: &[u8],
    nonce: &[u8],
) -> Result<Box<dyn CipherHandle>, CryptError>
where
    A: Aead + KeyInit + Send + 'static,
{
    let aead = A::new_from_slice(key).map_err(|_| CryptError::InvalidKeyLength {
        algorithm: name.to_owned(),
        actual: key.len(),
    })?;
    Ok(Box::new(AeadHandle::<A> {
        aead,
        nonce: fit_nonce::<A>(nonce),
        name,
    }))
}

fn fit_nonce<A: AeadCore>(nonce: &[u8]) -> Nonce<A> {
    let mut out: Nonce<A> = GenericArray::default();
    if out.len() == nonce.len() {
        out.copy_from_slice(nonce);
    } else {
        let mut hasher = blake3::Hasher::new_derive_key(NONCE_CONTEXT);
        hasher.update(nonce);
        hasher.finalize_xof().fill(&mut out);
    }
    out
}

/// ChaCha20-Poly1305. Carries its own cipher; the key must be 32 bytes.
pub fn chacha20poly1305(
    kind: ModeKind,
    key: &[u8],
    nonce: Option<&[u8]>,
) -> Result<Box<dyn CipherHandle>, CryptError> {
    if kind != ModeKind::ChaCha20Poly1305 {
        return Err(CryptError::unsupported("mode", format!("{kind:?} over ChaCha20")));
    }
    let nonce = nonce.ok_or_else(|| CryptError::MissingParameter("nonce".into()))?;
    aead_handle::<ChaCha20Poly1305>("ChaCha20-Poly1305", key, nonce)
}
