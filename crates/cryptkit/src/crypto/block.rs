//! Block ciphers and the modes layered over them.
//!
//! Every block cipher registered here has a 128-bit block, which lets the same generic
//! code drive CBC, CFB, CTR, OFB, EAX, GCM and CCM. Unauthenticated modes draw a fresh
//! random IV per call and prepend it to the ciphertext.

use std::marker::PhantomData;

use aead::{rand_core::RngCore, OsRng};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::AesGcm;
use aes_gcm_siv::{Aes128GcmSiv, Aes256GcmSiv};
use ccm::Ccm;
use cipher::{
    block_padding::Pkcs7,
    consts::{U12, U16, U8},
    AsyncStreamCipher, BlockCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut,
    BlockSizeUser, KeyInit, KeyIvInit, StreamCipher,
};
use cmac::Cmac;
use common::CryptError;
use eax::Eax;

use super::authenticated::aead_handle;
use super::mac::keyed;
use super::{CipherHandle, MacHandle, ModeKind};
use crate::key::SecretBytes;

/// Block length shared by every registered block cipher.
pub const BLOCK_LEN: usize = 16;

/// The bounds a block cipher must meet to be driven by [`build_mode`].
pub trait BlockAlgorithm:
    BlockCipher
    + BlockEncrypt
    + BlockDecrypt
    + BlockSizeUser<BlockSize = U16>
    + KeyInit
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> BlockAlgorithm for T where
    T: BlockCipher
        + BlockEncrypt
        + BlockDecrypt
        + BlockSizeUser<BlockSize = U16>
        + KeyInit
        + Clone
        + Send
        + Sync
        + 'static
{
}

/// Construct `kind` over the block cipher `C`.
///
/// # Errors
///
/// - [`CryptError::InvalidKeyLength`] if `key` does not fit `C`.
/// - [`CryptError::MissingParameter`] if an authenticated mode is built without a nonce.
/// - [`CryptError::UnsupportedAlgorithm`] for modes that cannot run over a generic cipher.
pub fn build_mode<C: BlockAlgorithm>(
    algorithm: &'static str,
    kind: ModeKind,
    key: &[u8],
    nonce: Option<&[u8]>,
) -> Result<Box<dyn CipherHandle>, CryptError> {
    match kind {
        ModeKind::Cbc | ModeKind::Cfb | ModeKind::Ctr | ModeKind::Ofb => {
            // Reject a bad key here rather than on first use.
            C::new_from_slice(key).map_err(|_| invalid_key(algorithm, key))?;
            Ok(Box::new(Unauthenticated::<C> {
                kind,
                algorithm,
                key: SecretBytes::from(key),
                _cipher: PhantomData,
            }))
        }
        ModeKind::Eax => aead_handle::<Eax<C>>("EAX", key, require_nonce(nonce)?),
        ModeKind::Gcm => aead_handle::<AesGcm<C, U12>>("GCM", key, require_nonce(nonce)?),
        ModeKind::Ccm => aead_handle::<Ccm<C, U16, U8>>("CCM", key, require_nonce(nonce)?),
        ModeKind::GcmSiv | ModeKind::ChaCha20Poly1305 => Err(CryptError::unsupported(
            "mode",
            format!("{kind:?} over {algorithm}"),
        )),
    }
}

fn require_nonce(nonce: Option<&[u8]>) -> Result<&[u8], CryptError> {
    nonce.ok_or_else(|| CryptError::MissingParameter("nonce".into()))
}

fn invalid_key(algorithm: &str, key: &[u8]) -> CryptError {
    CryptError::InvalidKeyLength {
        algorithm: algorithm.to_owned(),
        actual: key.len(),
    }
}

// ---------------------------------------------------------------------------
// Unauthenticated modes
// ---------------------------------------------------------------------------

/// CBC/CFB/CTR/OFB over `C`. Holds the key; mode state is rebuilt per call.
struct Unauthenticated<C> {
    kind: ModeKind,
    algorithm: &'static str,
    key: SecretBytes,
    _cipher: PhantomData<fn() -> C>,
}

impl<C: BlockAlgorithm> Unauthenticated<C> {
    fn key_error(&self) -> CryptError {
        invalid_key(self.algorithm, self.key.as_bytes())
    }

    fn apply(&self, iv: &[u8], data: &[u8], encrypt: bool) -> Result<Vec<u8>, CryptError> {
        let key = self.key.as_bytes();
        let mut buf = data.to_vec();
        match (self.kind, encrypt) {
            (ModeKind::Cbc, true) => {
                let enc = cbc::Encryptor::<C>::new_from_slices(key, iv)
                    .map_err(|_| self.key_error())?;
                return Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(data));
            }
            (ModeKind::Cbc, false) => {
                let dec = cbc::Decryptor::<C>::new_from_slices(key, iv)
                    .map_err(|_| self.key_error())?;
                return dec
                    .decrypt_padded_vec_mut::<Pkcs7>(data)
                    .map_err(|_| CryptError::DecryptionFailed("invalid CBC padding".into()));
            }
            (ModeKind::Cfb, true) => cfb_mode::Encryptor::<C>::new_from_slices(key, iv)
                .map_err(|_| self.key_error())?
                .encrypt(&mut buf),
            (ModeKind::Cfb, false) => cfb_mode::Decryptor::<C>::new_from_slices(key, iv)
                .map_err(|_| self.key_error())?
                .decrypt(&mut buf),
            (ModeKind::Ctr, _) => ctr::Ctr128BE::<C>::new_from_slices(key, iv)
                .map_err(|_| self.key_error())?
                .apply_keystream(&mut buf),
            (ModeKind::Ofb, _) => ofb::Ofb::<C>::new_from_slices(key, iv)
                .map_err(|_| self.key_error())?
                .apply_keystream(&mut buf),
            (other, _) => {
                return Err(CryptError::unsupported("mode", format!("{other:?}")));
            }
        }
        Ok(buf)
    }
}

impl<C: BlockAlgorithm> CipherHandle for Unauthenticated<C> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptError> {
        let mut iv = [0u8; BLOCK_LEN];
        OsRng.fill_bytes(&mut iv);
        let body = self.apply(&iv, plaintext, true)?;
        let mut out = Vec::with_capacity(BLOCK_LEN + body.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptError> {
        if ciphertext.len() < BLOCK_LEN {
            return Err(CryptError::DecryptionFailed(
                "ciphertext shorter than the IV".into(),
            ));
        }
        let (iv, body) = ciphertext.split_at(BLOCK_LEN);
        self.apply(iv, body, false)
    }
}

// ---------------------------------------------------------------------------
// Registered ciphers
// ---------------------------------------------------------------------------

/// AES, with the variant picked from the key length (16, 24 or 32 bytes).
pub fn aes_mode(
    kind: ModeKind,
    key: &[u8],
    nonce: Option<&[u8]>,
) -> Result<Box<dyn CipherHandle>, CryptError> {
    match (kind, key.len()) {
        (ModeKind::GcmSiv, 16) => {
            aead_handle::<Aes128GcmSiv>("GCM-SIV", key, require_nonce(nonce)?)
        }
        (ModeKind::GcmSiv, 32) => {
            aead_handle::<Aes256GcmSiv>("GCM-SIV", key, require_nonce(nonce)?)
        }
        (ModeKind::GcmSiv, _) => Err(invalid_key("AES-GCM-SIV", key)),
        (_, 16) => build_mode::<Aes128>("AES-128", kind, key, nonce),
        (_, 24) => build_mode::<Aes192>("AES-192", kind, key, nonce),
        (_, 32) => build_mode::<Aes256>("AES-256", kind, key, nonce),
        _ => Err(invalid_key("AES", key)),
    }
}

/// CMAC over AES, with the variant picked from the key length.
pub fn aes_cmac(key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError> {
    match key.len() {
        16 => keyed::<Cmac<Aes128>>("CMAC-AES-128", key),
        24 => keyed::<Cmac<Aes192>>("CMAC-AES-192", key),
        32 => keyed::<Cmac<Aes256>>("CMAC-AES-256", key),
        _ => Err(invalid_key("CMAC-AES", key)),
    }
}

/// Twofish under `kind`. Takes 16, 24 or 32 byte keys.
#[cfg(feature = "twofish")]
pub fn twofish_mode(
    kind: ModeKind,
    key: &[u8],
    nonce: Option<&[u8]>,
) -> Result<Box<dyn CipherHandle>, CryptError> {
    build_mode::<twofish::Twofish>("Twofish", kind, key, nonce)
}

/// CMAC over Twofish.
#[cfg(feature = "twofish")]
pub fn twofish_cmac(key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError> {
    keyed::<Cmac<twofish::Twofish>>("CMAC-Twofish", key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONCE: &[u8] = b"0123456789abcdef";

    fn key(len: usize) -> Vec<u8> {
        (0..len as u8).collect()
    }

    #[test]
    fn every_mode_round_trips_over_aes() {
        let kinds = [
            ModeKind::Cbc,
            ModeKind::Cfb,
            ModeKind::Ctr,
            ModeKind::Ofb,
            ModeKind::Eax,
            ModeKind::Gcm,
            ModeKind::Ccm,
            ModeKind::GcmSiv,
        ];
        let messages: [&[u8]; 4] = [
            b"",
            b"x",
            b"exactly sixteen!",
            b"a somewhat longer message body",
        ];
        for kind in kinds {
            for len in [16, 32] {
                let handle = aes_mode(kind, &key(len), Some(NONCE)).unwrap();
                for msg in messages {
                    let ct = handle.encrypt(msg).unwrap();
                    assert_eq!(handle.decrypt(&ct).unwrap(), msg, "{kind:?}/{len}");
                }
            }
        }
    }

    #[test]
    fn ccm_accepts_messages_beyond_64k() {
        let handle = aes_mode(ModeKind::Ccm, &key(32), Some(NONCE)).unwrap();
        let msg = vec![7u8; 70_000];
        let ct = handle.encrypt(&msg).unwrap();
        assert_eq!(ct.len(), msg.len() + 16);
        assert_eq!(handle.decrypt(&ct).unwrap(), msg);
    }

    #[test]
    fn aes_192_supported_outside_gcm_siv() {
        assert!(aes_mode(ModeKind::Cbc, &key(24), None).is_ok());
        assert!(matches!(
            aes_mode(ModeKind::GcmSiv, &key(24), Some(NONCE)),
            Err(CryptError::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn bad_key_length_rejected() {
        assert!(matches!(
            aes_mode(ModeKind::Ctr, &key(20), None),
            Err(CryptError::InvalidKeyLength { actual: 20, .. })
        ));
    }

    #[test]
    fn unauthenticated_modes_use_fresh_ivs() {
        let handle = aes_mode(ModeKind::Cbc, &key(32), None).unwrap();
        let a = handle.encrypt(b"same input").unwrap();
        let b = handle.encrypt(b"same input").unwrap();
        assert_ne!(a, b);
        assert_eq!((a.len() - BLOCK_LEN) % BLOCK_LEN, 0);
    }

    #[test]
    fn authenticated_mode_needs_nonce() {
        assert!(matches!(
            aes_mode(ModeKind::Gcm, &key(32), None),
            Err(CryptError::MissingParameter(_))
        ));
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let handle = aes_mode(ModeKind::Ofb, &key(16), None).unwrap();
        assert!(matches!(
            handle.decrypt(&[0u8; 5]),
            Err(CryptError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn tampered_aead_ciphertext_detected() {
        let handle = aes_mode(ModeKind::Eax, &key(32), Some(NONCE)).unwrap();
        let mut ct = handle.encrypt(b"tamper me").unwrap();
        ct[0] ^= 0xFF;
        assert!(matches!(
            handle.decrypt(&ct),
            Err(CryptError::TamperDetected(_))
        ));
    }

    #[test]
    fn cmac_over_aes() {
        let mac = aes_cmac(&key(16)).unwrap();
        let tag = mac.compute(b"message");
        assert_eq!(tag.len(), 16);
        assert_eq!(mac.tag_len(), 16);
        assert!(mac.verify(b"message", &tag));
        assert!(!mac.verify(b"massage", &tag));
        assert!(aes_cmac(&key(7)).is_err());
    }
}
