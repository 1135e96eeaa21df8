//! Keyed MACs over the RustCrypto `Mac` trait (HMAC and CMAC).

use common::CryptError;
use hmac::{
    digest::{KeyInit, OutputSizeUser},
    Hmac, Mac,
};
use sha2::{Sha224, Sha256, Sha384, Sha512, Sha512_256};

use super::MacHandle;

struct KeyedMac<M> {
    mac: M,
}

impl<M> MacHandle for KeyedMac<M>
where
    M: Mac + Clone + Send,
{
    fn tag_len(&self) -> usize {
        <M as OutputSizeUser>::output_size()
    }

    fn compute(&self, message: &[u8]) -> Vec<u8> {
        self.mac
            .clone()
            .chain_update(message)
            .finalize()
            .into_bytes()
            .to_vec()
    }

    fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(message);
        mac.verify_slice(tag).is_ok()
    }
}

/// Key a MAC of type `M`.
///
/// # Errors
///
/// Returns [`CryptError::InvalidKeyLength`] if `M` rejects the key length.
pub fn keyed<M>(name: &str, key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError>
where
    M: Mac + KeyInit + Clone + Send + 'static,
{
    let mac = <M as Mac>::new_from_slice(key).map_err(|_| CryptError::InvalidKeyLength {
        algorithm: name.to_owned(),
        actual: key.len(),
    })?;
    Ok(Box::new(KeyedMac { mac }))
}

/// HMAC-SHA-256.
pub fn hmac_sha256(key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError> {
    keyed::<Hmac<Sha256>>("HMAC-SHA-256", key)
}

/// HMAC-SHA-512.
pub fn hmac_sha512(key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError> {
    keyed::<Hmac<Sha512>>("HMAC-SHA-512", key)
}

/// HMAC-SHA-384.
pub fn hmac_sha384(key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError> {
    keyed::<Hmac<Sha384>>("HMAC-SHA-384", key)
}

/// HMAC-SHA-224.
pub fn hmac_sha224(key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError> {
    keyed::<Hmac<Sha224>>("HMAC-SHA-224", key)
}

/// HMAC-SHA-512/256.
pub fn hmac_sha512_256(key: &[u8]) -> Result<Box<dyn MacHandle>, CryptError> {
    keyed::<Hmac<Sha512_256>>("HMAC-SHA-512/256", key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_known_answer() {
        // RFC 4231, test case 2.
        let mac = hmac_sha256(b"Jefe").unwrap();
        let tag = mac.compute(b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(&tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
        assert_eq!(mac.tag_len(), 32);
    }

    #[test]
    fn verify_rejects_wrong_tag() {
        let mac = hmac_sha512(b"key").unwrap();
        let mut tag = mac.compute(b"msg");
        assert!(mac.verify(b"msg", &tag));
        tag[0] ^= 1;
        assert!(!mac.verify(b"msg", &tag));
        assert!(!mac.verify(b"msg", &tag[..10]));
    }

    #[test]
    fn tag_lengths() {
        assert_eq!(hmac_sha384(b"k").unwrap().tag_len(), 48);
        assert_eq!(hmac_sha224(b"k").unwrap().tag_len(), 28);
        assert_eq!(hmac_sha512_256(b"k").unwrap().tag_len(), 32);
    }

    #[test]
    fn handle_is_reusable() {
        let mac = hmac_sha256(b"k").unwrap();
        assert_eq!(mac.compute(b"a"), mac.compute(b"a"));
    }
}
