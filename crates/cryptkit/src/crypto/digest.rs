//! Built-in message digests (SHA-2 family).

use sha2::{Digest, Sha224, Sha256, Sha384, Sha512, Sha512_256};

use super::mac;
use super::registry::DigestSpec;

fn digest_with<D: Digest>(data: &[u8]) -> Vec<u8> {
    D::digest(data).to_vec()
}

macro_rules! digest_spec {
    ($name:literal, $ty:ty, $len:literal, $hmac:path) => {
        DigestSpec {
            name: $name.to_owned(),
            output_len: $len,
            digest: digest_with::<$ty>,
            hmac: $hmac,
        }
    };
}

/// Every digest the built-in registry ships, in preference order.
pub(crate) fn builtins() -> Vec<DigestSpec> {
    vec![
        digest_spec!("SHA-256", Sha256, 32, mac::hmac_sha256),
        digest_spec!("SHA-512", Sha512, 64, mac::hmac_sha512),
        digest_spec!("SHA-384", Sha384, 48, mac::hmac_sha384),
        digest_spec!("SHA-224", Sha224, 28, mac::hmac_sha224),
        digest_spec!("SHA-512/256", Sha512_256, 32, mac::hmac_sha512_256),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_lengths_match_declared() {
        for spec in builtins() {
            assert_eq!((spec.digest)(b"abc").len(), spec.output_len, "{}", spec.name);
        }
    }

    #[test]
    fn sha256_known_answer() {
        let spec = builtins().into_iter().next().unwrap();
        assert_eq!(
            hex::encode((spec.digest)(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digests_are_deterministic() {
        for spec in builtins() {
            assert_eq!((spec.digest)(b"x"), (spec.digest)(b"x"));
            assert_ne!((spec.digest)(b"x"), (spec.digest)(b"y"));
        }
    }
}
