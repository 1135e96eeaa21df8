//! Tamper-evident envelopes.
//!
//! ```text
//! mac:  0x01 | tag_len:u16 | tag | packed data envelope
//! aead: 0x02 | nonce_len:u16 | nonce | ciphertext(packed data envelope)
//! ```
//!
//! Sealing packs the data, then either encrypts it under an authenticated mode or MACs it in
//! the clear. Opening verifies before anything is unpacked.

use common::{CryptError, TamperFrame};
use tracing::{debug, warn};

use crate::crypto::{ModeClass, ModeSpec};
use crate::dispatch;
use crate::envelope::{self, Data};
use crate::fallback::Category;
use crate::key;
use crate::params::{Params, Resolver};

/// Outcome of opening a tamper-evident envelope with `fatal` off.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<T> {
    /// Integrity checked; the payload is trustworthy.
    Verified(T),
    /// Integrity check failed. No payload is recovered.
    Unverified,
}

impl<T> Verdict<T> {
    /// Returns `true` if the envelope verified.
    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified(_))
    }

    /// The payload, if verified.
    pub fn verified(self) -> Option<T> {
        match self {
            Verdict::Verified(v) => Some(v),
            Verdict::Unverified => None,
        }
    }

    /// Turn [`Verdict::Unverified`] back into [`CryptError::TamperDetected`].
    pub fn into_result(self) -> Result<T, CryptError> {
        match self {
            Verdict::Verified(v) => Ok(v),
            Verdict::Unverified => Err(CryptError::TamperDetected(
                "envelope failed verification".into(),
            )),
        }
    }
}

/// Select the authenticated mode for the encrypted branch.
///
/// Order: the call's `authenticated_mode`, the call's `mode`, the default
/// `authenticated_mode`, the default `mode`, then the authenticated fallback list.
///
/// # Errors
///
/// - [`CryptError::AuthenticatedModeRequired`] if the selection is not an AEAD mode.
/// - [`CryptError::UnsupportedAlgorithm`] if the name is not registered.
pub fn select_authenticated_mode<'a>(
    r: &Resolver<'a>,
    params: &Params,
) -> Result<&'a ModeSpec, CryptError> {
    let chosen = params
        .algorithm(Category::AuthenticatedMode)
        .or_else(|| params.algorithm(Category::Mode))
        .or_else(|| r.defaults.algorithm(Category::AuthenticatedMode))
        .or_else(|| r.defaults.algorithm(Category::Mode));

    let spec = match chosen {
        None => {
            let name = r.fallback(Category::AuthenticatedMode)?;
            r.registry
                .mode(&name)
                .ok_or_else(|| CryptError::unsupported(Category::AuthenticatedMode.name(), name))?
        }
        Some(name) => match ModeClass::from_symbol(name) {
            Some(ModeClass::Authenticated) => {
                dispatch::resolve_mode_class(r, params, ModeClass::Authenticated)?
            }
            Some(_) => return Err(CryptError::AuthenticatedModeRequired(name.to_owned())),
            None => r
                .registry
                .mode(name)
                .ok_or_else(|| CryptError::unsupported(Category::Mode.name(), name))?,
        },
    };

    if !spec.kind.is_authenticated() {
        return Err(CryptError::AuthenticatedModeRequired(spec.name.clone()));
    }
    Ok(spec)
}

/// Seal `data` into a tamper-evident envelope.
///
/// With `encode` on, the result is the envelope text-encoded with the resolved `encoding`.
pub fn seal(r: &Resolver<'_>, data: &Data, params: &Params) -> Result<Vec<u8>, CryptError> {
    let packed = envelope::pack(data)?;

    let frame = if r.encrypt(params) {
        let mode = select_authenticated_mode(r, params)?;
        let nonce = key::derive_nonce(r, params);
        let cipher = dispatch::build_cipher_in(r, params, mode, Some(&nonce))?;
        let ciphertext = cipher.encrypt(&packed)?;
        debug!(mode = %mode.name, "sealed aead envelope");
        TamperFrame::Aead { nonce, ciphertext }
    } else {
        let mac = dispatch::build_mac(r, params)?;
        let tag = mac.compute(&packed);
        debug!(tag_len = tag.len(), "sealed mac envelope");
        TamperFrame::Mac {
            tag,
            message: packed,
        }
    };

    let bytes = frame.encode()?;
    if r.encode(params) {
        let codec = dispatch::build_codec(r, Category::Encoding, params)?;
        return Ok((codec.encode)(&bytes).into_bytes());
    }
    Ok(bytes)
}

/// Open a tamper-evident envelope.
///
/// Integrity failures are [`CryptError::TamperDetected`] when `fatal` is on (the default)
/// and [`Verdict::Unverified`] otherwise. Every other error is returned as is.
pub fn open(r: &Resolver<'_>, input: &[u8], params: &Params) -> Result<Verdict<Data>, CryptError> {
    let fatal = r.fatal(params);

    let decoded;
    let bytes = if r.encode(params) {
        let codec = dispatch::build_codec(r, Category::Encoding, params)?;
        // Undecodable text is a damaged envelope, same as a bad frame.
        let text = match std::str::from_utf8(input) {
            Ok(text) => text,
            Err(e) => return reject(fatal, format!("{} text is not utf-8: {e}", codec.name)),
        };
        decoded = match (codec.decode)(text) {
            Ok(bytes) => bytes,
            Err(e) => return reject(fatal, e.to_string()),
        };
        decoded.as_slice()
    } else {
        input
    };

    let frame = match TamperFrame::decode(bytes) {
        Ok(frame) => frame,
        Err(e @ CryptError::UnknownEnvelopeType(_)) => return Err(e),
        Err(e) => return reject(fatal, e.to_string()),
    };

    let packed = match frame {
        TamperFrame::Mac { tag, message } => {
            let mac = dispatch::build_mac(r, params)?;
            if !mac.verify(&message, &tag) {
                return reject(fatal, "mac mismatch".into());
            }
            message
        }
        TamperFrame::Aead { nonce, ciphertext } => {
            let mode = select_authenticated_mode(r, params)?;
            let cipher = dispatch::build_cipher_in(r, params, mode, Some(&nonce))?;
            match cipher.decrypt(&ciphertext) {
                Ok(plaintext) => plaintext,
                Err(e) if e.is_tamper() => return reject(fatal, e.to_string()),
                Err(e) => return Err(e),
            }
        }
    };

    envelope::unpack(&packed).map(Verdict::Verified)
}

fn reject(fatal: bool, reason: String) -> Result<Verdict<Data>, CryptError> {
    warn!(fatal, reason = %reason, "tamper-evident envelope failed verification");
    if fatal {
        Err(CryptError::TamperDetected(reason))
    } else {
        Ok(Verdict::Unverified)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::Defaults;
    use crate::crypto::{ModeKind, Registry};
    use crate::fallback::{FallbackLists, FallbackResolver};

    struct Fixture {
        defaults: Defaults,
        lists: FallbackLists,
        fallback: FallbackResolver,
        registry: Arc<Registry>,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Registry::builtin();
            let mut defaults = Defaults::new();
            defaults.set_key("tamper key").unwrap();
            Self {
                defaults,
                lists: FallbackLists::new(),
                fallback: FallbackResolver::for_registry(registry.clone()),
                registry,
            }
        }

        fn resolver(&self) -> Resolver<'_> {
            Resolver::new(&self.defaults, &self.lists, &self.fallback, &self.registry)
        }
    }

    #[test]
    fn aead_round_trip_uses_eax_by_default() {
        let fx = Fixture::new();
        let r = fx.resolver();
        assert_eq!(
            select_authenticated_mode(&r, &Params::new()).unwrap().kind,
            ModeKind::Eax
        );
        let data = Data::from(json!({"user": "ada", "admin": false}));
        let sealed = seal(&r, &data, &Params::new()).unwrap();
        assert_eq!(sealed[0], 2);
        assert_eq!(open(&r, &sealed, &Params::new()).unwrap(), Verdict::Verified(data));
    }

    #[test]
    fn mac_round_trip() {
        let fx = Fixture::new();
        let r = fx.resolver();
        let params = Params::new().encrypt(false);
        let sealed = seal(&r, &Data::from("plain"), &params).unwrap();
        assert_eq!(sealed[0], 1);
        // HMAC-SHA-256 tag, then the packed envelope in the clear.
        assert_eq!(&sealed[1..3], &[0, 32]);
        assert!(sealed.ends_with(b"plain"));
        assert_eq!(open(&r, &sealed, &params).unwrap(), Verdict::Verified(Data::from("plain")));
    }

    #[test]
    fn every_flipped_byte_is_detected() {
        let fx = Fixture::new();
        let r = fx.resolver();
        for params in [Params::new(), Params::new().encrypt(false)] {
            let sealed = seal(&r, &Data::from("payload"), &params).unwrap();
            for i in 1..sealed.len() {
                let mut bad = sealed.clone();
                bad[i] ^= 0x01;
                assert!(
                    matches!(open(&r, &bad, &params), Err(CryptError::TamperDetected(_))),
                    "byte {i} of {sealed:?}"
                );
            }
        }
    }

    #[test]
    fn non_fatal_returns_unverified() {
        let fx = Fixture::new();
        let r = fx.resolver();
        let mut sealed = seal(&r, &Data::from("x"), &Params::new()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        let verdict = open(&r, &sealed, &Params::new().fatal(false)).unwrap();
        assert_eq!(verdict, Verdict::Unverified);
        assert!(verdict.into_result().unwrap_err().is_tamper());
    }

    #[test]
    fn unknown_type_is_reported_even_when_not_fatal() {
        let fx = Fixture::new();
        let r = fx.resolver();
        assert!(matches!(
            open(&r, &[9, 0, 0], &Params::new().fatal(false)),
            Err(CryptError::UnknownEnvelopeType(9))
        ));
    }

    #[test]
    fn non_authenticated_mode_is_refused() {
        let fx = Fixture::new();
        let r = fx.resolver();
        for mode in ["CBC", "stream"] {
            assert!(matches!(
                seal(&r, &Data::from("x"), &Params::new().mode(mode)),
                Err(CryptError::AuthenticatedModeRequired(_))
            ));
        }
    }

    #[test]
    fn mode_selection_order() {
        let mut fx = Fixture::new();
        fx.defaults.set_algorithm(Category::Mode, "CCM").unwrap();
        let r = fx.resolver();
        let pick = |p: Params| select_authenticated_mode(&r, &p).unwrap().kind;
        assert_eq!(pick(Params::new()), ModeKind::Ccm);
        assert_eq!(pick(Params::new().mode("GCM")), ModeKind::Gcm);
        assert_eq!(
            pick(Params::new().mode("GCM").authenticated_mode("GCM-SIV")),
            ModeKind::GcmSiv
        );
        assert_eq!(pick(Params::new().mode("authenticated")), ModeKind::Eax);
        assert_eq!(
            pick(Params::new().authenticated_mode("ChaCha20-Poly1305")),
            ModeKind::ChaCha20Poly1305
        );
    }

    #[test]
    fn encoded_envelopes() {
        let fx = Fixture::new();
        let r = fx.resolver();
        let params = Params::new().encode(true).encoding("base64");
        let sealed = seal(&r, &Data::from("text"), &params).unwrap();
        assert!(std::str::from_utf8(&sealed).is_ok());
        assert_eq!(open(&r, &sealed, &params).unwrap(), Verdict::Verified(Data::from("text")));
    }

    #[test]
    fn flipped_bytes_of_encoded_envelopes_are_tamper() {
        let fx = Fixture::new();
        let r = fx.resolver();
        for encoding in ["hex", "base64", "base32", "uri_base64", "uri_escape"] {
            let params = Params::new().encode(true).encoding(encoding);
            let sealed = seal(&r, &Data::from("payload"), &params).unwrap();
            let decode = fx.registry.codec(encoding).unwrap().decode;
            let type_byte = decode(std::str::from_utf8(&sealed).unwrap()).unwrap()[0];
            for i in 0..sealed.len() {
                for flip in [0x01u8, 0x80] {
                    let mut bad = sealed.clone();
                    bad[i] ^= flip;
                    // A different type byte is reported as an unknown envelope type.
                    let retyped = std::str::from_utf8(&bad)
                        .ok()
                        .and_then(|text| decode(text).ok())
                        .is_some_and(|bytes| bytes.first() != Some(&type_byte));
                    if retyped {
                        continue;
                    }
                    assert!(
                        matches!(open(&r, &bad, &params), Err(CryptError::TamperDetected(_))),
                        "{encoding}: byte {i} ^ {flip:#x}"
                    );
                    assert_eq!(
                        open(&r, &bad, &params.clone().fatal(false)).unwrap(),
                        Verdict::Unverified,
                        "{encoding}: byte {i} ^ {flip:#x}"
                    );
                }
            }
        }
    }

    #[test]
    fn ccm_seals_large_payloads() {
        let fx = Fixture::new();
        let r = fx.resolver();
        let params = Params::new().authenticated_mode("CCM");
        let data = Data::from(vec![7u8; 70_000]);
        let sealed = seal(&r, &data, &params).unwrap();
        assert_eq!(open(&r, &sealed, &params).unwrap(), Verdict::Verified(data));
    }

    #[test]
    fn wrong_key_is_tamper() {
        let fx = Fixture::new();
        let r = fx.resolver();
        let sealed = seal(&r, &Data::from("x"), &Params::new()).unwrap();
        assert!(matches!(
            open(&r, &sealed, &Params::new().key("other key")),
            Err(CryptError::TamperDetected(_))
        ));
    }
}
