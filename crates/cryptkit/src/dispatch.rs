//! Resolved names → constructed primitives.
//!
//! Every function here resolves its algorithm through [`Resolver`] and then looks the name up
//! in the registry. A name the registry does not know is [`CryptError::UnsupportedAlgorithm`];
//! dispatch never falls back on its own.

use common::CryptError;
use tracing::debug;

use crate::crypto::{
    authenticated, CipherHandle, CipherSpec, CodecSpec, DigestSpec, MacFamily, MacHandle,
    ModeClass, ModeKind, ModeSpec,
};
use crate::fallback::Category;
use crate::key::{self, SecretBytes};
use crate::params::{Params, Resolver};

/// Resolve the `mode` parameter to a concrete mode.
///
/// The symbolic classes `stream`, `block` and `authenticated` resolve through their own
/// category; the result must be a registered mode of that class.
pub fn resolve_mode<'a>(r: &Resolver<'a>, params: &Params) -> Result<&'a ModeSpec, CryptError> {
    let name = r.resolve_param(Category::Mode, params)?.value;
    match ModeClass::from_symbol(&name) {
        Some(class) => resolve_mode_class(r, params, class),
        None => lookup_mode(r, Category::Mode, &name),
    }
}

/// Resolve a concrete mode of `class` through the class's own category.
pub fn resolve_mode_class<'a>(
    r: &Resolver<'a>,
    params: &Params,
    class: ModeClass,
) -> Result<&'a ModeSpec, CryptError> {
    let category = class.category();
    let name = r.resolve_param(category, params)?.value;
    let spec = lookup_mode(r, category, &name)?;
    if spec.kind.class() != class {
        return Err(CryptError::unsupported(category.name(), name));
    }
    Ok(spec)
}

fn lookup_mode<'a>(
    r: &Resolver<'a>,
    category: Category,
    name: &str,
) -> Result<&'a ModeSpec, CryptError> {
    r.registry
        .mode(name)
        .ok_or_else(|| CryptError::unsupported(category.name(), name))
}

/// Resolve the `cipher` parameter to a registered cipher.
pub fn resolve_cipher<'a>(r: &Resolver<'a>, params: &Params) -> Result<&'a CipherSpec, CryptError> {
    let name = r.resolve_param(Category::Cipher, params)?.value;
    r.registry
        .cipher(&name)
        .ok_or_else(|| CryptError::unsupported(Category::Cipher.name(), name))
}

/// Resolve the `digest` parameter to a registered digest.
pub fn build_digest<'a>(r: &Resolver<'a>, params: &Params) -> Result<&'a DigestSpec, CryptError> {
    let name = r.resolve_param(Category::Digest, params)?.value;
    r.registry
        .digest(&name)
        .ok_or_else(|| CryptError::unsupported(Category::Digest.name(), name))
}

/// Look up the codec for one of the encoding categories.
pub fn build_codec<'a>(
    r: &Resolver<'a>,
    category: Category,
    params: &Params,
) -> Result<&'a CodecSpec, CryptError> {
    let name = r.resolve_param(category, params)?.value;
    r.registry
        .codec(&name)
        .ok_or_else(|| CryptError::unsupported(category.name(), name))
}

/// Derive the cipher key for the resolved mode and cipher.
pub fn derive_key(r: &Resolver<'_>, params: &Params) -> Result<SecretBytes, CryptError> {
    key::derive_key_with(r, params, || {
        let mode = resolve_mode(r, params)?;
        let cipher = if mode.kind.is_cipher_independent() {
            None
        } else {
            Some(resolve_cipher(r, params)?)
        };
        Ok(key::cipher_key_len(r.key_size(params), mode.kind, cipher))
    })
}

/// Construct the resolved cipher in the resolved mode.
///
/// Authenticated modes are bound to [`key::derive_nonce`]'s nonce.
pub fn build_cipher(
    r: &Resolver<'_>,
    params: &Params,
) -> Result<Box<dyn CipherHandle>, CryptError> {
    let mode = resolve_mode(r, params)?;
    let nonce = mode
        .kind
        .is_authenticated()
        .then(|| key::derive_nonce(r, params));
    build_cipher_in(r, params, mode, nonce.as_deref())
}

/// Construct the resolved cipher in an already selected `mode`, bound to `nonce`.
pub fn build_cipher_in(
    r: &Resolver<'_>,
    params: &Params,
    mode: &ModeSpec,
    nonce: Option<&[u8]>,
) -> Result<Box<dyn CipherHandle>, CryptError> {
    if mode.kind.is_cipher_independent() {
        let key = key::derive_key_with(r, params, || {
            Ok(key::cipher_key_len(r.key_size(params), mode.kind, None))
        })?;
        debug!(mode = %mode.name, "building cipher");
        return cipher_independent(mode.kind, key.as_bytes(), nonce);
    }

    let cipher = resolve_cipher(r, params)?;
    let key = key::derive_key_with(r, params, || {
        Ok(key::cipher_key_len(r.key_size(params), mode.kind, Some(cipher)))
    })?;
    debug!(cipher = %cipher.name, mode = %mode.name, "building cipher");
    (cipher.build_mode)(mode.kind, key.as_bytes(), nonce)
}

fn cipher_independent(
    kind: ModeKind,
    key: &[u8],
    nonce: Option<&[u8]>,
) -> Result<Box<dyn CipherHandle>, CryptError> {
    match kind {
        ModeKind::ChaCha20Poly1305 => authenticated::chacha20poly1305(kind, key, nonce),
        other => Err(CryptError::unsupported("mode", format!("{other:?}"))),
    }
}

/// Construct the resolved MAC.
///
/// `mac` names a family (`HMAC`, `CMAC`) whose inner primitive is resolved from `digest` or
/// `cipher`, or a concrete `HMAC-<digest>` / `CMAC-<cipher>` that pins the inner primitive.
pub fn build_mac(r: &Resolver<'_>, params: &Params) -> Result<Box<dyn MacHandle>, CryptError> {
    let name = r.resolve_param(Category::Mac, params)?.value;
    let (family, inner) = match r.registry.mac(&name) {
        Some(family) => (family, None),
        None => split_concrete_mac(r, &name)?,
    };

    match family {
        MacFamily::Hmac => {
            let digest = match inner {
                Some(inner) => r
                    .registry
                    .digest(inner)
                    .ok_or_else(|| CryptError::unsupported(Category::Mac.name(), &name))?,
                None => build_digest(r, params)?,
            };
            let key = key::derive_key_with(r, params, || {
                Ok(r.key_size(params).unwrap_or(digest.output_len))
            })?;
            debug!(mac = %name, digest = %digest.name, "building mac");
            (digest.hmac)(key.as_bytes())
        }
        MacFamily::Cmac => {
            let cipher = match inner {
                Some(inner) => r
                    .registry
                    .cipher(inner)
                    .ok_or_else(|| CryptError::unsupported(Category::Mac.name(), &name))?,
                None => resolve_cipher(r, params)?,
            };
            let build = cipher.build_cmac.ok_or_else(|| {
                CryptError::unsupported(Category::Mac.name(), format!("CMAC-{}", cipher.name))
            })?;
            let key = key::derive_key_with(r, params, || {
                Ok(r.key_size(params)
                    .or(cipher.key_len)
                    .or(cipher.block_len)
                    .unwrap_or(cipher.fallback_key_len))
            })?;
            debug!(mac = %name, cipher = %cipher.name, "building mac");
            build(key.as_bytes())
        }
    }
}

fn split_concrete_mac<'n>(
    r: &Resolver<'_>,
    name: &'n str,
) -> Result<(MacFamily, Option<&'n str>), CryptError> {
    name.split_once('-')
        .and_then(|(family, inner)| Some((r.registry.mac(family)?, Some(inner))))
        .ok_or_else(|| CryptError::unsupported(Category::Mac.name(), name))
}
