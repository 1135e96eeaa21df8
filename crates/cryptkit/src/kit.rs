//! [`CryptKit`]: one configured instance and every public operation.

use std::sync::Arc;

use common::CryptError;
use serde::{de::DeserializeOwned, Serialize};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::config::Defaults;
use crate::crypto::{CipherHandle, CodecSpec, DigestSpec, MacHandle, Registry};
use crate::dispatch;
use crate::envelope::{self, Data};
use crate::fallback::{Category, FallbackLists, FallbackResolver};
use crate::key::{self, SecretBytes};
use crate::params::{Params, Resolved, Resolver};
use crate::tamper::{self, Verdict};

/// A configured crypto policy instance.
///
/// Holds the defaults for one logical user, the per-instance fallback lists, and the
/// registry that names the available primitives. Independent instances never share
/// defaults; instances over the built-in registry share its probe cache.
#[derive(Debug, Clone)]
pub struct CryptKit {
    defaults: Defaults,
    lists: FallbackLists,
    registry: Arc<Registry>,
    fallback: FallbackResolver,
}

impl CryptKit {
    /// An instance with no defaults over the built-in registry.
    pub fn new() -> Self {
        Self::with_defaults(Defaults::new())
    }

    /// An instance with `defaults` over the built-in registry.
    pub fn with_defaults(defaults: Defaults) -> Self {
        Self {
            defaults,
            lists: FallbackLists::new(),
            registry: Registry::builtin(),
            fallback: FallbackResolver::builtin(),
        }
    }

    /// An instance over a custom registry. It gets its own probe cache.
    pub fn with_registry(defaults: Defaults, registry: Arc<Registry>) -> Self {
        Self {
            defaults,
            lists: FallbackLists::new(),
            fallback: FallbackResolver::for_registry(Arc::clone(&registry)),
            registry,
        }
    }

    /// Replace the fallback resolver, e.g. with a custom [`crate::fallback::Probe`].
    #[must_use]
    pub fn with_fallback_resolver(mut self, fallback: FallbackResolver) -> Self {
        self.fallback = fallback;
        self
    }

    /// An instance configured from `CRYPTKIT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds an invalid value.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::with_defaults(Defaults::from_env()?))
    }

    /// The instance defaults.
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Mutable access to the instance defaults.
    pub fn defaults_mut(&mut self) -> &mut Defaults {
        &mut self.defaults
    }

    /// The registry every name resolves against.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The candidate lists in effect on this instance.
    pub fn fallback_lists(&self) -> &FallbackLists {
        &self.lists
    }

    /// Override the candidate list for `category` on this instance.
    pub fn set_fallback_list<S: Into<String>>(
        &mut self,
        category: Category,
        candidates: impl IntoIterator<Item = S>,
    ) {
        self.lists
            .set(category, candidates.into_iter().map(Into::into).collect());
    }

    /// Restore the built-in candidate list for `category`.
    pub fn reset_fallback_list(&mut self, category: Category) {
        self.lists.reset(category);
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.defaults, &self.lists, &self.fallback, &self.registry)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve `category` through the explicit, default and fallback tiers.
    pub fn resolve_algorithm(
        &self,
        category: Category,
        explicit: Option<&str>,
    ) -> Result<Resolved<String>, CryptError> {
        self.resolver().resolve(category, explicit)
    }

    /// The first usable candidate of this instance's list for `category`.
    pub fn fallback(&self, category: Category) -> Result<String, CryptError> {
        self.resolver().fallback(category)
    }

    /// The key a cipher built with `params` would use.
    pub fn derive_key(&self, params: &Params) -> Result<SecretBytes, CryptError> {
        dispatch::derive_key(&self.resolver(), params)
    }

    /// The nonce a tamper-proof call with `params` would use.
    pub fn derive_nonce(&self, params: &Params) -> Vec<u8> {
        key::derive_nonce(&self.resolver(), params)
    }

    /// Construct the cipher `params` resolves to.
    pub fn build_cipher(&self, params: &Params) -> Result<Box<dyn CipherHandle>, CryptError> {
        dispatch::build_cipher(&self.resolver(), params)
    }

    /// Construct the MAC `params` resolves to.
    pub fn build_mac(&self, params: &Params) -> Result<Box<dyn MacHandle>, CryptError> {
        dispatch::build_mac(&self.resolver(), params)
    }

    /// Look up the digest `params` resolves to.
    pub fn build_digest(&self, params: &Params) -> Result<&DigestSpec, CryptError> {
        dispatch::build_digest(&self.resolver(), params)
    }

    // -----------------------------------------------------------------------
    // Ciphers
    // -----------------------------------------------------------------------

    /// Encrypt with the resolved cipher and mode.
    ///
    /// The nonce of an authenticated mode is not stored in the output, so one must be given
    /// explicitly (per call or as a default).
    pub fn encrypt_string(&self, plaintext: &[u8], params: &Params) -> Result<Vec<u8>, CryptError> {
        let r = self.resolver();
        let cipher = self.framed_cipher(&r, params)?;
        let ciphertext = cipher.encrypt(plaintext)?;
        self.encode_output(&r, ciphertext, params)
    }

    /// Reverse [`Self::encrypt_string`] under the same parameters.
    pub fn decrypt_string(
        &self,
        ciphertext: &[u8],
        params: &Params,
    ) -> Result<Vec<u8>, CryptError> {
        let r = self.resolver();
        let input = self.decode_input(&r, ciphertext, params)?;
        self.framed_cipher(&r, params)?.decrypt(&input)
    }

    fn framed_cipher(
        &self,
        r: &Resolver<'_>,
        params: &Params,
    ) -> Result<Box<dyn CipherHandle>, CryptError> {
        let mode = dispatch::resolve_mode(r, params)?;
        if mode.kind.is_authenticated() {
            let explicit = params.nonce.as_deref().is_some_and(|n| !n.is_empty())
                || self.defaults.nonce().is_some();
            if !explicit {
                return Err(CryptError::MissingParameter("nonce".into()));
            }
        }
        dispatch::build_cipher(r, params)
    }

    // -----------------------------------------------------------------------
    // Digests and MACs
    // -----------------------------------------------------------------------

    /// Digest `message` with the resolved digest.
    pub fn digest_string(&self, message: &[u8], params: &Params) -> Result<Vec<u8>, CryptError> {
        let r = self.resolver();
        let digest = dispatch::build_digest(&r, params)?;
        self.encode_output(&r, (digest.digest)(message), params)
    }

    /// Compare `expected` against the digest of `message` in constant time.
    pub fn verify_digest(
        &self,
        message: &[u8],
        expected: &[u8],
        params: &Params,
    ) -> Result<bool, CryptError> {
        let r = self.resolver();
        let expected = self.decode_input(&r, expected, params)?;
        let digest = dispatch::build_digest(&r, params)?;
        Ok(bool::from((digest.digest)(message).ct_eq(&expected)))
    }

    /// Tag `message` with the resolved MAC.
    pub fn mac_digest_string(
        &self,
        message: &[u8],
        params: &Params,
    ) -> Result<Vec<u8>, CryptError> {
        let r = self.resolver();
        let mac = dispatch::build_mac(&r, params)?;
        self.encode_output(&r, mac.compute(message), params)
    }

    /// Verify a MAC tag.
    ///
    /// # Errors
    ///
    /// A mismatch is [`CryptError::TamperDetected`] unless `fatal` is off, in which case it
    /// is `Ok(false)`.
    pub fn verify_mac(
        &self,
        message: &[u8],
        tag: &[u8],
        params: &Params,
    ) -> Result<bool, CryptError> {
        let r = self.resolver();
        let tag = self.decode_input(&r, tag, params)?;
        let mac = dispatch::build_mac(&r, params)?;
        if mac.verify(message, &tag) {
            return Ok(true);
        }
        warn!("mac verification failed");
        if r.fatal(params) {
            return Err(CryptError::TamperDetected("mac mismatch".into()));
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Encodings
    // -----------------------------------------------------------------------

    fn codec(&self, category: Category, params: &Params) -> Result<&CodecSpec, CryptError> {
        dispatch::build_codec(&self.resolver(), category, params)
    }

    /// Encode with the `encoding` category.
    pub fn encode_string(&self, data: &[u8], params: &Params) -> Result<String, CryptError> {
        Ok((self.codec(Category::Encoding, params)?.encode)(data))
    }

    /// Decode with the `encoding` category.
    pub fn decode_string(&self, text: &str, params: &Params) -> Result<Vec<u8>, CryptError> {
        (self.codec(Category::Encoding, params)?.decode)(text)
    }

    /// Encode with the `printable_encoding` category.
    pub fn encode_string_printable(
        &self,
        data: &[u8],
        params: &Params,
    ) -> Result<String, CryptError> {
        Ok((self.codec(Category::PrintableEncoding, params)?.encode)(data))
    }

    /// Decode with the `printable_encoding` category.
    pub fn decode_string_printable(
        &self,
        text: &str,
        params: &Params,
    ) -> Result<Vec<u8>, CryptError> {
        (self.codec(Category::PrintableEncoding, params)?.decode)(text)
    }

    /// Encode with the `alphanumerical_encoding` category.
    pub fn encode_string_alphanumerical(
        &self,
        data: &[u8],
        params: &Params,
    ) -> Result<String, CryptError> {
        Ok((self.codec(Category::AlphanumericalEncoding, params)?.encode)(data))
    }

    /// Decode with the `alphanumerical_encoding` category.
    pub fn decode_string_alphanumerical(
        &self,
        text: &str,
        params: &Params,
    ) -> Result<Vec<u8>, CryptError> {
        (self.codec(Category::AlphanumericalEncoding, params)?.decode)(text)
    }

    /// Encode with the `uri_encoding` category.
    pub fn encode_string_uri(&self, data: &[u8], params: &Params) -> Result<String, CryptError> {
        Ok((self.codec(Category::UriEncoding, params)?.encode)(data))
    }

    /// Decode with the `uri_encoding` category.
    pub fn decode_string_uri(&self, text: &str, params: &Params) -> Result<Vec<u8>, CryptError> {
        (self.codec(Category::UriEncoding, params)?.decode)(text)
    }

    fn encode_output(
        &self,
        r: &Resolver<'_>,
        bytes: Vec<u8>,
        params: &Params,
    ) -> Result<Vec<u8>, CryptError> {
        if !r.encode(params) {
            return Ok(bytes);
        }
        let codec = dispatch::build_codec(r, Category::Encoding, params)?;
        Ok((codec.encode)(&bytes).into_bytes())
    }

    fn decode_input(
        &self,
        r: &Resolver<'_>,
        input: &[u8],
        params: &Params,
    ) -> Result<Vec<u8>, CryptError> {
        if !r.encode(params) {
            return Ok(input.to_vec());
        }
        let codec = dispatch::build_codec(r, Category::Encoding, params)?;
        let text = std::str::from_utf8(input).map_err(|e| CryptError::InvalidEncoding {
            encoding: codec.name.clone(),
            reason: e.to_string(),
        })?;
        (codec.decode)(text)
    }

    // -----------------------------------------------------------------------
    // Envelopes
    // -----------------------------------------------------------------------

    /// Pack `data` into an unauthenticated data envelope.
    pub fn pack_data(&self, data: &Data) -> Result<Vec<u8>, CryptError> {
        envelope::pack(data)
    }

    /// Unpack a data envelope. Only for input of known origin; see [`Self::thaw`].
    pub fn unpack_data(&self, bytes: &[u8]) -> Result<Data, CryptError> {
        envelope::unpack(bytes)
    }

    /// Pack any serializable value as a structured envelope.
    pub fn pack_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CryptError> {
        envelope::pack_value(value)
    }

    /// Unpack a structured envelope into `T`.
    pub fn unpack_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CryptError> {
        envelope::unpack_value(bytes)
    }

    /// Seal `data` into a tamper-evident envelope (encrypted unless `encrypt` is off).
    pub fn tamper_proof(&self, data: &Data, params: &Params) -> Result<Vec<u8>, CryptError> {
        tamper::seal(&self.resolver(), data, params)
    }

    /// Open a tamper-evident envelope, honouring `fatal`.
    pub fn thaw_tamper_proof(
        &self,
        input: &[u8],
        params: &Params,
    ) -> Result<Verdict<Data>, CryptError> {
        tamper::open(&self.resolver(), input, params)
    }

    /// Open a tamper-evident envelope; any integrity failure is an error.
    pub fn thaw(&self, input: &[u8], params: &Params) -> Result<Data, CryptError> {
        let params = params.clone().fatal(true);
        tamper::open(&self.resolver(), input, &params)?.into_result()
    }
}

impl Default for CryptKit {
    fn default() -> Self {
        Self::new()
    }
}
