//! Per-instance defaults, and loading them from the environment.
//!
//! Every value is optional. An unset value is `None`; setters reject empty names, empty
//! keys and nonces, and zero key sizes, so no sentinel ever stands in for "unset".
//!
//! Environment variables use the `CRYPTKIT_` prefix followed by the upper-cased field name,
//! e.g. `CRYPTKIT_CIPHER=AES`, `CRYPTKIT_AUTHENTICATED_MODE=GCM`, `CRYPTKIT_FATAL=false`.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use common::CryptError;
use serde::Deserialize;

use crate::fallback::Category;
use crate::key::SecretBytes;

/// Configured defaults for one [`crate::CryptKit`] instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defaults {
    algorithms: BTreeMap<Category, String>,
    key: Option<SecretBytes>,
    nonce: Option<Vec<u8>>,
    key_size: Option<usize>,
    use_literal_key: Option<bool>,
    tamper_proof_unencrypted: Option<bool>,
    encode: Option<bool>,
    disable_fallback: Option<bool>,
    fatal: Option<bool>,
}

impl Defaults {
    /// Empty defaults: every parameter falls through to its fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default algorithm for `category`, if one is set.
    pub fn algorithm(&self, category: Category) -> Option<&str> {
        self.algorithms.get(&category).map(String::as_str)
    }

    /// Set the default algorithm for `category`.
    ///
    /// # Errors
    ///
    /// [`CryptError::InvalidConfiguration`] if `name` is empty.
    pub fn set_algorithm(
        &mut self,
        category: Category,
        name: impl Into<String>,
    ) -> Result<&mut Self, CryptError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CryptError::InvalidConfiguration(format!(
                "default {category} must not be empty"
            )));
        }
        self.algorithms.insert(category, name);
        Ok(self)
    }

    /// Remove the default for `category`.
    pub fn clear_algorithm(&mut self, category: Category) -> &mut Self {
        self.algorithms.remove(&category);
        self
    }

    /// The default key, if set.
    pub fn key(&self) -> Option<&SecretBytes> {
        self.key.as_ref()
    }

    /// Set the default key. Empty keys are rejected.
    pub fn set_key(&mut self, key: impl Into<SecretBytes>) -> Result<&mut Self, CryptError> {
        let key = key.into();
        if key.is_empty() {
            return Err(CryptError::InvalidConfiguration(
                "default key must not be empty".into(),
            ));
        }
        self.key = Some(key);
        Ok(self)
    }

    /// Remove the default key.
    pub fn clear_key(&mut self) -> &mut Self {
        self.key = None;
        self
    }

    /// The default nonce, if set.
    pub fn nonce(&self) -> Option<&[u8]> {
        self.nonce.as_deref()
    }

    /// Set the default nonce. Empty nonces are rejected.
    pub fn set_nonce(&mut self, nonce: impl Into<Vec<u8>>) -> Result<&mut Self, CryptError> {
        let nonce = nonce.into();
        if nonce.is_empty() {
            return Err(CryptError::InvalidConfiguration(
                "default nonce must not be empty".into(),
            ));
        }
        self.nonce = Some(nonce);
        Ok(self)
    }

    /// Remove the default nonce.
    pub fn clear_nonce(&mut self) -> &mut Self {
        self.nonce = None;
        self
    }

    /// The default derived key length in bytes, if set.
    pub fn key_size(&self) -> Option<usize> {
        self.key_size
    }

    /// Set the default derived key length. Zero is rejected.
    pub fn set_key_size(&mut self, size: usize) -> Result<&mut Self, CryptError> {
        if size == 0 {
            return Err(CryptError::InvalidConfiguration(
                "default key_size must be > 0".into(),
            ));
        }
        self.key_size = Some(size);
        Ok(self)
    }

    /// Whether keys are used as given instead of stretched.
    pub fn use_literal_key(&self) -> Option<bool> {
        self.use_literal_key
    }

    /// Use keys as given instead of stretching them.
    pub fn set_use_literal_key(&mut self, on: bool) -> &mut Self {
        self.use_literal_key = Some(on);
        self
    }

    /// Whether tamper-proofing defaults to the MAC branch.
    pub fn tamper_proof_unencrypted(&self) -> Option<bool> {
        self.tamper_proof_unencrypted
    }

    /// Make tamper-proofing default to the MAC branch.
    pub fn set_tamper_proof_unencrypted(&mut self, on: bool) -> &mut Self {
        self.tamper_proof_unencrypted = Some(on);
        self
    }

    /// Whether outputs are text-encoded by default.
    pub fn encode(&self) -> Option<bool> {
        self.encode
    }

    /// Text-encode outputs and decode inputs by default.
    pub fn set_encode(&mut self, on: bool) -> &mut Self {
        self.encode = Some(on);
        self
    }

    /// Whether fallback searches stop at the first candidate.
    pub fn disable_fallback(&self) -> Option<bool> {
        self.disable_fallback
    }

    /// Take the first candidate of each list without probing further.
    pub fn set_disable_fallback(&mut self, on: bool) -> &mut Self {
        self.disable_fallback = Some(on);
        self
    }

    /// Whether integrity failures are errors by default.
    pub fn fatal(&self) -> Option<bool> {
        self.fatal
    }

    /// Make integrity failures errors (`true`) or verdicts (`false`).
    pub fn set_fatal(&mut self, on: bool) -> &mut Self {
        self.fatal = Some(on);
        self
    }

    /// Load defaults from `CRYPTKIT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        Self::load(config::Environment::with_prefix("CRYPTKIT"))
    }

    /// Load defaults from an explicit variable map, as if it were the environment.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::load(config::Environment::with_prefix("CRYPTKIT").source(Some(vars)))
    }

    fn load(source: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to build configuration from environment")?;

        let settings: Settings = cfg
            .try_deserialize()
            .context("failed to deserialise cryptkit configuration")?;

        settings.validate()?;
        settings.into_defaults()
    }
}

/// Raw environment shape. Converted to [`Defaults`] after validation.
#[derive(Debug, Default, Deserialize)]
struct Settings {
    cipher: Option<String>,
    mode: Option<String>,
    stream_mode: Option<String>,
    block_mode: Option<String>,
    authenticated_mode: Option<String>,
    digest: Option<String>,
    mac: Option<String>,
    encoding: Option<String>,
    printable_encoding: Option<String>,
    alphanumerical_encoding: Option<String>,
    uri_encoding: Option<String>,

    key: Option<String>,
    nonce: Option<String>,
    key_size: Option<usize>,

    use_literal_key: Option<bool>,
    tamper_proof_unencrypted: Option<bool>,
    encode: Option<bool>,
    disable_fallback: Option<bool>,
    fatal: Option<bool>,
}

impl Settings {
    fn algorithms(&self) -> [(Category, Option<&String>); 11] {
        [
            (Category::Cipher, self.cipher.as_ref()),
            (Category::Mode, self.mode.as_ref()),
            (Category::StreamMode, self.stream_mode.as_ref()),
            (Category::BlockMode, self.block_mode.as_ref()),
            (Category::AuthenticatedMode, self.authenticated_mode.as_ref()),
            (Category::Digest, self.digest.as_ref()),
            (Category::Mac, self.mac.as_ref()),
            (Category::Encoding, self.encoding.as_ref()),
            (Category::PrintableEncoding, self.printable_encoding.as_ref()),
            (
                Category::AlphanumericalEncoding,
                self.alphanumerical_encoding.as_ref(),
            ),
            (Category::UriEncoding, self.uri_encoding.as_ref()),
        ]
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        for (category, value) in self.algorithms() {
            if let Some(value) = value {
                ensure_non_empty(value, category.name())?;
            }
        }
        if let Some(key) = &self.key {
            ensure_non_empty(key, "key")?;
        }
        if let Some(nonce) = &self.nonce {
            ensure_non_empty(nonce, "nonce")?;
        }
        if self.key_size == Some(0) {
            anyhow::bail!("CRYPTKIT_KEY_SIZE must be > 0");
        }
        Ok(())
    }

    fn into_defaults(self) -> Result<Defaults> {
        let mut defaults = Defaults::new();
        for (category, value) in self.algorithms() {
            if let Some(value) = value {
                defaults.set_algorithm(category, value.clone())?;
            }
        }
        if let Some(key) = self.key {
            defaults.set_key(key)?;
        }
        if let Some(nonce) = self.nonce {
            defaults.set_nonce(nonce.into_bytes())?;
        }
        if let Some(size) = self.key_size {
            defaults.set_key_size(size)?;
        }
        defaults.use_literal_key = self.use_literal_key;
        defaults.tamper_proof_unencrypted = self.tamper_proof_unencrypted;
        defaults.encode = self.encode;
        defaults.disable_fallback = self.disable_fallback;
        defaults.fatal = self.fatal;
        Ok(defaults)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("CRYPTKIT_{} must not be empty when set", name.to_ascii_uppercase());
    }
    Ok(())
}
