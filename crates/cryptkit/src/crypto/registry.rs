//! Name → primitive registry.
//!
//! Names are matched case-insensitively. The built-in registry is assembled once per process;
//! custom registries start from [`Registry::with_builtins`] or [`Registry::new`] and add
//! entries through the validating `register_*` methods.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock},
};

use common::CryptError;

use super::{block, CipherHandle, MacFamily, MacHandle, ModeClass, ModeKind};
use crate::fallback::Category;

/// Constructs a mode over a cipher from resolved key and nonce bytes.
pub type ModeBuilder =
    fn(ModeKind, &[u8], Option<&[u8]>) -> Result<Box<dyn CipherHandle>, CryptError>;

/// Constructs a keyed MAC from resolved key bytes.
pub type MacBuilder = fn(&[u8]) -> Result<Box<dyn MacHandle>, CryptError>;

static BUILTIN: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::assemble()));

/// A block cipher and its constructors.
#[derive(Clone)]
pub struct CipherSpec {
    pub name: String,
    /// Preferred key length. `None` when the cipher has no single native length.
    pub key_len: Option<usize>,
    pub block_len: Option<usize>,
    /// Key length used when neither of the above is known.
    pub fallback_key_len: usize,
    pub build_mode: ModeBuilder,
    /// CMAC over this cipher, if supported.
    pub build_cmac: Option<MacBuilder>,
}

/// A concrete cipher mode.
#[derive(Debug, Clone)]
pub struct ModeSpec {
    pub name: String,
    pub kind: ModeKind,
}

/// A message digest and its HMAC.
#[derive(Clone)]
pub struct DigestSpec {
    pub name: String,
    pub output_len: usize,
    pub digest: fn(&[u8]) -> Vec<u8>,
    pub hmac: MacBuilder,
}

/// A text codec.
#[derive(Clone)]
pub struct CodecSpec {
    pub name: String,
    pub encode: fn(&[u8]) -> String,
    pub decode: fn(&str) -> Result<Vec<u8>, CryptError>,
}

impl fmt::Debug for CipherSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherSpec")
            .field("name", &self.name)
            .field("key_len", &self.key_len)
            .field("block_len", &self.block_len)
            .field("cmac", &self.build_cmac.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for DigestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestSpec")
            .field("name", &self.name)
            .field("output_len", &self.output_len)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for CodecSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registered primitives, keyed by lower-cased name.
#[derive(Clone, Default)]
pub struct Registry {
    ciphers: HashMap<String, CipherSpec>,
    modes: HashMap<String, ModeSpec>,
    digests: HashMap<String, DigestSpec>,
    macs: HashMap<String, MacFamily>,
    codecs: HashMap<String, CodecSpec>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared built-in registry.
    pub fn builtin() -> Arc<Registry> {
        Arc::clone(&BUILTIN)
    }

    /// An owned copy of the built-in registry, for extension.
    pub fn with_builtins() -> Self {
        Registry::clone(&BUILTIN)
    }

    fn assemble() -> Self {
        let mut reg = Self::new();
        for spec in builtin_ciphers() {
            reg.ciphers.insert(key(&spec.name), spec);
        }
        for (name, kind) in BUILTIN_MODES {
            reg.modes.insert(
                key(name),
                ModeSpec {
                    name: (*name).to_owned(),
                    kind: *kind,
                },
            );
        }
        for spec in super::digest::builtins() {
            reg.digests.insert(key(&spec.name), spec);
        }
        reg.macs.insert(key("HMAC"), MacFamily::Hmac);
        reg.macs.insert(key("CMAC"), MacFamily::Cmac);
        for spec in super::encoding::builtins() {
            reg.codecs.insert(key(&spec.name), spec);
        }
        reg
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a block cipher.
    ///
    /// # Errors
    ///
    /// [`CryptError::InvalidConfiguration`] for an empty or duplicate name, or a zero length.
    pub fn register_cipher(&mut self, spec: CipherSpec) -> Result<(), CryptError> {
        let k = check_name(&spec.name, self.ciphers.contains_key(&key(&spec.name)))?;
        if spec.key_len == Some(0) || spec.block_len == Some(0) || spec.fallback_key_len == 0 {
            return Err(CryptError::InvalidConfiguration(format!(
                "cipher {} declares a zero length",
                spec.name
            )));
        }
        self.ciphers.insert(k, spec);
        Ok(())
    }

    /// Register a mode name. Class symbols are reserved.
    pub fn register_mode(&mut self, name: &str, kind: ModeKind) -> Result<(), CryptError> {
        let k = check_name(name, self.modes.contains_key(&key(name)))?;
        if ModeClass::from_symbol(name).is_some() {
            return Err(CryptError::InvalidConfiguration(format!(
                "{name} is reserved for a mode class"
            )));
        }
        self.modes.insert(
            k,
            ModeSpec {
                name: name.to_owned(),
                kind,
            },
        );
        Ok(())
    }

    /// Register a digest. Its output length must be non-zero.
    pub fn register_digest(&mut self, spec: DigestSpec) -> Result<(), CryptError> {
        let k = check_name(&spec.name, self.digests.contains_key(&key(&spec.name)))?;
        if spec.output_len == 0 {
            return Err(CryptError::InvalidConfiguration(format!(
                "digest {} declares a zero output length",
                spec.name
            )));
        }
        self.digests.insert(k, spec);
        Ok(())
    }

    /// Register a concrete MAC name for `family`.
    pub fn register_mac(&mut self, name: &str, family: MacFamily) -> Result<(), CryptError> {
        let k = check_name(name, self.macs.contains_key(&key(name)))?;
        self.macs.insert(k, family);
        Ok(())
    }

    /// Register a text codec.
    pub fn register_codec(&mut self, spec: CodecSpec) -> Result<(), CryptError> {
        let k = check_name(&spec.name, self.codecs.contains_key(&key(&spec.name)))?;
        self.codecs.insert(k, spec);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Look up a cipher, ignoring case.
    pub fn cipher(&self, name: &str) -> Option<&CipherSpec> {
        self.ciphers.get(&key(name))
    }

    /// Look up a mode, ignoring case.
    pub fn mode(&self, name: &str) -> Option<&ModeSpec> {
        self.modes.get(&key(name))
    }

    /// Look up a digest, ignoring case.
    pub fn digest(&self, name: &str) -> Option<&DigestSpec> {
        self.digests.get(&key(name))
    }

    /// Look up a concrete MAC, ignoring case.
    pub fn mac(&self, name: &str) -> Option<MacFamily> {
        self.macs.get(&key(name)).copied()
    }

    /// Look up a codec, ignoring case.
    pub fn codec(&self, name: &str) -> Option<&CodecSpec> {
        self.codecs.get(&key(name))
    }

    /// Returns `true` if `name` is a valid value for `category`.
    ///
    /// `mode` also accepts the symbolic classes; the per-class mode categories only accept
    /// concrete modes of their class.
    pub fn is_registered(&self, category: Category, name: &str) -> bool {
        match category {
            Category::Cipher => self.cipher(name).is_some(),
            Category::Mode => {
                ModeClass::from_symbol(name).is_some() || self.mode(name).is_some()
            }
            Category::StreamMode | Category::BlockMode | Category::AuthenticatedMode => self
                .mode(name)
                .is_some_and(|m| Some(m.kind.class()) == category.mode_class()),
            Category::Digest => self.digest(name).is_some(),
            Category::Mac => self.mac(name).is_some(),
            Category::Encoding
            | Category::PrintableEncoding
            | Category::AlphanumericalEncoding
            | Category::UriEncoding => self.codec(name).is_some(),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn names<V>(map: &HashMap<String, V>) -> Vec<&str> {
            let mut names: Vec<_> = map.keys().map(String::as_str).collect();
            names.sort_unstable();
            names
        }
        f.debug_struct("Registry")
            .field("ciphers", &names(&self.ciphers))
            .field("modes", &names(&self.modes))
            .field("digests", &names(&self.digests))
            .field("macs", &names(&self.macs))
            .field("codecs", &names(&self.codecs))
            .finish()
    }
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn check_name(name: &str, taken: bool) -> Result<String, CryptError> {
    if name.trim().is_empty() {
        return Err(CryptError::InvalidConfiguration(
            "primitive name must not be empty".into(),
        ));
    }
    if taken {
        return Err(CryptError::InvalidConfiguration(format!(
            "{name} is already registered"
        )));
    }
    Ok(key(name))
}

const BUILTIN_MODES: &[(&str, ModeKind)] = &[
    ("CBC", ModeKind::Cbc),
    ("CFB", ModeKind::Cfb),
    ("CTR", ModeKind::Ctr),
    ("OFB", ModeKind::Ofb),
    ("EAX", ModeKind::Eax),
    ("GCM", ModeKind::Gcm),
    ("CCM", ModeKind::Ccm),
    ("GCM-SIV", ModeKind::GcmSiv),
    ("ChaCha20-Poly1305", ModeKind::ChaCha20Poly1305),
];

fn builtin_ciphers() -> Vec<CipherSpec> {
    #[allow(unused_mut)]
    let mut ciphers = vec![CipherSpec {
        name: "AES".to_owned(),
        key_len: Some(32),
        block_len: Some(block::BLOCK_LEN),
        fallback_key_len: 32,
        build_mode: block::aes_mode,
        build_cmac: Some(block::aes_cmac),
    }];
    #[cfg(feature = "twofish")]
    ciphers.push(CipherSpec {
        name: "Twofish".to_owned(),
        key_len: Some(32),
        block_len: Some(block::BLOCK_LEN),
        fallback_key_len: 32,
        build_mode: block::twofish_mode,
        build_cmac: Some(block::twofish_cmac),
    });
    ciphers
}
