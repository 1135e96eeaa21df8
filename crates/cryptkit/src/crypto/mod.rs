//! Adapters over the RustCrypto primitives, and the registry that names them.
//!
//! Nothing in here chooses an algorithm. Every constructor takes fully resolved key and
//! nonce bytes; selection happens in [`crate::dispatch`].
//!
//! # Ciphertext formats
//!
//! ```text
//! unauthenticated modes: <iv (16 bytes)><ciphertext>
//! authenticated modes:   <ciphertext><tag>           (nonce is carried by the caller)
//! ```

pub mod authenticated;
pub mod block;
pub mod digest;
pub mod encoding;
pub mod mac;
pub mod registry;

use common::CryptError;

use crate::fallback::Category;

pub use registry::{CipherSpec, CodecSpec, DigestSpec, ModeSpec, Registry};

/// A constructed cipher bound to a key (and, for AEAD modes, a nonce).
pub trait CipherHandle: Send {
    /// Encrypt `plaintext`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptError::EncryptionFailed`] if the primitive refuses the input.
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptError>;

    /// Decrypt `ciphertext`.
    ///
    /// # Errors
    ///
    /// - [`CryptError::TamperDetected`] if an AEAD tag does not verify.
    /// - [`CryptError::DecryptionFailed`] for truncated input or bad padding.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptError>;
}

/// A keyed MAC.
pub trait MacHandle: Send {
    /// Length of the tags this MAC produces.
    fn tag_len(&self) -> usize;

    /// Compute the tag over `message`.
    fn compute(&self, message: &[u8]) -> Vec<u8>;

    /// Constant-time check of `tag` against `message`.
    fn verify(&self, message: &[u8], tag: &[u8]) -> bool;
}

/// Broad class of a cipher mode. Also the symbolic names a `mode` parameter may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeClass {
    Stream,
    Block,
    Authenticated,
}

impl ModeClass {
    /// Parse a symbolic mode name (`stream`, `block`, `authenticated`).
    pub fn from_symbol(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "stream" => Some(ModeClass::Stream),
            "block" => Some(ModeClass::Block),
            "authenticated" => Some(ModeClass::Authenticated),
            _ => None,
        }
    }

    /// The symbolic name accepted in place of a concrete mode.
    pub fn symbol(self) -> &'static str {
        match self {
            ModeClass::Stream => "stream",
            ModeClass::Block => "block",
            ModeClass::Authenticated => "authenticated",
        }
    }

    /// The category whose fallback list supplies concrete modes of this class.
    pub fn category(self) -> Category {
        match self {
            ModeClass::Stream => Category::StreamMode,
            ModeClass::Block => Category::BlockMode,
            ModeClass::Authenticated => Category::AuthenticatedMode,
        }
    }
}

/// Concrete cipher modes with a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeKind {
    Cbc,
    Cfb,
    Ctr,
    Ofb,
    Eax,
    Gcm,
    Ccm,
    GcmSiv,
    ChaCha20Poly1305,
}

impl ModeKind {
    /// The class this mode belongs to.
    pub fn class(self) -> ModeClass {
        match self {
            ModeKind::Cbc => ModeClass::Block,
            ModeKind::Cfb | ModeKind::Ctr | ModeKind::Ofb => ModeClass::Stream,
            ModeKind::Eax
            | ModeKind::Gcm
            | ModeKind::Ccm
            | ModeKind::GcmSiv
            | ModeKind::ChaCha20Poly1305 => ModeClass::Authenticated,
        }
    }

    /// Returns `true` for AEAD modes.
    pub fn is_authenticated(self) -> bool {
        self.class() == ModeClass::Authenticated
    }

    /// Modes that carry their own cipher and ignore the `cipher` parameter.
    pub fn is_cipher_independent(self) -> bool {
        matches!(self, ModeKind::ChaCha20Poly1305)
    }

    /// Key length imposed by the mode itself, when it does not follow the cipher.
    pub fn fixed_key_len(self) -> Option<usize> {
        match self {
            ModeKind::ChaCha20Poly1305 => Some(32),
            _ => None,
        }
    }
}

/// MAC families a `mac` parameter can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacFamily {
    /// HMAC over the resolved digest.
    Hmac,
    /// CMAC over the resolved block cipher.
    Cmac,
}
