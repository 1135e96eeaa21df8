//! Error taxonomy shared by every cryptkit layer.

use thiserror::Error;

/// Top-level error type for algorithm resolution, dispatch and envelope handling.
///
/// Every variant maps to a stable machine-readable code via [`CryptError::code`], so
/// callers can branch on the failure class without matching on message text.
#[derive(Debug, Error)]
pub enum CryptError {
    /// A required value is absent at every resolution tier.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// Every candidate in a fallback list was probed and none is usable.
    #[error("no usable {category} among candidates [{}]", .tried.join(", "))]
    NoUsableCandidate {
        /// Category whose list was exhausted.
        category: String,
        /// Candidates that were actually tried, in order.
        tried: Vec<String>,
    },

    /// The named algorithm has no registered constructor.
    #[error("unsupported {category}: {name}")]
    UnsupportedAlgorithm {
        /// Category the name was looked up in.
        category: String,
        /// The rejected name.
        name: String,
    },

    /// Encryption was requested for tamper-proofing but the selected mode is not an AEAD.
    #[error("tamper-proof encryption requires an authenticated mode, got {0}")]
    AuthenticatedModeRequired(String),

    /// A data envelope carries a format version this build does not speak.
    #[error("incompatible envelope version: expected {expected}, found {found}")]
    IncompatibleVersion {
        /// The version this build writes.
        expected: u16,
        /// The version read from the input.
        found: u16,
    },

    /// MAC mismatch or AEAD authentication failure.
    #[error("tamper detected: {0}")]
    TamperDetected(String),

    /// The tamper-evident envelope starts with an unknown type tag.
    #[error("unknown envelope type: {0}")]
    UnknownEnvelopeType(u8),

    /// A primitive failed to load for a reason other than being unavailable.
    #[error("failed to load primitive {name}: {reason}")]
    PrimitiveLoadFailure {
        /// Name of the primitive that failed.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// Decryption of an unauthenticated mode failed (bad padding, truncated IV).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The underlying primitive refused to encrypt.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Key material does not fit the selected primitive.
    #[error("invalid key length for {algorithm}: got {actual} bytes")]
    InvalidKeyLength {
        /// Primitive the key was offered to.
        algorithm: String,
        /// Length that was rejected.
        actual: usize,
    },

    /// Envelope bytes are truncated, oversized, or carry trailing garbage.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Structured payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Text could not be decoded with the named encoding.
    #[error("invalid {encoding} input: {reason}")]
    InvalidEncoding {
        /// Encoding that rejected the input.
        encoding: String,
        /// Decoder message.
        reason: String,
    },

    /// A default or registry entry was rejected when it was set.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CryptError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CryptError::MissingParameter(_) => "missing_parameter",
            CryptError::NoUsableCandidate { .. } => "no_usable_candidate",
            CryptError::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            CryptError::AuthenticatedModeRequired(_) => "authenticated_mode_required",
            CryptError::IncompatibleVersion { .. } => "incompatible_version",
            CryptError::TamperDetected(_) => "tamper_detected",
            CryptError::UnknownEnvelopeType(_) => "unknown_envelope_type",
            CryptError::PrimitiveLoadFailure { .. } => "primitive_load_failure",
            CryptError::DecryptionFailed(_) => "decryption_failed",
            CryptError::EncryptionFailed(_) => "encryption_failed",
            CryptError::InvalidKeyLength { .. } => "invalid_key_length",
            CryptError::MalformedEnvelope(_) => "malformed_envelope",
            CryptError::Serialization(_) => "serialization",
            CryptError::InvalidEncoding { .. } => "invalid_encoding",
            CryptError::InvalidConfiguration(_) => "invalid_configuration",
        }
    }

    /// Returns `true` for integrity failures that a non-fatal verifier may downgrade.
    pub fn is_tamper(&self) -> bool {
        matches!(self, CryptError::TamperDetected(_))
    }

    /// Shorthand for [`CryptError::UnsupportedAlgorithm`].
    pub fn unsupported(category: impl Into<String>, name: impl Into<String>) -> Self {
        CryptError::UnsupportedAlgorithm {
            category: category.into(),
            name: name.into(),
        }
    }
}
