//! Binary wire formats for data envelopes and tamper-evident envelopes.
//!
//! All multi-byte integers are big-endian.
//!
//! ```text
//! data envelope:    version:u16 | flags:u16 | length:u32 | payload
//! tamper envelope:  type:u8 | prefix_len:u16 | prefix | remainder
//!                     type 1 (mac):  prefix = tag,   remainder = packed data envelope
//!                     type 2 (aead): prefix = nonce, remainder = ciphertext
//! ```
//!
//! This module only frames bytes. It performs no authentication; callers decide what to
//! trust.

use bitflags::bitflags;
use bytes::{Buf, BufMut, BytesMut};

use crate::error::CryptError;

/// Data envelope format version written by this build. Decoders reject anything else.
pub const FORMAT_VERSION: u16 = 1;

/// Length of the fixed data envelope header (version, flags, payload length).
pub const DATA_HEADER_LEN: usize = 8;

bitflags! {
    /// Flag bits carried in a data envelope.
    ///
    /// Only [`EnvelopeFlags::SERIALIZED`] is defined. Unknown bits are retained on decode
    /// so that a newer writer's flags survive a read by this build.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EnvelopeFlags: u16 {
        /// The payload is a serialized structured value rather than raw bytes.
        const SERIALIZED = 1 << 0;
    }
}

// ---------------------------------------------------------------------------
// Data envelope
// ---------------------------------------------------------------------------

/// A decoded data envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// Format version; always [`FORMAT_VERSION`] for frames produced by this build.
    pub version: u16,
    /// Payload interpretation flags.
    pub flags: EnvelopeFlags,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

impl DataFrame {
    /// Construct a frame at the current format version.
    pub fn new(flags: EnvelopeFlags, payload: Vec<u8>) -> Self {
        Self {
            version: FORMAT_VERSION,
            flags,
            payload,
        }
    }

    /// Encode to `version | flags | length | payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptError::MalformedEnvelope`] if the payload does not fit a `u32` length.
    pub fn encode(&self) -> Result<Vec<u8>, CryptError> {
        let len = u32::try_from(self.payload.len()).map_err(|_| {
            CryptError::MalformedEnvelope("payload longer than u32::MAX bytes".into())
        })?;
        let mut buf = BytesMut::with_capacity(DATA_HEADER_LEN + self.payload.len());
        buf.put_u16(self.version);
        buf.put_u16(self.flags.bits());
        buf.put_u32(len);
        buf.put_slice(&self.payload);
        Ok(buf.to_vec())
    }

    /// Decode a data envelope.
    ///
    /// The version is checked before anything else so that data written by another format
    /// revision is reported as such rather than as a framing error.
    ///
    /// # Errors
    ///
    /// - [`CryptError::IncompatibleVersion`] if the version is not [`FORMAT_VERSION`].
    /// - [`CryptError::MalformedEnvelope`] if the input is truncated or has trailing bytes.
    pub fn decode(mut input: &[u8]) -> Result<Self, CryptError> {
        if input.remaining() < 2 {
            return Err(CryptError::MalformedEnvelope(
                "missing version field".into(),
            ));
        }
        let version = input.get_u16();
        if version != FORMAT_VERSION {
            return Err(CryptError::IncompatibleVersion {
                expected: FORMAT_VERSION,
                found: version,
            });
        }
        if input.remaining() < DATA_HEADER_LEN - 2 {
            return Err(CryptError::MalformedEnvelope("truncated header".into()));
        }
        let flags = EnvelopeFlags::from_bits_retain(input.get_u16());
        let len = input.get_u32() as usize;
        if input.remaining() != len {
            return Err(CryptError::MalformedEnvelope(format!(
                "declared payload length {len}, found {} bytes",
                input.remaining()
            )));
        }
        Ok(Self {
            version,
            flags,
            payload: input.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tamper-evident envelope
// ---------------------------------------------------------------------------

/// The leading type tag of a tamper-evident envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopeType {
    /// MAC over a plaintext data envelope.
    Mac = 1,
    /// Authenticated encryption of a data envelope.
    Aead = 2,
}

impl TryFrom<u8> for EnvelopeType {
    type Error = CryptError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(EnvelopeType::Mac),
            2 => Ok(EnvelopeType::Aead),
            other => Err(CryptError::UnknownEnvelopeType(other)),
        }
    }
}

/// A decoded tamper-evident envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TamperFrame {
    /// `tag` authenticates `message`, which is a packed data envelope.
    Mac {
        /// MAC tag bytes.
        tag: Vec<u8>,
        /// Packed data envelope in the clear.
        message: Vec<u8>,
    },
    /// `ciphertext` decrypts under `nonce` to a packed data envelope.
    Aead {
        /// Nonce used for encryption.
        nonce: Vec<u8>,
        /// AEAD ciphertext including the authentication tag.
        ciphertext: Vec<u8>,
    },
}

impl TamperFrame {
    /// The type tag this frame is written with.
    pub fn envelope_type(&self) -> EnvelopeType {
        match self {
            TamperFrame::Mac { .. } => EnvelopeType::Mac,
            TamperFrame::Aead { .. } => EnvelopeType::Aead,
        }
    }

    /// Encode to `type | prefix_len | prefix | remainder`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptError::MalformedEnvelope`] if the tag or nonce exceeds `u16::MAX` bytes.
    pub fn encode(&self) -> Result<Vec<u8>, CryptError> {
        let (prefix, remainder) = match self {
            TamperFrame::Mac { tag, message } => (tag, message),
            TamperFrame::Aead { nonce, ciphertext } => (nonce, ciphertext),
        };
        let prefix_len = u16::try_from(prefix.len()).map_err(|_| {
            CryptError::MalformedEnvelope("length-prefixed field longer than u16::MAX".into())
        })?;
        let mut buf = BytesMut::with_capacity(3 + prefix.len() + remainder.len());
        buf.put_u8(self.envelope_type() as u8);
        buf.put_u16(prefix_len);
        buf.put_slice(prefix);
        buf.put_slice(remainder);
        Ok(buf.to_vec())
    }

    /// Decode a tamper-evident envelope without verifying it.
    ///
    /// # Errors
    ///
    /// - [`CryptError::UnknownEnvelopeType`] for a type tag other than 1 or 2.
    /// - [`CryptError::MalformedEnvelope`] if the body is truncated.
    pub fn decode(mut input: &[u8]) -> Result<Self, CryptError> {
        if !input.has_remaining() {
            return Err(CryptError::MalformedEnvelope("empty input".into()));
        }
        let kind = EnvelopeType::try_from(input.get_u8())?;
        if input.remaining() < 2 {
            return Err(CryptError::MalformedEnvelope(
                "missing length prefix".into(),
            ));
        }
        let prefix_len = input.get_u16() as usize;
        if input.remaining() < prefix_len {
            return Err(CryptError::MalformedEnvelope(format!(
                "length prefix {prefix_len} exceeds remaining {} bytes",
                input.remaining()
            )));
        }
        let (prefix, remainder) = input.split_at(prefix_len);
        let (prefix, remainder) = (prefix.to_vec(), remainder.to_vec());
        Ok(match kind {
            EnvelopeType::Mac => TamperFrame::Mac {
                tag: prefix,
                message: remainder,
            },
            EnvelopeType::Aead => TamperFrame::Aead {
                nonce: prefix,
                ciphertext: remainder,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_frame_matches_reference_bytes() {
        let frame = DataFrame::new(EnvelopeFlags::empty(), b"hello".to_vec());
        let encoded = frame.encode().unwrap();
        assert_eq!(
            encoded,
            [0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o']
        );
        assert_eq!(DataFrame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn other_version_is_incompatible() {
        let frame = DataFrame {
            version: 2,
            flags: EnvelopeFlags::empty(),
            payload: b"x".to_vec(),
        };
        let encoded = frame.encode().unwrap();
        match DataFrame::decode(&encoded) {
            Err(CryptError::IncompatibleVersion { expected, found }) => {
                assert_eq!(expected, 1);
                assert_eq!(found, 2);
            }
            other => panic!("expected IncompatibleVersion, got {other:?}"),
        }
    }

    #[test]
    fn version_is_checked_before_length() {
        // A bare foreign version is reported as such even with no header behind it.
        assert!(matches!(
            DataFrame::decode(&[0x00, 0x07]),
            Err(CryptError::IncompatibleVersion { found: 7, .. })
        ));
    }

    #[test]
    fn truncated_and_trailing_payloads_rejected() {
        let encoded = DataFrame::new(EnvelopeFlags::SERIALIZED, b"{}".to_vec())
            .encode()
            .unwrap();
        assert!(DataFrame::decode(&encoded[..encoded.len() - 1]).is_err());
        let mut longer = encoded.clone();
        longer.push(0);
        assert!(matches!(
            DataFrame::decode(&longer),
            Err(CryptError::MalformedEnvelope(_))
        ));
        assert!(DataFrame::decode(&encoded[..5]).is_err());
    }

    #[test]
    fn unknown_flag_bits_are_retained() {
        let frame = DataFrame::new(EnvelopeFlags::from_bits_retain(0x8001), Vec::new());
        let decoded = DataFrame::decode(&frame.encode().unwrap()).unwrap();
        assert!(decoded.flags.contains(EnvelopeFlags::SERIALIZED));
        assert_eq!(decoded.flags.bits(), 0x8001);
    }

    #[test]
    fn tamper_frame_layout() {
        let frame = TamperFrame::Mac {
            tag: vec![0xAA, 0xBB],
            message: vec![1, 2, 3],
        };
        let encoded = frame.encode().unwrap();
        assert_eq!(encoded, [1, 0x00, 0x02, 0xAA, 0xBB, 1, 2, 3]);
        assert_eq!(TamperFrame::decode(&encoded).unwrap(), frame);

        let aead = TamperFrame::Aead {
            nonce: vec![9; 16],
            ciphertext: vec![7; 4],
        };
        let encoded = aead.encode().unwrap();
        assert_eq!(encoded[0], 2);
        assert_eq!(TamperFrame::decode(&encoded).unwrap(), aead);
    }

    #[test]
    fn tamper_frame_rejects_unknown_type_and_truncation() {
        assert!(matches!(
            TamperFrame::decode(&[3, 0, 0]),
            Err(CryptError::UnknownEnvelopeType(3))
        ));
        assert!(matches!(
            TamperFrame::decode(&[1, 0, 9, 1, 2]),
            Err(CryptError::MalformedEnvelope(_))
        ));
        assert!(TamperFrame::decode(&[]).is_err());
        assert!(TamperFrame::decode(&[2, 0]).is_err());
    }
}
