//! Data envelopes: raw bytes or a JSON value, framed with a version and flags.
//!
//! The envelope carries no authentication. Input of uncertain origin must go through
//! [`crate::tamper`] instead of [`unpack`].

use common::{CryptError, DataFrame, EnvelopeFlags};
use serde::{de::DeserializeOwned, Serialize};

/// A value that can be packed into an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Carried verbatim.
    Bytes(Vec<u8>),
    /// Serialized as JSON; the envelope's `SERIALIZED` flag is set.
    Structured(serde_json::Value),
}

impl Data {
    /// Borrow the raw bytes, if this is [`Data::Bytes`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Data::Bytes(b) => Some(b),
            Data::Structured(_) => None,
        }
    }

    /// Take the raw bytes, if this is [`Data::Bytes`].
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Data::Bytes(b) => Some(b),
            Data::Structured(_) => None,
        }
    }

    /// Convert into `T`, deserializing a structured value.
    ///
    /// # Errors
    ///
    /// [`CryptError::Serialization`] if this is raw bytes or does not match `T`.
    pub fn into_value<T: DeserializeOwned>(self) -> Result<T, CryptError> {
        match self {
            Data::Structured(v) => {
                serde_json::from_value(v).map_err(|e| CryptError::Serialization(e.to_string()))
            }
            Data::Bytes(_) => Err(CryptError::Serialization(
                "envelope holds raw bytes, not a structured value".into(),
            )),
        }
    }
}

impl From<Vec<u8>> for Data {
    fn from(bytes: Vec<u8>) -> Self {
        Data::Bytes(bytes)
    }
}

impl From<&[u8]> for Data {
    fn from(bytes: &[u8]) -> Self {
        Data::Bytes(bytes.to_vec())
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::Bytes(s.as_bytes().to_vec())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::Bytes(s.into_bytes())
    }
}

impl From<serde_json::Value> for Data {
    fn from(value: serde_json::Value) -> Self {
        Data::Structured(value)
    }
}

/// Pack `data` into envelope bytes.
pub fn pack(data: &Data) -> Result<Vec<u8>, CryptError> {
    let frame = match data {
        Data::Bytes(bytes) => DataFrame::new(EnvelopeFlags::empty(), bytes.clone()),
        Data::Structured(value) => {
            let payload =
                serde_json::to_vec(value).map_err(|e| CryptError::Serialization(e.to_string()))?;
            DataFrame::new(EnvelopeFlags::SERIALIZED, payload)
        }
    };
    frame.encode()
}

/// Unpack envelope bytes.
///
/// # Errors
///
/// - [`CryptError::IncompatibleVersion`] for any version other than the current one.
/// - [`CryptError::MalformedEnvelope`] for truncated input or trailing bytes.
/// - [`CryptError::Serialization`] if a serialized payload is not valid JSON.
pub fn unpack(bytes: &[u8]) -> Result<Data, CryptError> {
    let frame = DataFrame::decode(bytes)?;
    if frame.flags.contains(EnvelopeFlags::SERIALIZED) {
        let value = serde_json::from_slice(&frame.payload)
            .map_err(|e| CryptError::Serialization(e.to_string()))?;
        Ok(Data::Structured(value))
    } else {
        Ok(Data::Bytes(frame.payload))
    }
}

/// Pack any serializable value through the structured branch.
pub fn pack_value<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CryptError> {
    let value =
        serde_json::to_value(value).map_err(|e| CryptError::Serialization(e.to_string()))?;
    pack(&Data::Structured(value))
}

/// Unpack a structured envelope into `T`.
pub fn unpack_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CryptError> {
    unpack(bytes)?.into_value()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn hello_reference_bytes() {
        let packed = pack(&Data::from("hello")).unwrap();
        assert_eq!(hex::encode(&packed), "000100000000000568656c6c6f");
    }

    #[test]
    fn structured_sets_flag() {
        let packed = pack(&Data::from(json!({"a": 1}))).unwrap();
        assert_eq!(&packed[..4], &[0, 1, 0, 1]);
        assert_eq!(&packed[8..], br#"{"a":1}"#);
        assert_eq!(unpack(&packed).unwrap(), Data::Structured(json!({"a": 1})));
    }

    #[test]
    fn other_version_rejected() {
        let mut packed = pack(&Data::from("x")).unwrap();
        packed[1] = 2;
        assert!(matches!(
            unpack(&packed),
            Err(CryptError::IncompatibleVersion { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn unknown_flag_bits_are_tolerated() {
        let mut packed = pack(&Data::from("x")).unwrap();
        packed[2] = 0x80;
        assert_eq!(unpack(&packed).unwrap(), Data::from("x"));
    }

    #[test]
    fn serialized_flag_with_bad_json() {
        let mut packed = pack(&Data::from("not json")).unwrap();
        packed[3] = 1;
        assert_eq!(unpack(&packed).unwrap_err().code(), "serialization");
    }

    #[test]
    fn typed_values() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }
        let packed = pack_value(&Point { x: 3, y: -4 }).unwrap();
        assert_eq!(unpack_value::<Point>(&packed).unwrap(), Point { x: 3, y: -4 });
        assert!(unpack_value::<Point>(&pack(&Data::from("raw")).unwrap()).is_err());
    }

    #[test]
    fn data_accessors() {
        let d = Data::from(vec![1u8, 2]);
        assert_eq!(d.as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(Data::from(json!(null)).into_bytes(), None);
    }
}
