//! Built-in text codecs.
//!
//! | name         | alphabet                       |
//! |--------------|--------------------------------|
//! | `hex`        | `0-9a-f` (decode accepts A-F)  |
//! | `base64`     | standard, padded               |
//! | `uri_base64` | URL-safe, unpadded             |
//! | `base32`     | RFC 4648, upper case, padded   |
//! | `uri_escape` | percent-encoding               |

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use common::CryptError;

use super::registry::CodecSpec;

fn invalid(encoding: &str, reason: impl ToString) -> CryptError {
    CryptError::InvalidEncoding {
        encoding: encoding.to_owned(),
        reason: reason.to_string(),
    }
}

fn hex_encode(data: &[u8]) -> String {
    hex::encode(data)
}

fn hex_decode(text: &str) -> Result<Vec<u8>, CryptError> {
    hex::decode(text).map_err(|e| invalid("hex", e))
}

fn base64_encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

fn base64_decode(text: &str) -> Result<Vec<u8>, CryptError> {
    STANDARD.decode(text).map_err(|e| invalid("base64", e))
}

fn uri_base64_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

fn uri_base64_decode(text: &str) -> Result<Vec<u8>, CryptError> {
    URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| invalid("uri_base64", e))
}

fn base32_encode(data: &[u8]) -> String {
    data_encoding::BASE32.encode(data)
}

fn base32_decode(text: &str) -> Result<Vec<u8>, CryptError> {
    data_encoding::BASE32
        .decode(text.as_bytes())
        .map_err(|e| invalid("base32", e))
}

fn uri_escape_encode(data: &[u8]) -> String {
    urlencoding::encode_binary(data).into_owned()
}

fn uri_escape_decode(text: &str) -> Result<Vec<u8>, CryptError> {
    Ok(urlencoding::decode_binary(text.as_bytes()).into_owned())
}

fn codec(
    name: &str,
    encode: fn(&[u8]) -> String,
    decode: fn(&str) -> Result<Vec<u8>, CryptError>,
) -> CodecSpec {
    CodecSpec {
        name: name.to_owned(),
        encode,
        decode,
    }
}

/// Every codec the built-in registry ships.
pub(crate) fn builtins() -> Vec<CodecSpec> {
    vec![
        codec("hex", hex_encode, hex_decode),
        codec("base64", base64_encode, base64_decode),
        codec("uri_base64", uri_base64_encode, uri_base64_decode),
        codec("base32", base32_encode, base32_decode),
        codec("uri_escape", uri_escape_encode, uri_escape_decode),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(name: &str) -> CodecSpec {
        builtins()
            .into_iter()
            .find(|c| c.name == name)
            .unwrap()
    }

    #[test]
    fn reference_encodings() {
        let data = b"\xfb\xffhello";
        assert_eq!((find("hex").encode)(data), "fbff68656c6c6f");
        assert_eq!((find("base64").encode)(data), "+/9oZWxsbw==");
        assert_eq!((find("uri_base64").encode)(data), "-_9oZWxsbw");
        assert_eq!((find("base32").encode)(b"hello"), "NBSWY3DP");
        assert_eq!((find("uri_escape").encode)(b"a b/c"), "a%20b%2Fc");
    }

    #[test]
    fn alphabets_fit_their_category() {
        let data: Vec<u8> = (0..=255).collect();
        let printable = (find("base64").encode)(&data);
        assert!(printable.bytes().all(|b| b.is_ascii_graphic()));
        let alnum = (find("base32").encode)(&data);
        assert!(alnum.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'='));
        let uri = (find("uri_base64").encode)(&data);
        assert!(uri
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    #[test]
    fn every_codec_round_trips() {
        let data: Vec<u8> = (0..=255).collect();
        for codec in builtins() {
            let text = (codec.encode)(&data);
            assert_eq!((codec.decode)(&text).unwrap(), data, "{}", codec.name);
        }
    }

    #[test]
    fn malformed_input_is_invalid_encoding() {
        let cases = [("hex", "zz"), ("base64", "@@@"), ("base32", "1!"), ("uri_base64", "*")];
        for (name, bad) in cases {
            let err = (find(name).decode)(bad).unwrap_err();
            assert!(
                matches!(err, CryptError::InvalidEncoding { ref encoding, .. } if encoding == name),
                "{name}: {err:?}"
            );
        }
    }
}
