//! Wire codecs used by the cairn containers.
//!
//! Containers never pick a format themselves; `marshal`/`unmarshal` take a
//! [`Codec`] type parameter instead:
//!
//! - [`Json`]: structured text, backed by `serde_json`
//! - [`Cbor`]: compact binary, backed by `ciborium`
//!
//! Only content crosses the wire. Lock state, read-only flags and hub wiring
//! are never part of a payload.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Errors surfaced by a codec, passed through unchanged by the containers.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("json codec failed")]
    Json(#[from] serde_json::Error),

    #[error("cbor encoding failed")]
    CborEncode(#[from] ciborium::ser::Error<std::io::Error>),

    #[error("cbor decoding failed")]
    CborDecode(#[from] ciborium::de::Error<std::io::Error>),
}

/// A serialization format a container can be written to and read from.
pub trait Codec {
    /// Short name used in log lines.
    const NAME: &'static str;

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError>;
}

/// Structured textual codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Codec for Json {
    const NAME: &'static str = "json";

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact binary codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cbor;

impl Codec for Cbor {
    const NAME: &'static str = "cbor";

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)?;
        Ok(buf)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(ciborium::from_reader(bytes)?)
    }
}
