#![warn(missing_docs)]
//! # fightcast-codec
//!
//! Codecs that turn cache payloads into bytes for a dehydrated snapshot and
//! back.
//!
//! The [`Codec`] trait is object-safe (it works through `erased-serde`), so a
//! snapshot producer can hold an `Arc<dyn Codec>` chosen at runtime. Typed
//! access goes through [`CodecExt::encode`] and [`CodecExt::decode`].
//!
//! Fidelity for types JSON has no native form for (timestamps, durations,
//! sets, integer-keyed maps) comes from serde: the decoding side names the
//! concrete Rust type, so a timestamp written as an RFC 3339 string comes back
//! as a timestamp rather than as a string. Maps keyed by composite values need
//! [`RonCodec`]; JSON only has string object keys.
//!
//! ```
//! use fightcast_codec::{CodecExt, JsonCodec};
//! use fightcast_core::FightRecord;
//!
//! let fights = vec![FightRecord::new("A", "B", "A")];
//! let raw = JsonCodec.encode(&fights).unwrap();
//! let back: Vec<FightRecord> = JsonCodec.decode(&raw).unwrap();
//! assert_eq!(fights, back);
//! ```

use std::fmt;
use std::sync::Arc;

use fightcast_core::Raw;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

mod json;
mod ron;

pub use json::JsonCodec;
pub use ron::RonCodec;

/// Error produced while encoding or decoding a payload.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Encoding failed.
    #[error("failed to encode payload: {0}")]
    Serialize(Box<dyn std::error::Error + Send>),

    /// Decoding failed.
    #[error("failed to decode payload: {0}")]
    Deserialize(Box<dyn std::error::Error + Send>),
}

impl CodecError {
    pub(crate) fn serialize<E>(error: E) -> Self
    where
        E: std::error::Error + Send + 'static,
    {
        CodecError::Serialize(Box::new(error))
    }

    pub(crate) fn deserialize<E>(error: E) -> Self
    where
        E: std::error::Error + Send + 'static,
    {
        CodecError::Deserialize(Box::new(error))
    }
}

/// Identifier of a codec, stored in a snapshot so the receiving side can
/// rebuild the codec that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    /// [`JsonCodec`]
    #[default]
    Json,
    /// [`RonCodec`]
    Ron,
}

impl CodecId {
    /// Returns the codec this identifier names.
    pub fn codec(&self) -> Arc<dyn Codec> {
        match self {
            CodecId::Json => Arc::new(JsonCodec),
            CodecId::Ron => Arc::new(RonCodec::new()),
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecId::Json => f.write_str("json"),
            CodecId::Ron => f.write_str("ron"),
        }
    }
}

/// Object-safe codec trait (uses erased-serde for type erasure).
///
/// This trait can be used as `&dyn Codec` or `Arc<dyn Codec>`.
pub trait Codec: fmt::Debug + Send + Sync {
    /// Provides access to a serializer via a callback to avoid lifetime issues.
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut dyn erased_serde::Serializer) -> Result<(), CodecError>,
    ) -> Result<Raw, CodecError>;

    /// Provides access to a deserializer via a callback to avoid lifetime issues.
    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), CodecError>,
    ) -> Result<(), CodecError>;

    /// Clone this codec into a box (for object safety).
    fn clone_box(&self) -> Box<dyn Codec>;

    /// Returns the identifier written into snapshots.
    fn codec_id(&self) -> CodecId;
}

/// Extension trait providing typed encode/decode.
/// Implemented for every [`Codec`], including `dyn Codec`.
pub trait CodecExt: Codec {
    /// Encodes `value` into bytes.
    fn encode<T>(&self, value: &T) -> Result<Raw, CodecError>
    where
        T: Serialize,
    {
        self.with_serializer(&mut |serializer| {
            erased_serde::Serialize::erased_serialize(value, serializer)
                .map_err(CodecError::serialize)
        })
    }

    /// Decodes a value of type `T` from bytes.
    fn decode<T>(&self, data: &[u8]) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        let mut result: Option<T> = None;
        self.with_deserializer(data, &mut |deserializer| {
            let value: T =
                erased_serde::deserialize(deserializer).map_err(CodecError::deserialize)?;
            result = Some(value);
            Ok(())
        })?;

        result.ok_or_else(|| {
            CodecError::Deserialize(Box::new(std::io::Error::other(
                "deserialization produced no result",
            )))
        })
    }
}

impl<C> CodecExt for C where C: Codec + ?Sized {}

impl Codec for Box<dyn Codec> {
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut dyn erased_serde::Serializer) -> Result<(), CodecError>,
    ) -> Result<Raw, CodecError> {
        (**self).with_serializer(f)
    }

    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        (**self).with_deserializer(data, f)
    }

    fn clone_box(&self) -> Box<dyn Codec> {
        (**self).clone_box()
    }

    fn codec_id(&self) -> CodecId {
        (**self).codec_id()
    }
}

impl Codec for Arc<dyn Codec> {
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut dyn erased_serde::Serializer) -> Result<(), CodecError>,
    ) -> Result<Raw, CodecError> {
        (**self).with_serializer(f)
    }

    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        (**self).with_deserializer(data, f)
    }

    fn clone_box(&self) -> Box<dyn Codec> {
        (**self).clone_box()
    }

    fn codec_id(&self) -> CodecId {
        (**self).codec_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_id_builds_matching_codec() {
        for id in [CodecId::Json, CodecId::Ron] {
            assert_eq!(id.codec().codec_id(), id);
        }
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let result: Result<Vec<u32>, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(CodecError::Deserialize(_))));
    }
}
