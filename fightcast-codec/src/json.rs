use bytes::Bytes;
use fightcast_core::Raw;

use super::{Codec, CodecError, CodecId};

/// JSON codec (default).
///
/// Produces text a browser can parse natively, which makes it the codec of
/// choice for snapshots embedded into a server-rendered page.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut dyn erased_serde::Serializer) -> Result<(), CodecError>,
    ) -> Result<Raw, CodecError> {
        let mut buf = Vec::new();
        {
            let mut ser = serde_json::Serializer::new(&mut buf);
            let mut erased = <dyn erased_serde::Serializer>::erase(&mut ser);
            f(&mut erased)?;
        }
        Ok(Bytes::from(buf))
    }

    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        let mut deser = serde_json::Deserializer::from_slice(data);
        {
            let mut erased = <dyn erased_serde::Deserializer>::erase(&mut deser);
            f(&mut erased)?;
        }
        // Reject trailing characters after the value
        deser.end().map_err(CodecError::deserialize)
    }

    fn clone_box(&self) -> Box<dyn Codec> {
        Box::new(*self)
    }

    fn codec_id(&self) -> CodecId {
        CodecId::Json
    }
}
