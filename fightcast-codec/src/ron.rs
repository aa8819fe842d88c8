use fightcast_core::Raw;
use ron::de::Deserializer;
use ron::ser::{PrettyConfig, Serializer};

use super::{Codec, CodecError, CodecId};

/// RON codec.
///
/// Keeps map keys typed, so maps keyed by tuples, integers or enums survive a
/// snapshot unchanged. Output is compact unless built with
/// [`RonCodec::pretty`], which is easier to read when inspecting a snapshot.
#[derive(Debug, Clone, Default)]
pub struct RonCodec {
    pretty: Option<PrettyConfig>,
}

impl RonCodec {
    /// Compact output on a single line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented output, one field per line.
    pub fn pretty() -> Self {
        Self {
            pretty: Some(PrettyConfig::new()),
        }
    }
}

impl Codec for RonCodec {
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut dyn erased_serde::Serializer) -> Result<(), CodecError>,
    ) -> Result<Raw, CodecError> {
        let mut text = String::new();
        let mut serializer =
            Serializer::new(&mut text, self.pretty.clone()).map_err(CodecError::serialize)?;
        f(&mut <dyn erased_serde::Serializer>::erase(&mut serializer))?;
        drop(serializer);
        Ok(Raw::from(text))
    }

    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut dyn erased_serde::Deserializer<'_>) -> Result<(), CodecError>,
    ) -> Result<(), CodecError> {
        let text = std::str::from_utf8(data).map_err(CodecError::deserialize)?;
        let mut deserializer = Deserializer::from_str(text).map_err(CodecError::deserialize)?;
        f(&mut <dyn erased_serde::Deserializer>::erase(&mut deserializer))?;
        deserializer.end().map_err(CodecError::deserialize)
    }

    fn clone_box(&self) -> Box<dyn Codec> {
        Box::new(self.clone())
    }

    fn codec_id(&self) -> CodecId {
        CodecId::Ron
    }
}
