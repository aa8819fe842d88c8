//! Error types for hydration.

use fightcast_codec::CodecError;
use fightcast_core::QueryKey;
use thiserror::Error;

/// Error raised while dehydrating or hydrating a cache.
#[derive(Debug, Error)]
pub enum HydrationError {
    /// A payload could not be encoded with the snapshot codec.
    #[error("failed to encode query `{key}`")]
    Encode {
        /// Key of the entry that failed.
        key: QueryKey,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },

    /// A payload could not be decoded into the cache's data type.
    #[error("failed to decode query `{key}`")]
    Decode {
        /// Key of the entry that failed.
        key: QueryKey,
        /// Underlying codec error.
        #[source]
        source: CodecError,
    },

    /// The snapshot itself could not be written or read.
    #[error("malformed snapshot")]
    Wire(#[from] serde_json::Error),
}
