//! Transportable error descriptions.
//!
//! Typed errors (`GatewayError` and friends) stay inside the crate that
//! produced them. Once a failure settles a cache entry it is flattened into an
//! [`ErrorDescriptor`], which is `Clone`, comparable, and serializable, so it
//! can be shared between every waiter of an in-flight fetch and shipped to the
//! client inside a dehydrated snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Upstream answered with a non-success HTTP status.
    UpstreamStatus(u16),
    /// Upstream body did not have the expected shape.
    UpstreamShape,
    /// The request could not be completed (connect, DNS, timeout, body read).
    Network,
    /// Required configuration was missing or invalid.
    Configuration,
    /// The loader task aborted, or a streamed payload failed to encode.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::UpstreamStatus(status) => write!(f, "upstream status {}", status),
            ErrorKind::UpstreamShape => f.write_str("upstream shape"),
            ErrorKind::Network => f.write_str("network"),
            ErrorKind::Configuration => f.write_str("configuration"),
            ErrorKind::Internal => f.write_str("internal"),
        }
    }
}

/// Kind and message of a failed query.
///
/// ```
/// use fightcast_core::{ErrorDescriptor, ErrorKind};
///
/// let error = ErrorDescriptor::new(ErrorKind::UpstreamStatus(500), "prediction service failed");
/// assert_eq!(error.status(), Some(500));
/// assert_eq!(error.to_string(), "upstream status 500: prediction service failed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ErrorDescriptor {
    kind: ErrorKind,
    message: String,
}

impl ErrorDescriptor {
    /// Creates a new error descriptor.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the upstream HTTP status, if this is a status error.
    pub fn status(&self) -> Option<u16> {
        match self.kind {
            ErrorKind::UpstreamStatus(status) => Some(status),
            _ => None,
        }
    }
}
