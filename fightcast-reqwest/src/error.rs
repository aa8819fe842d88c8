use fightcast_core::{ErrorDescriptor, ErrorKind};
use thiserror::Error;

/// Failure of a prediction service call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The service answered with a non-success status.
    #[error("prediction service responded with status {status}")]
    UpstreamStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The body was not `{"data": [FightRecord, ...]}`.
    #[error("unexpected response from prediction service: {0}")]
    UpstreamShape(String),

    /// Connect, DNS, body read or timeout failure.
    #[error("request to prediction service failed")]
    Network(#[source] reqwest::Error),

    /// A required option is missing or invalid.
    #[error("gateway misconfigured: {0}")]
    Configuration(String),
}

impl From<&GatewayError> for ErrorDescriptor {
    fn from(error: &GatewayError) -> Self {
        match error {
            GatewayError::UpstreamStatus { status } => {
                ErrorDescriptor::new(ErrorKind::UpstreamStatus(*status), error.to_string())
            }
            GatewayError::UpstreamShape(_) => {
                ErrorDescriptor::new(ErrorKind::UpstreamShape, error.to_string())
            }
            GatewayError::Network(source) => {
                ErrorDescriptor::new(ErrorKind::Network, format!("{error}: {source}"))
            }
            GatewayError::Configuration(_) => {
                ErrorDescriptor::new(ErrorKind::Configuration, error.to_string())
            }
        }
    }
}

impl From<GatewayError> for ErrorDescriptor {
    fn from(error: GatewayError) -> Self {
        ErrorDescriptor::from(&error)
    }
}
