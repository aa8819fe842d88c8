//! Gateway configuration.

use std::time::Duration;

use serde::de::IntoDeserializer;
use serde::de::value::{Error as ValueError, StrDeserializer};
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Environment variable holding the base address used on the server.
pub const BACKEND_URL: &str = "BACKEND_URL";
/// Environment variable holding the base address used on the client.
pub const PUBLIC_BACKEND_URL: &str = "PUBLIC_BACKEND_URL";
/// Environment variable holding the request timeout (e.g. `5s`).
pub const TIMEOUT: &str = "FIGHTCAST_TIMEOUT";

/// Where the gateway runs.
///
/// The server and the client reach the prediction service through different
/// addresses, so the context picks which configured base address is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// Server-side rendering; uses [`GatewayConfig::backend_url`].
    Server,
    /// Client runtime; uses [`GatewayConfig::public_backend_url`].
    Client,
}

/// Addresses and limits for talking to the prediction service.
///
/// # Example
///
/// ```
/// use fightcast_reqwest::{ExecutionContext, GatewayConfig};
///
/// let config: GatewayConfig = serde_saphyr::from_str(r#"
/// backend_url: http://predictor.internal:8000
/// public_backend_url: https://api.example.com
/// timeout: 5s
/// "#).unwrap();
///
/// assert_eq!(
///     config.base_url(ExecutionContext::Client).unwrap(),
///     "https://api.example.com"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base address used on the server.
    #[serde(default)]
    pub backend_url: Option<String>,
    /// Base address used on the client.
    #[serde(default)]
    pub public_backend_url: Option<String>,
    /// Upper bound for one request, connect through body.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl GatewayConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// an environment variable by name. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GatewayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let timeout = var(TIMEOUT)
            .map(|raw| {
                let deserializer: StrDeserializer<'_, ValueError> = raw.as_str().into_deserializer();
                humantime_serde::deserialize(deserializer).map_err(|error| {
                    GatewayError::Configuration(format!("invalid {TIMEOUT} `{raw}`: {error}"))
                })
            })
            .transpose()?;

        Ok(Self {
            backend_url: var(BACKEND_URL),
            public_backend_url: var(PUBLIC_BACKEND_URL),
            timeout,
        })
    }

    /// Returns the base address for `context`.
    pub fn base_url(&self, context: ExecutionContext) -> Result<&str, GatewayError> {
        let (value, name) = match context {
            ExecutionContext::Server => (&self.backend_url, BACKEND_URL),
            ExecutionContext::Client => (&self.public_backend_url, PUBLIC_BACKEND_URL),
        };
        value
            .as_deref()
            .ok_or_else(|| GatewayError::Configuration(format!("{name} is not set")))
    }
}
