//! HTTP client for the prediction service.

use std::future::Future;
use std::pin::Pin;

use fightcast_core::{ErrorDescriptor, FightRecord, QueryFn};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ExecutionContext, GatewayConfig};
use crate::error::GatewayError;

/// Path of the fights listing, relative to the base address.
pub const FIGHTS_PATH: &str = "predictor/predictor/";

/// Client for the prediction service, bound to one execution context.
///
/// The base address is resolved once, in [`Gateway::new`]. Cloning is cheap
/// and clones share the connection pool.
///
/// `Gateway` is a [`QueryFn`], so a clone can be handed straight to
/// [`QueryCache::fetch`](fightcast::QueryCache::fetch) as the loader.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
    endpoint: Url,
    context: ExecutionContext,
}

impl Gateway {
    /// Creates a gateway for `context`.
    ///
    /// Fails with [`GatewayError::Configuration`] if `config` has no base
    /// address for `context` or the address is not a valid URL.
    pub fn new(context: ExecutionContext, config: &GatewayConfig) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|error| GatewayError::Configuration(error.to_string()))?;
        Self::with_client(context, config, client)
    }

    /// Creates a gateway that sends requests through `client`.
    ///
    /// `config.timeout` is ignored; configure it on `client` instead.
    pub fn with_client(
        context: ExecutionContext,
        config: &GatewayConfig,
        client: Client,
    ) -> Result<Self, GatewayError> {
        let endpoint = fights_endpoint(config.base_url(context)?)?;
        debug!(?context, %endpoint, "prediction gateway configured");
        Ok(Self {
            client,
            endpoint,
            context,
        })
    }

    /// Returns the execution context this gateway was built for.
    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    /// Returns the fights listing URL.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetches the fights of the current event with their predicted winners.
    ///
    /// Makes a single attempt.
    #[tracing::instrument(
        skip(self),
        fields(context = ?self.context, endpoint = %self.endpoint),
        level = "debug"
    )]
    pub async fn get_fights(&self) -> Result<Vec<FightRecord>, GatewayError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(|error| {
                warn!(%error, "prediction service unreachable");
                GatewayError::Network(error)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "prediction service returned an error");
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(GatewayError::Network)?;
        let fights = parse_fights(&body).inspect_err(|error| warn!(%error))?;
        debug!(fights = fights.len(), "fetched fights");
        Ok(fights)
    }
}

impl QueryFn<Vec<FightRecord>> for Gateway {
    type Future = Pin<Box<dyn Future<Output = Result<Vec<FightRecord>, ErrorDescriptor>> + Send>>;

    fn load(self) -> Self::Future {
        Box::pin(async move { self.get_fights().await.map_err(ErrorDescriptor::from) })
    }
}

fn fights_endpoint(base: &str) -> Result<Url, GatewayError> {
    let url = format!("{}/{}", base.trim_end_matches('/'), FIGHTS_PATH);
    Url::parse(&url)
        .map_err(|error| GatewayError::Configuration(format!("invalid base address `{base}`: {error}")))
}

/// Extracts the records from a `{"data": [...]}` body.
fn parse_fights(body: &[u8]) -> Result<Vec<FightRecord>, GatewayError> {
    let mut envelope: Value = serde_json::from_slice(body)
        .map_err(|error| GatewayError::UpstreamShape(format!("body is not JSON: {error}")))?;

    match envelope.get_mut("data").map(Value::take) {
        Some(data @ Value::Array(_)) => serde_json::from_value(data)
            .map_err(|error| GatewayError::UpstreamShape(format!("invalid fight record: {error}"))),
        Some(_) => Err(GatewayError::UpstreamShape("`data` is not a list".into())),
        None => Err(GatewayError::UpstreamShape("missing `data` field".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let with = fights_endpoint("http://localhost:8000/").unwrap();
        let without = fights_endpoint("http://localhost:8000").unwrap();

        assert_eq!(with, without);
        assert_eq!(with.as_str(), "http://localhost:8000/predictor/predictor/");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let url = fights_endpoint("https://example.com/api/").unwrap();
        assert_eq!(url.path(), "/api/predictor/predictor/");
    }

    #[test]
    fn test_invalid_base_is_configuration_error() {
        assert!(matches!(
            fights_endpoint("not a url"),
            Err(GatewayError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_fights() {
        let body = br#"{"data": [{"red_fighter": "A", "blue_fighter": "B", "predicted_winner": "B"}]}"#;
        assert_eq!(
            parse_fights(body).unwrap(),
            vec![FightRecord::new("A", "B", "B")]
        );
        assert_eq!(parse_fights(br#"{"data": []}"#).unwrap(), Vec::new());
    }

    #[test]
    fn test_parse_fights_rejects_bad_shapes() {
        let bodies: [&[u8]; 5] = [
            b"<html>",
            br#"{"fights": []}"#,
            br#"{"data": {"red_fighter": "A"}}"#,
            br#"{"data": [{"red_fighter": "A"}]}"#,
            br#"[]"#,
        ];
        for body in bodies {
            assert!(
                matches!(parse_fights(body), Err(GatewayError::UpstreamShape(_))),
                "accepted {}",
                String::from_utf8_lossy(body)
            );
        }
    }
}
