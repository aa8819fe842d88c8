//! Gateway behaviour against a mock prediction service.

use std::time::Duration;

use fightcast::{DehydrateOptions, DehydratedSnapshot, QueryCache};
use fightcast_core::{ErrorKind, FightRecord, QueryStatus};
use fightcast_reqwest::{
    ExecutionContext, Gateway, GatewayConfig, GatewayError, fetch_fights, fights_key,
    prefetch_fights,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIGHTS: &str = "/predictor/predictor/";

fn server_config(uri: &str) -> GatewayConfig {
    GatewayConfig {
        backend_url: Some(uri.to_owned()),
        ..GatewayConfig::default()
    }
}

fn card() -> Vec<FightRecord> {
    vec![
        FightRecord::new("Alpha", "Bravo", "Alpha"),
        FightRecord::new("Charlie", "Delta", "Delta"),
    ]
}

async fn mount_fights(server: &MockServer, fights: &[FightRecord]) {
    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": fights })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_successful_fetch() {
    let mock_server = MockServer::start().await;
    mount_fights(&mock_server, &card()).await;

    let gateway = Gateway::new(ExecutionContext::Server, &server_config(&mock_server.uri())).unwrap();

    assert_eq!(gateway.get_fights().await.unwrap(), card());
}

#[tokio::test]
async fn test_empty_card() {
    let mock_server = MockServer::start().await;
    mount_fights(&mock_server, &[]).await;

    let gateway = Gateway::new(ExecutionContext::Server, &server_config(&mock_server.uri())).unwrap();

    assert_eq!(gateway.get_fights().await.unwrap(), Vec::new());
}

#[tokio::test]
async fn test_cache_loads_once_while_fresh() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": card() })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = Gateway::new(ExecutionContext::Server, &server_config(&mock_server.uri())).unwrap();
    let cache = QueryCache::new();

    let first = fetch_fights(&cache, &gateway).await;
    let second = fetch_fights(&cache, &gateway).await;

    assert_eq!(first.status(), QueryStatus::Success);
    assert_eq!(first.data(), Some(&card()));
    assert_eq!(second, first);
}

#[tokio::test]
async fn test_upstream_status_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let gateway = Gateway::new(ExecutionContext::Server, &server_config(&mock_server.uri())).unwrap();

    let error = gateway.get_fights().await.unwrap_err();
    assert!(matches!(error, GatewayError::UpstreamStatus { status: 500 }));

    let cache = QueryCache::new();
    let state = fetch_fights(&cache, &gateway).await;
    assert_eq!(state.status(), QueryStatus::Error);
    assert_eq!(state.data(), None);
    assert_eq!(state.error_descriptor().and_then(|e| e.status()), Some(500));
}

#[tokio::test]
async fn test_unexpected_shapes() {
    for body in [
        json!({ "fights": [] }),
        json!({ "data": "none" }),
        json!({ "data": [{ "red_fighter": "Alpha" }] }),
    ] {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(FIGHTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&mock_server)
            .await;

        let gateway =
            Gateway::new(ExecutionContext::Server, &server_config(&mock_server.uri())).unwrap();
        let error = gateway.get_fights().await.unwrap_err();

        assert!(
            matches!(error, GatewayError::UpstreamShape(_)),
            "{body} gave {error:?}"
        );
    }
}

#[tokio::test]
async fn test_shape_error_settles_cache_entry() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock_server)
        .await;

    let gateway = Gateway::new(ExecutionContext::Server, &server_config(&mock_server.uri())).unwrap();
    let cache = QueryCache::new();

    let state = fetch_fights(&cache, &gateway).await;
    assert_eq!(
        state.error_descriptor().map(|e| e.kind()),
        Some(ErrorKind::UpstreamShape)
    );
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let uri = {
        let mock_server = MockServer::start().await;
        mock_server.uri()
    };

    let gateway = Gateway::new(ExecutionContext::Server, &server_config(&uri)).unwrap();
    let error = gateway.get_fights().await.unwrap_err();

    assert!(matches!(error, GatewayError::Network(_)));
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": card() }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let config = GatewayConfig {
        timeout: Some(Duration::from_millis(100)),
        ..server_config(&mock_server.uri())
    };
    let gateway = Gateway::new(ExecutionContext::Server, &config).unwrap();

    match gateway.get_fights().await {
        Err(GatewayError::Network(error)) => assert!(error.is_timeout()),
        other => panic!("expected a timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_context_selects_base_address() {
    let backend = MockServer::start().await;
    let public = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": card() })))
        .expect(1)
        .mount(&backend)
        .await;
    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&public)
        .await;

    let config = GatewayConfig {
        backend_url: Some(backend.uri()),
        public_backend_url: Some(format!("{}/", public.uri())),
        timeout: None,
    };

    let server = Gateway::new(ExecutionContext::Server, &config).unwrap();
    let client = Gateway::new(ExecutionContext::Client, &config).unwrap();

    assert_eq!(server.get_fights().await.unwrap(), card());
    assert_eq!(client.get_fights().await.unwrap(), Vec::new());
    assert_eq!(client.endpoint().path(), FIGHTS);
}

#[test]
fn test_missing_base_address() {
    let config = server_config("http://localhost:8000");

    let error = Gateway::new(ExecutionContext::Client, &config).unwrap_err();

    assert!(matches!(error, GatewayError::Configuration(_)));
}

#[test]
fn test_config_from_yaml() {
    let config: GatewayConfig = serde_saphyr::from_str(
        r#"
        backend_url: http://predictor:8000
        timeout: 3s
        "#,
    )
    .unwrap();

    assert_eq!(
        config,
        GatewayConfig {
            backend_url: Some("http://predictor:8000".into()),
            public_backend_url: None,
            timeout: Some(Duration::from_secs(3)),
        }
    );
}

#[tokio::test]
async fn test_server_prefetch_reaches_client_without_refetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FIGHTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": card() })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = GatewayConfig {
        backend_url: Some(mock_server.uri()),
        public_backend_url: Some(mock_server.uri()),
        timeout: None,
    };

    // Server render
    let server_gateway = Gateway::new(ExecutionContext::Server, &config).unwrap();
    let server_cache: QueryCache<Vec<FightRecord>> = QueryCache::new();
    prefetch_fights(&server_cache, &server_gateway);
    let settled = fetch_fights(&server_cache, &server_gateway).await;
    let page = server_cache
        .dehydrate(&DehydrateOptions::default())
        .unwrap()
        .to_json()
        .unwrap();

    // Client runtime
    let client_gateway = Gateway::new(ExecutionContext::Client, &config).unwrap();
    let client_cache: QueryCache<Vec<FightRecord>> = QueryCache::new();
    client_cache
        .hydrate(DehydratedSnapshot::from_json(&page).unwrap())
        .unwrap();

    assert_eq!(client_cache.read(&fights_key()), Some(settled.clone()));
    assert_eq!(fetch_fights(&client_cache, &client_gateway).await, settled);
}
