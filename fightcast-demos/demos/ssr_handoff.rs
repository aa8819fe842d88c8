//! Server render to client hand-off
//!
//! Demonstrates the full path of the fights listing:
//! - The server prefetches through the gateway into its own cache
//! - The cache is dehydrated into JSON embedded in the page
//! - The client hydrates a fresh cache and reads without a second request
//!
//! A mock prediction service stands in for the real one unless `BACKEND_URL`
//! is set.
//!
//! Run:
//!   cargo run -p fightcast-demos --example ssr_handoff
//!
//! Against a real service:
//!   BACKEND_URL=http://localhost:8000 PUBLIC_BACKEND_URL=http://localhost:8000 \
//!     cargo run -p fightcast-demos --example ssr_handoff

use fightcast::{CachePolicy, DehydrateOptions, DehydratedSnapshot, QueryCache};
use fightcast_core::FightRecord;
use fightcast_reqwest::{
    ExecutionContext, Gateway, GatewayConfig, fetch_fights, fights_key, prefetch_fights,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLICY: &str = r#"
default:
  stale_time: 30s
"#;

async fn mock_service() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/predictor/predictor/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "red_fighter": "Alex Pereira", "blue_fighter": "Magomed Ankalaev", "predicted_winner": "Magomed Ankalaev" },
                { "red_fighter": "Merab Dvalishvili", "blue_fighter": "Umar Nurmagomedov", "predicted_winner": "Merab Dvalishvili" },
            ]
        })))
        .mount(&server)
        .await;
    server
}

fn print_card(label: &str, fights: &[FightRecord]) {
    println!("{label}:");
    for fight in fights {
        println!(
            "  {} vs {} -> {}",
            fight.red_fighter, fight.blue_fighter, fight.predicted_winner
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let mut config = GatewayConfig::from_env()?;
    let _mock = if config.backend_url.is_none() {
        let mock = mock_service().await;
        config.backend_url = Some(mock.uri());
        config.public_backend_url = Some(mock.uri());
        Some(mock)
    } else {
        None
    };
    let policy: CachePolicy = serde_saphyr::from_str(POLICY)?;

    // Server render: one cache per request
    let server_gateway = Gateway::new(ExecutionContext::Server, &config)?;
    let server_cache: QueryCache<Vec<FightRecord>> =
        QueryCache::builder().policy(policy.clone()).build();
    prefetch_fights(&server_cache, &server_gateway);
    let rendered = fetch_fights(&server_cache, &server_gateway).await;
    if let Some(fights) = rendered.data() {
        print_card("server render", fights);
    }

    let page = server_cache
        .dehydrate(&DehydrateOptions::default())?
        .to_json()?;
    println!("embedded state: {page}");

    // Client runtime: hydrate, then fetch is served from the cache
    let client_gateway = Gateway::new(ExecutionContext::Client, &config)?;
    let client_cache: QueryCache<Vec<FightRecord>> = QueryCache::builder().policy(policy).build();
    let report = client_cache.hydrate(DehydratedSnapshot::from_json(&page)?)?;
    println!("hydrated {} entries", report.hydrated);

    let state = fetch_fights(&client_cache, &client_gateway).await;
    if let Some(fights) = state.data() {
        print_card("client", fights);
    }
    println!(
        "client entry updated at {} (same as server: {})",
        state.updated_at(),
        client_cache.read(&fights_key()).map(|s| s.updated_at()) == Some(rendered.updated_at())
    );

    Ok(())
}
