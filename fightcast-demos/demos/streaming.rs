//! Streaming a pending query into the client
//!
//! When the page is flushed before a prefetch finishes, the entry is
//! dehydrated as pending together with an in-memory promise. The client cache
//! hydrates it, and a client fetch waits for the server's request instead of
//! sending its own.
//!
//! Run:
//!   cargo run -p fightcast-demos --example streaming

use std::time::Duration;

use fightcast::{DehydrateOptions, QueryCache};
use fightcast_core::{ErrorDescriptor, FightRecord, QueryKey};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let key = QueryKey::from_slice("predictor", &[("getFights", None)]);

    let server: QueryCache<Vec<FightRecord>> = QueryCache::new();
    server.prefetch(key.clone(), || async {
        // A slow prediction service
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok::<_, ErrorDescriptor>(vec![FightRecord::new(
            "Islam Makhachev",
            "Jack Della Maddalena",
            "Islam Makhachev",
        )])
    });

    // Flush the page while the request is still running
    let snapshot = server.dehydrate(&DehydrateOptions::default())?;
    for query in &snapshot.queries {
        println!(
            "{} is {:?} (streaming: {})",
            query.key,
            query.state.status,
            query.promise.is_some()
        );
    }

    let client: QueryCache<Vec<FightRecord>> = QueryCache::new();
    client.hydrate(snapshot)?;

    let state = client
        .fetch(key, || async {
            Err::<Vec<FightRecord>, _>(ErrorDescriptor::new(
                fightcast_core::ErrorKind::Internal,
                "the client should not load on its own",
            ))
        })
        .await;
    println!("client settled as {:?}: {:?}", state.status(), state.data());

    Ok(())
}
