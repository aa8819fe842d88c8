#![warn(missing_docs)]
//! # fightcast-reqwest
//!
//! The remote data gateway: fetches fight predictions from the prediction
//! service over HTTP with [`reqwest`] and feeds them into a
//! [`QueryCache`](fightcast::QueryCache).
//!
//! ```no_run
//! use fightcast::QueryCache;
//! use fightcast_reqwest::{ExecutionContext, Gateway, GatewayConfig, fetch_fights};
//!
//! # async fn run() -> Result<(), fightcast_reqwest::GatewayError> {
//! let gateway = Gateway::new(ExecutionContext::Server, &GatewayConfig::from_env()?)?;
//! let cache = QueryCache::new();
//!
//! let state = fetch_fights(&cache, &gateway).await;
//! for fight in state.data().into_iter().flatten() {
//!     println!("{} vs {}: {}", fight.red_fighter, fight.blue_fighter, fight.predicted_winner);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! | Variable             | Used by  | Meaning                          |
//! |----------------------|----------|----------------------------------|
//! | `BACKEND_URL`        | server   | Base address of the service      |
//! | `PUBLIC_BACKEND_URL` | client   | Base address of the service      |
//! | `FIGHTCAST_TIMEOUT`  | both     | Optional request timeout (`5s`)  |
//!
//! Plain `http` base addresses work without features; enable `default-tls`
//! for `https`.

mod config;
mod error;
mod gateway;

pub use config::{BACKEND_URL, ExecutionContext, GatewayConfig, PUBLIC_BACKEND_URL, TIMEOUT};
pub use error::GatewayError;
pub use gateway::{FIGHTS_PATH, Gateway};

use fightcast::QueryCache;
use fightcast_core::{FightRecord, QueryKey, QueryState};

/// Key of the current event's fights: `predictor:getFights`.
pub fn fights_key() -> QueryKey {
    QueryKey::from_slice("predictor", &[("getFights", None)])
}

/// Returns the cached fights, loading them through `gateway` when needed.
pub async fn fetch_fights(
    cache: &QueryCache<Vec<FightRecord>>,
    gateway: &Gateway,
) -> QueryState<Vec<FightRecord>> {
    cache.fetch(fights_key(), gateway.clone()).await
}

/// Starts loading the fights through `gateway` without waiting.
///
/// Must be called within a Tokio runtime.
pub fn prefetch_fights(cache: &QueryCache<Vec<FightRecord>>, gateway: &Gateway) {
    cache.prefetch(fights_key(), gateway.clone());
}
