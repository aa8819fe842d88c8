#![warn(missing_docs)]
//! # fightcast
//!
//! A query cache for fight predictions that can be rendered on a server and
//! handed to a client without loading the same data twice.
//!
//! ## Overview
//!
//! - [`QueryCache`] stores one [`QueryState`](fightcast_core::QueryState) per
//!   [`QueryKey`](fightcast_core::QueryKey), decides when an entry is stale
//!   and guarantees at most one running load per key.
//! - [`CachePolicy`] sets the staleness window, globally or per key prefix.
//! - [`QueryCache::dehydrate`] and [`QueryCache::hydrate`] move entries from
//!   one cache into another through a [`DehydratedSnapshot`].
//!
//! ## Server to client
//!
//! ```no_run
//! use fightcast::{DehydrateOptions, DehydratedSnapshot, QueryCache};
//! use fightcast_core::{ErrorDescriptor, FightRecord, QueryKey};
//!
//! # async fn run() -> Result<(), fightcast::HydrationError> {
//! let key = QueryKey::from_slice("predictor", &[("getFights", None)]);
//!
//! // Server render
//! let server = QueryCache::<Vec<FightRecord>>::new();
//! server.prefetch(key.clone(), || async {
//!     Ok::<_, ErrorDescriptor>(vec![FightRecord::new("A", "B", "A")])
//! });
//! let page = server.dehydrate(&DehydrateOptions::default())?.to_json()?;
//!
//! // Client runtime
//! let client = QueryCache::<Vec<FightRecord>>::new();
//! client.hydrate(DehydratedSnapshot::from_json(&page)?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `metrics` - Record fetch and hydration counters with the `metrics` crate

pub mod cache;
pub mod concurrency;
pub mod error;
pub mod hydration;
pub mod metrics;
pub mod policy;

pub use cache::{QueryCache, QueryCacheBuilder};
pub use concurrency::InFlight;
pub use error::HydrationError;
pub use hydration::{
    DehydrateOptions, DehydratedQuery, DehydratedSnapshot, DehydratedState, HydrateReport,
    PendingPromise, default_should_dehydrate,
};
pub use policy::{CachePolicy, DEFAULT_STALE_TIME, ErrorRetry, QueryPolicy};
