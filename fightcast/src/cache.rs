//! The query cache.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use fightcast_core::{
    Clock, ErrorDescriptor, ErrorKind, QueryFn, QueryKey, QueryState, SystemClock,
};
use futures::FutureExt;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::concurrency::{FetchDecision, InFlight};
use crate::metrics::{self, FetchOutcome};
use crate::policy::CachePolicy;

pub(crate) struct Entry<T> {
    pub(crate) state: QueryState<T>,
    pub(crate) in_flight: Option<InFlight<T>>,
    /// Id of the last load or write. A load settles only if it still matches.
    pub(crate) generation: u64,
    pub(crate) invalidated: bool,
}

impl<T> Entry<T> {
    pub(crate) fn new(state: QueryState<T>, generation: u64) -> Self {
        Self {
            state,
            in_flight: None,
            generation,
            invalidated: false,
        }
    }
}

pub(crate) struct Inner<T> {
    pub(crate) entries: DashMap<QueryKey, Entry<T>>,
    pub(crate) policy: CachePolicy,
    pub(crate) clock: Arc<dyn Clock>,
    generation: AtomicU64,
}

impl<T> Inner<T> {
    pub(crate) fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn settle(&self, key: &QueryKey, generation: u64, state: QueryState<T>) {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.generation == generation => {
                debug!(query.key = %key, query.status = ?state.status(), "query settled");
                metrics::record_settled(key, state.status());
                entry.state = state;
                entry.in_flight = None;
            }
            _ => trace!(query.key = %key, "discarding superseded load"),
        }
    }
}

/// Store of query results for one execution context.
///
/// One instance serves one server request or one client session; nothing is
/// global. `QueryCache` is a handle: clones share the same entries, and the
/// entries are dropped with the last handle.
///
/// # Fetch semantics
///
/// [`fetch`](QueryCache::fetch) returns a fresh entry without calling the
/// loader. Otherwise it moves the entry to pending and starts exactly one load;
/// every other fetch of that key made before the load settles joins it.
///
/// Loads run on a spawned Tokio task, so they finish and settle the entry even
/// when every caller stopped waiting, and a second caller cannot abort them.
/// The loader is called with no entry locked, so it may use this cache.
///
/// # Example
///
/// ```
/// use fightcast::QueryCache;
/// use fightcast_core::{ErrorDescriptor, QueryKey, QueryStatus};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = QueryCache::<u32>::new();
/// let key = QueryKey::from_slice("answers", &[("get", None)]);
///
/// let state = cache.fetch(key.clone(), || async { Ok::<_, ErrorDescriptor>(42) }).await;
/// assert_eq!(state.status(), QueryStatus::Success);
///
/// // Fresh: the loader is not called again
/// let state = cache.fetch(key, || async { Ok::<_, ErrorDescriptor>(0) }).await;
/// assert_eq!(state.data(), Some(&42));
/// # }
/// ```
pub struct QueryCache<T> {
    pub(crate) inner: Arc<Inner<T>>,
}

impl<T> Clone for QueryCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for QueryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.len())
            .field("policy", &self.inner.policy)
            .field("clock", &self.inner.clock)
            .finish()
    }
}

impl<T> Default for QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache<()> {
    /// Creates a new [`QueryCacheBuilder`].
    pub fn builder() -> QueryCacheBuilder {
        QueryCacheBuilder::new()
    }
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a cache with the default policy and the system clock.
    pub fn new() -> Self {
        QueryCacheBuilder::new().build()
    }

    /// Returns the cache policy.
    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// Returns the current state of `key` without starting a load.
    pub fn read(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.inner.entries.get(key).map(|entry| entry.state.clone())
    }

    /// Returns the entry for `key`, loading it with `query_fn` if it is
    /// absent, stale, or failed.
    ///
    /// `query_fn` is dropped without being called when the entry is fresh or
    /// a load for `key` is already running.
    pub async fn fetch<Q>(&self, key: QueryKey, query_fn: Q) -> QueryState<T>
    where
        Q: QueryFn<T>,
    {
        match self.start(key, query_fn) {
            FetchDecision::Fresh(state) => state,
            FetchDecision::Await(in_flight) => in_flight.await,
        }
    }

    /// Starts loading `key` like [`fetch`](QueryCache::fetch) but does not
    /// wait for the result.
    ///
    /// Must be called within a Tokio runtime.
    pub fn prefetch<Q>(&self, key: QueryKey, query_fn: Q)
    where
        Q: QueryFn<T>,
    {
        let _ = self.start(key, query_fn);
    }

    /// Stores `data` as a successful result loaded now.
    ///
    /// A load still running for `key` is superseded: its result is dropped
    /// when it settles.
    pub fn set_data(&self, key: QueryKey, data: T) -> QueryState<T> {
        let now = self.inner.clock.now();
        let stale_time = self.inner.policy.for_key(&key).stale_time;
        let state = QueryState::success(data, now, stale_time);
        let generation = self.inner.next_generation();
        self.inner
            .entries
            .insert(key, Entry::new(state.clone(), generation));
        state
    }

    /// Marks `key` stale so the next fetch loads it regardless of age.
    ///
    /// Returns `false` if there is no entry for `key`.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        match self.inner.entries.get_mut(key) {
            Some(mut entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        }
    }

    /// Removes `key` and returns its last state.
    pub fn remove(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.inner
            .entries
            .remove(key)
            .map(|(_, entry)| entry.state)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Returns the keys of every entry, in no particular order.
    pub fn keys(&self) -> Vec<QueryKey> {
        self.inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn start<Q>(&self, key: QueryKey, query_fn: Q) -> FetchDecision<T>
    where
        Q: QueryFn<T>,
    {
        let now = self.inner.clock.now();
        let policy = *self.inner.policy.for_key(&key);
        let stale_time = policy.stale_time;

        let (in_flight, settled, generation) = {
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(QueryState::pending(now, stale_time), 0));

            if let Some(in_flight) = &entry.in_flight {
                debug!(query.key = %key, "joining in-flight load");
                metrics::record_fetch(&key, FetchOutcome::Joined);
                return FetchDecision::Await(in_flight.clone());
            }

            if !entry.invalidated && !policy.needs_fetch(&entry.state, now) {
                trace!(query.key = %key, "serving fresh entry");
                metrics::record_fetch(&key, FetchOutcome::Fresh);
                return FetchDecision::Fresh(entry.state.clone());
            }

            debug!(query.key = %key, query.status = ?entry.state.status(), "starting load");
            metrics::record_fetch(&key, FetchOutcome::Loaded);

            let generation = self.inner.next_generation();
            let (in_flight, settled) = self.in_flight(key.clone(), generation, stale_time);
            entry.state = QueryState::pending(now, stale_time);
            entry.in_flight = Some(in_flight.clone());
            entry.generation = generation;
            entry.invalidated = false;
            (in_flight, settled, generation)
        };

        // The entry is unlocked here, so the loader may use this cache.
        let clock = Arc::clone(&self.inner.clock);
        let load = query_fn.load();
        let load_key = key.clone();
        let load = async move {
            let result = load.await;
            if let Err(error) = &result {
                warn!(query.key = %load_key, %error, "query load failed");
            }
            QueryState::from_result(result, clock.now(), stale_time)
        };

        self.spawn_load(key, generation, stale_time, load, settled);
        FetchDecision::Await(in_flight)
    }

    /// Creates the handle joined by every fetch of `key` until the load
    /// started under `generation` reports through the returned sender.
    ///
    /// If the sender is dropped without a state, the entry settles as an
    /// internal error.
    pub(crate) fn in_flight(
        &self,
        key: QueryKey,
        generation: u64,
        stale_time: Duration,
    ) -> (InFlight<T>, oneshot::Sender<QueryState<T>>) {
        let (settled, receiver) = oneshot::channel();
        let inner = Arc::downgrade(&self.inner);
        let in_flight = async move {
            match receiver.await {
                Ok(state) => state,
                Err(_) => {
                    warn!(query.key = %key, "query load ended without a result");
                    let inner = inner.upgrade();
                    let now = inner
                        .as_ref()
                        .map_or_else(Utc::now, |inner| inner.clock.now());
                    let state = QueryState::error(
                        ErrorDescriptor::new(ErrorKind::Internal, "query load ended without a result"),
                        now,
                        stale_time,
                    );
                    if let Some(inner) = inner {
                        inner.settle(&key, generation, state.clone());
                    }
                    state
                }
            }
        }
        .boxed()
        .shared();
        (in_flight, settled)
    }

    /// Runs `load` on its own task, settles `key` with its result and
    /// reports it through `settled`.
    ///
    /// Holds the cache weakly: a cache dropped mid-load is not kept alive.
    pub(crate) fn spawn_load<F>(
        &self,
        key: QueryKey,
        generation: u64,
        stale_time: Duration,
        load: F,
        settled: oneshot::Sender<QueryState<T>>,
    ) where
        F: Future<Output = QueryState<T>> + Send + 'static,
    {
        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(load).catch_unwind().await;
            let inner = inner.upgrade();
            let state = outcome.unwrap_or_else(|panic| {
                let message = panic_message(panic.as_ref());
                warn!(query.key = %key, %message, "query loader panicked");
                let now = inner
                    .as_ref()
                    .map_or_else(Utc::now, |inner| inner.clock.now());
                QueryState::error(
                    ErrorDescriptor::new(ErrorKind::Internal, message),
                    now,
                    stale_time,
                )
            });
            if let Some(inner) = inner {
                inner.settle(&key, generation, state.clone());
            }
            let _ = settled.send(state);
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(
            || "query loader panicked".to_owned(),
            |message| format!("query loader panicked: {message}"),
        )
}

/// Builder for [`QueryCache`].
#[derive(Debug)]
pub struct QueryCacheBuilder {
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl QueryCacheBuilder {
    /// Creates a builder with the default policy and the system clock.
    pub fn new() -> Self {
        Self {
            policy: CachePolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the cache policy.
    pub fn policy(self, policy: CachePolicy) -> Self {
        Self { policy, ..self }
    }

    /// Sets the clock used for `updated_at` and freshness.
    pub fn clock<C>(self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    /// Builds the cache.
    pub fn build<T>(self) -> QueryCache<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        QueryCache {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                policy: self.policy,
                clock: self.clock,
                generation: AtomicU64::new(0),
            }),
        }
    }
}

impl Default for QueryCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
