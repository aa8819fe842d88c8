use std::future::Future;

use crate::ErrorDescriptor;

/// Trait for loading the data behind a query.
///
/// This is the upstream side of a cache entry: the query cache calls
/// [`load`](QueryFn::load) at most once per in-flight fetch and stores the
/// outcome. Any `FnOnce() -> impl Future<Output = Result<T, ErrorDescriptor>>`
/// closure is a `QueryFn`.
///
/// The returned future is `'static` and `Send` because the cache drives it on
/// its own task, so it keeps running even if every caller stops waiting.
///
/// # Examples
///
/// ```rust
/// use fightcast_core::{ErrorDescriptor, FightRecord, QueryFn};
///
/// fn assert_query_fn<Q: QueryFn<Vec<FightRecord>>>(_: Q) {}
///
/// assert_query_fn(|| async { Ok::<_, ErrorDescriptor>(Vec::new()) });
/// ```
pub trait QueryFn<T> {
    /// The future that resolves to the loaded data
    type Future: Future<Output = Result<T, ErrorDescriptor>> + Send + 'static;

    /// Start loading
    fn load(self) -> Self::Future;
}

impl<T, F, Fut> QueryFn<T> for F
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ErrorDescriptor>> + Send + 'static,
{
    type Future = Fut;

    fn load(self) -> Self::Future {
        self()
    }
}
