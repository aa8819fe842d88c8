use futures::future::{BoxFuture, Shared};

use fightcast_core::QueryState;

/// Handle to the single load running for a key.
///
/// Every caller that reaches a pending entry clones this handle and awaits it,
/// so all of them observe the same settled state. The load itself runs on its
/// own task; dropping every handle does not cancel it.
pub type InFlight<T> = Shared<BoxFuture<'static, QueryState<T>>>;

/// Result of reaching an entry - whether to return it or await a load
pub(crate) enum FetchDecision<T> {
    /// The entry is fresh; return it as is
    Fresh(QueryState<T>),
    /// Await the load for this entry, started now or joined
    Await(InFlight<T>),
}
