//! Metrics declaration and recording helpers.

use fightcast_core::{QueryKey, QueryStatus};

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track fetches answered from a fresh entry.
    pub static ref QUERY_FRESH_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fightcast_query_fresh_total",
            "Total number of fetches served from a fresh cache entry."
        );
        "fightcast_query_fresh_total"
    };
    /// Track fetches that joined an in-flight load.
    pub static ref QUERY_JOINED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fightcast_query_joined_total",
            "Total number of fetches that joined an in-flight load."
        );
        "fightcast_query_joined_total"
    };
    /// Track loader invocations.
    pub static ref QUERY_LOAD_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fightcast_query_load_total",
            "Total number of loader invocations."
        );
        "fightcast_query_load_total"
    };
    /// Track settled loads by outcome.
    pub static ref QUERY_SETTLED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fightcast_query_settled_total",
            "Total number of settled loads by status."
        );
        "fightcast_query_settled_total"
    };
    /// Track entries written by hydration.
    pub static ref HYDRATE_ENTRIES_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fightcast_hydrate_entries_total",
            "Total number of entries written by hydration."
        );
        "fightcast_hydrate_entries_total"
    };
    /// Track snapshot entries skipped because the destination was newer.
    pub static ref HYDRATE_SKIPPED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "fightcast_hydrate_skipped_total",
            "Total number of snapshot entries skipped during hydration."
        );
        "fightcast_hydrate_skipped_total"
    };
}

/// How a fetch was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from a fresh entry.
    Fresh,
    /// Joined an in-flight load.
    Joined,
    /// Started a new load.
    Loaded,
}

/// Record how a fetch was answered.
///
/// When the `metrics` feature is disabled, this function is a no-op
/// and will be eliminated by the compiler.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_fetch(key: &QueryKey, outcome: FetchOutcome) {
    let counter = match outcome {
        FetchOutcome::Fresh => *QUERY_FRESH_COUNTER,
        FetchOutcome::Joined => *QUERY_JOINED_COUNTER,
        FetchOutcome::Loaded => *QUERY_LOAD_COUNTER,
    };
    metrics::counter!(counter, "prefix" => key.prefix().to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_fetch(_key: &QueryKey, _outcome: FetchOutcome) {}

/// Record the outcome of a settled load.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_settled(key: &QueryKey, status: QueryStatus) {
    let status = match status {
        QueryStatus::Pending => "pending",
        QueryStatus::Success => "success",
        QueryStatus::Error => "error",
    };
    metrics::counter!(
        *QUERY_SETTLED_COUNTER,
        "prefix" => key.prefix().to_string(),
        "status" => status
    )
    .increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_settled(_key: &QueryKey, _status: QueryStatus) {}

/// Record the result of one hydration pass.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_hydrate(hydrated: usize, skipped: usize) {
    metrics::counter!(*HYDRATE_ENTRIES_COUNTER).increment(hydrated as u64);
    metrics::counter!(*HYDRATE_SKIPPED_COUNTER).increment(skipped as u64);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_hydrate(_hydrated: usize, _skipped: usize) {}
