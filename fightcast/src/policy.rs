use std::time::Duration;

use chrono::{DateTime, Utc};
use fightcast_core::{QueryKey, QueryState, QueryStatus};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Staleness window applied when no policy says otherwise.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

fn default_stale_time() -> Duration {
    DEFAULT_STALE_TIME
}

/// Policy for refetching entries whose last load failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
pub enum ErrorRetry {
    /// Error entries are always eligible for a new load.
    #[default]
    Immediate,
    /// Error entries are served until the staleness window elapses, like
    /// successful ones.
    AfterStaleTime,
}

/// Freshness policy for one class of query keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
pub struct QueryPolicy {
    /// Time after a successful load during which the entry is served without
    /// calling the loader (e.g., "30s", "500ms", "1m").
    #[serde(default = "default_stale_time", with = "humantime_serde")]
    pub stale_time: Duration,
    /// How error entries are retried.
    #[serde(default)]
    pub error_retry: ErrorRetry,
}

impl Default for QueryPolicy {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            error_retry: ErrorRetry::default(),
        }
    }
}

impl QueryPolicy {
    /// Creates a policy with the given staleness window.
    pub fn with_stale_time(stale_time: Duration) -> Self {
        Self {
            stale_time,
            ..Self::default()
        }
    }

    /// Returns `true` if `state` must be loaded again at `now`.
    ///
    /// Freshness is measured against the state's own `stale_time`, so an entry
    /// hydrated from a snapshot keeps the window it was produced with.
    pub fn needs_fetch<T>(&self, state: &QueryState<T>, now: DateTime<Utc>) -> bool {
        match state.status() {
            QueryStatus::Pending => true,
            QueryStatus::Success => state.is_stale_at(now),
            QueryStatus::Error => match self.error_retry {
                ErrorRetry::Immediate => true,
                ErrorRetry::AfterStaleTime => state.is_stale_at(now),
            },
        }
    }
}

/// Cache-wide policy: a default plus overrides per key prefix.
///
/// # Example
///
/// ```
/// use fightcast::policy::CachePolicy;
/// use std::time::Duration;
///
/// let policy: CachePolicy = serde_saphyr::from_str(r#"
/// default:
///   stale_time: 30s
/// overrides:
///   predictor:
///     stale_time: 5m
///     error_retry: AfterStaleTime
/// "#).unwrap();
///
/// assert_eq!(policy.default.stale_time, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct CachePolicy {
    /// Policy for keys without an override.
    #[serde(default)]
    pub default: QueryPolicy,
    /// Policies keyed by [`QueryKey::prefix`].
    #[serde(default)]
    pub overrides: IndexMap<SmolStr, QueryPolicy>,
}

impl CachePolicy {
    /// Creates a policy with only a default.
    pub fn new(default: QueryPolicy) -> Self {
        Self {
            default,
            overrides: IndexMap::new(),
        }
    }

    /// Adds an override for every key with the given prefix.
    pub fn with_override(mut self, prefix: impl Into<SmolStr>, policy: QueryPolicy) -> Self {
        self.overrides.insert(prefix.into(), policy);
        self
    }

    /// Returns the policy that applies to `key`.
    pub fn for_key(&self, key: &QueryKey) -> &QueryPolicy {
        self.overrides.get(key.prefix()).unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use fightcast_core::{ErrorDescriptor, ErrorKind};

    #[test]
    fn test_error_retry_policies() {
        let t0 = Utc::now();
        let state = QueryState::<()>::error(
            ErrorDescriptor::new(ErrorKind::Network, "down"),
            t0,
            DEFAULT_STALE_TIME,
        );
        let soon = t0 + TimeDelta::seconds(1);

        assert!(QueryPolicy::default().needs_fetch(&state, soon));

        let patient = QueryPolicy {
            error_retry: ErrorRetry::AfterStaleTime,
            ..QueryPolicy::default()
        };
        assert!(!patient.needs_fetch(&state, soon));
        assert!(patient.needs_fetch(&state, t0 + TimeDelta::seconds(30)));
    }

    #[test]
    fn test_override_by_prefix() {
        let policy = CachePolicy::default()
            .with_override("predictor", QueryPolicy::with_stale_time(Duration::from_secs(300)));

        let fights = QueryKey::from_slice("predictor", &[("getFights", None)]);
        let other = QueryKey::from_slice("post", &[("getLatest", None)]);

        assert_eq!(policy.for_key(&fights).stale_time, Duration::from_secs(300));
        assert_eq!(policy.for_key(&other).stale_time, DEFAULT_STALE_TIME);
    }
}
