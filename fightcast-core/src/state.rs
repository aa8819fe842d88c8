//! Query state with freshness metadata.
//!
//! A [`QueryState`] is what the cache knows about one key: where the query is
//! in its lifecycle ([`QueryStatus`]), its payload or error, when it last
//! changed, and how long a successful payload stays fresh.
//!
//! ## Status invariant
//!
//! | status    | data   | error  |
//! |-----------|--------|--------|
//! | `Pending` | `None` | `None` |
//! | `Success` | `Some` | `None` |
//! | `Error`   | `None` | `Some` |
//!
//! The fields are private and the only constructors are
//! [`QueryState::pending`], [`QueryState::success`] and [`QueryState::error`],
//! so no other combination can be built.
//!
//! ## Freshness
//!
//! A state is stale at `now` when `now - updated_at >= stale_time`. A state
//! whose `updated_at` lies in the future (clock skew between the server that
//! produced it and the client that hydrated it) counts as fresh.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ErrorDescriptor;

/// Lifecycle position of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// No outcome yet.
    Pending,
    /// The last load succeeded.
    Success,
    /// The last load failed.
    Error,
}

impl QueryStatus {
    /// Returns `true` for `Success` and `Error`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, QueryStatus::Pending)
    }
}

/// What the cache knows about one query key.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use fightcast_core::{FightRecord, QueryState, QueryStatus};
/// use std::time::Duration;
///
/// let t0 = Utc::now();
/// let state = QueryState::success(
///     vec![FightRecord::new("A", "B", "A")],
///     t0,
///     Duration::from_secs(30),
/// );
///
/// assert_eq!(state.status(), QueryStatus::Success);
/// assert!(!state.is_stale_at(t0 + chrono::Duration::seconds(29)));
/// assert!(state.is_stale_at(t0 + chrono::Duration::seconds(30)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState<T> {
    status: QueryStatus,
    data: Option<T>,
    error: Option<ErrorDescriptor>,
    updated_at: DateTime<Utc>,
    stale_time: Duration,
}

impl<T> QueryState<T> {
    /// Creates a state with no outcome yet.
    pub fn pending(updated_at: DateTime<Utc>, stale_time: Duration) -> Self {
        Self {
            status: QueryStatus::Pending,
            data: None,
            error: None,
            updated_at,
            stale_time,
        }
    }

    /// Creates a successful state holding `data`.
    pub fn success(data: T, updated_at: DateTime<Utc>, stale_time: Duration) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            updated_at,
            stale_time,
        }
    }

    /// Creates a failed state holding `error`.
    pub fn error(error: ErrorDescriptor, updated_at: DateTime<Utc>, stale_time: Duration) -> Self {
        Self {
            status: QueryStatus::Error,
            data: None,
            error: Some(error),
            updated_at,
            stale_time,
        }
    }

    /// Creates a state from a load outcome.
    pub fn from_result(
        result: Result<T, ErrorDescriptor>,
        updated_at: DateTime<Utc>,
        stale_time: Duration,
    ) -> Self {
        match result {
            Ok(data) => Self::success(data, updated_at, stale_time),
            Err(error) => Self::error(error, updated_at, stale_time),
        }
    }

    /// Returns the lifecycle status.
    #[inline]
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// Returns the payload, present iff the status is `Success`.
    #[inline]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Returns the error, present iff the status is `Error`.
    #[inline]
    pub fn error_descriptor(&self) -> Option<&ErrorDescriptor> {
        self.error.as_ref()
    }

    /// Returns when this state was last written.
    #[inline]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns how long a successful payload stays fresh.
    #[inline]
    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    /// Returns `true` if the status is `Pending`.
    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    /// Returns `true` if the status is `Success`.
    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    /// Returns `true` if the status is `Error`.
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Returns `true` if the staleness window has elapsed at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.updated_at).to_std() {
            Ok(age) => age >= self.stale_time,
            // updated_at is in the future
            Err(_) => false,
        }
    }

    /// Consumes the state and returns the payload or the error.
    ///
    /// A pending state yields `None`.
    pub fn into_result(self) -> Option<Result<T, ErrorDescriptor>> {
        match (self.data, self.error) {
            (Some(data), _) => Some(Ok(data)),
            (None, Some(error)) => Some(Err(error)),
            (None, None) => None,
        }
    }

    /// Maps the payload, keeping status and timestamps.
    pub fn map<U, F>(self, f: F) -> QueryState<U>
    where
        F: FnOnce(T) -> U,
    {
        QueryState {
            status: self.status,
            data: self.data.map(f),
            error: self.error,
            updated_at: self.updated_at,
            stale_time: self.stale_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use chrono::TimeDelta;

    fn window() -> Duration {
        Duration::from_secs(30)
    }

    #[test]
    fn test_constructors_keep_invariant() {
        let now = Utc::now();

        let pending = QueryState::<u32>::pending(now, window());
        assert!(pending.data().is_none() && pending.error_descriptor().is_none());

        let success = QueryState::success(7u32, now, window());
        assert_eq!(success.data(), Some(&7));
        assert!(success.error_descriptor().is_none());

        let error = QueryState::<u32>::error(
            ErrorDescriptor::new(ErrorKind::Network, "refused"),
            now,
            window(),
        );
        assert!(error.data().is_none());
        assert_eq!(error.error_descriptor().map(|e| e.kind()), Some(ErrorKind::Network));
    }

    #[test]
    fn test_staleness_boundary() {
        let t0 = Utc::now();
        let state = QueryState::success((), t0, window());
        let epsilon = TimeDelta::milliseconds(1);
        let stale_time = TimeDelta::seconds(30);

        assert!(!state.is_stale_at(t0 + stale_time - epsilon));
        assert!(state.is_stale_at(t0 + stale_time));
        assert!(state.is_stale_at(t0 + stale_time + epsilon));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let now = Utc::now();
        let state = QueryState::success((), now + TimeDelta::hours(1), window());
        assert!(!state.is_stale_at(now));
    }

    #[test]
    fn test_into_result() {
        let now = Utc::now();
        assert_eq!(
            QueryState::success(1u8, now, window()).into_result(),
            Some(Ok(1))
        );
        assert_eq!(QueryState::<u8>::pending(now, window()).into_result(), None);
    }
}
