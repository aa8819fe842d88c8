#![warn(missing_docs)]
//! # fightcast-core
//!
//! Core types for the fightcast query layer.
//!
//! This crate holds the vocabulary shared by every other fightcast crate:
//! what is fetched ([`FightRecord`]), how it is addressed ([`QueryKey`]),
//! what the cache knows about it ([`QueryState`]) and how a failed fetch is
//! described once it has left the component that failed ([`ErrorDescriptor`]).
//!
//! ## Architecture
//!
//! - **Identify** cached data ([`QueryKey`], [`KeyPart`])
//! - **Describe** the lifecycle of a query ([`QueryStatus`], [`QueryState`])
//! - **Load** data from an upstream ([`QueryFn`])
//! - **Tell time** in a way tests can control ([`Clock`])
//!
//! ## Feature Flags
//!
//! - `test-helpers` - Enable [`ManualClock`](clock::ManualClock) for deterministic tests
//!

pub mod clock;
pub mod error;
pub mod fight;
pub mod key;
pub mod query_fn;
pub mod state;

pub use clock::{Clock, SystemClock};
pub use error::{ErrorDescriptor, ErrorKind};
pub use fight::FightRecord;
pub use key::{KeyPart, QueryKey};
pub use query_fn::QueryFn;
#[doc(hidden)]
pub use smol_str::SmolStr;
pub use state::{QueryState, QueryStatus};

/// Raw byte data type used for encoded payloads.
/// Using `Bytes` provides efficient zero-copy cloning via reference counting.
pub type Raw = bytes::Bytes;
