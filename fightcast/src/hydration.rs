//! Moving cache state from the server render into the client.
//!
//! ## Dehydrate
//!
//! [`QueryCache::dehydrate`] walks the server cache, keeps the entries the
//! [`DehydrateOptions`] predicate accepts, and encodes each payload with the
//! options' codec. By default settled entries *and* pending ones are kept: a
//! prefetch started during the render but not finished when the page is
//! flushed still reaches the client as a pending entry.
//!
//! A pending entry with a running load also carries a
//! [`PendingPromise`] that resolves to the encoded settled state. The promise
//! lives only in memory and is skipped by serde, so it survives a streaming
//! transfer inside one process and is dropped by [`DehydratedSnapshot::to_json`].
//!
//! ## Hydrate
//!
//! [`QueryCache::hydrate`] decodes every payload first and inserts nothing if
//! any of them fails. It then writes each entry unless the destination already
//! holds a strictly newer `updated_at` for that key. A pending entry never
//! replaces a destination that is settled or already loading. A pending entry that
//! arrives with a promise becomes the destination's in-flight load, so a client
//! fetch awaits the server's request instead of starting its own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use fightcast_codec::{Codec, CodecError, CodecExt, CodecId, JsonCodec};
use fightcast_core::{ErrorDescriptor, ErrorKind, QueryKey, QueryState, QueryStatus, Raw};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, trace, warn};

use crate::cache::{Entry, QueryCache};
use crate::concurrency::InFlight;
use crate::error::HydrationError;
use crate::metrics;

/// In-memory handle resolving to the settled state of a pending entry.
pub type PendingPromise = Shared<BoxFuture<'static, DehydratedState>>;

/// Query state with its payload encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DehydratedState {
    /// Lifecycle status.
    pub status: QueryStatus,
    /// Encoded payload, present for `Success`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "text_payload"
    )]
    pub data: Option<Raw>,
    /// Encoded [`ErrorDescriptor`], present for `Error`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "text_payload"
    )]
    pub error: Option<Raw>,
    /// When the state was last written on the producing side.
    pub updated_at: DateTime<Utc>,
    /// Staleness window the state was produced with.
    #[serde(with = "humantime_serde")]
    pub stale_time: Duration,
}

/// Payloads on the wire are the codec's text output embedded as a string.
mod text_payload {
    use fightcast_core::Raw;
    use serde::{Deserialize, Deserializer, Serializer, ser::Error};

    pub(super) fn serialize<S>(payload: &Option<Raw>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match payload {
            Some(bytes) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|error| S::Error::custom(format!("payload is not text: {error}")))?;
                serializer.serialize_some(text)
            }
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Raw>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?.map(Raw::from))
    }
}

/// One transferred entry.
#[derive(Clone, Serialize, Deserialize)]
pub struct DehydratedQuery {
    /// Key of the entry.
    pub key: QueryKey,
    /// Encoded state.
    pub state: DehydratedState,
    /// Settled state of a pending entry, when its load was still running.
    #[serde(skip)]
    pub promise: Option<PendingPromise>,
}

impl fmt::Debug for DehydratedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DehydratedQuery")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("promise", &self.promise.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Entries selected for transfer, plus the codec that encoded them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DehydratedSnapshot {
    /// Codec needed to decode every payload.
    pub codec: CodecId,
    /// Entries ordered by key.
    pub queries: Vec<DehydratedQuery>,
}

impl DehydratedSnapshot {
    /// Serializes the snapshot for embedding into a page.
    ///
    /// Pending promises are not part of the wire form.
    pub fn to_json(&self) -> Result<String, HydrationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reads a snapshot produced by [`to_json`](DehydratedSnapshot::to_json).
    pub fn from_json(json: &str) -> Result<Self, HydrationError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Returns `true` if the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Predicate deciding whether an entry is dehydrated.
pub type ShouldDehydrate = Arc<dyn Fn(&QueryKey, QueryStatus) -> bool + Send + Sync>;

/// Keeps settled entries (success or error).
pub fn default_should_dehydrate(_key: &QueryKey, status: QueryStatus) -> bool {
    status.is_settled()
}

/// Options for [`QueryCache::dehydrate`].
#[derive(Clone)]
pub struct DehydrateOptions {
    codec: Arc<dyn Codec>,
    should_dehydrate: ShouldDehydrate,
}

impl fmt::Debug for DehydrateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DehydrateOptions")
            .field("codec", &self.codec.codec_id())
            .field("should_dehydrate", &"...")
            .finish()
    }
}

impl Default for DehydrateOptions {
    /// JSON payloads; settled and pending entries.
    fn default() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
            should_dehydrate: Arc::new(|key, status| {
                default_should_dehydrate(key, status) || status == QueryStatus::Pending
            }),
        }
    }
}

impl DehydrateOptions {
    /// Sets the payload codec.
    pub fn codec<C>(self, codec: C) -> Self
    where
        C: Codec + 'static,
    {
        Self {
            codec: Arc::new(codec),
            ..self
        }
    }

    /// Sets the entry predicate.
    pub fn should_dehydrate<F>(self, predicate: F) -> Self
    where
        F: Fn(&QueryKey, QueryStatus) -> bool + Send + Sync + 'static,
    {
        Self {
            should_dehydrate: Arc::new(predicate),
            ..self
        }
    }
}

/// Outcome of [`QueryCache::hydrate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrateReport {
    /// Entries written into the cache.
    pub hydrated: usize,
    /// Entries skipped because the cache held a newer state.
    pub skipped: usize,
    /// Written pending entries that are waiting on a promise.
    pub streaming: usize,
}

fn missing_payload(what: &str) -> CodecError {
    CodecError::Deserialize(Box::new(std::io::Error::other(format!(
        "settled entry has no {} payload",
        what
    ))))
}

fn encode_state<T>(codec: &dyn Codec, state: &QueryState<T>) -> Result<DehydratedState, CodecError>
where
    T: Serialize,
{
    Ok(DehydratedState {
        status: state.status(),
        data: state.data().map(|data| codec.encode(data)).transpose()?,
        error: state
            .error_descriptor()
            .map(|error| codec.encode(error))
            .transpose()?,
        updated_at: state.updated_at(),
        stale_time: state.stale_time(),
    })
}

fn decode_state<T>(codec: &dyn Codec, state: &DehydratedState) -> Result<QueryState<T>, CodecError>
where
    T: DeserializeOwned,
{
    match state.status {
        QueryStatus::Pending => Ok(QueryState::pending(state.updated_at, state.stale_time)),
        QueryStatus::Success => {
            let raw = state.data.as_ref().ok_or_else(|| missing_payload("data"))?;
            Ok(QueryState::success(
                codec.decode(raw)?,
                state.updated_at,
                state.stale_time,
            ))
        }
        QueryStatus::Error => {
            let raw = state.error.as_ref().ok_or_else(|| missing_payload("error"))?;
            Ok(QueryState::error(
                codec.decode(raw)?,
                state.updated_at,
                state.stale_time,
            ))
        }
    }
}

/// Encodes the settled state of `in_flight` once it resolves.
fn promise_for<T>(in_flight: InFlight<T>, codec: Arc<dyn Codec>) -> PendingPromise
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    async move {
        let state = in_flight.await;
        encode_state(codec.as_ref(), &state).unwrap_or_else(|error| {
            warn!(%error, "failed to encode streamed query state");
            let descriptor = ErrorDescriptor::new(ErrorKind::Internal, error.to_string());
            DehydratedState {
                status: QueryStatus::Error,
                data: None,
                error: codec.encode(&descriptor).ok(),
                updated_at: state.updated_at(),
                stale_time: state.stale_time(),
            }
        })
    }
    .boxed()
    .shared()
}

impl<T> QueryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Selects entries and encodes them into a snapshot.
    pub fn dehydrate(&self, options: &DehydrateOptions) -> Result<DehydratedSnapshot, HydrationError>
    where
        T: Serialize,
    {
        let codec = &options.codec;
        let mut queries = Vec::new();

        for entry in self.inner.entries.iter() {
            let key = entry.key();
            let status = entry.state.status();
            if !(options.should_dehydrate)(key, status) {
                trace!(query.key = %key, query.status = ?status, "not dehydrating");
                continue;
            }

            let state = encode_state(codec.as_ref(), &entry.state).map_err(|source| {
                HydrationError::Encode {
                    key: key.clone(),
                    source,
                }
            })?;
            let promise = entry
                .in_flight
                .clone()
                .map(|in_flight| promise_for(in_flight, Arc::clone(codec)));

            queries.push(DehydratedQuery {
                key: key.clone(),
                state,
                promise,
            });
        }

        queries.sort_by_cached_key(|query| query.key.to_string());
        debug!(queries = queries.len(), codec = %codec.codec_id(), "dehydrated cache");

        Ok(DehydratedSnapshot {
            codec: codec.codec_id(),
            queries,
        })
    }

    /// Writes a snapshot into this cache.
    ///
    /// Entries whose destination holds a strictly newer `updated_at` are
    /// skipped, and so are pending entries whose destination is already
    /// settled or loading. If any payload fails to decode, nothing is written.
    ///
    /// Must be called within a Tokio runtime when the snapshot carries
    /// pending promises.
    pub fn hydrate(&self, snapshot: DehydratedSnapshot) -> Result<HydrateReport, HydrationError>
    where
        T: DeserializeOwned,
    {
        let codec = snapshot.codec.codec();
        let decoded = snapshot
            .queries
            .into_iter()
            .map(|query| {
                let state = decode_state::<T>(codec.as_ref(), &query.state).map_err(|source| {
                    HydrationError::Decode {
                        key: query.key.clone(),
                        source,
                    }
                })?;
                Ok((query.key, state, query.promise))
            })
            .collect::<Result<Vec<_>, HydrationError>>()?;

        let mut report = HydrateReport::default();
        let mut streams = Vec::new();
        for (key, state, promise) in decoded {
            match self.inner.entries.entry(key.clone()) {
                MapEntry::Occupied(existing)
                    if existing.get().state.updated_at() > state.updated_at() =>
                {
                    debug!(query.key = %key, "destination is newer, skipping");
                    report.skipped += 1;
                }
                MapEntry::Occupied(existing)
                    if state.is_pending()
                        && (existing.get().state.status().is_settled()
                            || existing.get().in_flight.is_some()) =>
                {
                    debug!(
                        query.key = %key,
                        query.status = ?existing.get().state.status(),
                        "destination already holds a result or a load, skipping pending entry"
                    );
                    report.skipped += 1;
                }
                slot => {
                    let generation = self.inner.next_generation();
                    let stale_time = state.stale_time();
                    let mut entry = Entry::new(state, generation);

                    if entry.state.is_pending()
                        && let Some(promise) = promise
                    {
                        let (in_flight, settled) =
                            self.in_flight(key.clone(), generation, stale_time);
                        entry.in_flight = Some(in_flight);
                        streams.push((key.clone(), generation, stale_time, promise, settled));
                        report.streaming += 1;
                    }

                    trace!(query.key = %key, query.status = ?entry.state.status(), "hydrated");
                    slot.insert(entry);
                    report.hydrated += 1;
                }
            }
        }

        for (key, generation, stale_time, promise, settled) in streams {
            let codec = Arc::clone(&codec);
            let load = async move {
                let remote = promise.await;
                decode_state::<T>(codec.as_ref(), &remote).unwrap_or_else(|error| {
                    warn!(%error, "failed to decode streamed query state");
                    QueryState::error(
                        ErrorDescriptor::new(ErrorKind::Internal, error.to_string()),
                        remote.updated_at,
                        remote.stale_time,
                    )
                })
            };
            self.spawn_load(key, generation, stale_time, load, settled);
        }

        metrics::record_hydrate(report.hydrated, report.skipped);
        debug!(
            hydrated = report.hydrated,
            skipped = report.skipped,
            streaming = report.streaming,
            "hydrated cache"
        );
        Ok(report)
    }
}
