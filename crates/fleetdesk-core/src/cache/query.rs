use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::api::ApiError;

use super::{QueryKey, Resource};

/// Data younger than this is served without a refetch.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(2 * 60);

/// Data older than this is dropped; the next read refetches.
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(10 * 60);

type AnyValue = Arc<dyn Any + Send + Sync>;
type SharedError = Arc<anyhow::Error>;
type InFlight = Shared<BoxFuture<'static, Result<AnyValue, SharedError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub cache_time: Duration,
    /// Keep showing the previous key's data while a new key loads.
    pub keep_previous_data: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            cache_time: DEFAULT_CACHE_TIME,
            keep_previous_data: false,
        }
    }
}

impl QueryOptions {
    /// Paged and filtered lists.
    pub fn list() -> Self {
        Self {
            stale_time: Duration::from_secs(5 * 60),
            cache_time: Duration::from_secs(10 * 60),
            keep_previous_data: true,
        }
    }

    /// Slow-moving reference data such as the owner picker of the car form.
    pub fn reference() -> Self {
        Self {
            stale_time: Duration::from_secs(10 * 60),
            cache_time: Duration::from_secs(30 * 60),
            keep_previous_data: false,
        }
    }

    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }
}

#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error("{0}")]
    Fetch(SharedError),

    #[error("Cached value for {0} has an unexpected type")]
    TypeMismatch(String),

    #[error("Session changed while {0} was loading")]
    Discarded(String),
}

impl QueryError {
    /// The HTTP classification of the failure, if it came from the backend.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            QueryError::Fetch(err) => ApiError::find(err),
            _ => None,
        }
    }
}

/// Render-time view of one cache entry.
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    /// No data yet and a fetch is running.
    pub is_loading: bool,
    pub is_fetching: bool,
    pub error: Option<QueryError>,
    pub updated_at: Option<Instant>,
    /// `data` belongs to a previous key (keep-previous-data).
    pub is_previous_data: bool,
}

impl<T> QueryState<T> {
    /// State of a query that is not allowed to run.
    pub fn disabled() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_fetching: false,
            error: None,
            updated_at: None,
            is_previous_data: false,
        }
    }

    pub fn age(&self) -> Option<Duration> {
        self.updated_at.map(|t| t.elapsed())
    }

    fn from_entry(key: &QueryKey, entry: &Entry) -> Self
    where
        T: Send + Sync + 'static,
    {
        let (data, mismatch) = match entry.data.clone().map(|v| downcast::<T>(key, v)) {
            Some(Ok(data)) => (Some(data), None),
            Some(Err(e)) => (None, Some(e)),
            None => (None, None),
        };
        let is_fetching = entry.in_flight.is_some();
        Self {
            is_loading: is_fetching && data.is_none(),
            is_fetching,
            error: mismatch.or_else(|| entry.error.clone().map(QueryError::Fetch)),
            updated_at: entry.updated_at,
            data,
            is_previous_data: false,
        }
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            error: self.error.clone(),
            updated_at: self.updated_at,
            is_previous_data: self.is_previous_data,
        }
    }
}

struct Entry {
    data: Option<AnyValue>,
    updated_at: Option<Instant>,
    error: Option<SharedError>,
    /// Last time a fetch finished, successfully or not. Retention counts from here.
    settled_at: Instant,
    invalidated: bool,
    in_flight: Option<InFlight>,
    /// Bumped by every fetch start and invalidation; only the latest fetch may write.
    fetch_seq: u64,
    cache_time: Duration,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            data: None,
            updated_at: None,
            error: None,
            settled_at: Instant::now(),
            invalidated: false,
            in_flight: None,
            fetch_seq: 0,
            cache_time: DEFAULT_CACHE_TIME,
        }
    }
}

impl Entry {
    fn is_fresh(&self, stale_time: Duration, now: Instant) -> bool {
        !self.invalidated
            && self
                .updated_at
                .is_some_and(|t| now.duration_since(t) < stale_time)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.in_flight.is_none() && now.duration_since(self.settled_at) >= self.cache_time
    }

    fn needs_fetch(&self, stale_time: Duration, now: Instant) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        if self.invalidated {
            return true;
        }
        // Failed entries wait for an explicit retry
        if self.error.is_some() {
            return false;
        }
        !self.is_fresh(stale_time, now)
    }

    fn invalidate(&mut self) {
        self.invalidated = true;
        self.fetch_seq += 1;
        self.in_flight = None;
    }
}

struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    /// Bumped by `clear`; fetches started under an older generation are dropped.
    generation: u64,
}

impl CacheState {
    fn evict_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let expired = entry.is_expired(now);
            if expired {
                debug!(key = %key, "Evicting expired cache entry");
            }
            !expired
        });
        before - self.entries.len()
    }
}

struct CacheShared {
    state: Mutex<CacheState>,
    mutations: AtomicUsize,
}

impl CacheShared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(
        &self,
        key: &QueryKey,
        seq: u64,
        generation: u64,
        result: &Result<AnyValue, SharedError>,
    ) {
        let mut state = self.lock();
        if state.generation != generation {
            debug!(key = %key, "Discarding result fetched under a previous session");
            return;
        }
        let Some(entry) = state.entries.get_mut(key) else {
            return;
        };
        if entry.fetch_seq != seq {
            debug!(key = %key, seq, "Discarding superseded result");
            return;
        }

        entry.in_flight = None;
        entry.invalidated = false;
        entry.settled_at = Instant::now();
        match result {
            Ok(value) => {
                entry.data = Some(Arc::clone(value));
                entry.updated_at = Some(Instant::now());
                entry.error = None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Query failed");
                entry.error = Some(Arc::clone(e));
            }
        }
    }
}

struct MutationGuard<'a>(&'a AtomicUsize);

impl<'a> MutationGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Deduplicating query cache.
///
/// Clones share the same entries. Fetches run as spawned tasks, so
/// `observe` must be called from within a tokio runtime.
#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<CacheShared>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, value: AnyValue) -> Result<Arc<T>, QueryError> {
    value
        .downcast::<T>()
        .map_err(|_| QueryError::TypeMismatch(key.to_string()))
}

fn start_fetch<T, F, Fut>(
    shared: &Arc<CacheShared>,
    state: &mut CacheState,
    key: &QueryKey,
    cache_time: Duration,
    fetcher: F,
) -> InFlight
where
    T: Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let generation = state.generation;
    let entry = state.entries.entry(key.clone()).or_default();
    entry.fetch_seq += 1;
    entry.cache_time = cache_time;
    let seq = entry.fetch_seq;
    debug!(key = %key, seq, "Starting fetch");

    let owner = Arc::downgrade(shared);
    let task_key = key.clone();
    let request = fetcher();
    let task: InFlight = async move {
        let result = request
            .await
            .map(|value| Arc::new(value) as AnyValue)
            .map_err(Arc::new);
        if let Some(shared) = owner.upgrade() {
            shared.complete(&task_key, seq, generation, &result);
        }
        result
    }
    .boxed()
    .shared();

    entry.in_flight = Some(task.clone());
    // Runs to completion even if every caller goes away
    tokio::spawn(task.clone());
    task
}

enum Lookup {
    Ready(AnyValue),
    Pending(InFlight),
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(CacheShared {
                state: Mutex::new(CacheState {
                    entries: HashMap::new(),
                    generation: 0,
                }),
                mutations: AtomicUsize::new(0),
            }),
        }
    }

    /// Await the value for `key`: fresh data is served from cache, otherwise
    /// the key's in-flight fetch is joined or a new one started.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> Result<Arc<T>, QueryError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (lookup, generation) = {
            let mut state = self.shared.lock();
            let now = Instant::now();
            state.evict_expired(now);
            let generation = state.generation;

            let cached = state.entries.get_mut(key).and_then(|entry| {
                entry.cache_time = options.cache_time;
                match (&entry.data, &entry.in_flight) {
                    (Some(data), _) if entry.is_fresh(options.stale_time, now) => {
                        Some(Lookup::Ready(Arc::clone(data)))
                    }
                    (_, Some(in_flight)) => Some(Lookup::Pending(in_flight.clone())),
                    _ => None,
                }
            });

            let lookup = match cached {
                Some(lookup) => lookup,
                None => Lookup::Pending(start_fetch(
                    &self.shared,
                    &mut state,
                    key,
                    options.cache_time,
                    fetcher,
                )),
            };
            (lookup, generation)
        };

        let value = match lookup {
            Lookup::Ready(value) => value,
            Lookup::Pending(in_flight) => {
                let result = in_flight.await;
                if self.generation() != generation {
                    return Err(QueryError::Discarded(key.to_string()));
                }
                result.map_err(QueryError::Fetch)?
            }
        };
        downcast(key, value)
    }

    /// Non-blocking snapshot of `key`, starting a background fetch when the
    /// entry is missing, stale or invalidated.
    pub fn observe<T, F, Fut>(
        &self,
        key: &QueryKey,
        options: &QueryOptions,
        fetcher: F,
    ) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut state = self.shared.lock();
        let now = Instant::now();
        state.evict_expired(now);

        let needs_fetch = state
            .entries
            .get(key)
            .map_or(true, |entry| entry.needs_fetch(options.stale_time, now));
        if needs_fetch {
            start_fetch(&self.shared, &mut state, key, options.cache_time, fetcher);
        }

        match state.entries.get_mut(key) {
            Some(entry) => {
                entry.cache_time = options.cache_time;
                QueryState::from_entry(key, entry)
            }
            None => QueryState::disabled(),
        }
    }

    /// Mark every entry of `resource` for refetch. Returns how many were marked.
    pub fn invalidate(&self, resource: Resource) -> usize {
        let mut state = self.shared.lock();
        let mut count = 0;
        for (_, entry) in state
            .entries
            .iter_mut()
            .filter(|(key, _)| key.resource() == resource)
        {
            entry.invalidate();
            count += 1;
        }
        debug!(family = %resource, count, "Invalidated cache family");
        count
    }

    pub fn invalidate_key(&self, key: &QueryKey) -> bool {
        match self.shared.lock().entries.get_mut(key) {
            Some(entry) => {
                entry.invalidate();
                true
            }
            None => false,
        }
    }

    /// Refetch a failed entry on its next read.
    pub fn retry(&self, key: &QueryKey) -> bool {
        debug!(key = %key, "Retrying query");
        self.invalidate_key(key)
    }

    /// Drop every entry. Fetches still running will not write their results.
    pub fn clear(&self) {
        let mut state = self.shared.lock();
        state.generation += 1;
        state.entries.clear();
        debug!(generation = state.generation, "Cleared query cache");
    }

    pub fn collect_garbage(&self) -> usize {
        self.shared.lock().evict_expired(Instant::now())
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any entry has a fetch running.
    pub fn is_fetching(&self) -> bool {
        self.shared
            .lock()
            .entries
            .values()
            .any(|entry| entry.in_flight.is_some())
    }

    pub fn is_mutating(&self) -> bool {
        self.shared.mutations.load(Ordering::SeqCst) > 0
    }

    /// Run a write against the backend. The caller invalidates what it affects.
    pub async fn mutate<T, Fut>(&self, label: &str, mutation: Fut) -> anyhow::Result<T>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let _guard = MutationGuard::enter(&self.shared.mutations);
        debug!(mutation = label, "Mutation started");
        let result = mutation.await;
        match &result {
            Ok(_) => debug!(mutation = label, "Mutation succeeded"),
            Err(e) => warn!(mutation = label, error = %e, "Mutation failed"),
        }
        result
    }
}
