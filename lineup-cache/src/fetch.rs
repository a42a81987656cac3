//! Fetch coordinator: read-through loads with single-flight per key.
//!
//! A read is served from a Fresh entry inside its staleness window, joins a
//! load already running for the same key, or starts one. The load itself
//! does the store bookkeeping, so it completes correctly even if the reader
//! that started it goes away.

use futures_util::FutureExt;
use lineup_core::{ApiError, ApiResult, CacheKey, CachePolicy};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::entry::CacheRead;
use crate::error::{FetchError, FetchResult};
use crate::session::SessionBoundary;
use crate::store::{CacheStore, LoadTicket, ReadPlan};

/// Types that can be stored in the cache.
///
/// Values cross the store as JSON, so anything serde can round-trip works.
pub trait CachedResource: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CachedResource for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

#[derive(Clone)]
pub struct FetchCoordinator {
    store: Arc<CacheStore>,
    session: Arc<SessionBoundary>,
    defaults: CachePolicy,
}

impl FetchCoordinator {
    pub fn new(session: Arc<SessionBoundary>) -> Self {
        Self::with_policy(session, CachePolicy::default())
    }

    pub fn with_policy(session: Arc<SessionBoundary>, defaults: CachePolicy) -> Self {
        Self {
            store: Arc::clone(session.store()),
            session,
            defaults,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<SessionBoundary> {
        &self.session
    }

    pub fn default_policy(&self) -> &CachePolicy {
        &self.defaults
    }

    /// Read `key`, loading it with `loader` unless a fresh copy is cached.
    ///
    /// Concurrent reads of one key share a single `loader` call. On failure
    /// any previously cached data stays in place and the error is returned.
    /// A 401 clears the session before this returns.
    pub async fn read<T, F, Fut>(&self, key: CacheKey, loader: F, policy: &CachePolicy) -> FetchResult<T>
    where
        T: CachedResource,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        self.read_with_meta(key, loader, policy)
            .await
            .map(CacheRead::into_value)
    }

    /// [`read`](Self::read) with the coordinator's default policy.
    pub async fn read_default<T, F, Fut>(&self, key: CacheKey, loader: F) -> FetchResult<T>
    where
        T: CachedResource,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let policy = self.defaults.clone();
        self.read(key, loader, &policy).await
    }

    /// Like [`read`](Self::read), also reporting whether the cache answered.
    pub async fn read_with_meta<T, F, Fut>(
        &self,
        key: CacheKey,
        loader: F,
        policy: &CachePolicy,
    ) -> FetchResult<CacheRead<T>>
    where
        T: CachedResource,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let session = Arc::clone(&self.session);
        let load_policy = policy.clone();

        let plan = self.store.plan_read(&key, policy.stale_time, move |ticket| {
            run_load(store, session, ticket, loader, load_policy)
                .boxed()
                .shared()
        });

        match plan {
            ReadPlan::Hit { data, fetched_at } => {
                tracing::debug!(key = %key, "Cache hit");
                decode(&key, data).map(|value| CacheRead::from_cache(value, fetched_at))
            }
            ReadPlan::Join(load) => {
                tracing::debug!(key = %key, "Joining in-flight load");
                let data = load.await?;
                decode(&key, data).map(|value| CacheRead::from_network(value, self.store.now()))
            }
            ReadPlan::Lead(load) => {
                tracing::debug!(key = %key, "Cache miss, loading");
                let data = load.await?;
                decode(&key, data).map(|value| CacheRead::from_network(value, self.store.now()))
            }
        }
    }

    /// Warm `key` without handing the value back.
    pub async fn prefetch<T, F, Fut>(&self, key: CacheKey, loader: F) -> FetchResult<()>
    where
        T: CachedResource,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        self.read_default::<T, F, Fut>(key, loader).await.map(|_| ())
    }

    /// Cached value for `key` regardless of state, without touching the network.
    pub fn peek<T: CachedResource>(&self, key: &CacheKey) -> FetchResult<Option<T>> {
        match self.store.get(key).and_then(|entry| entry.data) {
            Some(data) => decode(key, data).map(Some),
            None => Ok(None),
        }
    }

    /// Write a value straight into the cache as Fresh.
    pub fn set_query_data<T: CachedResource>(&self, key: CacheKey, value: &T) -> FetchResult<()> {
        let data = encode(&key, value)?;
        self.store.put(key, data);
        Ok(())
    }
}

async fn run_load<T, F, Fut>(
    store: Arc<CacheStore>,
    session: Arc<SessionBoundary>,
    ticket: LoadTicket,
    mut loader: F,
    policy: CachePolicy,
) -> Result<Value, FetchError>
where
    T: CachedResource,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = ApiResult<T>> + Send,
{
    let result = match load_with_retry(&ticket.key, &mut loader, &policy).await {
        Ok(value) => encode(&ticket.key, &value),
        Err(err) => Err(FetchError::Api(err)),
    };

    if !store.finish_load(&ticket, &result) {
        // Data fetched under a previous session is withheld; its errors are not.
        if store.epoch() != ticket.epoch && result.is_ok() {
            tracing::debug!(key = %ticket.key, "Discarding load result from a previous session");
            return Err(FetchError::Cancelled {
                key: ticket.key.to_string(),
            });
        }
        tracing::debug!(key = %ticket.key, "Load finished for a key no longer tracked, result not cached");
    }

    if let Err(err) = &result {
        // A rejection from an older session must not sign out the current one.
        if err.is_unauthorized() && store.epoch() == ticket.epoch {
            session.on_auth_rejected();
        } else {
            tracing::warn!(key = %ticket.key, error = %err, "Load failed");
        }
    }
    result
}

/// Run `loader` with a per-attempt timeout, retrying retryable failures.
async fn load_with_retry<T, F, Fut>(key: &CacheKey, loader: &mut F, policy: &CachePolicy) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        let err = match with_timeout(policy.timeout, loader()).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= policy.retry.max_retries || !err.is_retryable() {
            return Err(err);
        }
        attempt += 1;
        let delay = policy.retry.backoff_for(attempt);
        tracing::warn!(
            key = %key,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Load failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Bound a remote call; running out of time counts as a failure.
pub(crate) async fn with_timeout<T, Fut>(timeout: Duration, call: Fut) -> ApiResult<T>
where
    Fut: Future<Output = ApiResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout { after: timeout }),
    }
}

fn encode<T: Serialize>(key: &CacheKey, value: &T) -> FetchResult<Value> {
    serde_json::to_value(value).map_err(|e| FetchError::Encode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(key: &CacheKey, data: Value) -> FetchResult<T> {
    serde_json::from_value(data).map_err(|e| FetchError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::entry::EntryState;
    use crate::identity::{Credential, Identity, InMemoryIdentity};
    use lineup_core::{PlayerId, QueryKeys, RetryPolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        fetch: FetchCoordinator,
        clock: Arc<ManualClock>,
        identity: Arc<InMemoryIdentity>,
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(CacheStore::with_clock(clock.clone()));
        let identity = Arc::new(InMemoryIdentity::with_credential(Credential::new("t")));
        let session = Arc::new(SessionBoundary::new(store, identity.clone()));
        Harness {
            fetch: FetchCoordinator::new(session),
            clock,
            identity,
        }
    }

    fn no_retry() -> CachePolicy {
        CachePolicy::default().with_retry(RetryPolicy::none())
    }

    fn counting_loader(
        calls: &Arc<AtomicUsize>,
        value: i64,
    ) -> impl FnMut() -> futures_util::future::Ready<ApiResult<i64>> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(value))
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_served_without_loader() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKeys::coach_players();
        let policy = CachePolicy::default().with_stale_time(Duration::from_secs(60));

        let first: i64 = h.fetch.read(key.clone(), counting_loader(&calls, 1), &policy).await.unwrap();
        h.clock.advance(Duration::from_secs(30));
        let second: i64 = h.fetch.read(key.clone(), counting_loader(&calls, 2), &policy).await.unwrap();

        assert_eq!((first, second), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reloads() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKeys::coach_players();
        let policy = CachePolicy::default().with_stale_time(Duration::from_secs(60));

        h.fetch.read(key.clone(), counting_loader(&calls, 1), &policy).await.unwrap();
        h.clock.advance(Duration::from_secs(120));
        let value: i64 = h.fetch.read(key.clone(), counting_loader(&calls, 2), &policy).await.unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_with_meta_reports_hit() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKeys::me();

        let miss = h
            .fetch
            .read_with_meta(key.clone(), counting_loader(&calls, 1), &no_retry())
            .await
            .unwrap();
        let hit = h
            .fetch
            .read_with_meta(key.clone(), counting_loader(&calls, 1), &no_retry())
            .await
            .unwrap();
        assert!(!miss.was_cache_hit());
        assert!(hit.was_cache_hit());
    }

    #[tokio::test]
    async fn test_decode_mismatch_is_reported() {
        let h = harness();
        let key = QueryKeys::me();
        h.fetch.set_query_data(key.clone(), &"not a number".to_string()).unwrap();

        let result = h.fetch.peek::<i64>(&key);
        assert!(matches!(result, Err(FetchError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Err::<i64, _>(ApiError::status(404, "missing")))
        };

        let result = h
            .fetch
            .read(QueryKeys::coach_player(PlayerId::new(9)), loader, &CachePolicy::default())
            .await;
        assert_eq!(result.unwrap_err().status_code(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(h.identity.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_retried_with_backoff() {
        let h = harness();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader = move || {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(if attempt < 2 {
                Err(ApiError::transport("connection reset"))
            } else {
                Ok(7i64)
            })
        };

        let started = tokio::time::Instant::now();
        let value = h
            .fetch
            .read(QueryKeys::player_stats(), loader, &CachePolicy::default())
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s then 2s of backoff
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_loader_times_out() {
        let h = harness();
        let loader = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<i64, ApiError>(1)
        };
        let policy = no_retry().with_timeout(Duration::from_secs(15));

        let err = h.fetch.read(QueryKeys::me(), loader, &policy).await.unwrap_err();
        assert!(matches!(err, FetchError::Api(ApiError::Timeout { .. })));
        assert_eq!(h.fetch.store().get(&QueryKeys::me()).unwrap().state, EntryState::Error);
    }
}
