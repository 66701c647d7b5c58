use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;
use wayfare_common::resilience::{
    Attempt, AttemptTimeout, CallExecutor, DescribeFailure, QueryClassifier, RetryOverrides,
    RetryPolicy, Sleeper,
};
use wayfare_common::CommonResult;

/// Default max capacity for the query cache (1000 entries)
pub const DEFAULT_QUERY_CACHE_CAPACITY: u64 = 1000;

/// Cache of query results with retrying reads and mutations.
///
/// Only successful results are cached; a failed fetch leaves the cache as it
/// was. Concurrent fetches of the same key are not coalesced.
#[derive(Clone)]
pub struct QueryClient<V> {
    cache: Cache<String, V>,
    reads: CallExecutor<QueryClassifier>,
    mutations: CallExecutor<QueryClassifier>,
}

impl<V> fmt::Debug for QueryClient<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.cache.entry_count())
            .field("read_policy", self.reads.policy())
            .field("mutation_policy", self.mutations.policy())
            .finish()
    }
}

impl<V> QueryClient<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Start configuring a query client
    pub fn builder() -> QueryClientBuilder {
        QueryClientBuilder::default()
    }

    /// Client with the default read and mutation presets.
    pub fn new() -> Self {
        QueryClientBuilder::default().build_with_policies(
            RetryPolicy::query_read(),
            RetryPolicy::query_mutation(),
        )
    }

    /// Policy for reads
    pub fn read_policy(&self) -> &RetryPolicy {
        self.reads.policy()
    }

    /// Policy for mutations
    pub fn mutation_policy(&self) -> &RetryPolicy {
        self.mutations.policy()
    }

    /// Return the cached value for `key`, or run `fetcher` under the read
    /// policy and cache its result.
    pub async fn fetch_query<E, F, Fut>(&self, key: &str, fetcher: F) -> Result<V, E>
    where
        E: DescribeFailure + From<AttemptTimeout> + fmt::Display,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.cache.get(key).await {
            debug!(query = key, "query cache hit");
            return Ok(value);
        }

        debug!(query = key, "query cache miss");
        let value = self.reads.execute(fetcher).await?;
        self.cache.insert(key.to_string(), value.clone()).await;
        Ok(value)
    }

    /// Run `fetcher` under the read policy regardless of the cache and store
    /// the fresh result.
    pub async fn refetch_query<E, F, Fut>(&self, key: &str, fetcher: F) -> Result<V, E>
    where
        E: DescribeFailure + From<AttemptTimeout> + fmt::Display,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let value = self.reads.execute(fetcher).await?;
        self.cache.insert(key.to_string(), value.clone()).await;
        Ok(value)
    }

    /// Run a mutation under the mutation policy. The cache is untouched;
    /// callers invalidate or update affected keys afterwards.
    pub async fn mutate<T, E, F, Fut>(&self, mutation: F) -> Result<T, E>
    where
        E: DescribeFailure + From<AttemptTimeout> + fmt::Display,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.mutations.execute(mutation).await
    }

    /// Drop the cached value for `key`
    pub async fn invalidate(&self, key: &str) {
        debug!(query = key, "invalidating query");
        self.cache.invalidate(key).await;
    }

    /// Drop every cached value
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Store `value` under `key` without fetching
    pub async fn set_query_data(&self, key: &str, value: V) {
        self.cache.insert(key.to_string(), value).await;
    }

    /// Cached value for `key`, if any
    pub async fn get_query_data(&self, key: &str) -> Option<V> {
        self.cache.get(key).await
    }
}

impl<V> Default for QueryClient<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`QueryClient`].
pub struct QueryClientBuilder {
    max_capacity: u64,
    time_to_live: Option<Duration>,
    read_policy: RetryPolicy,
    mutation_policy: RetryPolicy,
    read_overrides: RetryOverrides,
    mutation_overrides: RetryOverrides,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl Default for QueryClientBuilder {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            time_to_live: None,
            read_policy: RetryPolicy::query_read(),
            mutation_policy: RetryPolicy::query_mutation(),
            read_overrides: RetryOverrides::default(),
            mutation_overrides: RetryOverrides::default(),
            sleeper: None,
        }
    }
}

impl QueryClientBuilder {
    /// Maximum number of cached entries
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Evict cached results this long after they were stored.
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Replace the read preset
    pub fn read_policy(mut self, policy: RetryPolicy) -> Self {
        self.read_policy = policy;
        self
    }

    /// Replace the mutation preset
    pub fn mutation_policy(mut self, policy: RetryPolicy) -> Self {
        self.mutation_policy = policy;
        self
    }

    /// Overrides applied to the read policy
    pub fn read_overrides(mut self, overrides: RetryOverrides) -> Self {
        self.read_overrides = overrides;
        self
    }

    /// Overrides applied to the mutation policy
    pub fn mutation_overrides(mut self, overrides: RetryOverrides) -> Self {
        self.mutation_overrides = overrides;
        self
    }

    /// Replace the backoff sleeper for both budgets
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Validate overrides and build the client.
    pub fn build<V>(self) -> CommonResult<QueryClient<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let reads = self.read_policy.with_overrides(&self.read_overrides)?;
        let mutations = self.mutation_policy.with_overrides(&self.mutation_overrides)?;
        Ok(self.build_with_policies(reads, mutations))
    }

    fn build_with_policies<V>(self, reads: RetryPolicy, mutations: RetryPolicy) -> QueryClient<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        let mut cache = Cache::builder().max_capacity(self.max_capacity);
        if let Some(ttl) = self.time_to_live {
            cache = cache.time_to_live(ttl);
        }

        let mut read_executor = CallExecutor::new(reads, QueryClassifier);
        let mut mutation_executor = CallExecutor::new(mutations, QueryClassifier);
        if let Some(sleeper) = self.sleeper {
            read_executor = read_executor.with_sleeper(Arc::clone(&sleeper));
            mutation_executor = mutation_executor.with_sleeper(sleeper);
        }

        QueryClient { cache: cache.build(), reads: read_executor, mutations: mutation_executor }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use reqwest::StatusCode;
    use wayfare_common::testing::{RecordingSleeper, ScriptedOperation};

    use super::*;
    use crate::http::HttpError;

    fn status(code: u16) -> HttpError {
        HttpError::Status {
            status: StatusCode::from_u16(code).expect("valid status"),
            url: "https://api.example.test/trips".into(),
        }
    }

    fn client_with_recorder() -> (QueryClient<String>, RecordingSleeper) {
        let sleeper = RecordingSleeper::new();
        let client = QueryClient::<String>::builder()
            .sleeper(Arc::new(sleeper.clone()))
            .build()
            .expect("query client");
        (client, sleeper)
    }

    #[tokio::test]
    async fn cached_results_skip_the_fetcher() {
        let (client, _) = client_with_recorder();
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let value = client
                .fetch_query("destinations/lisbon", |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, HttpError>("Lisbon".to_string()) }
                })
                .await
                .expect("fetched");
            assert_eq!(value, "Lisbon");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reads_retry_server_errors_and_cache_the_success() {
        let (client, sleeper) = client_with_recorder();
        let op = ScriptedOperation::fail_then_succeed([status(502)], "Porto".to_string());

        let value = client.fetch_query("destinations/porto", |_| op.next()).await.expect("fetched");

        assert_eq!(value, "Porto");
        assert_eq!(op.invocations(), 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1)]);
        assert_eq!(client.get_query_data("destinations/porto").await.as_deref(), Some("Porto"));
    }

    #[tokio::test]
    async fn client_errors_fail_fast_and_are_not_cached() {
        let (client, sleeper) = client_with_recorder();
        let op: ScriptedOperation<String, _> = ScriptedOperation::failing(status(404));

        let err = client.fetch_query("destinations/atlantis", |_| op.next()).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(op.invocations(), 1);
        assert!(sleeper.recorded().is_empty());
        assert!(client.get_query_data("destinations/atlantis").await.is_none());
    }

    #[tokio::test]
    async fn mutations_use_their_own_budget() {
        let (client, sleeper) = client_with_recorder();
        let op: ScriptedOperation<(), _> = ScriptedOperation::failing(status(503));

        let err = client.mutate(|_| op.next()).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(op.invocations(), 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1)]);
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let (client, _) = client_with_recorder();
        client.set_query_data("trips/7", "draft".to_string()).await;
        assert_eq!(client.get_query_data("trips/7").await.as_deref(), Some("draft"));

        client.invalidate("trips/7").await;
        assert!(client.get_query_data("trips/7").await.is_none());

        let value = client
            .fetch_query("trips/7", |_| async { Ok::<_, HttpError>("published".to_string()) })
            .await
            .expect("refetched");
        assert_eq!(value, "published");

        let fresh = client
            .refetch_query("trips/7", |_| async { Ok::<_, HttpError>("archived".to_string()) })
            .await
            .expect("refetched");
        assert_eq!(fresh, "archived");
        assert_eq!(client.get_query_data("trips/7").await.as_deref(), Some("archived"));
    }

    #[tokio::test]
    async fn invalidate_all_clears_every_query() {
        let (client, _) = client_with_recorder();
        client.set_query_data("trips/1", "lisbon".to_string()).await;
        client.set_query_data("trips/2", "porto".to_string()).await;

        client.invalidate_all();

        assert!(client.get_query_data("trips/1").await.is_none());
        assert!(client.get_query_data("trips/2").await.is_none());

        let calls = AtomicU32::new(0);
        let value = client
            .fetch_query("trips/1", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, HttpError>("lisbon-again".to_string()) }
            })
            .await
            .expect("refetched");
        assert_eq!(value, "lisbon-again");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entries_expire_after_time_to_live() {
        let client = QueryClient::<String>::builder()
            .time_to_live(Duration::from_millis(50))
            .build()
            .expect("query client");

        client.set_query_data("weather/faro", "sunny".to_string()).await;
        assert_eq!(client.get_query_data("weather/faro").await.as_deref(), Some("sunny"));

        // moka tracks expiry on its own clock, so this waits in real time.
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(client.get_query_data("weather/faro").await.is_none());
    }

    #[test]
    fn overrides_adjust_each_budget_independently() {
        let client: QueryClient<String> = QueryClient::<String>::builder()
            .read_overrides(RetryOverrides { retries: Some(5), ..RetryOverrides::default() })
            .mutation_overrides(RetryOverrides {
                retry_delay_ms: Some(250),
                ..RetryOverrides::default()
            })
            .build()
            .expect("query client");

        assert_eq!(client.read_policy().max_attempts(), 5);
        assert_eq!(client.mutation_policy().max_attempts(), 2);
        assert_eq!(client.mutation_policy().base_delay(), Duration::from_millis(250));
        assert_eq!(client.mutation_policy().max_delay(), Duration::from_secs(10));

        let rejected = QueryClient::<String>::builder()
            .mutation_overrides(RetryOverrides { retries: Some(0), ..RetryOverrides::default() })
            .build::<String>();
        assert!(rejected.is_err());
    }
}
