//! Database handle backed by an r2d2 SQLite pool and the call executor.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Transaction};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use wayfare_common::resilience::{
    Attempt, CallExecutor, CallOutcome, RetryOverrides, RetryPolicy, Sleeper, StoreClassifier,
};

use super::error::StoreError;

/// r2d2 pool of SQLite connections
pub type SqlitePool = Pool<SqliteConnectionManager>;

const DEFAULT_POOL_SIZE: u32 = 8;
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 1000;";

/// Shape of a store operation, recorded in logs.
///
/// Retry eligibility never depends on the kind: a write that fails with a
/// transient fault is retried exactly like a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Single-row lookup
    PointRead,
    /// Multi-row query
    BulkRead,
    /// Insert, update or delete
    Write,
    /// Insert-or-update
    Upsert,
    /// Aggregate count
    Count,
    /// Multi-statement transaction
    Transaction,
    /// Arbitrary SQL
    RawQuery,
}

impl OperationKind {
    /// Label used in log fields
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PointRead => "point_read",
            Self::BulkRead => "bulk_read",
            Self::Write => "write",
            Self::Upsert => "upsert",
            Self::Count => "count",
            Self::Transaction => "transaction",
            Self::RawQuery => "raw_query",
        }
    }

    /// Whether the operation may change data.
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::Upsert | Self::Transaction | Self::RawQuery)
    }
}

/// Store adapter: pooled SQLite connections under the store retry preset.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    executor: CallExecutor<StoreClassifier>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("policy", self.executor.policy())
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Start configuring a database handle
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    /// Open (or create) a database file with the given pool size.
    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, StoreError> {
        Self::builder().path(path).pool_size(pool_size).build()
    }

    /// Private in-memory database on a single pooled connection.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::builder().build()
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store policy applied to every operation
    pub fn policy(&self) -> &RetryPolicy {
        self.executor.policy()
    }

    /// Return the configured database path, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a blocking operation on a pooled connection with retry semantics.
    ///
    /// The closure runs on the blocking thread pool and may be invoked once
    /// per attempt. If the attempt is abandoned at its deadline the running
    /// statement is interrupted.
    pub async fn run<T, E, F>(&self, kind: OperationKind, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        E: Into<StoreError>,
        F: Fn(&mut Connection) -> Result<T, E> + Send + Sync + 'static,
    {
        self.run_on(&self.executor, kind, Arc::new(operation)).await.into_result()
    }

    /// [`run`](Self::run) with per-call overrides of the store policy.
    pub async fn run_with<T, E, F>(
        &self,
        kind: OperationKind,
        overrides: &RetryOverrides,
        operation: F,
    ) -> Result<T, StoreError>
    where
        T: Send + 'static,
        E: Into<StoreError>,
        F: Fn(&mut Connection) -> Result<T, E> + Send + Sync + 'static,
    {
        let policy = self.executor.policy().with_overrides(overrides)?;
        let executor = self.executor.with_policy(policy);
        self.run_on(&executor, kind, Arc::new(operation)).await.into_result()
    }

    /// Run a blocking operation and report attempt statistics.
    pub async fn run_with_outcome<T, E, F>(
        &self,
        kind: OperationKind,
        operation: F,
    ) -> CallOutcome<T, StoreError>
    where
        T: Send + 'static,
        E: Into<StoreError>,
        F: Fn(&mut Connection) -> Result<T, E> + Send + Sync + 'static,
    {
        self.run_on(&self.executor, kind, Arc::new(operation)).await
    }

    /// Run an async store operation under the store policy.
    ///
    /// For operations that talk to the store through their own client; the
    /// pool is not touched.
    pub async fn run_async<T, F, Fut>(
        &self,
        kind: OperationKind,
        mut operation: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.executor
            .execute(|attempt| {
                log_attempt(kind, &attempt);
                operation(attempt)
            })
            .await
    }

    /// Run `operation` inside a transaction that commits on success.
    pub async fn transaction<T, E, F>(&self, operation: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        E: Into<StoreError>,
        F: Fn(&Transaction<'_>) -> Result<T, E> + Send + Sync + 'static,
    {
        self.run(OperationKind::Transaction, move |conn| {
            let tx = conn.transaction()?;
            let value = operation(&tx).map_err(Into::<StoreError>::into)?;
            tx.commit()?;
            Ok::<_, StoreError>(value)
        })
        .await
    }

    /// Execute a batch of SQL statements (schema setup, maintenance).
    pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<(), StoreError> {
        let sql = sql.into();
        self.run(OperationKind::RawQuery, move |conn| conn.execute_batch(&sql)).await
    }

    /// Perform a health check to verify database connectivity.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.run(OperationKind::PointRead, |conn| {
            conn.query_row("SELECT 1", params![], |row| row.get::<_, i32>(0))
        })
        .await
        .map(|_| ())
    }

    async fn run_on<T, E, F>(
        &self,
        executor: &CallExecutor<StoreClassifier>,
        kind: OperationKind,
        operation: Arc<F>,
    ) -> CallOutcome<T, StoreError>
    where
        T: Send + 'static,
        E: Into<StoreError>,
        F: Fn(&mut Connection) -> Result<T, E> + Send + Sync + 'static,
    {
        executor
            .execute_with_outcome(|attempt| {
                log_attempt(kind, &attempt);
                let pool = self.pool.clone();
                let operation = Arc::clone(&operation);
                let cancel = attempt.cancellation().clone();
                async move {
                    tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
                        let mut conn = pool.get()?;
                        let interrupt = conn.get_interrupt_handle();
                        let watcher = Handle::current().spawn(async move {
                            cancel.cancelled().await;
                            interrupt.interrupt();
                        });
                        let result: Result<T, StoreError> =
                            operation(&mut conn).map_err(Into::into);
                        watcher.abort();
                        result
                    })
                    .await?
                }
            })
            .await
    }
}

fn log_attempt(kind: OperationKind, attempt: &Attempt) {
    if attempt.is_retry() && kind.is_write() {
        warn!(
            operation = kind.as_str(),
            attempt = attempt.number(),
            "retrying store write without an idempotency guard"
        );
    } else {
        debug!(operation = kind.as_str(), attempt = attempt.number(), "running store operation");
    }
}

/// Builder for [`Database`].
pub struct DatabaseBuilder {
    path: Option<PathBuf>,
    pool_size: u32,
    connection_timeout: Duration,
    policy: RetryPolicy,
    overrides: RetryOverrides,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl Default for DatabaseBuilder {
    fn default() -> Self {
        Self {
            path: None,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            policy: RetryPolicy::database(),
            overrides: RetryOverrides::default(),
            sleeper: None,
        }
    }
}

impl DatabaseBuilder {
    /// Database file; without one the database lives in memory.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Maximum pooled connections for file databases
    pub fn pool_size(mut self, size: u32) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// How long a pool checkout waits before failing with a connection fault.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Replace the whole retry policy (defaults to [`RetryPolicy::database`]).
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply overrides on top of the policy
    pub fn overrides(mut self, overrides: RetryOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Replace the backoff sleeper
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Validate the policy and open the pool
    pub fn build(self) -> Result<Database, StoreError> {
        let policy = self.policy.with_overrides(&self.overrides)?;

        let (manager, pool_size) = match &self.path {
            Some(path) => (SqliteConnectionManager::file(path), self.pool_size),
            // Every in-memory connection is its own database.
            None => (SqliteConnectionManager::memory(), 1),
        };
        let manager = manager.with_init(|conn| conn.execute_batch(CONNECTION_PRAGMAS));

        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(self.connection_timeout)
            .build(manager)?;

        let db_path = match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        };
        info!(
            db_path = %db_path,
            max_connections = pool_size,
            max_attempts = policy.max_attempts(),
            "sqlite pool initialised"
        );

        let mut executor = CallExecutor::new(policy, StoreClassifier);
        if let Some(sleeper) = self.sleeper {
            executor = executor.with_sleeper(sleeper);
        }

        Ok(Database { pool, executor, path: self.path })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tempfile::TempDir;
    use wayfare_common::resilience::StoreFault;
    use wayfare_common::testing::RecordingSleeper;

    use super::*;

    const SCHEMA: &str = "CREATE TABLE destinations (
        id INTEGER PRIMARY KEY,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL
    );";

    async fn database_with_recorder() -> (Database, RecordingSleeper) {
        let sleeper = RecordingSleeper::new();
        let db = Database::builder()
            .sleeper(Arc::new(sleeper.clone()))
            .build()
            .expect("database created");
        db.execute_batch(SCHEMA).await.expect("schema created");
        (db, sleeper)
    }

    #[tokio::test]
    async fn health_check_succeeds_for_valid_database() {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open(&db_path, 4).expect("database opened");
        db.health_check().await.expect("health check passed");
        assert_eq!(db.path(), Some(db_path.as_path()));
    }

    #[tokio::test]
    async fn unique_violation_is_not_retried() {
        let (db, sleeper) = database_with_recorder().await;
        let calls = Arc::new(AtomicU32::new(0));

        db.run(OperationKind::Write, |conn| {
            conn.execute("INSERT INTO destinations (slug, name) VALUES ('lisbon', 'Lisbon')", [])
        })
        .await
        .expect("first insert");

        let counter = Arc::clone(&calls);
        let err = db
            .run(OperationKind::Write, move |conn| {
                counter.fetch_add(1, Ordering::SeqCst);
                conn.execute("INSERT INTO destinations (slug, name) VALUES ('lisbon', 'Again')", [])
            })
            .await
            .expect_err("duplicate slug rejected");

        assert_eq!(err.fault(), StoreFault::UniqueViolation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn transient_faults_are_retried_until_success() {
        let (db, sleeper) = database_with_recorder().await;
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let count = db
            .run(OperationKind::Count, move |conn| {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return Err(StoreError::from_code("P1017", "Server has closed the connection"));
                }
                conn.query_row("SELECT COUNT(*) FROM destinations", [], |row| row.get::<_, i64>(0))
                    .map_err(StoreError::from)
            })
            .await
            .expect("count after retries");

        assert_eq!(count, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn transaction_rolls_back_on_failure() {
        let (db, _) = database_with_recorder().await;

        let result = db
            .transaction(|tx| {
                tx.execute("INSERT INTO destinations (slug, name) VALUES ('porto', 'Porto')", [])?;
                tx.execute("INSERT INTO destinations (slug, name) VALUES ('porto', 'Dup')", [])
            })
            .await;
        assert_eq!(result.expect_err("duplicate").fault(), StoreFault::UniqueViolation);

        let count = db
            .run(OperationKind::Count, |conn| {
                conn.query_row("SELECT COUNT(*) FROM destinations", [], |row| row.get::<_, i64>(0))
            })
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn missing_row_maps_to_not_found() {
        let (db, _) = database_with_recorder().await;

        let err = db
            .run(OperationKind::PointRead, |conn| {
                conn.query_row("SELECT name FROM destinations WHERE slug = 'nowhere'", [], |row| {
                    row.get::<_, String>(0)
                })
            })
            .await
            .expect_err("no such row");

        assert_eq!(err.fault(), StoreFault::NotFound);
    }

    #[tokio::test]
    async fn run_async_applies_store_classification() {
        let (db, sleeper) = database_with_recorder().await;

        let outcome: Result<(), StoreError> = db
            .run_async(OperationKind::Upsert, |_| async {
                Err(StoreError::from_code("ECONNRESET", "socket hang up"))
            })
            .await;

        assert_eq!(outcome.expect_err("exhausted").fault(), StoreFault::ConnectionReset);
        assert_eq!(sleeper.recorded().len(), 2);
    }

    #[tokio::test]
    async fn per_call_overrides_limit_attempts() {
        let (db, sleeper) = database_with_recorder().await;
        let overrides = RetryOverrides { retries: Some(1), ..RetryOverrides::default() };

        let err = db
            .run_with(OperationKind::PointRead, &overrides, |_conn| {
                Err::<(), _>(StoreError::from_code("P1001", "Can't reach database server"))
            })
            .await
            .expect_err("single attempt");

        assert_eq!(err.fault(), StoreFault::ConnectionError);
        assert!(sleeper.recorded().is_empty());
    }

    /// Validates that a statement overrunning its per-attempt timeout is
    /// interrupted and releases the single pooled connection.
    ///
    /// Assertions:
    /// - Both attempts time out and surface `OperationTimedOut`
    /// - The error carries the `ATTEMPT_TIMEOUT` code
    /// - The connection is usable straight after the call returns
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn attempt_timeout_interrupts_running_statement() {
        let sleeper = RecordingSleeper::new();
        let policy = RetryPolicy::database()
            .to_builder()
            .max_attempts(2)
            .per_attempt_timeout(Duration::from_millis(100))
            .build()
            .expect("valid policy");
        let db = Database::builder()
            .policy(policy)
            .sleeper(Arc::new(sleeper.clone()))
            .build()
            .expect("database created");

        let outcome = db
            .run_with_outcome(OperationKind::RawQuery, |conn| {
                conn.query_row(
                    "WITH RECURSIVE counter(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM counter) \
                     SELECT count(*) FROM counter",
                    [],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await;

        assert_eq!(outcome.attempts, 2);
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1)]);
        let err = outcome.result.expect_err("unbounded query must time out");
        assert_eq!(err.fault(), StoreFault::OperationTimedOut);
        assert_eq!(err.code(), Some("ATTEMPT_TIMEOUT"));

        tokio::time::timeout(Duration::from_secs(2), db.health_check())
            .await
            .expect("connection released after interrupt")
            .expect("health check passed");
    }

    #[test]
    fn write_kinds_are_flagged() {
        assert!(OperationKind::Write.is_write());
        assert!(OperationKind::Upsert.is_write());
        assert!(!OperationKind::PointRead.is_write());
        assert!(!OperationKind::Count.is_write());
        assert_eq!(OperationKind::BulkRead.as_str(), "bulk_read");
    }
}
