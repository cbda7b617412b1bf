use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel::{Connection, RunQueryDsl};

use crate::error::Error;

/// Connection-pool tuning knobs, forwarded opaquely from the orchestrator's
/// construction parameters (spec.md §4.4's `pool_size`, `max_overflow`,
/// `pool_timeout`, `pool_recycle`).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Base number of pooled connections (maps to r2d2's `min_idle`).
    pub pool_size: u32,
    /// Extra connections allowed beyond `pool_size` (maps to r2d2's `max_size`).
    pub max_overflow: u32,
    /// How long to wait for a free connection before giving up.
    pub pool_timeout: Duration,
    /// How long an idle connection may sit in the pool before being recycled.
    pub pool_recycle: Duration,
}

impl Default for PoolConfig {
    fn default() -> PoolConfig {
        PoolConfig {
            pool_size: 5,
            max_overflow: 5,
            pool_timeout: Duration::from_secs(30),
            pool_recycle: Duration::from_secs(1800),
        }
    }
}

#[derive(Debug)]
struct EnableForeignKeys;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for EnableForeignKeys {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query("PRAGMA foreign_keys = ON;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        // WAL lets readers proceed while a writer holds the lock, and the
        // busy timeout makes a writer wait out a concurrent writer instead of
        // failing immediately with `SQLITE_BUSY` — both load-bearing once
        // `insert_children` calls from concurrent hops land on separate
        // pooled connections against the same file (spec.md §4.2's
        // per-transaction atomicity guarantee otherwise starves under
        // `max_concurrency` fan-out).
        diesel::sql_query("PRAGMA journal_mode = WAL;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        diesel::sql_query("PRAGMA busy_timeout = 30000;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        Ok(())
    }
}

/// Owns the connection pool and dispatches blocking Diesel calls onto a
/// background thread, the same "submit a closure over a pooled connection"
/// shape as alexandrie's `Repo::run`.
#[derive(Clone)]
pub struct Repo {
    pool: Pool<ConnectionManager<SqliteConnection>>,
    next_seq: Arc<AtomicI64>,
}

impl Repo {
    /// Builds a pool for the given SQLite connection string.
    pub fn new(connection_string: &str, config: &PoolConfig) -> Result<Repo, Error> {
        let manager = ConnectionManager::<SqliteConnection>::new(connection_string);
        let pool = Pool::builder()
            .min_idle(Some(config.pool_size))
            .max_size(config.pool_size + config.max_overflow)
            .connection_timeout(config.pool_timeout)
            .idle_timeout(Some(config.pool_recycle))
            .connection_customizer(Box::new(EnableForeignKeys))
            .build(manager)?;
        Ok(Repo {
            pool,
            next_seq: Arc::new(AtomicI64::new(0)),
        })
    }

    /// The next monotonic sequence number, used to order `children` reads by
    /// creation time without an independently-maintained column.
    pub fn next_seq(&self) -> i64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Advances the in-process sequence counter so freshly assigned values
    /// stay above `high_water_mark` (the highest `seq` already persisted).
    /// Called once at startup so documents inserted after a process restart
    /// don't undercut rows from a previous run (invariant I2).
    pub fn seed_next_seq(&self, high_water_mark: i64) {
        self.next_seq.fetch_max(high_water_mark + 1, Ordering::SeqCst);
    }

    /// Runs a blocking closure over a pooled connection on a background thread.
    pub async fn run<F, R>(&self, f: F) -> Result<R, Error>
    where
        F: FnOnce(&SqliteConnection) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        let pool = self.pool.clone();
        async_std::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
    }

    /// Releases the pool's connections. Idempotent: r2d2 pools tear down on
    /// drop, so this exists to give callers an explicit `Dispose()` moment
    /// per spec.md §6, mirroring `alexandrie-storage`'s `Store`/`Storage`
    /// lifecycle.
    pub async fn dispose(&self) {
        // Nothing to await: dropping the last clone of `self.pool` releases
        // the underlying connections. Kept as an explicit async method so
        // the orchestrator's `Dispose()` has a single, idempotent place to
        // call regardless of the backend.
    }
}
