use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::context::Ctx;
use crate::error::ConnectorError;
use crate::pool::DbPool;
use crate::template::{Params, PlaceholderStyle, Rendered, render};
use crate::transaction::Tx;
use crate::types::DatabaseType;

/// Pool and timeout settings shared by every backend builder.
#[derive(Debug, Clone)]
pub struct ConnectorOptions {
    pub max_connections: u32,
    /// How long a checkout waits for a free connection.
    pub connection_timeout: Duration,
    /// Per-statement limit; a context's own deadline still applies when earlier.
    pub statement_timeout: Option<Duration>,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout: Duration::from_secs(30),
            statement_timeout: None,
        }
    }
}

/// Counter snapshot returned by [`Connector::stats`].
///
/// Every begun transaction ends exactly once, so once all work has finished
/// `begun == committed + rolled_back`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectorStats {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
    /// `invoke` calls that ran inside an already bound transaction.
    pub joined: u64,
    /// `read` calls that checked out their own autocommit connection.
    pub reads: u64,
}

#[derive(Default)]
struct Counters {
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    joined: AtomicU64,
    reads: AtomicU64,
    next_tx_id: AtomicU64,
}

struct Inner {
    pool: DbPool,
    db_type: DatabaseType,
    max_connections: Option<u32>,
    statement_timeout: Option<Duration>,
    counters: Counters,
}

/// Entry point for running units of work against one store.
///
/// Cloning is cheap; clones share the pool and the counters.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("db_type", &self.inner.db_type)
            .field("pool", &self.inner.pool)
            .finish_non_exhaustive()
    }
}

impl Connector {
    #[must_use]
    pub fn from_pool(pool: DbPool, db_type: DatabaseType) -> Self {
        Self::from_pool_with(pool, db_type, None, None)
    }

    pub(crate) fn from_pool_with(
        pool: DbPool,
        db_type: DatabaseType,
        max_connections: Option<u32>,
        statement_timeout: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                db_type,
                max_connections,
                statement_timeout,
                counters: Counters::default(),
            }),
        }
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.inner.db_type
    }

    #[must_use]
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        self.inner.db_type.placeholder_style()
    }

    /// Render a `${name}` template for this connector's backend.
    ///
    /// # Errors
    /// Returns `ConnectorError::Template` for a missing value or bad placeholder.
    pub fn render(&self, template: &str, params: &Params) -> Result<Rendered, ConnectorError> {
        Ok(render(template, params, self.placeholder_style())?)
    }

    #[must_use]
    pub fn stats(&self) -> ConnectorStats {
        let c = &self.inner.counters;
        ConnectorStats {
            begun: c.begun.load(Ordering::Relaxed),
            committed: c.committed.load(Ordering::Relaxed),
            rolled_back: c.rolled_back.load(Ordering::Relaxed),
            joined: c.joined.load(Ordering::Relaxed),
            reads: c.reads.load(Ordering::Relaxed),
        }
    }

    /// Run a unit of work inside a transaction.
    ///
    /// If `ctx` already has a transaction bound, `work` runs inside it and its
    /// result is returned unchanged; the outermost `invoke` decides the outcome.
    /// Otherwise a connection is checked out, a transaction begun and bound into
    /// the context handed to `work`. `Ok` commits and `Err` rolls back. A failed
    /// rollback is logged and the unit's own error is returned.
    ///
    /// Inside a [`read`](Self::read) the bound connection is autocommit, so the
    /// transaction needs a second connection while the read still holds its
    /// own. On a single-connection pool that checkout could never succeed and
    /// fails at once with `ConnectorError::Pool`; otherwise size the pool for
    /// the extra connection.
    ///
    /// # Errors
    /// The unit's error, or `ConnectorError` converted into `E` when checkout,
    /// begin, or commit fails.
    pub async fn invoke<T, E, F>(&self, ctx: &mut Ctx<'_>, work: F) -> Result<T, E>
    where
        E: From<ConnectorError>,
        F: AsyncFnOnce(Ctx<'_>) -> Result<T, E>,
    {
        let counters = &self.inner.counters;
        if let Some(id) = ctx.lookup().map(|tx| tx.id()) {
            tracing::trace!(tx = id, "joining bound transaction");
            counters.joined.fetch_add(1, Ordering::Relaxed);
            return work(ctx.reborrow()).await;
        }

        if ctx.is_bound() && self.inner.max_connections == Some(1) {
            return Err(ConnectorError::Pool(
                "invoke inside read needs a second connection, but the pool holds one".into(),
            )
            .into());
        }
        let conn = ctx.guard(self.inner.pool.checkout()).await?;
        let id = counters.next_tx_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut tx = Tx::begin(conn, id).await?;
        counters.begun.fetch_add(1, Ordering::Relaxed);

        let result = work(
            ctx.bind(&mut tx)
                .with_statement_timeout(self.inner.statement_timeout),
        )
        .await;

        match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    counters.committed.fetch_add(1, Ordering::Relaxed);
                    Ok(value)
                }
                Err(err) => {
                    counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                    Err(err.into())
                }
            },
            Err(err) => {
                counters.rolled_back.fetch_add(1, Ordering::Relaxed);
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(tx = id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Run read-only work.
    ///
    /// Joins whatever executor `ctx` has bound. With nothing bound, the work
    /// runs on an autocommit connection without a transaction.
    ///
    /// # Errors
    /// The unit's error, or a checkout failure converted into `E`.
    pub async fn read<T, E, F>(&self, ctx: &mut Ctx<'_>, work: F) -> Result<T, E>
    where
        E: From<ConnectorError>,
        F: AsyncFnOnce(Ctx<'_>) -> Result<T, E>,
    {
        if ctx.is_bound() {
            return work(ctx.reborrow()).await;
        }
        let mut conn = ctx.guard(self.inner.pool.checkout()).await?;
        self.inner.counters.reads.fetch_add(1, Ordering::Relaxed);
        work(
            ctx.bind_conn(&mut conn)
                .with_statement_timeout(self.inner.statement_timeout),
        )
        .await
    }

    /// Run a parameterless multi-statement script on its own connection.
    ///
    /// # Errors
    /// Returns the store's error unchanged.
    pub async fn batch(&self, sql: &str) -> Result<(), ConnectorError> {
        let mut conn = self.inner.pool.checkout().await?;
        conn.batch(sql).await
    }
}
