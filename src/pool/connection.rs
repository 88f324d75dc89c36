use bb8::PooledConnection;

#[cfg(feature = "postgres")]
use crate::postgres::{self, PgManager};
#[cfg(feature = "sqlite")]
use crate::sqlite::{self, SqliteManager};

use crate::error::ConnectorError;
use crate::results::ResultSet;
use crate::template::Rendered;
use crate::types::DatabaseType;

/// A pooled connection, independent of backend.
///
/// Outside a [`Tx`](crate::Tx) every statement auto-commits.
pub enum DbConn {
    #[cfg(feature = "postgres")]
    Postgres(PooledConnection<'static, PgManager>),
    #[cfg(feature = "sqlite")]
    Sqlite(PooledConnection<'static, SqliteManager>),
}

impl std::fmt::Debug for DbConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DbConn").field(&self.database_type()).finish()
    }
}

impl DbConn {
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            #[cfg(feature = "postgres")]
            DbConn::Postgres(_) => DatabaseType::Postgres,
            #[cfg(feature = "sqlite")]
            DbConn::Sqlite(_) => DatabaseType::Sqlite,
        }
    }

    /// Run a statement that returns rows.
    ///
    /// # Errors
    /// Returns the store's error unchanged.
    pub async fn query(&mut self, rendered: &Rendered) -> Result<ResultSet, ConnectorError> {
        tracing::trace!(sql = %rendered.sql, args = rendered.args.len(), "query");
        match self {
            #[cfg(feature = "postgres")]
            DbConn::Postgres(client) => postgres::query::query(client, rendered).await,
            #[cfg(feature = "sqlite")]
            DbConn::Sqlite(conn) => sqlite::query::query(conn, rendered).await,
        }
    }

    /// Run a statement and return the number of rows it changed.
    ///
    /// # Errors
    /// Returns the store's error unchanged.
    pub async fn execute(&mut self, rendered: &Rendered) -> Result<usize, ConnectorError> {
        tracing::trace!(sql = %rendered.sql, args = rendered.args.len(), "execute");
        match self {
            #[cfg(feature = "postgres")]
            DbConn::Postgres(client) => postgres::query::execute(client, rendered).await,
            #[cfg(feature = "sqlite")]
            DbConn::Sqlite(conn) => sqlite::query::execute(conn, rendered).await,
        }
    }

    /// Run a multi-statement script without parameters.
    ///
    /// # Errors
    /// Returns the store's error unchanged.
    pub async fn batch(&mut self, sql: &str) -> Result<(), ConnectorError> {
        match self {
            #[cfg(feature = "postgres")]
            DbConn::Postgres(client) => postgres::query::batch(client, sql).await,
            #[cfg(feature = "sqlite")]
            DbConn::Sqlite(conn) => sqlite::query::batch(conn, sql).await,
        }
    }

    pub(crate) async fn begin(&mut self) -> Result<(), ConnectorError> {
        match self {
            #[cfg(feature = "postgres")]
            DbConn::Postgres(client) => postgres::query::batch(client, "BEGIN").await,
            #[cfg(feature = "sqlite")]
            DbConn::Sqlite(conn) => sqlite::query::begin(conn).await,
        }
    }

    pub(crate) async fn commit(&mut self) -> Result<(), ConnectorError> {
        match self {
            #[cfg(feature = "postgres")]
            DbConn::Postgres(client) => postgres::query::batch(client, "COMMIT").await,
            #[cfg(feature = "sqlite")]
            DbConn::Sqlite(conn) => sqlite::query::commit(conn).await,
        }
    }

    pub(crate) async fn rollback(&mut self) -> Result<(), ConnectorError> {
        match self {
            #[cfg(feature = "postgres")]
            DbConn::Postgres(client) => postgres::query::batch(client, "ROLLBACK").await,
            #[cfg(feature = "sqlite")]
            DbConn::Sqlite(conn) => sqlite::query::rollback(conn).await,
        }
    }
}
