pub mod connection;

pub use connection::DbConn;

#[cfg(feature = "postgres")]
use crate::postgres::PgManager;
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteManager;

use crate::error::ConnectorError;

/// Connection pool for the configured store.
///
/// This is the only state shared between requests; checkout and checkin are
/// handled by `bb8`.
#[derive(Clone)]
pub enum DbPool {
    #[cfg(feature = "postgres")]
    Postgres(bb8::Pool<PgManager>),
    #[cfg(feature = "sqlite")]
    Sqlite(bb8::Pool<SqliteManager>),
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "postgres")]
            Self::Postgres(pool) => f
                .debug_tuple("Postgres")
                .field(&pool.state().connections)
                .finish(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(pool) => f
                .debug_tuple("Sqlite")
                .field(&pool.state().connections)
                .finish(),
        }
    }
}

impl DbPool {
    /// Check out a connection; it returns to the pool when dropped.
    ///
    /// # Errors
    /// Returns `ConnectorError::Pool` if no connection can be obtained in time.
    pub async fn checkout(&self) -> Result<DbConn, ConnectorError> {
        match self {
            #[cfg(feature = "postgres")]
            DbPool::Postgres(pool) => Ok(DbConn::Postgres(pool.get_owned().await?)),
            #[cfg(feature = "sqlite")]
            DbPool::Sqlite(pool) => Ok(DbConn::Sqlite(pool.get_owned().await?)),
        }
    }
}
