use std::time::Duration;

use crate::connector::{Connector, ConnectorOptions};
use crate::error::ConnectorError;
use crate::pool::DbPool;
use crate::types::DatabaseType;

use super::manager::SqliteManager;

/// Options for opening a `SQLite` database.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Switch the database to write-ahead logging on first connect.
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: Duration::from_secs(5),
            wal: true,
        }
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }
}

/// Fluent builder for a `SQLite` connector.
#[derive(Debug, Clone)]
pub struct SqliteConnectorBuilder {
    opts: SqliteOptions,
    connector: ConnectorOptions,
}

impl SqliteConnectorBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
            connector: ConnectorOptions::default(),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.opts.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.connector.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connector.connection_timeout = timeout;
        self
    }

    /// Upper bound applied to every statement run through this connector.
    #[must_use]
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.connector.statement_timeout = Some(timeout);
        self
    }

    /// Build the pool and wrap it in a [`Connector`].
    ///
    /// # Errors
    /// Returns `ConnectorError` if the database cannot be opened.
    pub async fn build(self) -> Result<Connector, ConnectorError> {
        Connector::new_sqlite(self.opts, self.connector).await
    }
}

impl Connector {
    #[must_use]
    pub fn sqlite_builder(db_path: impl Into<String>) -> SqliteConnectorBuilder {
        SqliteConnectorBuilder::new(db_path)
    }

    /// Open a pooled `SQLite` connector.
    ///
    /// A `:memory:` database is limited to one connection, so an `invoke`
    /// nested inside a `read` fails fast there instead of waiting for a
    /// second checkout.
    ///
    /// # Errors
    /// Returns `ConnectorError::Config` for an empty path and
    /// `ConnectorError::Sqlite` if the first connection cannot be opened.
    pub async fn new_sqlite(
        opts: SqliteOptions,
        connector: ConnectorOptions,
    ) -> Result<Self, ConnectorError> {
        if opts.db_path.trim().is_empty() {
            return Err(ConnectorError::Config("db_path is required".to_string()));
        }
        // every connection to ":memory:" opens its own private database
        let max_size = if opts.db_path == ":memory:" {
            1
        } else {
            connector.max_connections
        };
        let pool = bb8::Pool::builder()
            .max_size(max_size)
            .connection_timeout(connector.connection_timeout)
            .build(SqliteManager::new(opts))
            .await?;
        Ok(Connector::from_pool_with(
            DbPool::Sqlite(pool),
            DatabaseType::Sqlite,
            Some(max_size),
            connector.statement_timeout,
        ))
    }
}
