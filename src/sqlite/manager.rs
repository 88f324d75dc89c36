use std::future::Future;
use std::sync::Arc;

use bb8::ManageConnection;
use rusqlite::InterruptHandle;
use tokio::sync::Mutex;

use crate::error::ConnectorError;

use super::config::SqliteOptions;

/// Pooled `SQLite` handle. The mutex lets blocking work run on a
/// `spawn_blocking` thread while the pool keeps ownership; the interrupt
/// handle aborts that work from the async side without taking the mutex.
#[derive(Clone)]
pub struct SqliteConnection {
    pub(crate) conn: Arc<Mutex<rusqlite::Connection>>,
    pub(crate) interrupt: Arc<InterruptHandle>,
}

impl SqliteConnection {
    fn new(conn: rusqlite::Connection) -> Self {
        let interrupt = Arc::new(conn.get_interrupt_handle());
        Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        }
    }

    /// Abort whatever statement is running on this connection.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}

/// bb8 manager for `rusqlite` connections.
pub struct SqliteManager {
    opts: SqliteOptions,
}

impl SqliteManager {
    #[must_use]
    pub fn new(opts: SqliteOptions) -> Self {
        Self { opts }
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SqliteConnection;
    type Error = ConnectorError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let opts = self.opts.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || {
                let conn = rusqlite::Connection::open(&opts.db_path)?;
                conn.busy_timeout(opts.busy_timeout)?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")?;
                if opts.wal {
                    // journal_mode returns a row, so it cannot go through execute_batch
                    conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
                }
                tracing::debug!(path = %opts.db_path, "opened sqlite connection");
                Ok::<_, rusqlite::Error>(conn)
            })
            .await
            .map_err(|e| ConnectorError::Execution(format!("sqlite connect join error: {e}")))??;
            Ok(SqliteConnection::new(conn))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let conn = conn.clone();
        async move {
            super::query::run_blocking(&conn, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(ConnectorError::Sqlite)
            })
            .await
        }
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
