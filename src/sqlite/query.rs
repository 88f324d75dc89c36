use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rusqlite::{Statement, params_from_iter};

use crate::error::ConnectorError;
use crate::results::ResultSet;
use crate::template::Rendered;

use super::manager::SqliteConnection;
use super::params::{convert_args, from_sqlite_value};

/// Interrupts the connection if the awaiting future is dropped before the
/// blocking work finishes (deadline, cancellation or a caller giving up).
struct InterruptOnDrop {
    conn: SqliteConnection,
    abandoned: Arc<AtomicBool>,
    armed: bool,
}

impl InterruptOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.abandoned.store(true, Ordering::Release);
            self.conn.interrupt();
            tracing::debug!("interrupted abandoned sqlite statement");
        }
    }
}

/// Run synchronous `rusqlite` work on a blocking thread.
///
/// Dropping the returned future interrupts the statement, so the mutex (and
/// with it the pooled connection) is released promptly.
pub(crate) async fn run_blocking<F, R>(
    conn: &SqliteConnection,
    func: F,
) -> Result<R, ConnectorError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, ConnectorError> + Send + 'static,
    R: Send + 'static,
{
    let shared = Arc::clone(&conn.conn);
    let abandoned = Arc::new(AtomicBool::new(false));
    let guard = InterruptOnDrop {
        conn: conn.clone(),
        abandoned: Arc::clone(&abandoned),
        armed: true,
    };
    let res = tokio::task::spawn_blocking(move || {
        let mut conn = shared.blocking_lock();
        // an interrupt only reaches statements already running
        if abandoned.load(Ordering::Acquire) {
            return Err(ConnectorError::Execution(
                "sqlite work abandoned before it started".into(),
            ));
        }
        func(&mut conn)
    })
    .await;
    guard.disarm();
    res.map_err(|e| ConnectorError::Execution(format!("sqlite spawn_blocking join error: {e}")))?
}

/// Materialize every row the statement yields.
///
/// # Errors
/// Returns `ConnectorError::Sqlite` if execution or row reads fail.
pub fn build_result_set(
    stmt: &mut Statement<'_>,
    args: &[rusqlite::types::Value],
) -> Result<ResultSet, ConnectorError> {
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = columns.len();
    let mut result_set = ResultSet::new(columns);

    let mut rows = stmt.query(params_from_iter(args.iter()))?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(col_count);
        for idx in 0..col_count {
            values.push(from_sqlite_value(row.get(idx)?));
        }
        result_set.push_row(values);
    }
    Ok(result_set)
}

pub(crate) async fn query(
    conn: &SqliteConnection,
    rendered: &Rendered,
) -> Result<ResultSet, ConnectorError> {
    let sql = rendered.sql.clone();
    let args = convert_args(&rendered.args);
    run_blocking(conn, move |guard| {
        let mut stmt = guard.prepare_cached(&sql)?;
        build_result_set(&mut stmt, &args)
    })
    .await
}

pub(crate) async fn execute(
    conn: &SqliteConnection,
    rendered: &Rendered,
) -> Result<usize, ConnectorError> {
    let sql = rendered.sql.clone();
    let args = convert_args(&rendered.args);
    run_blocking(conn, move |guard| {
        let mut stmt = guard.prepare_cached(&sql)?;
        Ok(stmt.execute(params_from_iter(args.iter()))?)
    })
    .await
}

pub(crate) async fn batch(conn: &SqliteConnection, sql: &str) -> Result<(), ConnectorError> {
    let sql = sql.to_owned();
    run_blocking(conn, move |guard| Ok(guard.execute_batch(&sql)?)).await
}

/// `BEGIN IMMEDIATE` takes the write lock up front, so two writers queue on the
/// busy timeout instead of deadlocking on a lock upgrade.
pub(crate) async fn begin(conn: &SqliteConnection) -> Result<(), ConnectorError> {
    batch(conn, "BEGIN IMMEDIATE").await
}

/// Commit; if the commit itself fails the transaction is still open, so it is
/// rolled back before the connection goes back to the pool.
pub(crate) async fn commit(conn: &SqliteConnection) -> Result<(), ConnectorError> {
    run_blocking(conn, |guard| match guard.execute_batch("COMMIT") {
        Ok(()) => Ok(()),
        Err(err) => {
            if !guard.is_autocommit() {
                let _ = guard.execute_batch("ROLLBACK");
            }
            Err(ConnectorError::Sqlite(err))
        }
    })
    .await
}

pub(crate) async fn rollback(conn: &SqliteConnection) -> Result<(), ConnectorError> {
    run_blocking(conn, |guard| {
        if guard.is_autocommit() {
            // the engine already rolled back (e.g. after SQLITE_FULL)
            return Ok(());
        }
        Ok(guard.execute_batch("ROLLBACK")?)
    })
    .await
}
