use crate::error::ConnectorError;
use crate::pool::DbConn;
use crate::results::ResultSet;
use crate::template::Rendered;

/// One open transaction on one pooled connection.
///
/// A handle ends exactly once, by [`Tx::commit`] or [`Tx::rollback`]. A handle
/// dropped before either is rolled back on a background task, and its
/// connection returns to the pool afterwards.
#[derive(Debug)]
pub struct Tx {
    conn: Option<DbConn>,
    id: u64,
}

impl Tx {
    /// Issue `BEGIN` on `conn` and take ownership of it.
    ///
    /// # Errors
    /// Returns `ConnectorError::Transaction` if the store refuses to begin.
    pub(crate) async fn begin(mut conn: DbConn, id: u64) -> Result<Self, ConnectorError> {
        conn.begin()
            .await
            .map_err(|e| ConnectorError::Transaction(format!("begin failed: {e}")))?;
        tracing::debug!(tx = id, db = ?conn.database_type(), "transaction begun");
        Ok(Self {
            conn: Some(conn),
            id,
        })
    }

    /// Connector-local sequence number, for log correlation.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn conn_mut(&mut self) -> Result<&mut DbConn, ConnectorError> {
        self.conn
            .as_mut()
            .ok_or_else(|| ConnectorError::Transaction("transaction already completed".into()))
    }

    /// Run a row-returning statement inside the transaction.
    ///
    /// # Errors
    /// Returns the store's error unchanged.
    pub async fn query(&mut self, rendered: &Rendered) -> Result<ResultSet, ConnectorError> {
        self.conn_mut()?.query(rendered).await
    }

    /// Run a statement inside the transaction and return the affected row count.
    ///
    /// # Errors
    /// Returns the store's error unchanged.
    pub async fn execute(&mut self, rendered: &Rendered) -> Result<usize, ConnectorError> {
        self.conn_mut()?.execute(rendered).await
    }

    /// # Errors
    /// Returns `ConnectorError::Transaction` if the commit fails; the
    /// transaction is rolled back in that case.
    pub async fn commit(mut self) -> Result<(), ConnectorError> {
        let id = self.id;
        let conn = self.conn_mut()?;
        match conn.commit().await {
            Ok(()) => {
                tracing::debug!(tx = id, "transaction committed");
                self.conn = None;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = conn.rollback().await {
                    tracing::warn!(tx = id, error = %rollback_err, "rollback after failed commit failed");
                }
                self.conn = None;
                Err(ConnectorError::Transaction(format!("commit failed: {err}")))
            }
        }
    }

    /// # Errors
    /// Returns the store's error if `ROLLBACK` fails.
    pub async fn rollback(mut self) -> Result<(), ConnectorError> {
        let id = self.id;
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| ConnectorError::Transaction("transaction already completed".into()))?;
        conn.rollback().await?;
        tracing::debug!(tx = id, "transaction rolled back");
        Ok(())
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if let Some(mut conn) = self.conn.take()
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            let id = self.id;
            handle.spawn(async move {
                if let Err(err) = conn.rollback().await {
                    tracing::warn!(tx = id, error = %err, "rollback of dropped transaction failed");
                }
            });
        }
    }
}
