use std::future::Future;

use bb8::ManageConnection;
use tokio_postgres::{Client, NoTls};

/// bb8 manager for Postgres clients.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
}

impl PgManager {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.config.clone();
        async move {
            let (client, connection) = cfg.connect(NoTls).await?;
            tracing::debug!(db = ?cfg.get_dbname(), "opened postgres connection");
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection task ended with error");
                }
            });
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}
