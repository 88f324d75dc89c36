use std::str::FromStr;
use std::time::Duration;

use crate::connector::{Connector, ConnectorOptions};
use crate::error::ConnectorError;
use crate::pool::DbPool;
use crate::types::DatabaseType;

use super::manager::PgManager;

/// Options for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub config: tokio_postgres::Config,
}

impl PostgresOptions {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Parse a `postgres://` URL or a `key=value` connection string.
    ///
    /// # Errors
    /// Returns `ConnectorError::Config` if the string does not parse.
    pub fn from_url(url: &str) -> Result<Self, ConnectorError> {
        let config = tokio_postgres::Config::from_str(url)
            .map_err(|e| ConnectorError::Config(format!("invalid postgres url: {e}")))?;
        Ok(Self { config })
    }

    fn validate(&self) -> Result<(), ConnectorError> {
        if self.config.get_hosts().is_empty() {
            return Err(ConnectorError::Config("host is required".to_string()));
        }
        if self.config.get_dbname().is_none() {
            return Err(ConnectorError::Config("dbname is required".to_string()));
        }
        if self.config.get_user().is_none() {
            return Err(ConnectorError::Config("user is required".to_string()));
        }
        Ok(())
    }
}

/// Fluent builder for a Postgres connector.
#[derive(Debug, Clone)]
pub struct PostgresConnectorBuilder {
    opts: PostgresOptions,
    connector: ConnectorOptions,
}

impl PostgresConnectorBuilder {
    #[must_use]
    pub fn new(opts: PostgresOptions) -> Self {
        Self {
            opts,
            connector: ConnectorOptions::default(),
        }
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
    /// Returns `ConnectorError` if the options are incomplete or the pool cannot be built.
    pub async fn build(self) -> Result<Connector, ConnectorError> {
        Connector::new_postgres(self.opts, self.connector).await
    }
}

impl Connector {
    #[must_use]
    pub fn postgres_builder(opts: PostgresOptions) -> PostgresConnectorBuilder {
        PostgresConnectorBuilder::new(opts)
    }

    /// Create a pooled Postgres connector.
    ///
    /// # Errors
    /// Returns `ConnectorError::Config` if host, dbname or user are missing and
    /// `ConnectorError::Postgres` if the pool cannot be created.
    pub async fn new_postgres(
        opts: PostgresOptions,
        connector: ConnectorOptions,
    ) -> Result<Self, ConnectorError> {
        opts.validate()?;
        let pool = bb8::Pool::builder()
            .max_size(connector.max_connections)
            .connection_timeout(connector.connection_timeout)
            .build(PgManager::new(opts.config))
            .await?;
        Ok(Connector::from_pool_with(
            DbPool::Postgres(pool),
            DatabaseType::Postgres,
            Some(connector.max_connections),
            connector.statement_timeout,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_parsing_and_validation() {
        let opts = PostgresOptions::from_url("postgres://app@localhost:5432/exchange").unwrap();
        assert!(opts.validate().is_ok());

        let no_db = PostgresOptions::from_url("host=localhost user=app").unwrap();
        assert!(matches!(no_db.validate(), Err(ConnectorError::Config(_))));

        assert!(PostgresOptions::from_url("postgres://[bad").is_err());
    }
}
