use thiserror::Error;

/// Failure while rendering a `${name}` template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("no value supplied for placeholder `{name}`")]
    MissingValue { name: String },

    #[error("unterminated placeholder starting at byte {offset}")]
    Unterminated { offset: usize },

    #[error("invalid placeholder name `{name}` at byte {offset}")]
    InvalidName { name: String, offset: usize },
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("query returned no rows")]
    NoRows,

    #[error("decode error: {0}")]
    Decode(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("statement issued on a context with no bound executor")]
    Unbound,

    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    Timeout,

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("pool error: {0}")]
    Pool(String),

    #[error("SQL execution error: {0}")]
    Execution(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ConnectorError {
    /// True when the store rejected a write because of a unique constraint.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            #[cfg(feature = "postgres")]
            ConnectorError::Postgres(err) => {
                err.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION)
            }
            #[cfg(feature = "sqlite")]
            ConnectorError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.extended_code,
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ),
            _ => false,
        }
    }

    /// True for errors that mean "nothing matched" rather than a failure.
    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        matches!(self, ConnectorError::NoRows)
    }
}

impl From<serde_json::Error> for ConnectorError {
    fn from(err: serde_json::Error) -> Self {
        ConnectorError::Decode(err.to_string())
    }
}

impl<E: std::fmt::Display> From<bb8::RunError<E>> for ConnectorError {
    fn from(err: bb8::RunError<E>) -> Self {
        match err {
            bb8::RunError::User(e) => ConnectorError::Pool(format!("checkout failed: {e}")),
            bb8::RunError::TimedOut => {
                ConnectorError::Pool("timed out waiting for a pooled connection".into())
            }
        }
    }
}
