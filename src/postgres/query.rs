use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use tokio_postgres::types::Type;
use tokio_postgres::{CancelToken, Client, NoTls, Statement};

use crate::error::ConnectorError;
use crate::results::ResultSet;
use crate::template::Rendered;
use crate::types::SqlValue;

use super::params::as_refs;

/// Extract column `idx` of a row as a [`SqlValue`].
///
/// # Errors
/// Returns `ConnectorError::Postgres` if the column cannot be read as the type
/// the server reported.
pub fn extract_value(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue, ConnectorError> {
    let ty = row.columns()[idx].type_();
    let value = match *ty {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Float(f64::from(v))),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Float),
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string())),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<JsonValue>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Json),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Blob),
        _ => row
            .try_get::<_, Option<String>>(idx)?
            .map_or(SqlValue::Null, SqlValue::Text),
    };
    Ok(value)
}

/// Build a result set using statement metadata for column names, so an empty
/// result still reports its columns.
///
/// # Errors
/// Returns errors from value extraction.
pub fn build_result_set(
    stmt: &Statement,
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, ConnectorError> {
    let columns: Vec<String> = stmt
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let col_count = columns.len();
    let mut result_set = ResultSet::with_capacity(columns, rows.len());
    for row in rows {
        let mut values = Vec::with_capacity(col_count);
        for idx in 0..col_count {
            values.push(extract_value(row, idx)?);
        }
        result_set.push_row(values);
    }
    Ok(result_set)
}

/// Sends a cancel request for the running statement if the awaiting future
/// is dropped first. Dropping a `tokio-postgres` future alone leaves the
/// statement running on the server and the connection busy.
struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    fn new(client: &Client) -> Self {
        Self {
            token: Some(client.cancel_token()),
        }
    }

    fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                match token.cancel_query(NoTls).await {
                    Ok(()) => tracing::debug!("cancelled abandoned postgres statement"),
                    Err(e) => tracing::warn!(error = %e, "postgres cancel request failed"),
                }
            });
        }
    }
}

pub(crate) async fn query(client: &Client, rendered: &Rendered) -> Result<ResultSet, ConnectorError> {
    let guard = CancelOnDrop::new(client);
    let res = async {
        let stmt = client.prepare(&rendered.sql).await?;
        let rows = client.query(&stmt, &as_refs(&rendered.args)).await?;
        Ok::<_, tokio_postgres::Error>((stmt, rows))
    }
    .await;
    guard.disarm();
    let (stmt, rows) = res?;
    build_result_set(&stmt, &rows)
}

pub(crate) async fn execute(client: &Client, rendered: &Rendered) -> Result<usize, ConnectorError> {
    let guard = CancelOnDrop::new(client);
    let affected = client
        .execute(rendered.sql.as_str(), &as_refs(&rendered.args))
        .await;
    guard.disarm();
    usize::try_from(affected?).map_err(|e| {
        ConnectorError::Execution(format!("postgres affected rows conversion error: {e}"))
    })
}

pub(crate) async fn batch(client: &Client, sql: &str) -> Result<(), ConnectorError> {
    let guard = CancelOnDrop::new(client);
    let res = client.batch_execute(sql).await;
    guard.disarm();
    res?;
    Ok(())
}
