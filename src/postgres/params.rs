use std::error::Error;

use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::types::SqlValue;

/// Borrow positional arguments in the shape `tokio-postgres` expects.
#[must_use]
pub fn as_refs(args: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    args.iter().map(|a| a as &(dyn ToSql + Sync)).collect()
}

fn mismatch(value: &SqlValue, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot bind {} value to postgres {ty} parameter", value.kind()).into()
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match (self, ty) {
            (SqlValue::Null, _) => Ok(IsNull::Yes),
            // narrow to the width the server inferred for the parameter
            (SqlValue::Int(i), &Type::INT2) => i16::try_from(*i)?.to_sql(ty, out),
            (SqlValue::Int(i), &Type::INT4) => i32::try_from(*i)?.to_sql(ty, out),
            (SqlValue::Int(i), &Type::INT8) => i.to_sql(ty, out),
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
            (SqlValue::Int(i), &Type::FLOAT4) => (*i as f32).to_sql(ty, out),
            #[allow(clippy::cast_precision_loss)]
            (SqlValue::Int(i), &Type::FLOAT8) => (*i as f64).to_sql(ty, out),
            #[allow(clippy::cast_possible_truncation)]
            (SqlValue::Float(f), &Type::FLOAT4) => (*f as f32).to_sql(ty, out),
            (SqlValue::Float(f), &Type::FLOAT8) => f.to_sql(ty, out),
            (SqlValue::Text(s), &Type::TEXT | &Type::VARCHAR | &Type::BPCHAR | &Type::NAME) => {
                s.to_sql(ty, out)
            }
            (SqlValue::Bool(b), &Type::BOOL) => b.to_sql(ty, out),
            (SqlValue::Timestamp(dt), &Type::TIMESTAMP) => dt.to_sql(ty, out),
            (SqlValue::Timestamp(dt), &Type::TIMESTAMPTZ) => dt.and_utc().to_sql(ty, out),
            (SqlValue::Json(v), &Type::JSON | &Type::JSONB) => v.to_sql(ty, out),
            (SqlValue::Blob(bytes), &Type::BYTEA) => bytes.to_sql(ty, out),
            (value, ty) => Err(mismatch(value, ty)),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}
