// Postgres backend
//
// - config: options and connector construction
// - manager: bb8 connection manager
// - params: `ToSql` for `SqlValue`
// - query: execution and result extraction

pub mod config;
pub mod manager;
pub mod params;
pub(crate) mod query;

pub use config::{PostgresConnectorBuilder, PostgresOptions};
pub use manager::PgManager;
pub use query::{build_result_set, extract_value};
