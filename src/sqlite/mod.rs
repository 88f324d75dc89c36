// SQLite backend
//
// - config: options and connector construction
// - manager: bb8 connection manager
// - params: value conversion in both directions
// - query: blocking execution helpers

pub mod config;
pub mod manager;
pub mod params;
pub(crate) mod query;

pub use config::{SqliteConnectorBuilder, SqliteOptions};
pub use manager::{SqliteConnection, SqliteManager};
pub use query::build_result_set;
