//! Convenient imports for common functionality.
//!
//! Re-exports what model code needs to render templates, run units of work,
//! and decode results.

pub use crate::connector::{Connector, ConnectorOptions, ConnectorStats};
pub use crate::context::Ctx;
pub use crate::error::{ConnectorError, TemplateError};
pub use crate::params;
pub use crate::results::{ResultSet, Row};
pub use crate::scan::{DecodeMode, scan_all, scan_one, scan_optional, scan_scalar};
pub use crate::template::{Params, PlaceholderStyle, Rendered, escape_like, render};
pub use crate::transaction::Tx;
pub use crate::types::{DatabaseType, SqlValue};

#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresConnectorBuilder, PostgresOptions};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnectorBuilder, SqliteOptions};

pub use tokio_util::sync::CancellationToken;
