//! Transactional query execution for model modules.
//!
//! A [`Connector`] owns a pooled connection to one store (Postgres or
//! `SQLite`). Model code renders `${name}` templates with [`render`] and runs
//! them inside [`Connector::invoke`], which begins a transaction, or joins the
//! one already bound to the caller's [`Ctx`], so one model's write can cascade
//! into another's and commit or roll back as a unit.
//!
//! ```rust,no_run
//! use sql_connector::prelude::*;
//!
//! # async fn demo() -> Result<(), ConnectorError> {
//! let connector = Connector::sqlite_builder("app.db").build().await?;
//! let mut ctx = Ctx::background();
//! let stmt = connector.render("SELECT ${n} AS n", &params! { "n" => 1_i64 })?;
//! let n: i64 = connector
//!     .read(&mut ctx, async |mut ctx| {
//!         let rs = ctx.query(&stmt).await?;
//!         scan_scalar(&rs)
//!     })
//!     .await?;
//! assert_eq!(n, 1);
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod context;
pub mod error;
pub mod models;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod scan;
pub mod template;
pub mod transaction;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use connector::{Connector, ConnectorOptions, ConnectorStats};
pub use context::Ctx;
pub use error::{ConnectorError, TemplateError};
pub use pool::{DbConn, DbPool};
pub use results::{ResultSet, Row};
pub use scan::{DecodeMode, scan_all, scan_one, scan_optional, scan_scalar};
pub use template::{Params, PlaceholderStyle, Rendered, escape_like, render};
pub use transaction::Tx;
pub use types::{DatabaseType, SqlValue};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresConnectorBuilder, PostgresOptions};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnectorBuilder, SqliteOptions};

pub use tokio_util::sync::CancellationToken;
