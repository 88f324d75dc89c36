use crate::connector::Connector;
use crate::error::ConnectorError;
use crate::types::DatabaseType;

#[cfg(feature = "postgres")]
const POSTGRES_DDL: &str = "
CREATE TABLE IF NOT EXISTS startups (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    logo TEXT NOT NULL DEFAULT '',
    mission TEXT NOT NULL DEFAULT '',
    token_name TEXT NOT NULL DEFAULT '',
    token_symbol TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMP NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS exchanges (
    id BIGSERIAL PRIMARY KEY,
    tx_id TEXT NOT NULL,
    startup_id BIGINT NOT NULL REFERENCES startups(id),
    token_name1 TEXT NOT NULL,
    token_symbol1 TEXT NOT NULL,
    token_address1 TEXT,
    token_name2 TEXT NOT NULL,
    token_symbol2 TEXT NOT NULL,
    pair_name TEXT,
    pair_address TEXT,
    price DOUBLE PRECISION NOT NULL DEFAULT 0,
    liquidities DOUBLE PRECISION NOT NULL DEFAULT 0,
    volumes DOUBLE PRECISION NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS exchanges_startup_id_idx ON exchanges(startup_id);

CREATE TABLE IF NOT EXISTS exchange_transactions (
    id BIGSERIAL PRIMARY KEY,
    tx_id TEXT NOT NULL,
    exchange_id BIGINT NOT NULL REFERENCES exchanges(id),
    account TEXT NOT NULL,
    type TEXT NOT NULL,
    token_amount1 DOUBLE PRECISION NOT NULL,
    token_amount2 DOUBLE PRECISION NOT NULL,
    total_value DOUBLE PRECISION NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    occurred_at TIMESTAMP NOT NULL DEFAULT now(),
    created_at TIMESTAMP NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS exchange_transactions_tx_id_idx ON exchange_transactions(tx_id);
CREATE INDEX IF NOT EXISTS exchange_transactions_occurred_idx
    ON exchange_transactions(exchange_id, occurred_at);

CREATE TABLE IF NOT EXISTS startups_follows_rel (
    startup_id BIGINT NOT NULL REFERENCES startups(id),
    user_id BIGINT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT now(),
    PRIMARY KEY (startup_id, user_id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id BIGSERIAL PRIMARY KEY,
    tx_id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    source_id BIGINT NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS transactions_source_idx ON transactions(source, source_id);
";

// timestamps are ISO-8601 text with milliseconds
#[cfg(feature = "sqlite")]
const SQLITE_DDL: &str = "
CREATE TABLE IF NOT EXISTS startups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    logo TEXT NOT NULL DEFAULT '',
    mission TEXT NOT NULL DEFAULT '',
    token_name TEXT NOT NULL DEFAULT '',
    token_symbol TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
);

CREATE TABLE IF NOT EXISTS exchanges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tx_id TEXT NOT NULL,
    startup_id INTEGER NOT NULL REFERENCES startups(id),
    token_name1 TEXT NOT NULL,
    token_symbol1 TEXT NOT NULL,
    token_address1 TEXT,
    token_name2 TEXT NOT NULL,
    token_symbol2 TEXT NOT NULL,
    pair_name TEXT,
    pair_address TEXT,
    price REAL NOT NULL DEFAULT 0,
    liquidities REAL NOT NULL DEFAULT 0,
    volumes REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
);
CREATE INDEX IF NOT EXISTS exchanges_startup_id_idx ON exchanges(startup_id);

CREATE TABLE IF NOT EXISTS exchange_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tx_id TEXT NOT NULL,
    exchange_id INTEGER NOT NULL REFERENCES exchanges(id),
    account TEXT NOT NULL,
    type TEXT NOT NULL,
    token_amount1 REAL NOT NULL,
    token_amount2 REAL NOT NULL,
    total_value REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    occurred_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now')),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
);
CREATE INDEX IF NOT EXISTS exchange_transactions_tx_id_idx ON exchange_transactions(tx_id);
CREATE INDEX IF NOT EXISTS exchange_transactions_occurred_idx
    ON exchange_transactions(exchange_id, occurred_at);

CREATE TABLE IF NOT EXISTS startups_follows_rel (
    startup_id INTEGER NOT NULL REFERENCES startups(id),
    user_id INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now')),
    PRIMARY KEY (startup_id, user_id)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tx_id TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    source_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now'))
);
CREATE INDEX IF NOT EXISTS transactions_source_idx ON transactions(source, source_id);
";

/// Create the model tables if they do not exist yet.
///
/// # Errors
/// Returns the store's error if any statement fails.
pub async fn install(connector: &Connector) -> Result<(), ConnectorError> {
    let ddl = match connector.database_type() {
        #[cfg(feature = "postgres")]
        DatabaseType::Postgres => POSTGRES_DDL,
        #[cfg(feature = "sqlite")]
        DatabaseType::Sqlite => SQLITE_DDL,
    };
    tracing::debug!(db = ?connector.database_type(), "installing schema");
    connector.batch(ddl).await
}
