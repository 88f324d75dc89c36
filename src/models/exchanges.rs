use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::transactions::{CreateTransactionInput, TransactionSource, Transactions};
use super::{Page, text_enum};
use crate::connector::Connector;
use crate::context::Ctx;
use crate::error::ConnectorError;
use crate::params;
use crate::scan::{DecodeMode, scan_all, scan_one, scan_scalar};
use crate::template::{Params, escape_like};
use crate::types::DatabaseType;

pub const DEFAULT_LIST_LIMIT: i64 = 10;
pub const MAX_LIST_LIMIT: i64 = 100;
/// Most recent trading days reported in [`ExchangeSummary::price_changes`].
pub const PRICE_CHANGE_DAYS: i64 = 12;

text_enum!(ExchangeStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
});

text_enum!(ExchangeTxType {
    AddLiquidity => "add_liquidity",
    RemoveLiquidity => "remove_liquidity",
    Swap1For2 => "swap1for2",
    Swap2For1 => "swap2for1",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExchangeInput {
    pub tx_id: String,
    pub startup_id: i64,
    pub token_name1: String,
    pub token_symbol1: String,
    pub token_address1: Option<String>,
    pub token_name2: String,
    pub token_symbol2: String,
    pub status: ExchangeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExchangeResult {
    pub id: i64,
    pub status: ExchangeStatus,
}

/// Look up by `id`, else by `startup_id`. With neither set nothing matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetExchangeInput {
    pub id: Option<i64>,
    pub startup_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartupBrief {
    pub id: i64,
    pub name: String,
    pub logo: String,
    #[serde(default)]
    pub mission: Option<String>,
    #[serde(default)]
    pub token_name: Option<String>,
    pub token_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeDetail {
    pub id: i64,
    pub tx_id: String,
    pub startup: StartupBrief,
    pub token_name1: String,
    pub token_symbol1: String,
    pub token_address1: Option<String>,
    pub token_name2: String,
    pub token_symbol2: String,
    pub pair_name: Option<String>,
    pub pair_address: Option<String>,
    pub status: ExchangeStatus,
    /// Users following the exchange's startup.
    pub follow_count: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListExchangesInput {
    /// Case-insensitive substring of the startup name.
    pub keyword: Option<String>,
    pub offset: i64,
    pub limit: Option<i64>,
}

impl ListExchangesInput {
    /// Requested page size, defaulted and clamped to `1..=MAX_LIST_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT)
    }
}

/// Average traded value of an exchange on one day (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub occurred_day: String,
    pub avg_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSummary {
    pub id: i64,
    pub tx_id: String,
    pub startup: StartupBrief,
    pub price: f64,
    pub liquidities: f64,
    pub volumes_24hrs: f64,
    /// Oldest day first, at most [`PRICE_CHANGE_DAYS`] entries.
    #[serde(default)]
    pub price_changes: Vec<PriceChange>,
    pub status: ExchangeStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExchangeTxInput {
    pub tx_id: String,
    pub exchange_id: i64,
    pub account: String,
    #[serde(rename = "type")]
    pub tx_type: ExchangeTxType,
    pub token_amount1: f64,
    pub token_amount2: f64,
    pub total_value: f64,
    pub status: ExchangeStatus,
    /// Defaults to now.
    #[serde(default)]
    pub occurred_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExchangeTxResult {
    pub id: i64,
    pub status: ExchangeStatus,
}

/// Look up by `id`, else by `tx_id`. With neither set nothing matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetExchangeTxInput {
    pub id: Option<i64>,
    pub tx_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTx {
    pub id: i64,
    pub tx_id: String,
    pub exchange_id: i64,
    pub account: String,
    #[serde(rename = "type")]
    pub tx_type: ExchangeTxType,
    pub token_amount1: f64,
    pub token_amount2: f64,
    pub total_value: f64,
    pub status: ExchangeStatus,
    pub occurred_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

const INSERT_EXCHANGE: &str = "
    INSERT INTO exchanges(tx_id, startup_id, token_name1, token_symbol1, token_address1,
                          token_name2, token_symbol2, status)
    VALUES (${txId}, ${startupId}, ${tokenName1}, ${tokenSymbol1}, ${tokenAddress1},
            ${tokenName2}, ${tokenSymbol2}, ${status})
    RETURNING id, status
";

const INSERT_EXCHANGE_TX: &str = "
    INSERT INTO exchange_transactions(tx_id, exchange_id, account, type,
                                      token_amount1, token_amount2, total_value,
                                      status, occurred_at)
    VALUES (${txId}, ${exchangeId}, ${account}, ${type},
            ${tokenAmount1}, ${tokenAmount2}, ${totalValue},
            ${status}, ${occurredAt})
    RETURNING id, status
";

const COUNT_EXCHANGES: &str = "
    SELECT count(*)
    FROM exchanges ex
        INNER JOIN startups s ON s.id = ex.startup_id
    WHERE 1 = 1";

#[cfg(feature = "postgres")]
const PG_GET_EXCHANGE: &str = "
    WITH res AS (
        SELECT
            ex.id,
            ex.tx_id,
            json_build_object('id', s.id, 'name', s.name, 'logo', s.logo, 'mission', s.mission,
                              'token_name', s.token_name, 'token_symbol', s.token_symbol) AS startup,
            ex.token_name1, ex.token_symbol1, ex.token_address1,
            ex.token_name2, ex.token_symbol2,
            ex.pair_name, ex.pair_address,
            ex.status,
            (SELECT count(*) FROM startups_follows_rel sfr WHERE sfr.startup_id = s.id) AS follow_count,
            ex.created_at
        FROM exchanges ex
            INNER JOIN startups s ON s.id = ex.startup_id
        WHERE {where}
    )
    SELECT row_to_json(res.*) FROM res";

#[cfg(feature = "sqlite")]
const SQLITE_GET_EXCHANGE: &str = "
    SELECT json_object(
        'id', ex.id,
        'tx_id', ex.tx_id,
        'startup', json_object('id', s.id, 'name', s.name, 'logo', s.logo, 'mission', s.mission,
                               'token_name', s.token_name, 'token_symbol', s.token_symbol),
        'token_name1', ex.token_name1, 'token_symbol1', ex.token_symbol1,
        'token_address1', ex.token_address1,
        'token_name2', ex.token_name2, 'token_symbol2', ex.token_symbol2,
        'pair_name', ex.pair_name, 'pair_address', ex.pair_address,
        'status', ex.status,
        'follow_count', (SELECT count(*) FROM startups_follows_rel sfr WHERE sfr.startup_id = s.id),
        'created_at', ex.created_at)
    FROM exchanges ex
        INNER JOIN startups s ON s.id = ex.startup_id
    WHERE {where}";

// daily average of traded value per exchange on the page, newest `days` days
#[cfg(feature = "postgres")]
const PG_LIST_EXCHANGES: &str = "
    WITH page AS (
        SELECT
            ex.id,
            ex.tx_id,
            json_build_object('id', s.id, 'name', s.name, 'logo', s.logo,
                              'token_symbol', s.token_symbol) AS startup,
            ex.price,
            ex.liquidities,
            ex.volumes AS volumes_24hrs,
            ex.status,
            ex.created_at
        FROM exchanges ex
            INNER JOIN startups s ON s.id = ex.startup_id
        WHERE 1 = 1{filter}
        ORDER BY ex.created_at DESC, ex.id DESC
        LIMIT ${limit} OFFSET ${offset}
    ), daily AS (
        SELECT
            et.exchange_id,
            to_char(et.occurred_at, 'YYYY-MM-DD') AS occurred_day,
            AVG(et.total_value) AS avg_price,
            row_number() OVER (PARTITION BY et.exchange_id
                               ORDER BY to_char(et.occurred_at, 'YYYY-MM-DD') DESC) AS rn
        FROM page p
            INNER JOIN exchange_transactions et ON et.exchange_id = p.id
        GROUP BY et.exchange_id, to_char(et.occurred_at, 'YYYY-MM-DD')
    ), series AS (
        SELECT
            d.exchange_id,
            json_agg(json_build_object('occurred_day', d.occurred_day, 'avg_price', d.avg_price)
                     ORDER BY d.occurred_day) AS price_changes
        FROM daily d
        WHERE d.rn <= ${days}
        GROUP BY d.exchange_id
    ), res AS (
        SELECT p.*, COALESCE(sr.price_changes, '[]'::json) AS price_changes
        FROM page p
            LEFT JOIN series sr ON sr.exchange_id = p.id
    )
    SELECT COALESCE(json_agg(r ORDER BY r.created_at DESC, r.id DESC), '[]'::json) FROM res r";

// nested json values lose their JSON subtype across a CTE; json() restores it
#[cfg(feature = "sqlite")]
const SQLITE_LIST_EXCHANGES: &str = "
    WITH page AS (
        SELECT
            ex.id,
            ex.created_at,
            json_object(
                'id', ex.id,
                'tx_id', ex.tx_id,
                'startup', json_object('id', s.id, 'name', s.name, 'logo', s.logo,
                                       'token_symbol', s.token_symbol),
                'price', ex.price,
                'liquidities', ex.liquidities,
                'volumes_24hrs', ex.volumes,
                'status', ex.status,
                'created_at', ex.created_at) AS doc
        FROM exchanges ex
            INNER JOIN startups s ON s.id = ex.startup_id
        WHERE 1 = 1{filter}
        ORDER BY ex.created_at DESC, ex.id DESC
        LIMIT ${limit} OFFSET ${offset}
    ), daily AS (
        SELECT
            et.exchange_id,
            strftime('%Y-%m-%d', et.occurred_at) AS occurred_day,
            AVG(et.total_value) AS avg_price,
            row_number() OVER (PARTITION BY et.exchange_id
                               ORDER BY strftime('%Y-%m-%d', et.occurred_at) DESC) AS rn
        FROM page p
            INNER JOIN exchange_transactions et ON et.exchange_id = p.id
        GROUP BY et.exchange_id, strftime('%Y-%m-%d', et.occurred_at)
    ), series AS (
        SELECT
            d.exchange_id,
            json_group_array(json_object('occurred_day', d.occurred_day, 'avg_price', d.avg_price)
                             ORDER BY d.occurred_day) AS price_changes
        FROM daily d
        WHERE d.rn <= ${days}
        GROUP BY d.exchange_id
    )
    SELECT json_group_array(
        json_set(json(p.doc), '$.price_changes', json(COALESCE(sr.price_changes, '[]')))
        ORDER BY p.created_at DESC, p.id DESC)
    FROM page p
        LEFT JOIN series sr ON sr.exchange_id = p.id";

const KEYWORD_FILTER: &str = " AND s.name {like} ${keyword} ESCAPE '\\'";

/// Exchanges (token pairs per startup) and their on-chain transactions.
///
/// Both create operations record a ledger row through [`Transactions::create`]
/// inside the same transaction; if the ledger insert fails nothing is written.
#[derive(Debug, Clone)]
pub struct Exchanges {
    connector: Connector,
    transactions: Transactions,
}

impl Exchanges {
    #[must_use]
    pub fn new(connector: Connector, transactions: Transactions) -> Self {
        Self {
            connector,
            transactions,
        }
    }

    /// Insert an exchange and its ledger row atomically.
    ///
    /// # Errors
    /// Any store error from either insert; a duplicate ledger `tx_id` surfaces
    /// as a unique violation and leaves no exchange behind.
    pub async fn create_exchange(
        &self,
        ctx: &mut Ctx<'_>,
        input: &CreateExchangeInput,
    ) -> Result<CreateExchangeResult, ConnectorError> {
        let insert = self.connector.render(
            INSERT_EXCHANGE,
            &params! {
                "txId" => input.tx_id.as_str(),
                "startupId" => input.startup_id,
                "tokenName1" => input.token_name1.as_str(),
                "tokenSymbol1" => input.token_symbol1.as_str(),
                "tokenAddress1" => input.token_address1.as_deref(),
                "tokenName2" => input.token_name2.as_str(),
                "tokenSymbol2" => input.token_symbol2.as_str(),
                "status" => input.status,
            },
        )?;
        self.connector
            .invoke(ctx, async |mut ctx| {
                let rs = ctx.query(&insert).await?;
                let created: CreateExchangeResult = scan_one(&rs, DecodeMode::Columns)?;
                let ledger = CreateTransactionInput {
                    tx_id: input.tx_id.clone(),
                    source: TransactionSource::Exchange,
                    source_id: created.id,
                };
                self.transactions.create(&mut ctx, &ledger).await?;
                Ok(created)
            })
            .await
    }

    /// Fetch one exchange with its startup nested as an object.
    ///
    /// # Errors
    /// [`ConnectorError::NoRows`] when nothing matches.
    pub async fn get_exchange(
        &self,
        ctx: &mut Ctx<'_>,
        input: &GetExchangeInput,
    ) -> Result<ExchangeDetail, ConnectorError> {
        let (clause, params) = match (input.id, input.startup_id) {
            (Some(id), _) => ("ex.id = ${id}", params! { "id" => id }),
            (None, Some(startup_id)) => (
                "ex.startup_id = ${startupId}",
                params! { "startupId" => startup_id },
            ),
            (None, None) => ("1 = 2", Params::new()),
        };
        let template = match self.connector.database_type() {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => PG_GET_EXCHANGE,
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => SQLITE_GET_EXCHANGE,
        };
        let select = self
            .connector
            .render(&template.replace("{where}", clause), &params)?;
        self.connector
            .read(ctx, async |mut ctx| {
                let rs = ctx.query(&select).await?;
                scan_one(&rs, DecodeMode::Json)
            })
            .await
    }

    /// List exchanges newest first, optionally filtered by startup name.
    ///
    /// Each item carries its daily average traded value over its most recent
    /// [`PRICE_CHANGE_DAYS`] trading days. An empty page is not an error.
    ///
    /// # Errors
    /// Any store or decode error.
    pub async fn list_exchanges(
        &self,
        ctx: &mut Ctx<'_>,
        input: &ListExchangesInput,
    ) -> Result<Page<ExchangeSummary>, ConnectorError> {
        let keyword = input
            .keyword
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{}%", escape_like(k)));

        let (list_template, like) = match self.connector.database_type() {
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => (PG_LIST_EXCHANGES, "ILIKE"),
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => (SQLITE_LIST_EXCHANGES, "LIKE"),
        };
        let filter = if keyword.is_some() {
            KEYWORD_FILTER.replace("{like}", like)
        } else {
            String::new()
        };

        let mut params = params! {
            "limit" => input.effective_limit(),
            "offset" => input.offset.max(0),
            "days" => PRICE_CHANGE_DAYS,
        };
        if let Some(keyword) = keyword {
            params.insert("keyword", keyword);
        }

        let count = self
            .connector
            .render(&format!("{COUNT_EXCHANGES}{filter}"), &params)?;
        let list = self
            .connector
            .render(&list_template.replace("{filter}", &filter), &params)?;

        self.connector
            .read(ctx, async |mut ctx| {
                let rs = ctx.query(&count).await?;
                let total: i64 = scan_scalar(&rs)?;
                let rs = ctx.query(&list).await?;
                let items = scan_all(&rs, DecodeMode::Json)?;
                Ok(Page { total, items })
            })
            .await
    }

    /// Insert an exchange transaction and its ledger row atomically.
    ///
    /// # Errors
    /// Same as [`Exchanges::create_exchange`].
    pub async fn create_exchange_tx(
        &self,
        ctx: &mut Ctx<'_>,
        input: &CreateExchangeTxInput,
    ) -> Result<CreateExchangeTxResult, ConnectorError> {
        let insert = self.connector.render(
            INSERT_EXCHANGE_TX,
            &params! {
                "txId" => input.tx_id.as_str(),
                "exchangeId" => input.exchange_id,
                "account" => input.account.as_str(),
                "type" => input.tx_type,
                "tokenAmount1" => input.token_amount1,
                "tokenAmount2" => input.token_amount2,
                "totalValue" => input.total_value,
                "status" => input.status,
                "occurredAt" => input
                    .occurred_at
                    .unwrap_or_else(|| chrono::Utc::now().naive_utc()),
            },
        )?;
        self.connector
            .invoke(ctx, async |mut ctx| {
                let rs = ctx.query(&insert).await?;
                let created: CreateExchangeTxResult = scan_one(&rs, DecodeMode::Columns)?;
                let ledger = CreateTransactionInput {
                    tx_id: input.tx_id.clone(),
                    source: TransactionSource::ExchangeTx,
                    source_id: created.id,
                };
                self.transactions.create(&mut ctx, &ledger).await?;
                Ok(created)
            })
            .await
    }

    /// # Errors
    /// [`ConnectorError::NoRows`] when nothing matches.
    pub async fn get_exchange_tx(
        &self,
        ctx: &mut Ctx<'_>,
        input: &GetExchangeTxInput,
    ) -> Result<ExchangeTx, ConnectorError> {
        let (clause, params) = match (input.id, input.tx_id.as_deref()) {
            (Some(id), _) => ("et.id = ${id}", params! { "id" => id }),
            (None, Some(tx_id)) if !tx_id.is_empty() => {
                ("et.tx_id = ${txId}", params! { "txId" => tx_id })
            }
            _ => ("1 = 2", Params::new()),
        };
        let select = self.connector.render(
            &format!(
                "SELECT et.id, et.tx_id, et.exchange_id, et.account, et.type,
                        et.token_amount1, et.token_amount2, et.total_value, et.status,
                        et.occurred_at, et.created_at
                 FROM exchange_transactions et
                 WHERE {clause}"
            ),
            &params,
        )?;
        self.connector
            .read(ctx, async |mut ctx| {
                let rs = ctx.query(&select).await?;
                scan_one(&rs, DecodeMode::Columns)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_limit_defaults_and_clamps() {
        let mut input = ListExchangesInput::default();
        assert_eq!(input.effective_limit(), DEFAULT_LIST_LIMIT);
        input.limit = Some(0);
        assert_eq!(input.effective_limit(), DEFAULT_LIST_LIMIT);
        input.limit = Some(25);
        assert_eq!(input.effective_limit(), 25);
        input.limit = Some(10_000);
        assert_eq!(input.effective_limit(), MAX_LIST_LIMIT);
    }

    #[test]
    fn exchange_tx_type_round_trips_through_serde() {
        let json = serde_json::to_string(&ExchangeTxType::Swap1For2).unwrap();
        assert_eq!(json, "\"swap1for2\"");
        let back: ExchangeTxType = serde_json::from_str("\"add_liquidity\"").unwrap();
        assert_eq!(back, ExchangeTxType::AddLiquidity);
    }
}
