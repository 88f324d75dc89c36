use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::text_enum;
use crate::connector::Connector;
use crate::context::Ctx;
use crate::error::ConnectorError;
use crate::params;
use crate::scan::{DecodeMode, scan_one};

text_enum!(TransactionSource {
    Exchange => "exchange",
    ExchangeTx => "exchange_tx",
});

text_enum!(LedgerTxStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Failed => "failed",
});

/// Input for recording an on-chain transaction against the record that caused it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionInput {
    pub tx_id: String,
    pub source: TransactionSource,
    pub source_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: i64,
    pub tx_id: String,
    pub source: TransactionSource,
    pub source_id: i64,
    pub status: LedgerTxStatus,
    pub created_at: NaiveDateTime,
}

const INSERT: &str = "
    INSERT INTO transactions(tx_id, source, source_id, status)
    VALUES (${txId}, ${source}, ${sourceId}, ${status})
    RETURNING id, tx_id, source, source_id, status, created_at
";

const BY_SOURCE: &str = "
    SELECT id, tx_id, source, source_id, status, created_at
    FROM transactions
    WHERE source = ${source} AND source_id = ${sourceId}
";

/// The ledger of on-chain transactions. `tx_id` is unique.
#[derive(Debug, Clone)]
pub struct Transactions {
    connector: Connector,
}

impl Transactions {
    #[must_use]
    pub fn new(connector: Connector) -> Self {
        Self { connector }
    }

    /// Record a pending ledger row, joining the caller's transaction if one is bound.
    ///
    /// # Errors
    /// A unique violation when `tx_id` is already recorded, or any store error.
    pub async fn create(
        &self,
        ctx: &mut Ctx<'_>,
        input: &CreateTransactionInput,
    ) -> Result<LedgerTransaction, ConnectorError> {
        let insert = self.connector.render(
            INSERT,
            &params! {
                "txId" => input.tx_id.as_str(),
                "source" => input.source,
                "sourceId" => input.source_id,
                "status" => LedgerTxStatus::Pending,
            },
        )?;
        self.connector
            .invoke(ctx, async |mut ctx| {
                let rs = ctx.query(&insert).await?;
                scan_one(&rs, DecodeMode::Columns)
            })
            .await
    }

    /// # Errors
    /// [`ConnectorError::NoRows`] when nothing was recorded for the source.
    pub async fn get_by_source(
        &self,
        ctx: &mut Ctx<'_>,
        source: TransactionSource,
        source_id: i64,
    ) -> Result<LedgerTransaction, ConnectorError> {
        let select = self.connector.render(
            BY_SOURCE,
            &params! { "source" => source, "sourceId" => source_id },
        )?;
        self.connector
            .read(ctx, async |mut ctx| {
                let rs = ctx.query(&select).await?;
                scan_one(&rs, DecodeMode::Columns)
            })
            .await
    }
}
