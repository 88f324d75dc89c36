//! Model operations built on [`Connector`].
//!
//! Each model owns a connector handle and runs its statements through
//! `invoke`/`read`, so a model method called with a context that already has a
//! transaction bound simply joins it. [`Exchanges::create_exchange`] relies on
//! that to record its ledger row atomically with the exchange.

use serde::{Deserialize, Serialize};

use crate::connector::Connector;

pub mod exchanges;
pub mod schema;
pub mod startups;
pub mod transactions;

pub use exchanges::{
    CreateExchangeInput, CreateExchangeResult, CreateExchangeTxInput, CreateExchangeTxResult,
    ExchangeDetail, ExchangeStatus, ExchangeSummary, ExchangeTx, ExchangeTxType, Exchanges,
    GetExchangeInput, GetExchangeTxInput, ListExchangesInput, PRICE_CHANGE_DAYS, PriceChange,
};
pub use startups::{CreateStartupInput, Startup, Startups};
pub use transactions::{
    CreateTransactionInput, LedgerTransaction, LedgerTxStatus, TransactionSource, Transactions,
};

/// One page of a listing plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: i64,
    pub items: Vec<T>,
}

/// Every model, sharing one connector.
#[derive(Debug, Clone)]
pub struct Models {
    pub startups: Startups,
    pub exchanges: Exchanges,
    pub transactions: Transactions,
}

impl Models {
    #[must_use]
    pub fn new(connector: Connector) -> Self {
        let transactions = Transactions::new(connector.clone());
        Self {
            startups: Startups::new(connector.clone()),
            exchanges: Exchanges::new(connector, transactions.clone()),
            transactions,
        }
    }
}

/// Enums stored as lowercase text columns.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for $crate::types::SqlValue {
            fn from(value: $name) -> Self {
                $crate::types::SqlValue::Text(value.as_str().to_string())
            }
        }
    };
}

pub(crate) use text_enum;
