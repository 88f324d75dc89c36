use std::time::Duration;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sql_connector::models::{
    CreateExchangeInput, CreateStartupInput, ExchangeStatus, GetExchangeInput,
    ListExchangesInput, Models, TransactionSource, schema,
};
use sql_connector::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about = "Create an exchange and read it back")]
struct Args {
    #[arg(long, value_enum, default_value = "sqlite")]
    backend: DatabaseType,
    /// `SQLite` file path, or a Postgres connection URL.
    #[arg(long, default_value = "exchange-demo.db")]
    database: String,
    #[arg(long, default_value = "Acme Labs")]
    startup: String,
    #[arg(long, default_value = "0xdemo")]
    tx_id: String,
    #[arg(long, default_value_t = 5)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), ConnectorError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exchange_demo=info,sql_connector=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let connector = match args.backend {
        DatabaseType::Sqlite => Connector::sqlite_builder(&args.database).build().await?,
        DatabaseType::Postgres => {
            Connector::postgres_builder(PostgresOptions::from_url(&args.database)?)
                .build()
                .await?
        }
    };
    schema::install(&connector).await?;
    let models = Models::new(connector.clone());

    let mut ctx = Ctx::background().with_timeout(Duration::from_secs(args.timeout_secs));
    let startup = models
        .startups
        .create(
            &mut ctx,
            &CreateStartupInput {
                name: args.startup.clone(),
                token_name: format!("{} Token", args.startup),
                token_symbol: "ACME".into(),
                ..CreateStartupInput::default()
            },
        )
        .await?;

    let created = models
        .exchanges
        .create_exchange(
            &mut ctx,
            &CreateExchangeInput {
                tx_id: args.tx_id.clone(),
                startup_id: startup.id,
                token_name1: startup.token_name.clone(),
                token_symbol1: startup.token_symbol.clone(),
                token_address1: None,
                token_name2: "Wrapped Ether".into(),
                token_symbol2: "WETH".into(),
                status: ExchangeStatus::Pending,
            },
        )
        .await;
    let created = match created {
        Ok(created) => created,
        Err(err) if err.is_unique_violation() => {
            tracing::warn!(tx_id = %args.tx_id, "tx id already recorded; pass a fresh --tx-id");
            return Err(err);
        }
        Err(err) => return Err(err),
    };
    tracing::info!(id = created.id, status = %created.status, "exchange created");

    let detail = models
        .exchanges
        .get_exchange(
            &mut ctx,
            &GetExchangeInput {
                id: Some(created.id),
                startup_id: None,
            },
        )
        .await?;
    let ledger = models
        .transactions
        .get_by_source(&mut ctx, TransactionSource::Exchange, created.id)
        .await?;
    let page = models
        .exchanges
        .list_exchanges(&mut ctx, &ListExchangesInput::default())
        .await?;

    println!("{}", serde_json::to_string_pretty(&detail)?);
    tracing::info!(ledger_id = ledger.id, tx_id = %ledger.tx_id, "ledger row recorded");
    tracing::info!(total = page.total, page = page.items.len(), "listed exchanges");
    tracing::info!(stats = ?connector.stats(), "done");
    Ok(())
}
