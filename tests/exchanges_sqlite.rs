#![cfg(feature = "sqlite")]

use chrono::{NaiveDate, NaiveDateTime};
use sql_connector::models::{
    CreateExchangeInput, CreateExchangeTxInput, CreateStartupInput, CreateTransactionInput,
    ExchangeStatus, ExchangeTxType, GetExchangeInput, GetExchangeTxInput, LedgerTxStatus,
    ListExchangesInput, Models, PRICE_CHANGE_DAYS, Startup, TransactionSource, schema,
};
use sql_connector::prelude::*;
use tempfile::TempDir;

async fn setup() -> Result<(TempDir, Connector, Models), ConnectorError> {
    let dir = tempfile::tempdir().map_err(|e| ConnectorError::Config(e.to_string()))?;
    let path = dir.path().join("exchanges.db");
    let connector = Connector::sqlite_builder(path.to_string_lossy()).build().await?;
    schema::install(&connector).await?;
    let models = Models::new(connector.clone());
    Ok((dir, connector, models))
}

async fn startup(models: &Models, name: &str, symbol: &str) -> Result<Startup, ConnectorError> {
    models
        .startups
        .create(
            &mut Ctx::background(),
            &CreateStartupInput {
                name: name.into(),
                logo: format!("https://img.example/{symbol}.png"),
                mission: format!("{name} mission"),
                token_name: format!("{name} Token"),
                token_symbol: symbol.into(),
            },
        )
        .await
}

fn swap(
    tx_id: &str,
    exchange_id: i64,
    total_value: f64,
    at: NaiveDateTime,
) -> CreateExchangeTxInput {
    CreateExchangeTxInput {
        tx_id: tx_id.into(),
        exchange_id,
        account: "0xalice".into(),
        tx_type: ExchangeTxType::Swap1For2,
        token_amount1: 1.0,
        token_amount2: 1.0,
        total_value,
        status: ExchangeStatus::Completed,
        occurred_at: Some(at),
    }
}

fn day(d: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, d)
        .and_then(|date| date.and_hms_opt(hour, 15, 0))
        .unwrap()
}

fn exchange_input(tx_id: &str, startup: &Startup) -> CreateExchangeInput {
    CreateExchangeInput {
        tx_id: tx_id.into(),
        startup_id: startup.id,
        token_name1: startup.token_name.clone(),
        token_symbol1: startup.token_symbol.clone(),
        token_address1: Some(format!("0xaddr{}", startup.id)),
        token_name2: "Wrapped Ether".into(),
        token_symbol2: "WETH".into(),
        status: ExchangeStatus::Pending,
    }
}

#[tokio::test]
async fn create_exchange_records_ledger_row_in_same_transaction() -> Result<(), ConnectorError> {
    let (_dir, connector, models) = setup().await?;
    let acme = startup(&models, "Acme", "ACME").await?;
    let before = connector.stats();

    let mut ctx = Ctx::background();
    let created = models
        .exchanges
        .create_exchange(&mut ctx, &exchange_input("0xabc", &acme))
        .await?;
    assert_eq!(created.status, ExchangeStatus::Pending);

    let after = connector.stats();
    assert_eq!(after.begun - before.begun, 1);
    assert_eq!(after.joined - before.joined, 1);
    assert_eq!(after.committed - before.committed, 1);

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
    assert_eq!(detail.id, created.id);
    assert_eq!(detail.tx_id, "0xabc");
    assert_eq!(detail.startup.id, acme.id);
    assert_eq!(detail.startup.name, "Acme");
    assert_eq!(detail.startup.mission.as_deref(), Some("Acme mission"));
    assert_eq!(detail.token_symbol1, "ACME");
    assert_eq!(detail.token_address1.as_deref(), Some(&*format!("0xaddr{}", acme.id)));
    assert_eq!(detail.pair_name, None);
    assert_eq!(detail.follow_count, 0);

    let by_startup = models
        .exchanges
        .get_exchange(
            &mut ctx,
            &GetExchangeInput {
                id: None,
                startup_id: Some(acme.id),
            },
        )
        .await?;
    assert_eq!(by_startup, detail);

    let ledger = models
        .transactions
        .get_by_source(&mut ctx, TransactionSource::Exchange, created.id)
        .await?;
    assert_eq!(ledger.tx_id, "0xabc");
    assert_eq!(ledger.status, LedgerTxStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn duplicate_ledger_tx_leaves_no_exchange() -> Result<(), ConnectorError> {
    let (_dir, connector, models) = setup().await?;
    let acme = startup(&models, "Acme", "ACME").await?;
    let mut ctx = Ctx::background();

    models
        .transactions
        .create(
            &mut ctx,
            &CreateTransactionInput {
                tx_id: "0xdup".into(),
                source: TransactionSource::ExchangeTx,
                source_id: 999,
            },
        )
        .await?;
    let rolled_back = connector.stats().rolled_back;

    let err = models
        .exchanges
        .create_exchange(&mut ctx, &exchange_input("0xdup", &acme))
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err:?}");
    assert_eq!(connector.stats().rolled_back, rolled_back + 1);

    let missing = models
        .exchanges
        .get_exchange(
            &mut ctx,
            &GetExchangeInput {
                id: None,
                startup_id: Some(acme.id),
            },
        )
        .await
        .unwrap_err();
    assert!(missing.is_no_rows());

    let page = models
        .exchanges
        .list_exchanges(&mut ctx, &ListExchangesInput::default())
        .await?;
    assert_eq!(page.total, 0);
    assert!(page.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn caller_transaction_owns_the_cascade() -> Result<(), ConnectorError> {
    let (_dir, connector, models) = setup().await?;
    let acme = startup(&models, "Acme", "ACME").await?;
    let mut ctx = Ctx::background();

    let res: Result<(), ConnectorError> = connector
        .invoke(&mut ctx, async |mut ctx| {
            models
                .exchanges
                .create_exchange(&mut ctx, &exchange_input("0xouter", &acme))
                .await?;
            Err(ConnectorError::Execution("caller gave up".into()))
        })
        .await;
    assert!(matches!(res, Err(ConnectorError::Execution(_))));

    let err = models
        .transactions
        .get_by_source(&mut ctx, TransactionSource::Exchange, 1)
        .await
        .unwrap_err();
    assert!(err.is_no_rows());
    let page = models
        .exchanges
        .list_exchanges(&mut ctx, &ListExchangesInput::default())
        .await?;
    assert_eq!(page.total, 0);
    Ok(())
}

#[tokio::test]
async fn single_row_reads_report_no_rows() -> Result<(), ConnectorError> {
    let (_dir, _connector, models) = setup().await?;
    let mut ctx = Ctx::background();

    let unknown = models
        .exchanges
        .get_exchange(
            &mut ctx,
            &GetExchangeInput {
                id: Some(42),
                startup_id: None,
            },
        )
        .await
        .unwrap_err();
    assert!(unknown.is_no_rows());

    let unfiltered = models
        .exchanges
        .get_exchange(&mut ctx, &GetExchangeInput::default())
        .await
        .unwrap_err();
    assert!(unfiltered.is_no_rows());

    let no_tx = models
        .exchanges
        .get_exchange_tx(&mut ctx, &GetExchangeTxInput::default())
        .await
        .unwrap_err();
    assert!(no_tx.is_no_rows());

    let no_startup = models.startups.get(&mut ctx, 7).await.unwrap_err();
    assert!(no_startup.is_no_rows());
    Ok(())
}

#[tokio::test]
async fn list_exchanges_filters_pages_and_orders_newest_first() -> Result<(), ConnectorError> {
    let (_dir, _connector, models) = setup().await?;
    let mut ctx = Ctx::background();

    let empty = models
        .exchanges
        .list_exchanges(&mut ctx, &ListExchangesInput::default())
        .await?;
    assert_eq!(empty.total, 0);
    assert!(empty.items.is_empty());

    let pure = startup(&models, "100% Pure", "PURE").await?;
    let plain = startup(&models, "1000 Plain", "PLN").await?;
    let acme = startup(&models, "ACME Rockets", "ACME").await?;
    let mut ids = Vec::new();
    for (tx_id, s) in [("0x1", &pure), ("0x2", &plain), ("0x3", &acme)] {
        let created = models
            .exchanges
            .create_exchange(&mut ctx, &exchange_input(tx_id, s))
            .await?;
        ids.push(created.id);
    }

    let all = models
        .exchanges
        .list_exchanges(&mut ctx, &ListExchangesInput::default())
        .await?;
    assert_eq!(all.total, 3);
    let listed: Vec<i64> = all.items.iter().map(|e| e.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);
    assert_eq!(all.items[0].startup.token_symbol, "ACME");
    assert!((all.items[0].price - 0.0).abs() < f64::EPSILON);

    // `%` in the keyword is a literal, not a wildcard
    let literal = models
        .exchanges
        .list_exchanges(
            &mut ctx,
            &ListExchangesInput {
                keyword: Some("0%".into()),
                ..ListExchangesInput::default()
            },
        )
        .await?;
    assert_eq!(literal.total, 1);
    assert_eq!(literal.items[0].startup.name, "100% Pure");

    let case_insensitive = models
        .exchanges
        .list_exchanges(
            &mut ctx,
            &ListExchangesInput {
                keyword: Some("acme".into()),
                ..ListExchangesInput::default()
            },
        )
        .await?;
    assert_eq!(case_insensitive.total, 1);

    let second_page = models
        .exchanges
        .list_exchanges(
            &mut ctx,
            &ListExchangesInput {
                keyword: None,
                offset: 1,
                limit: Some(1),
            },
        )
        .await?;
    assert_eq!(second_page.total, 3);
    assert_eq!(second_page.items.len(), 1);
    assert_eq!(second_page.items[0].id, listed[1]);

    let no_match = models
        .exchanges
        .list_exchanges(
            &mut ctx,
            &ListExchangesInput {
                keyword: Some("nothing like this".into()),
                ..ListExchangesInput::default()
            },
        )
        .await?;
    assert_eq!(no_match.total, 0);
    assert!(no_match.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn exchange_tx_cascades_and_reads_back() -> Result<(), ConnectorError> {
    let (_dir, _connector, models) = setup().await?;
    let acme = startup(&models, "Acme", "ACME").await?;
    let mut ctx = Ctx::background();
    let exchange = models
        .exchanges
        .create_exchange(&mut ctx, &exchange_input("0xpair", &acme))
        .await?;

    let created = models
        .exchanges
        .create_exchange_tx(
            &mut ctx,
            &CreateExchangeTxInput {
                tx_id: "0xswap".into(),
                exchange_id: exchange.id,
                account: "0xalice".into(),
                tx_type: ExchangeTxType::Swap1For2,
                token_amount1: 12.5,
                token_amount2: 3.0,
                total_value: 37.5,
                status: ExchangeStatus::Completed,
                occurred_at: Some(day(1, 9)),
            },
        )
        .await?;
    assert_eq!(created.status, ExchangeStatus::Completed);

    let by_id = models
        .exchanges
        .get_exchange_tx(
            &mut ctx,
            &GetExchangeTxInput {
                id: Some(created.id),
                tx_id: None,
            },
        )
        .await?;
    assert_eq!(by_id.exchange_id, exchange.id);
    assert_eq!(by_id.tx_type, ExchangeTxType::Swap1For2);
    assert!((by_id.token_amount1 - 12.5).abs() < f64::EPSILON);
    assert!((by_id.total_value - 37.5).abs() < f64::EPSILON);
    assert_eq!(by_id.occurred_at, day(1, 9));

    let by_hash = models
        .exchanges
        .get_exchange_tx(
            &mut ctx,
            &GetExchangeTxInput {
                id: None,
                tx_id: Some("0xswap".into()),
            },
        )
        .await?;
    assert_eq!(by_hash, by_id);

    let ledger = models
        .transactions
        .get_by_source(&mut ctx, TransactionSource::ExchangeTx, created.id)
        .await?;
    assert_eq!(ledger.tx_id, "0xswap");
    Ok(())
}

#[tokio::test]
async fn exchange_detail_counts_startup_followers() -> Result<(), ConnectorError> {
    let (_dir, _connector, models) = setup().await?;
    let acme = startup(&models, "Acme", "ACME").await?;
    let other = startup(&models, "Other", "OTH").await?;
    let mut ctx = Ctx::background();
    let created = models
        .exchanges
        .create_exchange(&mut ctx, &exchange_input("0xfollow", &acme))
        .await?;

    assert!(models.startups.follow(&mut ctx, acme.id, 1).await?);
    assert!(models.startups.follow(&mut ctx, acme.id, 2).await?);
    // following again changes nothing
    assert!(!models.startups.follow(&mut ctx, acme.id, 2).await?);
    assert!(models.startups.follow(&mut ctx, other.id, 1).await?);

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
    assert_eq!(detail.follow_count, 2);
    Ok(())
}

#[tokio::test]
async fn list_exchanges_reports_recent_daily_average_prices() -> Result<(), ConnectorError> {
    let (_dir, _connector, models) = setup().await?;
    let acme = startup(&models, "Acme", "ACME").await?;
    let quiet = startup(&models, "Quiet", "QT").await?;
    let mut ctx = Ctx::background();
    let traded = models
        .exchanges
        .create_exchange(&mut ctx, &exchange_input("0xtraded", &acme))
        .await?;
    let untraded = models
        .exchanges
        .create_exchange(&mut ctx, &exchange_input("0xquiet", &quiet))
        .await?;

    // two swaps on March 1st average out; then one per day through the 14th
    models
        .exchanges
        .create_exchange_tx(&mut ctx, &swap("0xs1a", traded.id, 10.0, day(1, 8)))
        .await?;
    models
        .exchanges
        .create_exchange_tx(&mut ctx, &swap("0xs1b", traded.id, 20.0, day(1, 20)))
        .await?;
    for d in 2..=14 {
        let value = f64::from(d) * 10.0;
        models
            .exchanges
            .create_exchange_tx(&mut ctx, &swap(&format!("0xs{d}"), traded.id, value, day(d, 12)))
            .await?;
    }

    let page = models
        .exchanges
        .list_exchanges(&mut ctx, &ListExchangesInput::default())
        .await?;
    assert_eq!(page.total, 2);
    let quiet_item = page.items.iter().find(|e| e.id == untraded.id).unwrap();
    assert!(quiet_item.price_changes.is_empty());

    let item = page.items.iter().find(|e| e.id == traded.id).unwrap();
    let days: Vec<&str> = item
        .price_changes
        .iter()
        .map(|p| p.occurred_day.as_str())
        .collect();
    assert_eq!(days.len(), usize::try_from(PRICE_CHANGE_DAYS).unwrap());
    // the oldest days fall off; the rest are oldest first
    assert_eq!(days.first(), Some(&"2024-03-03"));
    assert_eq!(days.last(), Some(&"2024-03-14"));
    assert!((item.price_changes[0].avg_price - 30.0).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn timestamps_bound_as_params_compare_with_column_defaults() -> Result<(), ConnectorError> {
    let (_dir, connector, models) = setup().await?;
    let acme = startup(&models, "Acme", "ACME").await?;
    let mut ctx = Ctx::background();
    let before = models
        .exchanges
        .create_exchange(&mut ctx, &exchange_input("0xold", &acme))
        .await?;
    let cutoff = chrono::Utc::now().naive_utc() + chrono::Duration::seconds(60);

    let stmt = connector.render(
        "SELECT count(*) FROM exchanges WHERE created_at < ${cutoff}",
        &params! { "cutoff" => cutoff },
    )?;
    let older: i64 = connector
        .read(&mut ctx, async |mut ctx| {
            let rs = ctx.query(&stmt).await?;
            scan_scalar(&rs)
        })
        .await?;
    assert_eq!(older, 1, "exchange {} should sort before the cutoff", before.id);

    let echo = connector.render("SELECT ${at} AS at", &params! { "at" => day(5, 7) })?;
    let back: NaiveDateTime = connector
        .read(&mut ctx, async |mut ctx| {
            let rs = ctx.query(&echo).await?;
            scan_scalar(&rs)
        })
        .await?;
    assert_eq!(back, day(5, 7));
    Ok(())
}
