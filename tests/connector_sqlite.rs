#![cfg(feature = "sqlite")]

use std::time::Duration;

use sql_connector::prelude::*;
use tempfile::TempDir;

#[derive(Debug)]
enum AppError {
    Rejected(&'static str),
    Db(ConnectorError),
}

impl From<ConnectorError> for AppError {
    fn from(err: ConnectorError) -> Self {
        AppError::Db(err)
    }
}

async fn setup() -> Result<(TempDir, Connector), ConnectorError> {
    let dir = tempfile::tempdir().map_err(|e| ConnectorError::Config(e.to_string()))?;
    let path = dir.path().join("connector.db");
    let connector = Connector::sqlite_builder(path.to_string_lossy())
        .max_connections(4)
        .build()
        .await?;
    connector
        .batch(
            "CREATE TABLE items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );",
        )
        .await?;
    Ok((dir, connector))
}

/// Insert one item through `invoke`, joining any transaction bound to `ctx`.
async fn insert_item(
    connector: &Connector,
    ctx: &mut Ctx<'_>,
    name: &str,
) -> Result<usize, ConnectorError> {
    let stmt = connector.render(
        "INSERT INTO items(name) VALUES (${name})",
        &params! { "name" => name },
    )?;
    connector
        .invoke(ctx, async |mut ctx| ctx.execute(&stmt).await)
        .await
}

async fn count_items(connector: &Connector) -> Result<i64, ConnectorError> {
    let stmt = Rendered::raw("SELECT count(*) FROM items");
    connector
        .read(&mut Ctx::background(), async |mut ctx| {
            let rs = ctx.query(&stmt).await?;
            scan_scalar(&rs)
        })
        .await
}

#[tokio::test]
async fn nested_invoke_joins_the_outer_transaction() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx = Ctx::background();

    connector
        .invoke(&mut ctx, async |mut ctx| {
            assert!(ctx.lookup().is_some());
            insert_item(&connector, &mut ctx, "first").await?;
            insert_item(&connector, &mut ctx, "second").await?;
            Ok::<_, ConnectorError>(())
        })
        .await?;

    let stats = connector.stats();
    assert_eq!(stats.begun, 1);
    assert_eq!(stats.joined, 2);
    assert_eq!(stats.committed, 1);
    assert_eq!(stats.rolled_back, 0);
    assert_eq!(count_items(&connector).await?, 2);
    Ok(())
}

#[tokio::test]
async fn failing_nested_unit_rolls_back_earlier_writes() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx = Ctx::background();

    let res = connector
        .invoke(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "dup").await?;
            insert_item(&connector, &mut ctx, "dup").await?;
            Ok::<_, ConnectorError>(())
        })
        .await;

    let err = res.unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err:?}");
    assert_eq!(count_items(&connector).await?, 0);
    let stats = connector.stats();
    assert_eq!(stats.begun, 1);
    assert_eq!(stats.rolled_back, 1);
    assert_eq!(stats.committed, 0);
    Ok(())
}

#[tokio::test]
async fn caller_error_type_is_returned_unchanged() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx = Ctx::background();

    let res: Result<(), AppError> = connector
        .invoke(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "kept?").await?;
            Err(AppError::Rejected("business rule"))
        })
        .await;

    assert!(matches!(res, Err(AppError::Rejected("business rule"))));
    assert_eq!(count_items(&connector).await?, 0);
    Ok(())
}

#[tokio::test]
async fn store_errors_convert_into_caller_error_type() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx = Ctx::background();
    let bad = Rendered::raw("INSERT INTO missing_table VALUES (1)");

    let res: Result<usize, AppError> = connector
        .invoke(&mut ctx, async |mut ctx| Ok(ctx.execute(&bad).await?))
        .await;

    assert!(matches!(res, Err(AppError::Db(ConnectorError::Sqlite(_)))));
    assert_eq!(connector.stats().rolled_back, 1);
    Ok(())
}

#[tokio::test]
async fn sibling_invokes_each_get_their_own_transaction() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx_a = Ctx::background();
    let mut ctx_b = Ctx::background();

    let (a, b) = tokio::join!(
        insert_item(&connector, &mut ctx_a, "a"),
        insert_item(&connector, &mut ctx_b, "b"),
    );
    assert_eq!(a?, 1);
    assert_eq!(b?, 1);

    let stats = connector.stats();
    assert_eq!(stats.begun, 2);
    assert_eq!(stats.committed, 2);
    assert_eq!(stats.joined, 0);
    assert_eq!(count_items(&connector).await?, 2);
    Ok(())
}

#[tokio::test]
async fn read_uses_autocommit_connection_or_joins() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;

    assert_eq!(count_items(&connector).await?, 0);
    assert_eq!(connector.stats().reads, 1);
    assert_eq!(connector.stats().begun, 0);

    let mut ctx = Ctx::background();
    let seen = connector
        .invoke(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "uncommitted").await?;
            let stmt = Rendered::raw("SELECT count(*) FROM items");
            connector
                .read(&mut ctx, async |mut ctx| {
                    let rs = ctx.query(&stmt).await?;
                    scan_scalar::<i64>(&rs)
                })
                .await
        })
        .await?;

    // the nested read saw the row inside the open transaction
    assert_eq!(seen, 1);
    assert_eq!(connector.stats().reads, 1);
    Ok(())
}

#[tokio::test]
async fn missing_template_value_fails_before_any_transaction() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let err = connector
        .render("SELECT * FROM items WHERE id = ${id}", &Params::new())
        .unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::Template(TemplateError::MissingValue { ref name }) if name == "id"
    ));
    assert_eq!(connector.stats().begun, 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_context_never_checks_out() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let token = CancellationToken::new();
    token.cancel();
    let mut ctx = Ctx::with_cancellation(token);

    let err = insert_item(&connector, &mut ctx, "never").await.unwrap_err();
    assert!(matches!(err, ConnectorError::Cancelled));
    assert_eq!(connector.stats().begun, 0);
    assert_eq!(count_items(&connector).await?, 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_mid_transaction_rolls_back() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let token = CancellationToken::new();
    let mut ctx = Ctx::with_cancellation(token.clone());

    let res = connector
        .invoke(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "before").await?;
            token.cancel();
            insert_item(&connector, &mut ctx, "after").await?;
            Ok::<_, ConnectorError>(())
        })
        .await;

    assert!(matches!(res, Err(ConnectorError::Cancelled)));
    assert_eq!(connector.stats().rolled_back, 1);
    assert_eq!(count_items(&connector).await?, 0);
    Ok(())
}

#[tokio::test]
async fn expired_deadline_rolls_back() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx = Ctx::background().with_timeout(Duration::from_millis(200));

    let res = connector
        .invoke(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "slow").await?;
            tokio::time::sleep(Duration::from_millis(400)).await;
            insert_item(&connector, &mut ctx, "too late").await?;
            Ok::<_, ConnectorError>(())
        })
        .await;

    assert!(matches!(res, Err(ConnectorError::Timeout)));
    assert_eq!(count_items(&connector).await?, 0);
    Ok(())
}

#[tokio::test]
async fn statement_timeout_applies_to_every_statement() -> Result<(), ConnectorError> {
    let dir = tempfile::tempdir().map_err(|e| ConnectorError::Config(e.to_string()))?;
    let path = dir.path().join("slow.db");
    let connector = Connector::sqlite_builder(path.to_string_lossy())
        .statement_timeout(Duration::from_millis(50))
        .build()
        .await?;
    // a recursive CTE that takes far longer than the limit
    let slow = Rendered::raw(
        "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 5000000)
         SELECT count(*) FROM n",
    );

    let res = connector
        .read(&mut Ctx::background(), async |mut ctx| ctx.query(&slow).await)
        .await;
    assert!(matches!(res, Err(ConnectorError::Timeout)));
    Ok(())
}

const SLOW_COUNT: &str = "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 50000000)
     SELECT count(*) FROM n";

#[tokio::test]
async fn timed_out_invoke_interrupts_the_running_statement() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let slow = Rendered::raw(SLOW_COUNT);
    let mut ctx = Ctx::background().with_timeout(Duration::from_millis(100));

    let started = std::time::Instant::now();
    let res = connector
        .invoke(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "doomed").await?;
            ctx.query(&slow).await
        })
        .await;
    assert!(matches!(res, Err(ConnectorError::Timeout)));
    // rollback could only run once the statement let go of the connection
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    assert_eq!(connector.stats().rolled_back, 1);
    assert_eq!(count_items(&connector).await?, 0);
    Ok(())
}

#[tokio::test]
async fn cancelled_statement_releases_its_connection() -> Result<(), ConnectorError> {
    let dir = tempfile::tempdir().map_err(|e| ConnectorError::Config(e.to_string()))?;
    let path = dir.path().join("single.db");
    let connector = Connector::sqlite_builder(path.to_string_lossy())
        .max_connections(1)
        .build()
        .await?;
    let slow = Rendered::raw(SLOW_COUNT);
    let token = CancellationToken::new();
    let mut ctx = Ctx::with_cancellation(token.clone());

    let (res, ()) = tokio::join!(
        connector.read(&mut ctx, async |mut ctx| ctx.query(&slow).await),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        },
    );
    assert!(matches!(res, Err(ConnectorError::Cancelled)));

    // the pool's only connection must be usable straight away
    let started = std::time::Instant::now();
    let one: i64 = connector
        .read(&mut Ctx::background(), async |mut ctx| {
            let rs = ctx.query(&Rendered::raw("SELECT 1")).await?;
            scan_scalar(&rs)
        })
        .await?;
    assert_eq!(one, 1);
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    Ok(())
}

#[tokio::test]
async fn unit_error_wins_over_its_own_rollback() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx = Ctx::background();

    let res: Result<(), AppError> = connector
        .invoke(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "ended early").await?;
            ctx.execute(&Rendered::raw("ROLLBACK")).await?;
            Err(AppError::Rejected("gave up"))
        })
        .await;

    assert!(matches!(res, Err(AppError::Rejected("gave up"))));
    let stats = connector.stats();
    assert_eq!(stats.begun, 1);
    assert_eq!(stats.rolled_back, 1);
    assert_eq!(stats.committed, 0);
    assert_eq!(count_items(&connector).await?, 0);

    // the connection went back to the pool in a usable state
    insert_item(&connector, &mut ctx, "after").await?;
    assert_eq!(count_items(&connector).await?, 1);
    Ok(())
}

#[tokio::test]
async fn invoke_inside_read_on_single_connection_pool_fails_fast() -> Result<(), ConnectorError> {
    let connector = Connector::sqlite_builder(":memory:").build().await?;
    connector
        .batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE);")
        .await?;
    let mut ctx = Ctx::background();

    let started = std::time::Instant::now();
    let res = connector
        .read(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "nested").await
        })
        .await;
    assert!(matches!(res, Err(ConnectorError::Pool(_))), "unexpected: {res:?}");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(connector.stats().begun, 0);
    Ok(())
}

#[tokio::test]
async fn invoke_inside_read_opens_its_own_transaction() -> Result<(), ConnectorError> {
    let (_dir, connector) = setup().await?;
    let mut ctx = Ctx::background();

    let inserted = connector
        .read(&mut ctx, async |mut ctx| {
            insert_item(&connector, &mut ctx, "nested").await
        })
        .await?;
    assert_eq!(inserted, 1);
    let stats = connector.stats();
    assert_eq!(stats.begun, 1);
    assert_eq!(stats.committed, 1);
    assert_eq!(count_items(&connector).await?, 1);
    Ok(())
}
