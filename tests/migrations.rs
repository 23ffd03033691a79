mod common;

use storefront_api::{db::run_migrations, notifications::OrderNotifier};

use common::setup_state;

#[tokio::test]
async fn migrations_are_recorded_and_rerun_cleanly() -> anyhow::Result<()> {
    let Some(state) = setup_state(OrderNotifier::new()).await? else {
        return Ok(());
    };

    run_migrations(&state.pool).await?;

    let (applied,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM _sqlx_migrations WHERE version = 1 AND success",
    )
    .fetch_one(&state.pool)
    .await?;
    assert_eq!(applied, 1);

    Ok(())
}
