use std::time::Duration;

use axum::extract::State;
use sqlx::postgres::PgPoolOptions;
use storefront_api::{
    db::orm_from_pool, notifications::OrderNotifier, routes::health::health_check,
    state::AppState,
};

#[tokio::test]
async fn health_check_reports_unreachable_database() {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy("postgres://storefront@127.0.0.1:1/storefront")
        .expect("lazy pool");
    let state = AppState {
        orm: orm_from_pool(&pool),
        pool,
        notifier: OrderNotifier::new(),
    };

    let response = health_check(State(state)).await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.database, "down");
}
