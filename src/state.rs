use crate::{
    db::{DbPool, OrmConn},
    notifications::OrderNotifier,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub notifier: OrderNotifier,
}
