//! Observers for the "order created" event.
//!
//! Observers run after the placing transaction has committed. A failing or
//! panicking observer is logged and skipped; it can never undo or fail the
//! order that triggered it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{audit::log_audit, db::DbPool, models::Order};

#[async_trait]
pub trait OrderObserver: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn order_created(&self, order: &Order) -> anyhow::Result<()>;
}

#[derive(Clone, Default)]
pub struct OrderNotifier {
    observers: Vec<Arc<dyn OrderObserver>>,
}

impl OrderNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier with the observers the server runs with.
    pub fn with_defaults(pool: DbPool) -> Self {
        Self::new()
            .register(AuditLogObserver::new(pool))
            .register(ReceiptLogger)
    }

    pub fn register(mut self, observer: impl OrderObserver) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `order` to every observer, returning how many succeeded.
    pub async fn notify_order_created(&self, order: &Order) -> usize {
        let handles: Vec<_> = self
            .observers
            .iter()
            .map(|observer| {
                let observer = Arc::clone(observer);
                let order = order.clone();
                let name = observer.name();
                let handle =
                    tokio::spawn(async move { observer.order_created(&order).await });
                (name, handle)
            })
            .collect();

        let mut delivered = 0;
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    tracing::warn!(observer = name, order_id = %order.id, error = %err, "order observer failed");
                }
                Err(join_err) => {
                    tracing::warn!(observer = name, order_id = %order.id, error = %join_err, "order observer panicked");
                }
            }
        }
        delivered
    }
}

/// Persists an `order_created` row in `audit_logs`.
pub struct AuditLogObserver {
    pool: DbPool,
}

impl AuditLogObserver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderObserver for AuditLogObserver {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn order_created(&self, order: &Order) -> anyhow::Result<()> {
        log_audit(
            &self.pool,
            None,
            "order_created",
            Some("orders"),
            Some(serde_json::json!({
                "order_id": order.id,
                "customer_id": order.customer_id,
                "items": order.items.len(),
                "total_price": order.total_price,
            })),
        )
        .await?;
        Ok(())
    }
}

/// Emits a structured receipt event; stands in for an email sender.
pub struct ReceiptLogger;

#[async_trait]
impl OrderObserver for ReceiptLogger {
    fn name(&self) -> &'static str {
        "receipt_logger"
    }

    async fn order_created(&self, order: &Order) -> anyhow::Result<()> {
        tracing::info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            items = order.items.len(),
            total_price = %order.total_price,
            "order receipt queued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentStatus;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl OrderObserver for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn order_created(&self, _order: &Order) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl OrderObserver for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn order_created(&self, _order: &Order) -> anyhow::Result<()> {
            anyhow::bail!("smtp unavailable")
        }
    }

    struct Panicking;

    #[async_trait]
    impl OrderObserver for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn order_created(&self, _order: &Order) -> anyhow::Result<()> {
            panic!("observer bug")
        }
    }

    fn order() -> Order {
        Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            placed_at: Utc::now(),
            payment_status: PaymentStatus::Pending,
            items: Vec::new(),
            total_price: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_other_observers() {
        let hits = Arc::new(AtomicUsize::new(0));
        let notifier = OrderNotifier::new()
            .register(Failing)
            .register(Panicking)
            .register(Counting(hits.clone()));

        let delivered = notifier.notify_order_created(&order()).await;

        assert_eq!(delivered, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_notifier_delivers_nothing() {
        let notifier = OrderNotifier::new();
        assert!(notifier.is_empty());
        assert_eq!(notifier.notify_order_created(&order()).await, 0);
    }

    #[tokio::test]
    async fn receipt_logger_never_fails() {
        assert!(ReceiptLogger.order_created(&order()).await.is_ok());
    }
}
