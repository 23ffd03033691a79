use serde_json::Value;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Append a row to `audit_logs`, returning its id. Accepts a pool or an open
/// transaction.
pub async fn log_audit<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .fetch_one(executor)
    .await?;

    tracing::debug!(audit_id = %id, action, "audit entry written");
    Ok(id)
}

/// Record an audit entry without failing the caller.
pub async fn log_audit_best_effort(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    if let Err(err) = log_audit(pool, user_id, action, resource, metadata).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
