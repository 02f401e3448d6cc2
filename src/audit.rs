//! Audit trail for money- and account-touching actions: registrations,
//! checkouts, order transitions, payments, refunds, invoices.
//!
//! Writes are fire-and-forget; callers log the error and move on rather
//! than failing the request over a missing audit row.

use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await?;

    tracing::debug!(action, resource, "audit entry recorded");
    Ok(())
}
