//! Audit sink: fire-and-forget fact recording. Failures are logged and
//! swallowed; an audit outage must never unwind a ledger mutation.

use sqlx::PgPool;

use crate::db::queries;

#[derive(Clone)]
pub struct AuditSink {
    pool: PgPool,
}

impl AuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn record(&self, actor: &str, action: &str, details: Option<serde_json::Value>) {
        let pool = self.pool.clone();
        let actor = actor.to_string();
        let action = action.to_string();
        tokio::spawn(async move {
            if let Err(e) = queries::insert_audit(&pool, &actor, &action, details.as_ref()).await {
                tracing::error!(%actor, %action, error = %e, "failed to record audit entry");
            }
        });
    }
}
