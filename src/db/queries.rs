//! Every SQL statement in the crate. Status-changing paths all funnel
//! through [`update_transaction_status`]; nothing else writes ledger rows.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{Admin, Transaction, User, WebhookRegistration};
use crate::domain::status::{StageStamps, TransactionStatus};

// --- Locking helpers ---

/// Bounded wait for row locks within the current store transaction.
/// Expiry raises 55P03, surfaced to callers as `Busy`.
pub async fn set_lock_timeout(
    executor: &mut SqlxTransaction<'_, Postgres>,
    timeout_ms: u64,
) -> Result<()> {
    // SET LOCAL does not take bind parameters; the value is a validated integer.
    sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", timeout_ms))
        .execute(&mut **executor)
        .await?;
    Ok(())
}

/// Exclusive lock on a transaction row. Always acquired before any user-row
/// lock (fixed global order, see `lock_user`).
pub async fn lock_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

/// Exclusive lock on a user row. Never acquire a transaction-row lock while
/// holding this one.
pub async fn lock_user(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

// --- User queries ---

pub async fn insert_user(pool: &PgPool, user: &User) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            id, handle, balance_units, fee_percent, fee_min_fiat_threshold,
            notify_instant, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(&user.handle)
    .bind(user.balance_units)
    .bind(user.fee_percent)
    .bind(&user.fee_min_fiat_threshold)
    .bind(user.notify_instant)
    .bind(user.created_at)
    .fetch_one(pool)
    .await
}

pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn user_exists(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(&mut **executor)
        .await
}

/// Applies a balance delta; the schema CHECK keeps the result non-negative,
/// so callers verify sufficiency under lock before debiting.
pub async fn apply_balance_delta(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    delta_units: i64,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE users SET balance_units = balance_units + $1 WHERE id = $2 RETURNING balance_units",
    )
    .bind(delta_units)
    .bind(user_id)
    .fetch_one(&mut **executor)
    .await
}

/// Adjustment variant: a debit larger than the balance clamps to zero
/// instead of failing.
pub async fn apply_balance_delta_clamped(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    delta_units: i64,
) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "UPDATE users SET balance_units = GREATEST(balance_units + $1, 0) WHERE id = $2 RETURNING balance_units",
    )
    .bind(delta_units)
    .bind(user_id)
    .fetch_one(&mut **executor)
    .await
}

// --- Admin queries ---

pub async fn get_admin_by_handle(pool: &PgPool, handle: &str) -> Result<Option<Admin>> {
    sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE LOWER(handle) = LOWER($1)")
        .bind(handle)
        .fetch_optional(pool)
        .await
}

// --- Transaction queries ---

pub async fn insert_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &Transaction,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, owner_id, kind, amount_units, amount_fiat, status, reviewer_id,
            note, display_code, created_at, review_started_at, admitted_at,
            settled_at, cancelled_at, last_alerted_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.owner_id)
    .bind(tx.kind)
    .bind(tx.amount_units)
    .bind(&tx.amount_fiat)
    .bind(tx.status)
    .bind(tx.reviewer_id)
    .bind(&tx.note)
    .bind(&tx.display_code)
    .bind(tx.created_at)
    .bind(tx.review_started_at)
    .bind(tx.admitted_at)
    .bind(tx.settled_at)
    .bind(tx.cancelled_at)
    .bind(tx.last_alerted_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Writes the new status plus the full stamp set computed by the validator.
/// The note is only replaced when the transition carries one.
pub async fn update_transaction_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    status: TransactionStatus,
    reviewer_id: Option<Uuid>,
    note: Option<&str>,
    stamps: StageStamps,
) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        UPDATE transactions
        SET status = $2,
            reviewer_id = COALESCE($3, reviewer_id),
            note = COALESCE($4, note),
            review_started_at = $5,
            admitted_at = $6,
            settled_at = $7,
            cancelled_at = $8
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(reviewer_id)
    .bind(note)
    .bind(stamps.review_started_at)
    .bind(stamps.admitted_at)
    .bind(stamps.settled_at)
    .bind(stamps.cancelled_at)
    .fetch_one(&mut **executor)
    .await
}

/// Unresolved transactions past the staleness threshold, oldest first.
/// Ids only: each candidate is cancelled as its own independent attempt.
pub async fn expiry_candidates(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Uuid>> {
    sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM transactions
        WHERE status IN ('pending', 'in_review')
          AND created_at < $1
        ORDER BY created_at ASC
        LIMIT $2
        "#,
    )
    .bind(cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Unresolved transactions old enough to alert on, throttled by
/// `last_alerted_at`.
pub async fn alert_candidates(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
    realert_cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE status IN ('pending', 'in_review')
          AND created_at < $1
          AND (last_alerted_at IS NULL OR last_alerted_at < $2)
        ORDER BY created_at ASC
        LIMIT $3
        "#,
    )
    .bind(cutoff)
    .bind(realert_cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn mark_alerted(pool: &PgPool, ids: &[Uuid]) -> Result<()> {
    sqlx::query("UPDATE transactions SET last_alerted_at = NOW() WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(())
}

// --- Webhook registrations ---

pub async fn active_webhooks_for_event(
    pool: &PgPool,
    event: &str,
) -> Result<Vec<WebhookRegistration>> {
    sqlx::query_as::<_, WebhookRegistration>(
        r#"
        SELECT * FROM webhooks
        WHERE active = TRUE AND (event = $1 OR event = '*')
        "#,
    )
    .bind(event)
    .fetch_all(pool)
    .await
}

pub async fn insert_webhook(pool: &PgPool, hook: &WebhookRegistration) -> Result<WebhookRegistration> {
    sqlx::query_as::<_, WebhookRegistration>(
        r#"
        INSERT INTO webhooks (id, name, target_url, event, secret, active, extra_headers, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(hook.id)
    .bind(&hook.name)
    .bind(&hook.target_url)
    .bind(&hook.event)
    .bind(&hook.secret)
    .bind(hook.active)
    .bind(&hook.extra_headers)
    .bind(hook.created_at)
    .bind(hook.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn list_webhooks(pool: &PgPool) -> Result<Vec<WebhookRegistration>> {
    sqlx::query_as::<_, WebhookRegistration>("SELECT * FROM webhooks ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn get_webhook(pool: &PgPool, id: Uuid) -> Result<Option<WebhookRegistration>> {
    sqlx::query_as::<_, WebhookRegistration>("SELECT * FROM webhooks WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_webhook(pool: &PgPool, hook: &WebhookRegistration) -> Result<WebhookRegistration> {
    sqlx::query_as::<_, WebhookRegistration>(
        r#"
        UPDATE webhooks
        SET name = $2, target_url = $3, event = $4, secret = $5,
            active = $6, extra_headers = $7, updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(hook.id)
    .bind(&hook.name)
    .bind(&hook.target_url)
    .bind(&hook.event)
    .bind(&hook.secret)
    .bind(hook.active)
    .bind(&hook.extra_headers)
    .fetch_one(pool)
    .await
}

pub async fn delete_webhook(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM webhooks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- Audit log ---

pub async fn insert_audit(
    pool: &PgPool,
    actor: &str,
    action: &str,
    details: Option<&serde_json::Value>,
) -> Result<()> {
    sqlx::query("INSERT INTO audit_logs (actor, action, details) VALUES ($1, $2, $3)")
        .bind(actor)
        .bind(action)
        .bind(details)
        .execute(pool)
        .await?;
    Ok(())
}
