//! Ledger core.
//!
//! The single write path for transactions and balances. Every operation
//! runs inside one store transaction with a bounded lock wait, and locks
//! in the fixed global order: transaction row first, then the owner's user
//! row. Webhook and audit side effects fire only after commit.

use bigdecimal::BigDecimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::Transaction;
use crate::db::queries;
use crate::domain::capability::Capability;
use crate::domain::status::{
    balance_effect, validate, BalanceEffect, TransactionKind, TransactionStatus,
};
use crate::error::LedgerError;
use crate::services::audit::AuditSink;
use crate::services::gate::{Actor, CapabilityGate};
use crate::services::webhook::{
    WebhookDispatcher, EVENT_TRANSACTION_CREATED, EVENT_TRANSACTION_STATUS_CHANGED,
};

#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
    gate: CapabilityGate,
    webhooks: WebhookDispatcher,
    audit: AuditSink,
    lock_timeout_ms: u64,
}

impl LedgerService {
    pub fn new(
        pool: PgPool,
        gate: CapabilityGate,
        webhooks: WebhookDispatcher,
        audit: AuditSink,
        lock_timeout_ms: u64,
    ) -> Self {
        Self {
            pool,
            gate,
            webhooks,
            audit,
            lock_timeout_ms,
        }
    }

    /// Creates a ledger record. A charge atomically checks and debits the
    /// owner's balance in the same store transaction; insufficient balance
    /// leaves no record behind. Deposits and adjustments insert only.
    pub async fn create(
        &self,
        owner_id: Uuid,
        kind: TransactionKind,
        amount_units: i64,
        amount_fiat: Option<BigDecimal>,
    ) -> Result<Transaction, LedgerError> {
        if amount_units <= 0 {
            return Err(LedgerError::Validation(
                "amount_units must be positive".into(),
            ));
        }

        let record = Transaction::new(owner_id, kind, amount_units, amount_fiat);

        let mut tx = self.pool.begin().await?;
        queries::set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        match kind {
            TransactionKind::Charge => {
                let owner = queries::lock_user(&mut tx, owner_id)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound(format!("user {owner_id}")))?;
                if owner.balance_units < amount_units {
                    tx.rollback().await?;
                    return Err(LedgerError::InsufficientBalance);
                }
                queries::apply_balance_delta(&mut tx, owner_id, -amount_units).await?;
            }
            TransactionKind::Deposit | TransactionKind::Adjustment => {
                if !queries::user_exists(&mut tx, owner_id).await? {
                    tx.rollback().await?;
                    return Err(LedgerError::NotFound(format!("user {owner_id}")));
                }
            }
        }

        let inserted = queries::insert_transaction(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            transaction = %inserted.id,
            code = %inserted.display_code,
            kind = %kind,
            amount_units,
            "transaction created"
        );
        self.webhooks
            .emit(EVENT_TRANSACTION_CREATED, created_payload(&inserted));

        Ok(inserted)
    }

    /// Moves a transaction along the status graph, applying the balance
    /// effect the move carries. Rejections roll back and surface as
    /// `Conflict`; a concurrent duplicate admit loses the lock race,
    /// re-reads the new status and conflicts instead of double-applying.
    pub async fn transition(
        &self,
        transaction_id: Uuid,
        target: TransactionStatus,
        actor: &Actor,
        note: Option<&str>,
    ) -> Result<Transaction, LedgerError> {
        let admin = self.gate.require(actor, Capability::ApprovePayments).await?;

        let mut tx = self.pool.begin().await?;
        queries::set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        // Transaction row first, user row second. Fixed order on every path.
        let current = queries::lock_transaction(&mut tx, transaction_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {transaction_id}")))?;

        let plan = match validate(current.status, target) {
            Ok(plan) => plan,
            Err(reject) => {
                tx.rollback().await?;
                return Err(LedgerError::Conflict(reject));
            }
        };

        match balance_effect(current.kind, target) {
            BalanceEffect::None => {}
            BalanceEffect::Refund | BalanceEffect::Credit => {
                queries::lock_user(&mut tx, current.owner_id)
                    .await?
                    .ok_or_else(|| LedgerError::NotFound(format!("user {}", current.owner_id)))?;
                queries::apply_balance_delta(&mut tx, current.owner_id, current.amount_units)
                    .await?;
            }
        }

        let stamps = plan.apply(current.stage_stamps(), chrono::Utc::now());
        let updated = queries::update_transaction_status(
            &mut tx,
            transaction_id,
            target,
            admin.as_ref().map(|a| a.id),
            note,
            stamps,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            transaction = %updated.id,
            code = %updated.display_code,
            from = %current.status,
            to = %target,
            actor = %actor.audit_name(),
            "transaction status changed"
        );
        self.audit.record(
            &actor.audit_name(),
            &format!("transaction_{target}"),
            Some(json!({
                "transaction_id": updated.id,
                "display_code": updated.display_code,
                "previous_status": current.status,
                "new_status": target,
                "note": note,
            })),
        );
        self.webhooks.emit(
            EVENT_TRANSACTION_STATUS_CHANGED,
            json!({
                "id": updated.id,
                "display_code": updated.display_code,
                "owner_id": updated.owner_id,
                "kind": updated.kind,
                "amount_units": updated.amount_units,
                "previous_status": current.status,
                "new_status": target,
                "actor": actor.audit_name(),
                "note": updated.note,
            }),
        );

        Ok(updated)
    }

    /// Moderator-only direct balance correction: applies the delta (debits
    /// clamp at zero) and records an adjustment already settled.
    pub async fn force_adjust(
        &self,
        owner_id: Uuid,
        delta_units: i64,
        note: &str,
        actor: &Actor,
    ) -> Result<Transaction, LedgerError> {
        let admin = self.gate.require(actor, Capability::ManageBalances).await?;

        if delta_units == 0 {
            return Err(LedgerError::Validation("delta_units must be non-zero".into()));
        }
        // i64::MIN has no positive magnitude; it would wrap negative below.
        if delta_units == i64::MIN {
            return Err(LedgerError::Validation(
                "delta_units magnitude out of range".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;
        queries::set_lock_timeout(&mut tx, self.lock_timeout_ms).await?;

        let owner = queries::lock_user(&mut tx, owner_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("user {owner_id}")))?;
        let new_balance =
            queries::apply_balance_delta_clamped(&mut tx, owner_id, delta_units).await?;
        let applied_delta = new_balance - owner.balance_units;

        let now = chrono::Utc::now();
        let mut record = Transaction::new(
            owner_id,
            TransactionKind::Adjustment,
            delta_units.unsigned_abs() as i64,
            None,
        );
        record.status = TransactionStatus::Settled;
        record.settled_at = Some(now);
        record.reviewer_id = admin.as_ref().map(|a| a.id);
        record.note = Some(note.to_string());

        let inserted = queries::insert_transaction(&mut tx, &record).await?;
        tx.commit().await?;

        tracing::info!(
            transaction = %inserted.id,
            owner = %owner_id,
            delta_units,
            applied_delta,
            new_balance,
            actor = %actor.audit_name(),
            "balance adjusted"
        );
        self.audit.record(
            &actor.audit_name(),
            "balance_adjust",
            Some(json!({
                "transaction_id": inserted.id,
                "owner_id": owner_id,
                "delta_units": delta_units,
                "applied_delta": applied_delta,
                "new_balance": new_balance,
                "note": note,
            })),
        );
        let mut payload = created_payload(&inserted);
        payload["delta_units"] = json!(delta_units);
        self.webhooks.emit(EVENT_TRANSACTION_CREATED, payload);

        Ok(inserted)
    }
}

fn created_payload(tx: &Transaction) -> serde_json::Value {
    json!({
        "id": tx.id,
        "display_code": tx.display_code,
        "owner_id": tx.owner_id,
        "kind": tx.kind,
        "amount_units": tx.amount_units,
        "amount_fiat": tx.amount_fiat,
        "status": tx.status,
        "created_at": tx.created_at,
    })
}
