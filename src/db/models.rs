use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::capability::AdminRole;
use crate::domain::status::{StageStamps, TransactionKind, TransactionStatus};

/// Balance holder.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub handle: String,
    pub balance_units: i64,
    pub fee_percent: f64,
    pub fee_min_fiat_threshold: BigDecimal,
    pub notify_instant: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(handle: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            handle,
            balance_units: 0,
            fee_percent: crate::domain::fee::DEFAULT_FEE_PERCENT,
            fee_min_fiat_threshold: BigDecimal::from(0),
            notify_instant: true,
            created_at: Utc::now(),
        }
    }
}

/// Moderator resolved by the capability gate.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub handle: String,
    pub role: AdminRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// The unit of ledger work. Mutated exclusively through the ledger
/// service's primitives; `id`, `display_code`, `owner_id`, `kind` and
/// `amount_units` never change after insertion.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: TransactionKind,
    /// Magnitude in balance units; the sign of the effect comes from `kind`.
    pub amount_units: i64,
    pub amount_fiat: Option<BigDecimal>,
    pub status: TransactionStatus,
    pub reviewer_id: Option<Uuid>,
    pub note: Option<String>,
    pub display_code: String,
    pub created_at: DateTime<Utc>,
    pub review_started_at: Option<DateTime<Utc>>,
    pub admitted_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub last_alerted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(
        owner_id: Uuid,
        kind: TransactionKind,
        amount_units: i64,
        amount_fiat: Option<BigDecimal>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            owner_id,
            kind,
            amount_units,
            amount_fiat,
            status: TransactionStatus::Pending,
            reviewer_id: None,
            note: None,
            display_code: display_code_for(id),
            created_at: Utc::now(),
            review_started_at: None,
            admitted_at: None,
            settled_at: None,
            cancelled_at: None,
            last_alerted_at: None,
        }
    }

    pub fn stage_stamps(&self) -> StageStamps {
        StageStamps {
            review_started_at: self.review_started_at,
            admitted_at: self.admitted_at,
            settled_at: self.settled_at,
            cancelled_at: self.cancelled_at,
        }
    }
}

/// Short human-facing correlation code, assigned once and never reused.
fn display_code_for(id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("LGR-{}", simple[..8].to_uppercase())
}

/// Outbound notification target.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WebhookRegistration {
    pub id: Uuid,
    pub name: String,
    pub target_url: String,
    /// `*` or a specific event name.
    pub event: String,
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    pub active: bool,
    pub extra_headers: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_starts_pending_with_a_code() {
        let tx = Transaction::new(Uuid::new_v4(), TransactionKind::Charge, 50, None);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.display_code.starts_with("LGR-"));
        assert_eq!(tx.display_code.len(), 12);
        assert!(tx.reviewer_id.is_none());
        assert!(tx.stage_stamps().cancelled_at.is_none());
    }

    #[test]
    fn display_codes_differ_per_transaction() {
        let owner = Uuid::new_v4();
        let a = Transaction::new(owner, TransactionKind::Deposit, 10, None);
        let b = Transaction::new(owner, TransactionKind::Deposit, 10, None);
        assert_ne!(a.display_code, b.display_code);
    }
}
