//! Transaction status state machine.
//!
//! Every status change in the crate funnels through [`validate`]: it decides
//! whether a move is legal from the current status and returns the stage
//! timestamps to stamp or clear. Monitoring depends on the clearing rule
//! (moving backward resets the stamps of the stages being left), so the plan
//! is computed here once instead of at each call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    InReview,
    Admitted,
    Settled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Charge,
    Adjustment,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Settled | TransactionStatus::Cancelled)
    }

    /// Position along the forward path. `Cancelled` sits outside the path.
    fn rank(&self) -> u8 {
        match self {
            TransactionStatus::Pending => 0,
            TransactionStatus::InReview => 1,
            TransactionStatus::Admitted => 2,
            TransactionStatus::Settled => 3,
            TransactionStatus::Cancelled => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::InReview => "in_review",
            TransactionStatus::Admitted => "admitted",
            TransactionStatus::Settled => "settled",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Charge => "charge",
            TransactionKind::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a requested transition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionReject {
    #[error("transaction already in a terminal status")]
    AlreadyTerminal,
    #[error("illegal backward move from a terminal status")]
    IllegalBackward,
    #[error("transaction already in the requested status")]
    AlreadyInStatus,
}

/// Stage timestamps of a transaction row, as loaded under lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStamps {
    pub review_started_at: Option<DateTime<Utc>>,
    pub admitted_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Timestamp deltas a legal transition applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampPlan {
    target: TransactionStatus,
}

impl StampPlan {
    /// Applies the plan: stamps the destination stage if unset and clears
    /// the stamps of every stage the record is logically leaving.
    pub fn apply(&self, stamps: StageStamps, now: DateTime<Utc>) -> StageStamps {
        let mut next = stamps;
        if self.target != TransactionStatus::Cancelled {
            // Stages past the destination are no longer applicable.
            if self.target.rank() < TransactionStatus::InReview.rank() {
                next.review_started_at = None;
            }
            if self.target.rank() < TransactionStatus::Admitted.rank() {
                next.admitted_at = None;
            }
        }
        match self.target {
            TransactionStatus::Pending => {}
            TransactionStatus::InReview => {
                next.review_started_at.get_or_insert(now);
            }
            TransactionStatus::Admitted => {
                next.admitted_at.get_or_insert(now);
            }
            TransactionStatus::Settled => {
                next.settled_at.get_or_insert(now);
            }
            TransactionStatus::Cancelled => {
                next.cancelled_at.get_or_insert(now);
            }
        }
        next
    }
}

/// Decides whether `current -> target` is legal.
///
/// Legal moves: between any two distinct non-terminal stages (forward or
/// backward), from any non-terminal stage to `Settled` or `Cancelled`.
/// Terminal statuses accept nothing; in particular `Settled <-> Cancelled`
/// is forbidden in both directions.
pub fn validate(
    current: TransactionStatus,
    target: TransactionStatus,
) -> Result<StampPlan, TransitionReject> {
    if current == target {
        return Err(TransitionReject::AlreadyInStatus);
    }
    if current.is_terminal() {
        return if target.is_terminal() {
            Err(TransitionReject::AlreadyTerminal)
        } else {
            Err(TransitionReject::IllegalBackward)
        };
    }
    Ok(StampPlan { target })
}

/// Balance effect a legal transition carries, derived from the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    /// No balance mutation.
    None,
    /// Return the debited magnitude to the owner (cancel of a charge).
    Refund,
    /// Credit the owner (settle of a deposit).
    Credit,
}

pub fn balance_effect(kind: TransactionKind, target: TransactionStatus) -> BalanceEffect {
    match (kind, target) {
        (TransactionKind::Charge, TransactionStatus::Cancelled) => BalanceEffect::Refund,
        (TransactionKind::Deposit, TransactionStatus::Settled) => BalanceEffect::Credit,
        _ => BalanceEffect::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionStatus::*;

    const ALL: [TransactionStatus; 5] = [Pending, InReview, Admitted, Settled, Cancelled];

    #[test]
    fn forward_path_is_legal() {
        assert!(validate(Pending, InReview).is_ok());
        assert!(validate(InReview, Admitted).is_ok());
        assert!(validate(Admitted, Settled).is_ok());
    }

    #[test]
    fn forward_jumps_are_legal() {
        assert!(validate(Pending, Admitted).is_ok());
        assert!(validate(Pending, Settled).is_ok());
        assert!(validate(InReview, Settled).is_ok());
    }

    #[test]
    fn backward_moves_among_non_terminal_are_legal() {
        assert!(validate(InReview, Pending).is_ok());
        assert!(validate(Admitted, Pending).is_ok());
        assert!(validate(Admitted, InReview).is_ok());
    }

    #[test]
    fn any_non_terminal_can_cancel() {
        for from in [Pending, InReview, Admitted] {
            assert!(validate(from, Cancelled).is_ok());
        }
    }

    #[test]
    fn settled_and_cancelled_never_swap() {
        assert_eq!(validate(Settled, Cancelled), Err(TransitionReject::AlreadyTerminal));
        assert_eq!(validate(Cancelled, Settled), Err(TransitionReject::AlreadyTerminal));
    }

    #[test]
    fn terminal_statuses_reject_everything() {
        for from in [Settled, Cancelled] {
            for to in ALL {
                assert!(validate(from, to).is_err(), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn terminal_to_earlier_stage_is_illegal_backward() {
        assert_eq!(validate(Settled, Admitted), Err(TransitionReject::IllegalBackward));
        assert_eq!(validate(Cancelled, Pending), Err(TransitionReject::IllegalBackward));
    }

    #[test]
    fn same_status_is_rejected() {
        for status in ALL {
            assert_eq!(validate(status, status), Err(TransitionReject::AlreadyInStatus));
        }
    }

    #[test]
    fn stamps_are_set_on_forward_moves() {
        let now = Utc::now();
        let plan = validate(Pending, InReview).unwrap();
        let stamps = plan.apply(StageStamps::default(), now);
        assert_eq!(stamps.review_started_at, Some(now));
        assert_eq!(stamps.admitted_at, None);

        let plan = validate(InReview, Admitted).unwrap();
        let stamps = plan.apply(stamps, now);
        assert_eq!(stamps.review_started_at, Some(now));
        assert_eq!(stamps.admitted_at, Some(now));
    }

    #[test]
    fn existing_stamp_is_not_overwritten() {
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let now = Utc::now();
        let stamps = StageStamps {
            review_started_at: Some(earlier),
            ..Default::default()
        };
        // Re-entering review after a bounce back keeps the original stamp.
        let plan = validate(Pending, InReview).unwrap();
        let stamps = plan.apply(stamps, now);
        assert_eq!(stamps.review_started_at, Some(earlier));
    }

    #[test]
    fn backward_move_clears_left_stages() {
        let now = Utc::now();
        let stamps = StageStamps {
            review_started_at: Some(now),
            admitted_at: Some(now),
            ..Default::default()
        };
        let plan = validate(Admitted, InReview).unwrap();
        let next = plan.apply(stamps, now);
        assert_eq!(next.review_started_at, Some(now));
        assert_eq!(next.admitted_at, None);

        let plan = validate(InReview, Pending).unwrap();
        let next = plan.apply(next, now);
        assert_eq!(next.review_started_at, None);
        assert_eq!(next.admitted_at, None);
    }

    #[test]
    fn cancellation_keeps_visited_stamps() {
        let now = Utc::now();
        let stamps = StageStamps {
            review_started_at: Some(now),
            admitted_at: Some(now),
            ..Default::default()
        };
        let plan = validate(Admitted, Cancelled).unwrap();
        let next = plan.apply(stamps, now);
        assert_eq!(next.review_started_at, Some(now));
        assert_eq!(next.admitted_at, Some(now));
        assert_eq!(next.cancelled_at, Some(now));
    }

    #[test]
    fn balance_effects_by_kind() {
        assert_eq!(
            balance_effect(TransactionKind::Charge, Cancelled),
            BalanceEffect::Refund
        );
        assert_eq!(
            balance_effect(TransactionKind::Deposit, Settled),
            BalanceEffect::Credit
        );
        // Settling a charge moves no balance: it was debited at creation.
        assert_eq!(balance_effect(TransactionKind::Charge, Settled), BalanceEffect::None);
        // Cancelling a deposit never refunds: nothing was deducted.
        assert_eq!(balance_effect(TransactionKind::Deposit, Cancelled), BalanceEffect::None);
        assert_eq!(
            balance_effect(TransactionKind::Adjustment, Settled),
            BalanceEffect::None
        );
    }
}
