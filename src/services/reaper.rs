//! Stale transaction reaper.
//!
//! Fixed-interval background sweep over unresolved transactions. Expiry
//! goes through the normal `transition` locking path, so a moderator
//! racing the reaper on the same record cannot double-refund: one side
//! wins the row lock, the other gets a `Conflict`.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::Config;
use crate::db::queries;
use crate::domain::status::TransactionStatus;
use crate::error::LedgerError;
use crate::services::audit::AuditSink;
use crate::services::gate::Actor;
use crate::services::ledger::LedgerService;

const SWEEP_BATCH: i64 = 50;
const EXPIRY_NOTE: &str = "auto-expired";

#[derive(Debug, Default)]
pub struct SweepStats {
    pub expired: usize,
    pub skipped: usize,
    pub alerted: usize,
}

#[derive(Clone)]
pub struct Reaper {
    pool: PgPool,
    ledger: LedgerService,
    audit: AuditSink,
    stale_after_minutes: i64,
    alert_after_minutes: i64,
    realert_minutes: i64,
    interval: Duration,
}

impl Reaper {
    pub fn new(pool: PgPool, ledger: LedgerService, audit: AuditSink, config: &Config) -> Self {
        Self {
            pool,
            ledger,
            audit,
            stale_after_minutes: config.stale_after_minutes,
            alert_after_minutes: config.alert_after_minutes,
            realert_minutes: config.realert_minutes,
            interval: Duration::from_secs(config.reaper_interval_secs),
        }
    }

    /// Runs forever. One bad tick must not kill the loop.
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            stale_after_minutes = self.stale_after_minutes,
            "reaper started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(stats) if stats.expired + stats.alerted > 0 => {
                    tracing::info!(
                        expired = stats.expired,
                        skipped = stats.skipped,
                        alerted = stats.alerted,
                        "reaper sweep completed"
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "reaper sweep failed"),
            }
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepStats, LedgerError> {
        let mut stats = SweepStats::default();
        self.expire_stale(&mut stats).await?;
        self.alert_stale(&mut stats).await?;
        Ok(stats)
    }

    /// Cancels unresolved transactions past the staleness threshold. Each
    /// candidate is its own attempt: a Busy or Conflict on one record never
    /// aborts the rest of the batch.
    async fn expire_stale(&self, stats: &mut SweepStats) -> Result<(), LedgerError> {
        let cutoff = Utc::now() - ChronoDuration::minutes(self.stale_after_minutes);
        let candidates = queries::expiry_candidates(&self.pool, cutoff, SWEEP_BATCH).await?;

        for id in candidates {
            match self
                .ledger
                .transition(id, TransactionStatus::Cancelled, &Actor::System, Some(EXPIRY_NOTE))
                .await
            {
                Ok(cancelled) => {
                    tracing::info!(
                        transaction = %cancelled.id,
                        code = %cancelled.display_code,
                        "stale transaction auto-cancelled"
                    );
                    stats.expired += 1;
                }
                // A moderator resolved it first, or the row is busy: move on.
                Err(LedgerError::Conflict(_)) | Err(LedgerError::Busy) => {
                    stats.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(transaction = %id, error = %e, "failed to auto-cancel");
                    stats.skipped += 1;
                }
            }
        }
        Ok(())
    }

    /// Records a staleness alert for unresolved transactions, throttled per
    /// record by `last_alerted_at`.
    async fn alert_stale(&self, stats: &mut SweepStats) -> Result<(), LedgerError> {
        let now = Utc::now();
        let cutoff = now - ChronoDuration::minutes(self.alert_after_minutes);
        let realert_cutoff = now - ChronoDuration::minutes(self.realert_minutes);
        let candidates =
            queries::alert_candidates(&self.pool, cutoff, realert_cutoff, SWEEP_BATCH).await?;

        if candidates.is_empty() {
            return Ok(());
        }

        for tx in &candidates {
            tracing::warn!(
                transaction = %tx.id,
                code = %tx.display_code,
                status = %tx.status,
                created_at = %tx.created_at,
                "transaction pending past alert threshold"
            );
        }
        self.audit.record(
            "system",
            "stale_alert",
            Some(json!({
                "count": candidates.len(),
                "transaction_ids": candidates.iter().map(|t| t.id).collect::<Vec<_>>(),
            })),
        );

        let ids: Vec<_> = candidates.iter().map(|t| t.id).collect();
        queries::mark_alerted(&self.pool, &ids).await?;
        stats.alerted += ids.len();
        Ok(())
    }
}
