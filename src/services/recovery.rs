//! Recovery scheduler.
//!
//! Finds pending transactions older than the configured age and
//! force-completes them so abandoned sales are reconciled against inventory.
//! Each transaction is processed independently: a failure is logged and
//! counted and the sweep moves on, while a failure to even list the pending
//! set aborts the run and is retried on the next tick. All age math is UTC.
//!
//! Running this on more than one process instance is safe only because the
//! store's conditional status transition makes the duplicate force-complete
//! attempt lose cleanly; there is no distributed lock.

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::ports::TransactionStore;
use crate::services::lifecycle::TransactionLifecycle;
use crate::services::stats::{PendingStats, StatsReporter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub completed: u32,
    pub errors: u32,
}

pub struct RecoveryScheduler {
    lifecycle: Arc<TransactionLifecycle>,
    store: Arc<dyn TransactionStore>,
    reporter: StatsReporter,
    sweep_interval: Duration,
    max_age_hours: i64,
}

impl RecoveryScheduler {
    pub fn new(
        lifecycle: Arc<TransactionLifecycle>,
        store: Arc<dyn TransactionStore>,
        sweep_interval: Duration,
        max_age_hours: i64,
    ) -> Self {
        let reporter = StatsReporter::new(store.clone());
        Self {
            lifecycle,
            store,
            reporter,
            sweep_interval,
            max_age_hours,
        }
    }

    /// One sweep pass. Partial-failure semantics: per-transaction errors are
    /// counted, never propagated; only the initial listing can fail the run.
    pub async fn auto_complete(&self, max_age_hours: i64) -> Result<SweepOutcome, AppError> {
        let cutoff = Utc::now() - ChronoDuration::hours(max_age_hours);
        let stale = self.store.list_pending_older_than(cutoff).await?;

        let mut outcome = SweepOutcome::default();
        for tx in stale {
            match self.lifecycle.force_complete(tx.id).await {
                Ok(_) => outcome.completed += 1,
                Err(err) => {
                    warn!("Sweep failed to complete transaction {}: {}", tx.id, err);
                    outcome.errors += 1;
                }
            }
        }

        info!(
            "Sweep finished: {} completed, {} error(s)",
            outcome.completed, outcome.errors
        );
        Ok(outcome)
    }

    /// On-demand sweep with the configured max age. Safe to call while the
    /// timer is mid-sweep; duplicated attempts lose the per-transaction CAS.
    pub async fn trigger_now(&self) -> Result<SweepOutcome, AppError> {
        self.auto_complete(self.max_age_hours).await
    }

    pub async fn pending_stats(&self) -> Result<PendingStats, AppError> {
        self.reporter.pending_stats().await
    }

    /// Background loop: sweep, sleep, repeat. A failed run is logged and the
    /// next tick retries from scratch, since failed transactions still match
    /// the age predicate.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Recovery scheduler started (interval {:?}, max age {}h)",
            self.sweep_interval, self.max_age_hours
        );

        loop {
            sleep(self.sweep_interval).await;
            if let Err(err) = self.auto_complete(self.max_age_hours).await {
                error!("Sweep run failed: {}", err);
            }
        }
    }
}
