//! Overdue sweeper: moves borrowed records past their due date to
//! `overdue` and keeps accrued fines current.
//!
//! The sweep is a plain method so tests can drive a single pass
//! synchronously; [`OverdueSweeper::spawn`] wraps it in a recurring task
//! that runs once at startup and then on a fixed interval.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinHandle;

use crate::{error::AppResult, fine, repository::Repository};

/// Outcome of one sweep pass
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Borrowed records moved to overdue
    pub marked_overdue: u64,
    /// Already-overdue records whose fine was recomputed
    pub fines_refreshed: u64,
    /// Records skipped because of an individual storage failure
    pub failed: u64,
}

#[derive(Clone)]
pub struct OverdueSweeper {
    repository: Repository,
}

impl OverdueSweeper {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Run one sweep pass against the given reference date.
    ///
    /// Each record is updated independently; a failure on one is logged and
    /// does not abort the rest of the pass. Inventory is never touched
    /// here: copies were reserved at approval and are only released at
    /// return.
    pub async fn run_once(&self, today: NaiveDate) -> AppResult<SweepSummary> {
        let mut summary = SweepSummary::default();

        for t in self.repository.transactions.borrowed_past_due(today).await? {
            let fine_amount = fine::compute_fine(t.due_date, today);
            match self.repository.transactions.mark_overdue(t.id, fine_amount).await {
                Ok(true) => {
                    tracing::info!(transaction_id = t.id, fine_amount, "Transaction marked overdue");
                    summary.marked_overdue += 1;
                }
                // Raced with a return or extension; nothing to do
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(transaction_id = t.id, error = %e, "Failed to mark transaction overdue");
                    summary.failed += 1;
                }
            }
        }

        for t in self.repository.transactions.all_overdue().await? {
            let fine_amount = fine::compute_fine(t.due_date, today);
            if fine_amount == t.fine_amount {
                continue;
            }
            match self.repository.transactions.refresh_overdue_fine(t.id, fine_amount).await {
                Ok(true) => {
                    tracing::info!(transaction_id = t.id, fine_amount, "Overdue fine refreshed");
                    summary.fines_refreshed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(transaction_id = t.id, error = %e, "Failed to refresh overdue fine");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Start the recurring sweep. The first pass runs immediately.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let today = Utc::now().date_naive();
                match self.run_once(today).await {
                    Ok(summary) => {
                        if summary.marked_overdue > 0 || summary.fines_refreshed > 0 || summary.failed > 0 {
                            tracing::info!(
                                marked_overdue = summary.marked_overdue,
                                fines_refreshed = summary.fines_refreshed,
                                failed = summary.failed,
                                "Overdue sweep completed"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Overdue sweep pass failed");
                    }
                }
            }
        })
    }
}
