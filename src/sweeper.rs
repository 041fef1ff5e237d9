//! Sweep of expired, exhausted and undecodable actions.
//!
//! Expiration is lazy, so spent records linger until someone presents them
//! or a sweep runs. [`SecureActions::sweep`] is the entry point for whatever
//! scheduler the host uses; [`spawn_sweep_task`] is a ready-made tokio loop.

use crate::db::DbError;
use crate::engine::SecureActions;
use crate::error::ActionResult;
use crate::metrics;
use crate::policy;
use crate::telemetry::spans;
use futures_util::TryStreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, info, warn};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rows read from the store.
    pub scanned: u64,
    /// Records removed because policy or the cleanup predicate said so.
    pub evicted: u64,
    /// Rows removed because their callback or arguments no longer decode.
    pub corrupt: u64,
}

impl SweepReport {
    pub fn removed(&self) -> u64 {
        self.evicted + self.corrupt
    }
}

impl SecureActions {
    /// Remove every record that should no longer exist.
    ///
    /// Rows are read in id-ordered pages of `sweeper.batch_size`, and each
    /// page's victims are deleted before the next page is read, so memory is
    /// bounded by the batch size rather than the table. Records deleted or
    /// changed by concurrent callers in the meantime are tolerated: deletion
    /// of an absent id is a no-op and a record that became persistent is
    /// spared.
    pub async fn sweep(&self) -> ActionResult<SweepReport> {
        self.sweep_inner().instrument(spans::sweep()).await
    }

    async fn sweep_inner(&self) -> ActionResult<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();
        let mut after_id = 0;

        while let Some(last_id) = self.sweep_page(after_id, now, &mut report).await? {
            after_id = last_id;
        }

        metrics::record_sweep(report.removed());
        if report.removed() > 0 {
            info!(
                scanned = report.scanned,
                evicted = report.evicted,
                corrupt = report.corrupt,
                "Secure actions swept"
            );
        }
        Ok(report)
    }

    /// Sweep one page after `after_id`. Returns the last id read, or `None`
    /// once a short page shows the scan is complete.
    async fn sweep_page(
        &self,
        after_id: i64,
        now: i64,
        report: &mut SweepReport,
    ) -> ActionResult<Option<i64>> {
        let mut victims = Vec::with_capacity(self.sweep_batch);
        let mut corrupt = Vec::new();
        let mut read = 0;
        let mut last_id = after_id;

        // The stream must be dropped before deleting: an in-memory store has a
        // single connection.
        {
            let repo = self.db.actions();
            let mut rows = repo.stream_page(after_id, self.sweep_batch as i64);
            while let Some(row) = rows.try_next().await? {
                read += 1;
                let id = row.id;
                last_id = id;
                match row.into_record() {
                    Ok(record) => {
                        if policy::should_evict(&record, now, self.cleanup.as_ref()) {
                            victims.push(id);
                        }
                    }
                    Err(DbError::Corrupt { field, reason, .. }) => {
                        warn!(action_id = id, field = field, reason = %reason, "Undecodable secure action");
                        corrupt.push(id);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        report.scanned += read as u64;

        let repo = self.db.actions();
        for id in victims {
            if repo.delete_evictable(id).await? {
                report.evicted += 1;
            }
            self.invalidate(id);
        }
        for id in corrupt {
            if repo.delete(id).await? {
                report.corrupt += 1;
            }
            self.invalidate(id);
        }

        if read < self.sweep_batch {
            Ok(None)
        } else {
            Ok(Some(last_id))
        }
    }
}

/// Run [`SecureActions::sweep`] once at startup and then every `period`.
///
/// Failures are logged and the loop keeps going.
pub fn spawn_sweep_task(actions: Arc<SecureActions>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        // The first tick completes immediately.
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = actions.sweep().await {
                warn!(error = %e, "Failed to sweep secure actions");
            }
        }
    })
}
