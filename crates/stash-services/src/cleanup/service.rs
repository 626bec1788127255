use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use stash_core::constants::STALE_STAGING_SECS;
use stash_core::{AppError, Clock, RecordId};
use stash_db::RecordStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What the sweeper is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    Idle,
    Scanning,
    Deleting,
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records enumerated.
    pub scanned: usize,
    /// Records at or past the TTL when the pass started.
    pub expired: usize,
    pub deleted: usize,
    /// Expired records whose deletion failed; retried next pass.
    pub failed: usize,
    /// Blobs without metadata that were removed.
    pub orphans_removed: usize,
    /// Abandoned staging files that were removed.
    pub staging_removed: usize,
}

/// Age based expiration of records.
///
/// One pass enumerates every record, deletes those whose age is at least the
/// TTL, then reclaims orphaned blobs and stale staging files. Passes never
/// overlap; concurrent callers of [`RetentionSweeper::sweep`] queue up.
pub struct RetentionSweeper {
    store: RecordStore,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    interval: Duration,
    state: Mutex<SweepState>,
    pass: tokio::sync::Mutex<()>,
    completed_passes: AtomicU64,
}

/// Resets the state to `Idle` when a pass ends, however it ends.
struct IdleOnDrop<'a>(&'a RetentionSweeper);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set_state(SweepState::Idle);
    }
}

impl RetentionSweeper {
    pub fn new(
        store: RecordStore,
        clock: Arc<dyn Clock>,
        ttl: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            interval,
            state: Mutex::new(SweepState::Idle),
            pass: tokio::sync::Mutex::new(()),
            completed_passes: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SweepState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SweepState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Number of passes that ran to completion, successful or not.
    pub fn completed_passes(&self) -> u64 {
        self.completed_passes.load(Ordering::Acquire)
    }

    /// Run one pass using the injected clock.
    pub async fn sweep_now(&self) -> Result<SweepReport, AppError> {
        self.sweep(self.clock.now()).await
    }

    /// Run one pass, treating `now` as the current time.
    ///
    /// Individual delete failures are counted and logged. Failing to
    /// enumerate records fails the whole pass.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "sweep"))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let _pass = self.pass.lock().await;
        let _idle = IdleOnDrop(self);
        let start = Instant::now();

        self.set_state(SweepState::Scanning);
        let result = self.run_pass(now).await;
        self.completed_passes.fetch_add(1, Ordering::AcqRel);

        match &result {
            Ok(report) => {
                tracing::info!(
                    scanned = report.scanned,
                    expired = report.expired,
                    deleted = report.deleted,
                    failed = report.failed,
                    orphans_removed = report.orphans_removed,
                    staging_removed = report.staging_removed,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Retention sweep completed"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Retention sweep failed to enumerate records");
            }
        }

        result
    }

    async fn run_pass(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let mut report = SweepReport::default();

        // Eligibility is decided once, against the snapshot taken here.
        let mut expired: Vec<RecordId> = Vec::new();
        {
            let mut records = self.store.list_all();
            while let Some(record) = records.try_next().await? {
                report.scanned += 1;
                if record.age_at(now) >= self.ttl {
                    expired.push(record.id);
                }
            }
        }
        report.expired = expired.len();

        self.set_state(SweepState::Deleting);

        for id in expired {
            match self.store.delete(&id).await {
                Ok(true) => {
                    report.deleted += 1;
                    tracing::debug!(record_id = %id, "Deleted expired record");
                }
                Ok(false) => {
                    tracing::debug!(record_id = %id, "Expired record already gone");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, record_id = %id, "Failed to delete expired record");
                }
            }
        }

        match self.store.reclaim_orphans().await {
            Ok(removed) => report.orphans_removed = removed,
            Err(e) => tracing::warn!(error = %e, "Failed to scan for orphaned blobs"),
        }

        match self
            .store
            .purge_staging(Duration::from_secs(STALE_STAGING_SECS))
            .await
        {
            Ok(removed) => report.staging_removed = removed,
            Err(e) => tracing::warn!(error = %e, "Failed to purge staging directory"),
        }

        Ok(report)
    }

    /// Start the periodic sweep task.
    ///
    /// A pass runs immediately, then once per interval. A pass that is in
    /// progress when [`SweeperHandle::stop`] is called runs to completion.
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let cancel = CancellationToken::new();
        let trigger = Arc::new(Notify::new());

        let task = tokio::spawn({
            let cancel = cancel.clone();
            let trigger = trigger.clone();
            async move {
                let mut ticker = interval(self.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                tracing::info!(
                    interval_secs = self.interval.as_secs(),
                    ttl_days = self.ttl.num_days(),
                    "Retention sweeper started"
                );

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                        _ = trigger.notified() => {
                            tracing::debug!("Retention sweep triggered");
                        }
                    }

                    // Errors are logged inside; the next tick retries.
                    let _ = self.sweep(self.clock.now()).await;
                }

                tracing::info!("Retention sweeper stopped");
            }
        });

        SweeperHandle {
            cancel,
            trigger,
            task,
        }
    }
}

/// Control handle for a running [`RetentionSweeper`].
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    trigger: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Request an extra pass as soon as the current one (if any) finishes.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the sweeper and wait for its task to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Retention sweeper task ended abnormally");
        }
    }
}
