//! Recurrence reconciler.
//!
//! Completed recurring tasks stay completed until a pass finds their next
//! occurrence has arrived. The pass then resets them in place: not
//! completed, due at the first occurrence after now, subtasks cleared, and
//! a trigger armed for the new due instant.

use crate::clock::instant_from_ms;
use crate::error::CoreResult;
use crate::lifecycle::Lifecycle;
use crate::triggers::TriggerOwner;
use crate::types::Task;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default time between passes.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Rows returned by the scan.
    pub scanned: usize,
    /// Rows moved to their next occurrence.
    pub reset: usize,
    /// Rows left alone (next occurrence still ahead, or changed since the scan).
    pub skipped: usize,
    /// Rows that hit a store error.
    pub failed: usize,
    /// Occurrences passed over by catch-up, not counting the ones landed on.
    pub occurrences_skipped: u64,
    /// The pass stopped early on shutdown.
    pub interrupted: bool,
}

enum RowOutcome {
    Reset { steps: u32 },
    Skipped,
}

#[derive(Clone)]
pub struct Reconciler {
    lifecycle: Lifecycle,
    interval: Duration,
    run_on_startup: bool,
    shutdown: Option<watch::Receiver<bool>>,
}

impl Reconciler {
    pub fn new(lifecycle: Lifecycle) -> Self {
        Self {
            lifecycle,
            interval: DEFAULT_INTERVAL,
            run_on_startup: true,
            shutdown: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_run_on_startup(mut self, run_on_startup: bool) -> Self {
        self.run_on_startup = run_on_startup;
        self
    }

    fn stop_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run one pass over every completed recurring task.
    ///
    /// A store failure on one row is logged and counted; the pass moves on.
    /// Only the initial scan failing fails the pass.
    pub async fn run_pass(&self) -> CoreResult<ReconcileReport> {
        let candidates = self.lifecycle.store(|db| db.list_completed_recurring()).await?;
        let mut report = ReconcileReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            if self.stop_requested() {
                report.interrupted = true;
                info!("Reconcile pass interrupted by shutdown");
                break;
            }
            match self.reconcile_task(candidate.id).await {
                Ok(RowOutcome::Reset { steps }) => {
                    report.reset += 1;
                    report.occurrences_skipped += u64::from(steps.saturating_sub(1));
                }
                Ok(RowOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(task_id = candidate.id, error = %e, "Failed to reconcile task");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            reset = report.reset,
            skipped = report.skipped,
            failed = report.failed,
            "Reconcile pass finished"
        );
        Ok(report)
    }

    async fn reconcile_task(&self, task_id: i64) -> CoreResult<RowOutcome> {
        let owner = TriggerOwner::task(task_id);
        let _guard = self.lifecycle.locks().lock(owner).await;

        // The scan is a snapshot; decide on the row as it is now.
        let Some(task) = self.lifecycle.store(move |db| db.get_task(task_id)).await? else {
            return Ok(RowOutcome::Skipped);
        };
        let Some((due_ms, next_ms, steps)) = self.plan(&task) else {
            return Ok(RowOutcome::Skipped);
        };

        let applied = self
            .lifecycle
            .store(move |db| db.reset_occurrence(task_id, due_ms, next_ms))
            .await?;
        if !applied {
            return Ok(RowOutcome::Skipped);
        }

        debug!(task_id, next_due = next_ms, steps, "Reset recurring task");
        self.lifecycle.arm(owner, next_ms).await;
        Ok(RowOutcome::Reset { steps })
    }

    /// Current due, new due and step count when the task's next occurrence
    /// has arrived.
    fn plan(&self, task: &Task) -> Option<(i64, i64, u32)> {
        if !task.completed || task.is_deleted {
            return None;
        }
        let rule = task.recurrence.rule()?;
        let due_ms = task.due_date?;
        let clock = self.lifecycle.clock();
        let now = clock.now();
        let zone = clock.zone();
        let due = instant_from_ms(due_ms);

        if zone.next_occurrence(due, rule) > now {
            return None;
        }
        let (next, steps) = zone.first_occurrence_after(due, rule, now);
        Some((due_ms, next.timestamp_millis(), steps))
    }

    /// Run passes on a fixed interval until `shutdown` turns true or its
    /// sender is dropped. The first pass runs immediately when
    /// `run_on_startup` is set.
    pub fn spawn(mut self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        self.shutdown = Some(shutdown.clone());
        let mut shutdown = shutdown;
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Reconciler started");
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            if !self.run_on_startup {
                // The first tick completes immediately.
                interval.tick().await;
            }

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                if *shutdown.borrow() {
                    break;
                }
                if let Err(e) = self.run_pass().await {
                    warn!(error = %e, "Reconcile pass failed");
                }
            }
            info!("Reconciler stopped");
        })
    }
}
