//! Lifecycle engine: trash, editing and trigger bookkeeping for tasks and
//! reminders.
//!
//! Every mutation of one entity runs under that entity's lock. Store calls
//! run on the blocking pool. A trigger failure is logged and never undoes
//! the state change that requested it.

mod editing;
mod lists;
mod locks;
mod trash;

pub use locks::{EntityGuard, EntityLocks};

use crate::clock::{Clock, instant_from_ms};
use crate::db::Database;
use crate::error::{CoreError, CoreResult};
use crate::triggers::{ScheduleOutcome, TriggerOwner, TriggerScheduler};
use crate::types::TaskWithList;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snooze length used when the caller does not give one.
pub const DEFAULT_SNOOZE_MINUTES: i64 = 60;

/// Counts from a startup re-arm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RearmReport {
    pub tasks: usize,
    pub reminders: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Lifecycle {
    db: Database,
    triggers: Arc<dyn TriggerScheduler>,
    clock: Arc<dyn Clock>,
    locks: EntityLocks,
    snooze_minutes: i64,
}

impl Lifecycle {
    pub fn new(db: Database, triggers: Arc<dyn TriggerScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            triggers,
            clock,
            locks: EntityLocks::new(),
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
        }
    }

    /// Override the default snooze length.
    pub fn with_snooze_minutes(mut self, minutes: i64) -> Self {
        self.snooze_minutes = minutes;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn triggers(&self) -> &Arc<dyn TriggerScheduler> {
        &self.triggers
    }

    pub fn locks(&self) -> &EntityLocks {
        &self.locks
    }

    /// Run a store call on the blocking pool.
    pub(crate) async fn store<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await?
            .map_err(CoreError::Store)
    }

    /// Arm the owner's trigger at `fire_at_ms`. Failures are logged only.
    pub(crate) async fn arm(&self, owner: TriggerOwner, fire_at_ms: i64) -> Option<ScheduleOutcome> {
        match self.triggers.schedule(owner, instant_from_ms(fire_at_ms)).await {
            Ok(outcome) => {
                match outcome {
                    ScheduleOutcome::Inexact => {
                        info!(%owner, "Exact triggers unavailable, armed inexact trigger")
                    }
                    ScheduleOutcome::SkippedPast => {
                        debug!(%owner, fire_at_ms, "Trigger instant already passed")
                    }
                    ScheduleOutcome::Exact => debug!(%owner, fire_at_ms, "Armed trigger"),
                }
                Some(outcome)
            }
            Err(e) => {
                warn!(%owner, error = %e, "Failed to arm trigger");
                None
            }
        }
    }

    /// Move an already armed owner to a new instant. A past instant leaves
    /// nothing to fire, so the old trigger is cancelled.
    pub(crate) async fn rearm(&self, owner: TriggerOwner, fire_at_ms: i64) {
        if let Some(ScheduleOutcome::SkippedPast) = self.arm(owner, fire_at_ms).await {
            self.disarm(owner).await;
        }
    }

    /// Cancel the owner's trigger. Failures are logged only.
    pub(crate) async fn disarm(&self, owner: TriggerOwner) {
        if let Err(e) = self.triggers.cancel(owner).await {
            warn!(%owner, error = %e, "Failed to cancel trigger");
        }
    }

    /// Active tasks joined with list data, the input of the task views.
    pub async fn joined_tasks(&self) -> CoreResult<Vec<TaskWithList>> {
        self.store(|db| db.list_tasks_with_lists()).await
    }

    /// Arm a trigger for every active, not completed task and reminder that
    /// is still in the future. Run once at process start.
    pub async fn rearm_pending_triggers(&self) -> CoreResult<RearmReport> {
        let now_ms = self.clock.now_ms();
        let (tasks, reminders) = self
            .store(move |db| {
                Ok((
                    db.list_pending_tasks_due_after(now_ms)?,
                    db.list_pending_reminders_after(now_ms)?,
                ))
            })
            .await?;

        let mut report = RearmReport::default();
        for task in tasks {
            let Some(due) = task.due_date else { continue };
            let owner = TriggerOwner::task(task.id);
            let _guard = self.locks.lock(owner).await;
            match self.arm(owner, due).await {
                Some(outcome) if outcome.is_armed() => report.tasks += 1,
                Some(_) => {}
                None => report.failed += 1,
            }
        }
        for reminder in reminders {
            let owner = TriggerOwner::reminder(reminder.id);
            let _guard = self.locks.lock(owner).await;
            match self.arm(owner, reminder.date_time).await {
                Some(outcome) if outcome.is_armed() => report.reminders += 1,
                Some(_) => {}
                None => report.failed += 1,
            }
        }
        info!(
            tasks = report.tasks,
            reminders = report.reminders,
            failed = report.failed,
            "Re-armed pending triggers"
        );
        Ok(report)
    }
}
