//! Trash transitions: move to trash, restore, purge, empty.
//!
//! A missing id is never an error here; the outcome says whether the row
//! existed.

use super::Lifecycle;
use crate::error::CoreResult;
use crate::triggers::TriggerOwner;
use crate::types::{EmptyTrashReport, OwnerKind, Outcome, TrashEntry};
use tracing::{debug, info, warn};

impl Lifecycle {
    /// Flag the entity as trashed and cancel its trigger.
    pub async fn move_to_trash(&self, kind: OwnerKind, id: i64) -> CoreResult<Outcome> {
        let owner = TriggerOwner { kind, id };
        let _guard = self.locks.lock(owner).await;

        let found = self
            .store(move |db| match kind {
                OwnerKind::Task => db.soft_delete_task(id),
                OwnerKind::Reminder => db.soft_delete_reminder(id),
            })
            .await?;
        if found {
            self.disarm(owner).await;
            info!(%owner, "Moved to trash");
        } else {
            debug!(%owner, "Move to trash: no such row");
        }
        Ok(Outcome::from_found(found))
    }

    /// Clear the trashed flag and re-arm the trigger when the entity is not
    /// completed and its instant has not passed.
    pub async fn restore_from_trash(&self, kind: OwnerKind, id: i64) -> CoreResult<Outcome> {
        let owner = TriggerOwner { kind, id };
        let _guard = self.locks.lock(owner).await;

        let pending_at = self
            .store(move |db| {
                let pending_at = match kind {
                    OwnerKind::Task => {
                        if !db.restore_task(id)? {
                            return Ok(None);
                        }
                        db.get_task(id)?
                            .map(|t| if t.completed { None } else { t.due_date })
                    }
                    OwnerKind::Reminder => {
                        if !db.restore_reminder(id)? {
                            return Ok(None);
                        }
                        db.get_reminder(id)?
                            .map(|r| if r.is_completed { None } else { Some(r.date_time) })
                    }
                };
                Ok(Some(pending_at.flatten()))
            })
            .await?;

        let Some(pending_at) = pending_at else {
            debug!(%owner, "Restore: no such row");
            return Ok(Outcome::NotFound);
        };
        if let Some(fire_at) = pending_at {
            if fire_at >= self.clock.now_ms() {
                self.arm(owner, fire_at).await;
            }
        }
        info!(%owner, "Restored from trash");
        Ok(Outcome::Applied)
    }

    /// Remove the entity for good (a task with its subtasks) and cancel its
    /// trigger.
    pub async fn permanent_delete(&self, kind: OwnerKind, id: i64) -> CoreResult<Outcome> {
        let owner = TriggerOwner { kind, id };
        let _guard = self.locks.lock(owner).await;

        let found = self
            .store(move |db| match kind {
                OwnerKind::Task => db.purge_task(id),
                OwnerKind::Reminder => db.purge_reminder(id),
            })
            .await?;
        self.disarm(owner).await;
        if found {
            info!(%owner, "Permanently deleted");
        }
        Ok(Outcome::from_found(found))
    }

    /// Purge every trashed task and reminder.
    ///
    /// Each row is purged under its own lock and only if it is still
    /// trashed by then. A row that fails stays in the trash and is counted;
    /// the run continues with the rest.
    pub async fn empty_trash(&self) -> CoreResult<EmptyTrashReport> {
        let trashed = self.store(|db| db.trashed_ids()).await?;
        let mut report = EmptyTrashReport::default();

        let owners = trashed
            .tasks
            .iter()
            .map(|&id| TriggerOwner::task(id))
            .chain(trashed.reminders.iter().map(|&id| TriggerOwner::reminder(id)));
        for owner in owners {
            let _guard = self.locks.lock(owner).await;
            let id = owner.id;
            let kind = owner.kind;
            let result = self
                .store(move |db| match kind {
                    OwnerKind::Task => db.purge_task_if_deleted(id),
                    OwnerKind::Reminder => db.purge_reminder_if_deleted(id),
                })
                .await;
            match result {
                Ok(true) => {
                    self.disarm(owner).await;
                    match kind {
                        OwnerKind::Task => report.tasks_purged += 1,
                        OwnerKind::Reminder => report.reminders_purged += 1,
                    }
                }
                Ok(false) => debug!(%owner, "Left the trash before purge"),
                Err(e) => {
                    warn!(%owner, error = %e, "Failed to purge trashed row");
                    report.failed += 1;
                }
            }
        }

        info!(
            tasks = report.tasks_purged,
            reminders = report.reminders_purged,
            failed = report.failed,
            "Emptied trash"
        );
        Ok(report)
    }

    /// Trashed tasks and reminders, newest first.
    pub async fn list_trash(&self) -> CoreResult<Vec<TrashEntry>> {
        let (tasks, reminders) = self
            .store(|db| Ok((db.list_deleted_tasks()?, db.list_deleted_reminders()?)))
            .await?;
        let mut entries: Vec<TrashEntry> = tasks
            .into_iter()
            .map(TrashEntry::Task)
            .chain(reminders.into_iter().map(TrashEntry::Reminder))
            .collect();
        entries.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| a.kind().cmp(&b.kind()))
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(entries)
    }
}
