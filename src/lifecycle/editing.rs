//! Creating and editing tasks, subtasks and reminders, and the trigger
//! bookkeeping that goes with each edit.

use super::Lifecycle;
use crate::error::{CoreError, CoreResult};
use crate::triggers::{ScheduleOutcome, TriggerOwner};
use crate::types::{
    NewReminder, NewTask, OwnerKind, Outcome, Reminder, Subtask, Task, normalize_tags,
};
use chrono::TimeDelta;
use tracing::{debug, info};

fn validate_title(title: &str) -> CoreResult<()> {
    if title.trim().is_empty() {
        return Err(CoreError::invalid("title", "must not be empty"));
    }
    Ok(())
}

impl Lifecycle {
    /// Insert a task with its initial subtasks and arm its trigger when the
    /// due instant is in the future.
    pub async fn create_task(&self, new: NewTask) -> CoreResult<Task> {
        validate_title(&new.title)?;
        let list_id = new.list_id;
        let created_at = self.clock.now_ms();

        let task = self
            .store(move |db| {
                if db.get_list(list_id)?.is_none() {
                    return Ok(None);
                }
                let order_index = match new.order_index {
                    Some(index) => index,
                    None => db.next_order_index(list_id)?,
                };
                let task = Task {
                    id: 0,
                    list_id,
                    title: new.title.trim().to_string(),
                    description: new.description,
                    completed: false,
                    tags: normalize_tags(&new.tags),
                    created_at,
                    due_date: new.due_date,
                    order_index,
                    recurrence: new.recurrence,
                    is_deleted: false,
                };
                db.insert_task(&task, &new.subtasks).map(Some)
            })
            .await?
            .ok_or_else(|| CoreError::list_not_found(list_id))?;

        info!(task_id = task.id, list_id, "Created task");
        if let Some(due) = task.due_date {
            let owner = TriggerOwner::task(task.id);
            let _guard = self.locks.lock(owner).await;
            self.arm(owner, due).await;
        }
        Ok(task)
    }

    /// Write a task and bring its trigger in line: armed while it has a due
    /// date and is neither completed nor trashed, cancelled otherwise.
    pub async fn update_task(&self, task: Task) -> CoreResult<Outcome> {
        validate_title(&task.title)?;
        let owner = TriggerOwner::task(task.id);
        let _guard = self.locks.lock(owner).await;

        let stored = task.clone();
        let found = self.store(move |db| db.update_task(&stored)).await?;
        if !found {
            return Ok(Outcome::NotFound);
        }
        match task.due_date {
            Some(due) if !task.completed && !task.is_deleted => {
                self.rearm(owner, due).await;
            }
            _ => self.disarm(owner).await,
        }
        debug!(task_id = task.id, "Updated task");
        Ok(Outcome::Applied)
    }

    /// Flip a task's completed flag. Completing cancels its trigger;
    /// un-completing re-arms it for a future due date. A completed recurring
    /// task stays completed until the reconciler moves it on.
    ///
    /// Returns the updated task, or None when it does not exist.
    pub async fn toggle_task_completion(&self, task_id: i64) -> CoreResult<Option<Task>> {
        let owner = TriggerOwner::task(task_id);
        let _guard = self.locks.lock(owner).await;

        let updated = self
            .store(move |db| match db.get_task(task_id)? {
                Some(task) => db.set_task_completed(task_id, !task.completed),
                None => Ok(None),
            })
            .await?;
        let Some(task) = updated else {
            return Ok(None);
        };

        if task.completed {
            self.disarm(owner).await;
        } else if let (Some(due), false) = (task.due_date, task.is_deleted) {
            self.arm(owner, due).await;
        }
        info!(task_id, completed = task.completed, "Toggled task completion");
        Ok(Some(task))
    }

    /// Replace the subtasks of a task.
    pub async fn replace_subtasks(&self, task_id: i64, titles: Vec<String>) -> CoreResult<Vec<Subtask>> {
        let owner = TriggerOwner::task(task_id);
        let _guard = self.locks.lock(owner).await;

        self.store(move |db| {
            if db.get_task(task_id)?.is_none() {
                return Ok(None);
            }
            db.replace_subtasks(task_id, &titles).map(Some)
        })
        .await?
        .ok_or_else(|| CoreError::task_not_found(task_id))
    }

    /// Flip one subtask's completed flag under its parent task's lock.
    pub async fn toggle_subtask(&self, subtask_id: i64) -> CoreResult<Option<Subtask>> {
        let Some(subtask) = self.store(move |db| db.get_subtask(subtask_id)).await? else {
            return Ok(None);
        };
        let _guard = self.locks.lock(TriggerOwner::task(subtask.task_id)).await;

        let toggled = Subtask {
            completed: !subtask.completed,
            ..subtask
        };
        let stored = toggled.clone();
        let found = self.store(move |db| db.update_subtask(&stored)).await?;
        Ok(found.then_some(toggled))
    }

    /// Rewrite the order of tasks to their position in `task_ids`.
    pub async fn reorder_tasks(&self, task_ids: Vec<i64>) -> CoreResult<usize> {
        let _guards = self
            .locks
            .lock_many(task_ids.iter().map(|&id| TriggerOwner::task(id)))
            .await;
        let changed = self.store(move |db| db.reorder_tasks(&task_ids)).await?;
        debug!(changed, "Reordered tasks");
        Ok(changed)
    }

    /// Insert a reminder and arm its trigger.
    pub async fn create_reminder(&self, new: NewReminder) -> CoreResult<Reminder> {
        validate_title(&new.title)?;
        let reminder = Reminder {
            id: 0,
            title: new.title.trim().to_string(),
            description: new.description,
            date_time: new.date_time,
            is_completed: false,
            is_deleted: false,
            created_at: self.clock.now_ms(),
        };
        let reminder = self.store(move |db| db.insert_reminder(&reminder)).await?;

        info!(reminder_id = reminder.id, "Created reminder");
        let owner = TriggerOwner::reminder(reminder.id);
        let _guard = self.locks.lock(owner).await;
        self.arm(owner, reminder.date_time).await;
        Ok(reminder)
    }

    /// Write a reminder; re-arm it while pending, cancel it once completed
    /// or trashed.
    pub async fn update_reminder(&self, reminder: Reminder) -> CoreResult<Outcome> {
        validate_title(&reminder.title)?;
        let owner = TriggerOwner::reminder(reminder.id);
        let _guard = self.locks.lock(owner).await;

        let stored = reminder.clone();
        let found = self.store(move |db| db.update_reminder(&stored)).await?;
        if !found {
            return Ok(Outcome::NotFound);
        }
        if reminder.is_completed || reminder.is_deleted {
            self.disarm(owner).await;
        } else {
            self.rearm(owner, reminder.date_time).await;
        }
        Ok(Outcome::Applied)
    }

    /// Flip a reminder's completed flag, with the same trigger rules as tasks.
    pub async fn toggle_reminder_completion(&self, reminder_id: i64) -> CoreResult<Option<Reminder>> {
        let owner = TriggerOwner::reminder(reminder_id);
        let _guard = self.locks.lock(owner).await;

        let updated = self
            .store(move |db| match db.get_reminder(reminder_id)? {
                Some(reminder) => db.set_reminder_completed(reminder_id, !reminder.is_completed),
                None => Ok(None),
            })
            .await?;
        let Some(reminder) = updated else {
            return Ok(None);
        };

        if reminder.is_completed {
            self.disarm(owner).await;
        } else if !reminder.is_deleted {
            self.arm(owner, reminder.date_time).await;
        }
        Ok(Some(reminder))
    }

    /// Re-arm the owner's trigger `minutes` from now (the configured default
    /// when None) without touching its stored instant.
    ///
    /// Returns None when the owner does not exist or is trashed.
    pub async fn snooze(
        &self,
        owner: TriggerOwner,
        minutes: Option<i64>,
    ) -> CoreResult<Option<ScheduleOutcome>> {
        let minutes = minutes.unwrap_or(self.snooze_minutes);
        if minutes <= 0 {
            return Err(CoreError::invalid("minutes", "must be positive"));
        }
        let _guard = self.locks.lock(owner).await;

        let id = owner.id;
        let active = self
            .store(move |db| {
                Ok(match owner.kind {
                    OwnerKind::Task => db.get_task(id)?.is_some_and(|t| !t.is_deleted),
                    OwnerKind::Reminder => db.get_reminder(id)?.is_some_and(|r| !r.is_deleted),
                })
            })
            .await?;
        if !active {
            return Ok(None);
        }

        let fire_at = self.clock.now() + TimeDelta::minutes(minutes);
        let outcome = self.triggers.schedule(owner, fire_at).await?;
        info!(%owner, minutes, "Snoozed trigger");
        Ok(Some(outcome))
    }
}
