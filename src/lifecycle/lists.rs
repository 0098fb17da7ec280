//! List management.

use super::Lifecycle;
use crate::error::{CoreError, CoreResult};
use crate::triggers::TriggerOwner;
use crate::types::{NewTaskList, Outcome, TaskList};
use tracing::info;

impl Lifecycle {
    pub async fn create_list(&self, new: NewTaskList) -> CoreResult<TaskList> {
        if new.title.trim().is_empty() {
            return Err(CoreError::invalid("title", "must not be empty"));
        }
        let created_at = self.clock.now_ms();
        let list = self
            .store(move |db| db.insert_list(new.title.trim(), &new.icon, created_at))
            .await?;
        info!(list_id = list.id, "Created list");
        Ok(list)
    }

    pub async fn list_lists(&self) -> CoreResult<Vec<TaskList>> {
        self.store(|db| db.list_lists()).await
    }

    /// Delete a list with all its tasks and their subtasks. Every removed
    /// task's trigger is cancelled, including tasks added after the locks
    /// were taken.
    pub async fn delete_list(&self, list_id: i64) -> CoreResult<Outcome> {
        let task_ids = self.store(move |db| db.list_task_ids_in_list(list_id)).await?;
        let owners: Vec<TriggerOwner> = task_ids.iter().map(|&id| TriggerOwner::task(id)).collect();
        let _guards = self.locks.lock_many(owners.iter().copied()).await;

        let Some(removed) = self.store(move |db| db.delete_list_cascade(list_id)).await? else {
            return Ok(Outcome::NotFound);
        };
        for &task_id in &removed {
            self.disarm(TriggerOwner::task(task_id)).await;
        }
        info!(list_id, tasks = removed.len(), "Deleted list");
        Ok(Outcome::Applied)
    }

    /// Rewrite the home-view order of lists to their position in `list_ids`.
    /// Lists not named keep their position after the named ones.
    pub async fn reorder_lists_for_home(&self, list_ids: Vec<i64>) -> CoreResult<usize> {
        self.store(move |db| {
            let mut lists = db.list_lists()?;
            lists.sort_by_key(|l| {
                let rank = list_ids.iter().position(|&id| id == l.id).unwrap_or(usize::MAX);
                (rank, l.home_order_index, l.id)
            });
            for (position, list) in lists.iter_mut().enumerate() {
                list.home_order_index = position as i32;
            }
            db.update_lists(&lists)
        })
        .await
    }
}
