//! Task CRUD, trash flags and the queries behind views and reconciliation.

use super::{Database, placeholders};
use crate::types::{Recurrence, Task, TaskWithList, normalize_tags};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const TASK_COLUMNS: &str = "id, list_id, title, description, completed, tags, created_at, \
                            due_date, order_index, recurrence, is_deleted";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let recurrence: String = row.get("recurrence")?;
    Ok(Task {
        id: row.get("id")?,
        list_id: row.get("list_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        completed: row.get("completed")?,
        tags: row.get("tags")?,
        created_at: row.get("created_at")?,
        due_date: row.get("due_date")?,
        order_index: row.get("order_index")?,
        recurrence: Recurrence::parse(&recurrence),
        is_deleted: row.get("is_deleted")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, task_id: i64) -> Result<Option<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
    let task = conn
        .query_row(&sql, params![task_id], parse_task_row)
        .optional()?;
    Ok(task)
}

fn query_tasks(conn: &Connection, where_clause: &str, params: impl rusqlite::Params) -> Result<Vec<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks {where_clause}");
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params, parse_task_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn write_task(conn: &Connection, task: &Task) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE tasks SET list_id = ?1, title = ?2, description = ?3, completed = ?4, tags = ?5,
                          due_date = ?6, order_index = ?7, recurrence = ?8, is_deleted = ?9
         WHERE id = ?10",
        params![
            task.list_id,
            task.title,
            task.description,
            task.completed,
            normalize_tags(&task.tags),
            task.due_date,
            task.order_index,
            task.recurrence.as_str(),
            task.is_deleted,
            task.id,
        ],
    )?;
    Ok(changed)
}

impl Database {
    /// Insert a task together with its initial subtasks.
    ///
    /// `task.id` is ignored; the stored row (with its new id) is returned.
    pub fn insert_task(&self, task: &Task, subtask_titles: &[String]) -> Result<Task> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO tasks (list_id, title, description, completed, tags, created_at,
                                    due_date, order_index, recurrence, is_deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    task.list_id,
                    task.title,
                    task.description,
                    task.completed,
                    normalize_tags(&task.tags),
                    task.created_at,
                    task.due_date,
                    task.order_index,
                    task.recurrence.as_str(),
                    task.is_deleted,
                ],
            )?;
            let id = tx.last_insert_rowid();
            for title in subtask_titles {
                tx.execute(
                    "INSERT INTO subtasks (task_id, title, completed) VALUES (?1, ?2, 0)",
                    params![id, title],
                )?;
            }
            let stored = get_task_internal(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("task {id} vanished after insert"))?;
            tx.commit()?;
            Ok(stored)
        })
    }

    /// Overwrite every column of an existing task. Returns false when missing.
    pub fn update_task(&self, task: &Task) -> Result<bool> {
        self.with_conn(|conn| Ok(write_task(conn, task)? > 0))
    }

    /// Overwrite several tasks in one transaction. Returns how many existed.
    pub fn update_tasks(&self, tasks: &[Task]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for task in tasks {
                changed += write_task(&tx, task)?;
            }
            tx.commit()?;
            Ok(changed)
        })
    }

    /// Get a task by id, trashed or not.
    pub fn get_task(&self, task_id: i64) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Tasks not in the trash, newest first.
    pub fn list_active_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(conn, "WHERE is_deleted = 0 ORDER BY created_at DESC, id DESC", params![])
        })
    }

    /// Tasks in the trash, newest first.
    pub fn list_deleted_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(conn, "WHERE is_deleted = 1 ORDER BY created_at DESC, id DESC", params![])
        })
    }

    /// Active tasks of one list in list order.
    pub fn list_tasks_by_list(&self, list_id: i64) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "WHERE list_id = ?1 AND is_deleted = 0 ORDER BY order_index ASC, id ASC",
                params![list_id],
            )
        })
    }

    /// Active tasks joined with their list's title and home position and
    /// their subtask counts, in home-view order.
    pub fn list_tasks_with_lists(&self) -> Result<Vec<TaskWithList>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.id, t.list_id, t.title, t.description, t.completed, t.tags, t.created_at,
                        t.due_date, t.order_index, t.recurrence, t.is_deleted,
                        l.title AS list_title,
                        l.home_order_index AS list_home_order_index,
                        (SELECT COUNT(*) FROM subtasks s WHERE s.task_id = t.id) AS total_subtasks,
                        (SELECT COUNT(*) FROM subtasks s WHERE s.task_id = t.id AND s.completed = 1)
                            AS completed_subtasks
                 FROM tasks t
                 LEFT JOIN task_lists l ON t.list_id = l.id
                 WHERE t.is_deleted = 0
                 ORDER BY l.home_order_index ASC, t.list_id ASC, t.order_index ASC, t.id ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TaskWithList {
                        task: parse_task_row(row)?,
                        list_title: row.get("list_title")?,
                        list_home_order_index: row.get("list_home_order_index")?,
                        total_subtasks: row.get("total_subtasks")?,
                        completed_subtasks: row.get("completed_subtasks")?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Mark a task as trashed. Returns false when the id does not exist.
    pub fn soft_delete_task(&self, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET is_deleted = 1 WHERE id = ?1",
                params![task_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Take a task out of the trash. Returns false when the id does not exist.
    pub fn restore_task(&self, task_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET is_deleted = 0 WHERE id = ?1",
                params![task_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Remove a task and its subtasks. Returns false when the id does not exist.
    pub fn purge_task(&self, task_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM subtasks WHERE task_id = ?1", params![task_id])?;
            let deleted = tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    /// Alias of [`Database::purge_task`] for callers deleting outside the trash flow.
    pub fn delete_task(&self, task_id: i64) -> Result<bool> {
        self.purge_task(task_id)
    }

    /// Remove a task only if it is still in the trash.
    pub fn purge_task_if_deleted(&self, task_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let trashed: Option<bool> = tx
                .query_row(
                    "SELECT is_deleted FROM tasks WHERE id = ?1",
                    params![task_id],
                    |row| row.get(0),
                )
                .optional()?;
            if trashed != Some(true) {
                return Ok(false);
            }
            tx.execute("DELETE FROM subtasks WHERE task_id = ?1", params![task_id])?;
            tx.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Completed, recurring, dated, active tasks: the reconciler's scan set.
    pub fn list_completed_recurring(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "WHERE completed = 1 AND recurrence != 'NONE' AND due_date IS NOT NULL
                   AND is_deleted = 0
                 ORDER BY due_date ASC, id ASC",
                params![],
            )
        })
    }

    /// Active, not completed tasks due strictly after `after_ms`.
    pub fn list_pending_tasks_due_after(&self, after_ms: i64) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "WHERE completed = 0 AND is_deleted = 0 AND due_date > ?1
                 ORDER BY due_date ASC, id ASC",
                params![after_ms],
            )
        })
    }

    /// Move a completed recurring task to its next occurrence and reset its
    /// subtasks, in one transaction.
    ///
    /// Applies only while the row is still completed, active and due at
    /// `expected_due`, so a concurrent edit or a second pass is not
    /// overwritten. Returns whether the reset happened.
    pub fn reset_occurrence(&self, task_id: i64, expected_due: i64, next_due: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE tasks SET completed = 0, due_date = ?1
                 WHERE id = ?2 AND completed = 1 AND is_deleted = 0 AND due_date = ?3",
                params![next_due, task_id, expected_due],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            tx.execute(
                "UPDATE subtasks SET completed = 0 WHERE task_id = ?1",
                params![task_id],
            )?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Set the completed flag. Returns the updated task, or None when missing.
    pub fn set_task_completed(&self, task_id: i64, completed: bool) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tasks SET completed = ?1 WHERE id = ?2",
                params![completed, task_id],
            )?;
            get_task_internal(conn, task_id)
        })
    }

    /// Next free position at the end of a list.
    pub fn next_order_index(&self, list_id: i64) -> Result<i32> {
        self.with_conn(|conn| {
            let max: Option<i32> = conn.query_row(
                "SELECT MAX(order_index) FROM tasks WHERE list_id = ?1",
                params![list_id],
                |row| row.get(0),
            )?;
            Ok(max.map_or(0, |m| m + 1))
        })
    }

    /// Rewrite the order of the given tasks to their position in `task_ids`.
    pub fn reorder_tasks(&self, task_ids: &[i64]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for (position, id) in task_ids.iter().enumerate() {
                changed += tx.execute(
                    "UPDATE tasks SET order_index = ?1 WHERE id = ?2",
                    params![position as i32, id],
                )?;
            }
            tx.commit()?;
            Ok(changed)
        })
    }

    /// Active tasks whose title, description or tags contain `query`.
    pub fn search_tasks(&self, query: &str) -> Result<Vec<Task>> {
        let pattern = format!("%{}%", query.trim());
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "WHERE (title LIKE ?1 OR description LIKE ?1 OR tags LIKE ?1) AND is_deleted = 0
                 ORDER BY created_at DESC, id DESC",
                params![pattern],
            )
        })
    }

    /// Active tasks due within `[start_ms, end_ms]`, earliest first.
    pub fn tasks_between(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            query_tasks(
                conn,
                "WHERE due_date BETWEEN ?1 AND ?2 AND is_deleted = 0
                 ORDER BY due_date ASC, id ASC",
                params![start_ms, end_ms],
            )
        })
    }

    /// Fetch several tasks by id, in id order; missing ids are skipped.
    pub fn get_tasks(&self, task_ids: &[i64]) -> Result<Vec<Task>> {
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let where_clause = format!("WHERE id IN ({}) ORDER BY id ASC", placeholders(task_ids.len()));
            query_tasks(conn, &where_clause, rusqlite::params_from_iter(task_ids.iter()))
        })
    }
}
