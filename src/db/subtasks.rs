//! Subtask storage operations.

use super::Database;
use crate::types::Subtask;
use anyhow::{Result, anyhow};
use rusqlite::{OptionalExtension, Row, params};

fn parse_subtask_row(row: &Row) -> rusqlite::Result<Subtask> {
    Ok(Subtask {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        title: row.get("title")?,
        completed: row.get("completed")?,
    })
}

impl Database {
    /// Add a subtask to an existing task.
    pub fn insert_subtask(&self, task_id: i64, title: &str) -> Result<Subtask> {
        self.with_conn(|conn| {
            let exists: bool = conn
                .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![task_id], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            if !exists {
                return Err(anyhow!("Task not found: {task_id}"));
            }

            conn.execute(
                "INSERT INTO subtasks (task_id, title, completed) VALUES (?1, ?2, 0)",
                params![task_id, title],
            )?;
            Ok(Subtask {
                id: conn.last_insert_rowid(),
                task_id,
                title: title.to_string(),
                completed: false,
            })
        })
    }

    /// Write a subtask's title and completed flag. Returns false when missing.
    pub fn update_subtask(&self, subtask: &Subtask) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE subtasks SET title = ?1, completed = ?2 WHERE id = ?3",
                params![subtask.title, subtask.completed, subtask.id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_subtask(&self, subtask_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM subtasks WHERE id = ?1", params![subtask_id])?;
            Ok(deleted > 0)
        })
    }

    pub fn get_subtask(&self, subtask_id: i64) -> Result<Option<Subtask>> {
        self.with_conn(|conn| {
            let subtask = conn
                .query_row(
                    "SELECT id, task_id, title, completed FROM subtasks WHERE id = ?1",
                    params![subtask_id],
                    parse_subtask_row,
                )
                .optional()?;
            Ok(subtask)
        })
    }

    /// Subtasks of a task in creation order.
    pub fn list_subtasks(&self, task_id: i64) -> Result<Vec<Subtask>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, title, completed FROM subtasks
                 WHERE task_id = ?1 ORDER BY id ASC",
            )?;
            let subtasks = stmt
                .query_map(params![task_id], parse_subtask_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(subtasks)
        })
    }

    /// Mark every subtask of a task not completed. Returns the number touched.
    pub fn reset_subtasks_for_task(&self, task_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE subtasks SET completed = 0 WHERE task_id = ?1",
                params![task_id],
            )?;
            Ok(changed)
        })
    }

    /// Replace all subtasks of a task with fresh, not completed ones.
    pub fn replace_subtasks(&self, task_id: i64, titles: &[String]) -> Result<Vec<Subtask>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM subtasks WHERE task_id = ?1", params![task_id])?;
            let mut created = Vec::with_capacity(titles.len());
            for title in titles {
                tx.execute(
                    "INSERT INTO subtasks (task_id, title, completed) VALUES (?1, ?2, 0)",
                    params![task_id, title],
                )?;
                created.push(Subtask {
                    id: tx.last_insert_rowid(),
                    task_id,
                    title: title.clone(),
                    completed: false,
                });
            }
            tx.commit()?;
            Ok(created)
        })
    }
}
