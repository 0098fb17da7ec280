//! Task list storage operations.

use super::Database;
use crate::types::TaskList;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};

fn parse_list_row(row: &Row) -> rusqlite::Result<TaskList> {
    Ok(TaskList {
        id: row.get("id")?,
        title: row.get("title")?,
        icon: row.get("icon")?,
        order_index: row.get("order_index")?,
        home_order_index: row.get("home_order_index")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Insert a list at the end of both the list order and the home order.
    pub fn insert_list(&self, title: &str, icon: &str, created_at: i64) -> Result<TaskList> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let (order_index, home_order_index): (i32, i32) = tx.query_row(
                "SELECT COALESCE(MAX(order_index) + 1, 0), COALESCE(MAX(home_order_index) + 1, 0)
                 FROM task_lists",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            tx.execute(
                "INSERT INTO task_lists (title, icon, order_index, home_order_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![title, icon, order_index, home_order_index, created_at],
            )?;
            let list = TaskList {
                id: tx.last_insert_rowid(),
                title: title.to_string(),
                icon: icon.to_string(),
                order_index,
                home_order_index,
                created_at,
            };
            tx.commit()?;
            Ok(list)
        })
    }

    /// Write a list's columns. Returns false when missing.
    pub fn update_list(&self, list: &TaskList) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE task_lists SET title = ?1, icon = ?2, order_index = ?3, home_order_index = ?4
                 WHERE id = ?5",
                params![list.title, list.icon, list.order_index, list.home_order_index, list.id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Write several lists in one transaction. Returns how many existed.
    pub fn update_lists(&self, lists: &[TaskList]) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut changed = 0;
            for list in lists {
                changed += tx.execute(
                    "UPDATE task_lists SET title = ?1, icon = ?2, order_index = ?3,
                                           home_order_index = ?4
                     WHERE id = ?5",
                    params![list.title, list.icon, list.order_index, list.home_order_index, list.id],
                )?;
            }
            tx.commit()?;
            Ok(changed)
        })
    }

    pub fn get_list(&self, list_id: i64) -> Result<Option<TaskList>> {
        self.with_conn(|conn| {
            let list = conn
                .query_row(
                    "SELECT id, title, icon, order_index, home_order_index, created_at
                     FROM task_lists WHERE id = ?1",
                    params![list_id],
                    parse_list_row,
                )
                .optional()?;
            Ok(list)
        })
    }

    /// All lists in list order.
    pub fn list_lists(&self) -> Result<Vec<TaskList>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, icon, order_index, home_order_index, created_at
                 FROM task_lists ORDER BY order_index ASC, id ASC",
            )?;
            let lists = stmt
                .query_map([], parse_list_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(lists)
        })
    }

    /// Ids of every task in a list, trashed ones included.
    pub fn list_task_ids_in_list(&self, list_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM tasks WHERE list_id = ?1 ORDER BY id ASC")?;
            let ids = stmt
                .query_map(params![list_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(ids)
        })
    }

    /// Remove a list with its tasks and their subtasks in one transaction.
    /// Returns the ids of the removed tasks, or None when the list does not
    /// exist.
    pub fn delete_list_cascade(&self, list_id: i64) -> Result<Option<Vec<i64>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let task_ids = {
                let mut stmt = tx.prepare("SELECT id FROM tasks WHERE list_id = ?1 ORDER BY id ASC")?;
                stmt.query_map(params![list_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?
            };
            tx.execute(
                "DELETE FROM subtasks WHERE task_id IN (SELECT id FROM tasks WHERE list_id = ?1)",
                params![list_id],
            )?;
            tx.execute("DELETE FROM tasks WHERE list_id = ?1", params![list_id])?;
            let deleted = tx.execute("DELETE FROM task_lists WHERE id = ?1", params![list_id])?;
            tx.commit()?;
            Ok((deleted > 0).then_some(task_ids))
        })
    }
}
