//! Bulk trash queries spanning tasks and reminders.

use super::{Database, placeholders};
use anyhow::Result;
use rusqlite::{Connection, params_from_iter};

/// Ids currently in the trash, per entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrashedIds {
    pub tasks: Vec<i64>,
    pub reminders: Vec<i64>,
}

impl TrashedIds {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.reminders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len() + self.reminders.len()
    }
}

fn ids(conn: &Connection, sql: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

impl Database {
    /// Snapshot of every trashed task and reminder id.
    pub fn trashed_ids(&self) -> Result<TrashedIds> {
        self.with_conn(|conn| {
            Ok(TrashedIds {
                tasks: ids(conn, "SELECT id FROM tasks WHERE is_deleted = 1 ORDER BY id")?,
                reminders: ids(conn, "SELECT id FROM reminders WHERE is_deleted = 1 ORDER BY id")?,
            })
        })
    }

    /// Remove every trashed row of both types in one transaction, subtasks
    /// of trashed tasks first. Returns the ids that were removed.
    pub fn purge_all_deleted(&self) -> Result<TrashedIds> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let purged = TrashedIds {
                tasks: ids(&tx, "SELECT id FROM tasks WHERE is_deleted = 1 ORDER BY id")?,
                reminders: ids(&tx, "SELECT id FROM reminders WHERE is_deleted = 1 ORDER BY id")?,
            };
            if !purged.tasks.is_empty() {
                let marks = placeholders(purged.tasks.len());
                tx.execute(
                    &format!("DELETE FROM subtasks WHERE task_id IN ({marks})"),
                    params_from_iter(purged.tasks.iter()),
                )?;
                tx.execute(
                    &format!("DELETE FROM tasks WHERE id IN ({marks})"),
                    params_from_iter(purged.tasks.iter()),
                )?;
            }
            tx.execute("DELETE FROM reminders WHERE is_deleted = 1", [])?;
            tx.commit()?;
            Ok(purged)
        })
    }
}
