//! Reminder storage operations.

use super::Database;
use crate::types::Reminder;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

const REMINDER_COLUMNS: &str =
    "id, title, description, date_time, is_completed, is_deleted, created_at";

pub fn parse_reminder_row(row: &Row) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        date_time: row.get("date_time")?,
        is_completed: row.get("is_completed")?,
        is_deleted: row.get("is_deleted")?,
        created_at: row.get("created_at")?,
    })
}

fn query_reminders(
    conn: &Connection,
    where_clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Reminder>> {
    let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders {where_clause}");
    let mut stmt = conn.prepare(&sql)?;
    let reminders = stmt
        .query_map(params, parse_reminder_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(reminders)
}

impl Database {
    /// Insert a reminder. `reminder.id` is ignored; the stored row is returned.
    pub fn insert_reminder(&self, reminder: &Reminder) -> Result<Reminder> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO reminders (title, description, date_time, is_completed, is_deleted, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    reminder.title,
                    reminder.description,
                    reminder.date_time,
                    reminder.is_completed,
                    reminder.is_deleted,
                    reminder.created_at,
                ],
            )?;
            Ok(Reminder {
                id: conn.last_insert_rowid(),
                ..reminder.clone()
            })
        })
    }

    /// Overwrite every column of a reminder. Returns false when missing.
    pub fn update_reminder(&self, reminder: &Reminder) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reminders SET title = ?1, description = ?2, date_time = ?3,
                                      is_completed = ?4, is_deleted = ?5
                 WHERE id = ?6",
                params![
                    reminder.title,
                    reminder.description,
                    reminder.date_time,
                    reminder.is_completed,
                    reminder.is_deleted,
                    reminder.id,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn get_reminder(&self, reminder_id: i64) -> Result<Option<Reminder>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1");
            let reminder = conn
                .query_row(&sql, params![reminder_id], parse_reminder_row)
                .optional()?;
            Ok(reminder)
        })
    }

    /// Reminders not in the trash, soonest first.
    pub fn list_active_reminders(&self) -> Result<Vec<Reminder>> {
        self.with_conn(|conn| {
            query_reminders(conn, "WHERE is_deleted = 0 ORDER BY date_time ASC, id ASC", params![])
        })
    }

    /// Reminders in the trash, newest first.
    pub fn list_deleted_reminders(&self) -> Result<Vec<Reminder>> {
        self.with_conn(|conn| {
            query_reminders(
                conn,
                "WHERE is_deleted = 1 ORDER BY created_at DESC, id DESC",
                params![],
            )
        })
    }

    /// Active, not completed reminders firing strictly after `after_ms`.
    pub fn list_pending_reminders_after(&self, after_ms: i64) -> Result<Vec<Reminder>> {
        self.with_conn(|conn| {
            query_reminders(
                conn,
                "WHERE is_deleted = 0 AND is_completed = 0 AND date_time > ?1
                 ORDER BY date_time ASC, id ASC",
                params![after_ms],
            )
        })
    }

    pub fn soft_delete_reminder(&self, reminder_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reminders SET is_deleted = 1 WHERE id = ?1",
                params![reminder_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn restore_reminder(&self, reminder_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE reminders SET is_deleted = 0 WHERE id = ?1",
                params![reminder_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_reminder_completed(
        &self,
        reminder_id: i64,
        completed: bool,
    ) -> Result<Option<Reminder>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE reminders SET is_completed = ?1 WHERE id = ?2",
                params![completed, reminder_id],
            )?;
            let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1");
            let reminder = conn
                .query_row(&sql, params![reminder_id], parse_reminder_row)
                .optional()?;
            Ok(reminder)
        })
    }

    /// Remove a reminder row. Returns false when the id does not exist.
    pub fn purge_reminder(&self, reminder_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM reminders WHERE id = ?1", params![reminder_id])?;
            Ok(deleted > 0)
        })
    }

    /// Alias of [`Database::purge_reminder`] for callers deleting outside the trash flow.
    pub fn delete_reminder(&self, reminder_id: i64) -> Result<bool> {
        self.purge_reminder(reminder_id)
    }

    /// Remove a reminder only if it is still in the trash.
    pub fn purge_reminder_if_deleted(&self, reminder_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM reminders WHERE id = ?1 AND is_deleted = 1",
                params![reminder_id],
            )?;
            Ok(deleted > 0)
        })
    }
}
