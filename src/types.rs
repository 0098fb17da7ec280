//! Core types for the task lifecycle engine.
//!
//! Timestamps are stored as milliseconds since the Unix epoch, matching the
//! SQLite columns they map to.

use serde::{Deserialize, Serialize};

/// Separator used when tags are flattened into a single text column.
pub const TAG_SEPARATOR: char = ',';

/// Title shown for a home-view group whose list row is missing.
pub const UNKNOWN_LIST_TITLE: &str = "Unknown List";

/// Recurrence setting of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "NONE",
            Recurrence::Daily => "DAILY",
            Recurrence::Weekly => "WEEKLY",
            Recurrence::Monthly => "MONTHLY",
        }
    }

    /// Parse the stored representation. Unknown values read as `None` so a
    /// bad row never makes a task recur.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "DAILY" => Recurrence::Daily,
            "WEEKLY" => Recurrence::Weekly,
            "MONTHLY" => Recurrence::Monthly,
            _ => Recurrence::None,
        }
    }

    /// The calculator rule for this setting, if the task recurs at all.
    pub fn rule(&self) -> Option<crate::recurrence::RecurrenceRule> {
        use crate::recurrence::RecurrenceRule;
        match self {
            Recurrence::None => None,
            Recurrence::Daily => Some(RecurrenceRule::Daily),
            Recurrence::Weekly => Some(RecurrenceRule::Weekly),
            Recurrence::Monthly => Some(RecurrenceRule::Monthly),
        }
    }
}

/// A task row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Surrogate key; 0 until persisted.
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub description: String,
    pub completed: bool,
    /// Labels flattened with [`TAG_SEPARATOR`].
    pub tags: String,
    pub created_at: i64,
    pub due_date: Option<i64>,
    pub order_index: i32,
    pub recurrence: Recurrence,
    pub is_deleted: bool,
}

impl Task {
    /// Individual tag labels.
    pub fn tag_list(&self) -> Vec<&str> {
        split_tags(&self.tags)
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence != Recurrence::None
    }
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub list_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: String,
    pub due_date: Option<i64>,
    #[serde(default)]
    pub recurrence: Recurrence,
    /// Position within the list. Appended after the last task when absent.
    pub order_index: Option<i32>,
    /// Titles of subtasks created together with the task.
    #[serde(default)]
    pub subtasks: Vec<String>,
}

/// A checklist item owned by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    pub completed: bool,
}

/// A standalone reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Instant the reminder fires.
    pub date_time: i64,
    pub is_completed: bool,
    pub is_deleted: bool,
    pub created_at: i64,
}

/// Input for creating a reminder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewReminder {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date_time: i64,
}

/// A list owning tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: i64,
    pub title: String,
    pub icon: String,
    pub order_index: i32,
    /// Ordering used only by the aggregated home view.
    pub home_order_index: i32,
    pub created_at: i64,
}

/// Input for creating a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskList {
    pub title: String,
    #[serde(default = "default_list_icon")]
    pub icon: String,
}

fn default_list_icon() -> String {
    "ic_list".to_string()
}

/// A task joined with its owning list and subtask progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithList {
    #[serde(flatten)]
    pub task: Task,
    /// None when the owning list row is missing.
    pub list_title: Option<String>,
    pub list_home_order_index: Option<i32>,
    pub total_subtasks: i32,
    pub completed_subtasks: i32,
}

/// One list's section of the home view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub list_id: i64,
    pub title: String,
    pub tasks: Vec<TaskWithList>,
}

/// Kind of entity that can own a trigger or sit in the trash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Task,
    Reminder,
}

impl OwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKind::Task => "task",
            OwnerKind::Reminder => "reminder",
        }
    }
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a lifecycle transition addressed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The row existed and the transition was applied.
    Applied,
    /// No row with that id (already purged, or never existed).
    NotFound,
}

impl Outcome {
    pub fn from_found(found: bool) -> Self {
        if found { Outcome::Applied } else { Outcome::NotFound }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// An entry of the trash listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrashEntry {
    Task(Task),
    Reminder(Reminder),
}

impl TrashEntry {
    pub fn id(&self) -> i64 {
        match self {
            TrashEntry::Task(t) => t.id,
            TrashEntry::Reminder(r) => r.id,
        }
    }

    pub fn kind(&self) -> OwnerKind {
        match self {
            TrashEntry::Task(_) => OwnerKind::Task,
            TrashEntry::Reminder(_) => OwnerKind::Reminder,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            TrashEntry::Task(t) => &t.title,
            TrashEntry::Reminder(r) => &r.title,
        }
    }

    pub fn created_at(&self) -> i64 {
        match self {
            TrashEntry::Task(t) => t.created_at,
            TrashEntry::Reminder(r) => r.created_at,
        }
    }
}

/// Summary of an empty-trash run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyTrashReport {
    pub tasks_purged: usize,
    pub reminders_purged: usize,
    /// Rows that could not be purged; they stay in the trash.
    pub failed: usize,
}

/// Split a flattened tag column into labels.
pub fn split_tags(tags: &str) -> Vec<&str> {
    tags.split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Normalize a tag column: trimmed, empty labels dropped, duplicates removed
/// keeping the first occurrence.
pub fn normalize_tags(tags: &str) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for tag in split_tags(tags) {
        if !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen.join(&TAG_SEPARATOR.to_string())
}
