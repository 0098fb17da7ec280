//! Output formatting utilities for markdown and JSON.

use crate::clock::{CalendarZone, instant_from_ms};
use crate::reconciler::ReconcileReport;
use crate::types::{EmptyTrashReport, Outcome, TaskWithList, TrashEntry};
use crate::views::{TaskView, is_overdue};
use chrono::{Local, NaiveDate};
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Pretty JSON for any serializable result.
pub fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render an instant as `YYYY-MM-DD HH:MM` on the zone's wall clock.
pub fn format_instant(ms: i64, zone: CalendarZone) -> String {
    let instant = instant_from_ms(ms);
    match zone {
        CalendarZone::Local => instant.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        CalendarZone::Fixed(offset) => instant.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string(),
    }
}

fn format_task_line(row: &TaskWithList, today: NaiveDate, zone: CalendarZone) -> String {
    let task = &row.task;
    let mut line = format!(
        "- [{}] {} (`{}`)",
        if task.completed { "x" } else { " " },
        task.title,
        task.id
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!(" due {}", format_instant(due, zone)));
        if is_overdue(row, today, zone) {
            line.push_str(" **overdue**");
        }
    }
    if task.is_recurring() {
        line.push_str(&format!(" ↻ {}", task.recurrence.as_str().to_lowercase()));
    }
    if row.total_subtasks > 0 {
        line.push_str(&format!(" [{}/{}]", row.completed_subtasks, row.total_subtasks));
    }
    let tags = task.tag_list();
    if !tags.is_empty() {
        let tags: Vec<String> = tags.iter().map(|t| format!("#{t}")).collect();
        line.push_str(&format!(" {}", tags.join(" ")));
    }
    line.push('\n');
    line
}

/// Format a task view as markdown.
pub fn format_view_markdown(view: &TaskView, today: NaiveDate, zone: CalendarZone) -> String {
    let mut md = String::new();
    md.push_str(&format!("# Tasks ({})\n\n", view.task_count()));

    match view {
        TaskView::Flat(tasks) => {
            for row in tasks {
                md.push_str(&format_task_line(row, today, zone));
            }
        }
        TaskView::Grouped(groups) => {
            for group in groups {
                md.push_str(&format!("## {} ({})\n\n", group.title, group.tasks.len()));
                for row in &group.tasks {
                    md.push_str(&format_task_line(row, today, zone));
                }
                md.push('\n');
            }
        }
    }
    md
}

/// Format the trash listing as markdown.
pub fn format_trash_markdown(entries: &[TrashEntry], zone: CalendarZone) -> String {
    if entries.is_empty() {
        return "Trash is empty.\n".to_string();
    }
    let mut md = format!("# Trash ({})\n\n", entries.len());
    for entry in entries {
        md.push_str(&format!(
            "- {} `{}`: {} (created {})\n",
            entry.kind(),
            entry.id(),
            entry.title(),
            format_instant(entry.created_at(), zone)
        ));
    }
    md
}

pub fn format_outcome_markdown(action: &str, kind: &str, id: i64, outcome: Outcome) -> String {
    match outcome {
        Outcome::Applied => format!("{action}: {kind} `{id}`\n"),
        Outcome::NotFound => format!("No {kind} with id `{id}`\n"),
    }
}

pub fn format_empty_trash_markdown(report: &EmptyTrashReport) -> String {
    let mut md = format!(
        "Purged {} task(s) and {} reminder(s)\n",
        report.tasks_purged, report.reminders_purged
    );
    if report.failed > 0 {
        md.push_str(&format!("- **failed**: {} (left in trash)\n", report.failed));
    }
    md
}

pub fn format_reconcile_markdown(report: &ReconcileReport) -> String {
    let mut md = String::from("## Reconcile pass\n");
    md.push_str(&format!("- **scanned**: {}\n", report.scanned));
    md.push_str(&format!("- **reset**: {}\n", report.reset));
    md.push_str(&format!("- **skipped**: {}\n", report.skipped));
    if report.failed > 0 {
        md.push_str(&format!("- **failed**: {}\n", report.failed));
    }
    if report.occurrences_skipped > 0 {
        md.push_str(&format!(
            "- **missed occurrences**: {}\n",
            report.occurrences_skipped
        ));
    }
    if report.interrupted {
        md.push_str("- interrupted before finishing\n");
    }
    md
}
