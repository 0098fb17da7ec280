//! Task view filter and grouper.
//!
//! A view is a pure function of the active tasks, the filter and today's
//! date. [`TaskViewModel`] keeps the last inputs and output and recomputes
//! only when asked.

use crate::clock::{CalendarZone, instant_from_ms};
use crate::types::{TaskGroup, TaskWithList, UNKNOWN_LIST_TITLE};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which lists a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "list_id", rename_all = "snake_case")]
pub enum ListSelection {
    /// Every list, grouped per list (the home view).
    #[default]
    All,
    /// One list, flat.
    List(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewFilter {
    pub selection: ListSelection,
    /// Drop completed tasks.
    pub pending_only: bool,
    /// Keep only incomplete tasks due before today.
    pub overdue_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "snake_case")]
pub enum TaskView {
    Flat(Vec<TaskWithList>),
    Grouped(Vec<TaskGroup>),
}

impl TaskView {
    /// Number of tasks across all groups.
    pub fn task_count(&self) -> usize {
        match self {
            TaskView::Flat(tasks) => tasks.len(),
            TaskView::Grouped(groups) => groups.iter().map(|g| g.tasks.len()).sum(),
        }
    }

    /// Ids of the tasks in display order.
    pub fn task_ids(&self) -> Vec<i64> {
        match self {
            TaskView::Flat(tasks) => tasks.iter().map(|t| t.task.id).collect(),
            TaskView::Grouped(groups) => groups
                .iter()
                .flat_map(|g| g.tasks.iter().map(|t| t.task.id))
                .collect(),
        }
    }
}

/// Whether a task is overdue: not completed and due on a calendar day
/// before `today` in `zone`.
pub fn is_overdue(task: &TaskWithList, today: NaiveDate, zone: CalendarZone) -> bool {
    if task.task.completed {
        return false;
    }
    match task.task.due_date {
        Some(due) => zone.date_of(instant_from_ms(due)) < today,
        None => false,
    }
}

impl ViewFilter {
    pub fn matches(&self, task: &TaskWithList, today: NaiveDate, zone: CalendarZone) -> bool {
        if task.task.is_deleted {
            return false;
        }
        if let ListSelection::List(list_id) = self.selection {
            if task.task.list_id != list_id {
                return false;
            }
        }
        if self.pending_only && task.task.completed {
            return false;
        }
        if self.overdue_only && !is_overdue(task, today, zone) {
            return false;
        }
        true
    }
}

/// Compute the view of `tasks` under `filter`.
pub fn compute_view(
    tasks: &[TaskWithList],
    filter: &ViewFilter,
    today: NaiveDate,
    zone: CalendarZone,
) -> TaskView {
    let mut matching: Vec<TaskWithList> = tasks
        .iter()
        .filter(|t| filter.matches(t, today, zone))
        .cloned()
        .collect();
    matching.sort_by_key(|t| (t.task.order_index, t.task.id));

    match filter.selection {
        ListSelection::List(_) => TaskView::Flat(matching),
        ListSelection::All => {
            // Missing home positions sort after every real one.
            let mut groups: BTreeMap<(i64, i64), TaskGroup> = BTreeMap::new();
            for task in matching {
                let rank = task.list_home_order_index.map_or(i64::MAX, i64::from);
                let group = groups
                    .entry((rank, task.task.list_id))
                    .or_insert_with(|| TaskGroup {
                        list_id: task.task.list_id,
                        title: task
                            .list_title
                            .clone()
                            .unwrap_or_else(|| UNKNOWN_LIST_TITLE.to_string()),
                        tasks: Vec::new(),
                    });
                group.tasks.push(task);
            }
            TaskView::Grouped(groups.into_values().collect())
        }
    }
}

/// Memoizing holder for one view.
///
/// Setters only record inputs. [`TaskViewModel::refresh`] recomputes when
/// any input differs from the last computation and reports whether the
/// output changed.
#[derive(Debug, Clone)]
pub struct TaskViewModel {
    zone: CalendarZone,
    filter: ViewFilter,
    tasks: Vec<TaskWithList>,
    computed_for: Option<(ViewFilter, NaiveDate)>,
    dirty: bool,
    view: Option<TaskView>,
}

impl TaskViewModel {
    pub fn new(zone: CalendarZone) -> Self {
        Self {
            zone,
            filter: ViewFilter::default(),
            tasks: Vec::new(),
            computed_for: None,
            dirty: true,
            view: None,
        }
    }

    pub fn filter(&self) -> &ViewFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: ViewFilter) {
        self.filter = filter;
    }

    pub fn set_selection(&mut self, selection: ListSelection) {
        self.filter.selection = selection;
    }

    pub fn set_pending_only(&mut self, pending_only: bool) {
        self.filter.pending_only = pending_only;
    }

    pub fn set_overdue_only(&mut self, overdue_only: bool) {
        self.filter.overdue_only = overdue_only;
    }

    /// Replace the task snapshot. Identical snapshots do not invalidate.
    pub fn set_tasks(&mut self, tasks: Vec<TaskWithList>) {
        if tasks != self.tasks {
            self.tasks = tasks;
            self.dirty = true;
        }
    }

    /// Last computed view, if any.
    pub fn view(&self) -> Option<&TaskView> {
        self.view.as_ref()
    }

    /// Bring the view up to date for `today`. Returns true when the output
    /// differs from the previous one.
    pub fn refresh(&mut self, today: NaiveDate) -> bool {
        let inputs = (self.filter, today);
        if !self.dirty && self.computed_for == Some(inputs) {
            return false;
        }
        let view = compute_view(&self.tasks, &self.filter, today, self.zone);
        self.computed_for = Some(inputs);
        self.dirty = false;
        if self.view.as_ref() == Some(&view) {
            return false;
        }
        self.view = Some(view);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Recurrence, Task};
    use chrono::{TimeZone, Utc};

    fn ms(y: i32, m: u32, d: u32, h: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().timestamp_millis()
    }

    fn row(id: i64, list_id: i64, order_index: i32, due: Option<i64>, completed: bool) -> TaskWithList {
        TaskWithList {
            task: Task {
                id,
                list_id,
                title: format!("task {id}"),
                description: String::new(),
                completed,
                tags: String::new(),
                created_at: 0,
                due_date: due,
                order_index,
                recurrence: Recurrence::None,
                is_deleted: false,
            },
            list_title: Some(format!("list {list_id}")),
            list_home_order_index: Some(list_id as i32),
            total_subtasks: 0,
            completed_subtasks: 0,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    #[test]
    fn due_today_is_not_overdue() {
        let zone = CalendarZone::utc();
        assert!(!is_overdue(&row(1, 1, 0, Some(ms(2025, 3, 10, 0)), false), today(), zone));
        assert!(is_overdue(&row(1, 1, 0, Some(ms(2025, 3, 9, 23)), false), today(), zone));
        assert!(!is_overdue(&row(1, 1, 0, Some(ms(2025, 3, 9, 10)), true), today(), zone));
        assert!(!is_overdue(&row(1, 1, 0, None, false), today(), zone));
    }

    #[test]
    fn flat_view_orders_by_order_index_then_id() {
        let tasks = vec![row(3, 1, 1, None, false), row(2, 1, 0, None, false), row(1, 1, 1, None, false), row(4, 2, 0, None, false)];
        let filter = ViewFilter {
            selection: ListSelection::List(1),
            ..Default::default()
        };
        let view = compute_view(&tasks, &filter, today(), CalendarZone::utc());
        assert_eq!(view.task_ids(), vec![2, 1, 3]);
    }

    #[test]
    fn unknown_list_title_and_missing_home_index_sort_last() {
        let mut orphan = row(9, 7, 0, None, false);
        orphan.list_title = None;
        orphan.list_home_order_index = None;
        let tasks = vec![orphan, row(1, 1, 0, None, false)];
        let TaskView::Grouped(groups) = compute_view(&tasks, &ViewFilter::default(), today(), CalendarZone::utc()) else {
            panic!("expected grouped view");
        };
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].list_id, 1);
        assert_eq!(groups[1].title, UNKNOWN_LIST_TITLE);
    }

    #[test]
    fn refresh_reports_changes_only() {
        let mut model = TaskViewModel::new(CalendarZone::utc());
        model.set_tasks(vec![row(1, 1, 0, Some(ms(2025, 3, 9, 10)), false)]);
        assert!(model.refresh(today()));
        assert!(!model.refresh(today()));

        // Different input, same output.
        model.set_pending_only(true);
        assert!(!model.refresh(today()));

        model.set_overdue_only(true);
        assert!(!model.refresh(today()));
        assert_eq!(model.view().unwrap().task_count(), 1);

        // Same task is no longer overdue when viewed a day earlier.
        assert!(model.refresh(NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()));
        assert_eq!(model.view().unwrap().task_count(), 0);
    }
}
