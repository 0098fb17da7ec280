//! Integration tests for the recurrence reconciler.

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use polar_core::clock::{CalendarZone, ManualClock};
use polar_core::db::Database;
use polar_core::lifecycle::Lifecycle;
use polar_core::reconciler::Reconciler;
use polar_core::triggers::{MemoryScheduler, TriggerOwner};
use polar_core::types::{NewTask, NewTaskList, Recurrence, Subtask, Task};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

struct Harness {
    clock: Arc<ManualClock>,
    triggers: Arc<MemoryScheduler>,
    lifecycle: Lifecycle,
    list_id: i64,
}

fn due_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap()
}

async fn setup_at(now: DateTime<Utc>, zone: CalendarZone) -> Harness {
    let clock = Arc::new(ManualClock::with_zone(now, zone));
    let triggers = Arc::new(MemoryScheduler::new(clock.clone()));
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let lifecycle = Lifecycle::new(db, triggers.clone(), clock.clone());
    let list_id = lifecycle
        .create_list(NewTaskList {
            title: "Routines".to_string(),
            icon: "ic_list".to_string(),
        })
        .await
        .unwrap()
        .id;
    Harness {
        clock,
        triggers,
        lifecycle,
        list_id,
    }
}

async fn setup() -> Harness {
    setup_at(due_day() - TimeDelta::hours(1), CalendarZone::utc()).await
}

impl Harness {
    /// A recurring task due at `due`, completed, with completed subtasks.
    async fn completed_recurring(&self, recurrence: Recurrence, due: DateTime<Utc>) -> Task {
        let task = self
            .lifecycle
            .create_task(NewTask {
                list_id: self.list_id,
                title: format!("{recurrence:?} chore"),
                due_date: Some(due.timestamp_millis()),
                recurrence,
                subtasks: vec!["first".to_string(), "second".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        self.lifecycle.toggle_task_completion(task.id).await.unwrap();
        for subtask in self.lifecycle.db().list_subtasks(task.id).unwrap() {
            self.lifecycle
                .db()
                .update_subtask(&Subtask {
                    completed: true,
                    ..subtask
                })
                .unwrap();
        }
        self.lifecycle.db().get_task(task.id).unwrap().unwrap()
    }

    fn subtasks_all_open(&self, task_id: i64) -> bool {
        self.lifecycle
            .db()
            .list_subtasks(task_id)
            .unwrap()
            .iter()
            .all(|s| !s.completed)
    }
}

#[tokio::test]
async fn catch_up_lands_on_first_occurrence_after_now() {
    let h = setup().await;
    let task = h.completed_recurring(Recurrence::Daily, due_day()).await;

    h.clock.set(due_day() + TimeDelta::days(3));
    let report = Reconciler::new(h.lifecycle.clone()).run_pass().await.unwrap();

    let expected = due_day() + TimeDelta::days(4);
    let stored = h.lifecycle.db().get_task(task.id).unwrap().unwrap();
    assert!(!stored.completed);
    assert_eq!(stored.due_date, Some(expected.timestamp_millis()));
    assert!(h.subtasks_all_open(task.id));
    assert_eq!(h.triggers.armed_at(TriggerOwner::task(task.id)), Some(expected));
    assert_eq!(report.scanned, 1);
    assert_eq!(report.reset, 1);
    assert_eq!(report.occurrences_skipped, 3);
}

#[tokio::test]
async fn pass_is_idempotent_without_elapsed_time() {
    let h = setup().await;
    let task = h.completed_recurring(Recurrence::Weekly, due_day()).await;
    h.clock.set(due_day() + TimeDelta::days(8));

    let reconciler = Reconciler::new(h.lifecycle.clone());
    reconciler.run_pass().await.unwrap();
    let after_first = h.lifecycle.db().get_task(task.id).unwrap().unwrap();

    let second = reconciler.run_pass().await.unwrap();
    let after_second = h.lifecycle.db().get_task(task.id).unwrap().unwrap();
    assert_eq!(after_first, after_second);
    assert_eq!(second.scanned, 0);
    assert_eq!(second.reset, 0);
}

#[tokio::test]
async fn next_occurrence_in_future_is_untouched() {
    let h = setup().await;
    let task = h.completed_recurring(Recurrence::Daily, due_day()).await;
    h.clock.set(due_day() + TimeDelta::hours(12));

    let report = Reconciler::new(h.lifecycle.clone()).run_pass().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.reset, 0);
    let stored = h.lifecycle.db().get_task(task.id).unwrap().unwrap();
    assert_eq!(stored, task);
    assert!(!h.subtasks_all_open(task.id));
}

#[tokio::test]
async fn exactly_due_next_occurrence_is_advanced() {
    let h = setup().await;
    let task = h.completed_recurring(Recurrence::Daily, due_day()).await;
    // next occurrence equals now: due moves to the one after.
    h.clock.set(due_day() + TimeDelta::days(1));

    Reconciler::new(h.lifecycle.clone()).run_pass().await.unwrap();
    let stored = h.lifecycle.db().get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.due_date, Some((due_day() + TimeDelta::days(2)).timestamp_millis()));
}

#[tokio::test]
async fn monthly_reset_clamps_to_month_end() {
    let due = Utc.with_ymd_and_hms(2025, 1, 31, 8, 0, 0).unwrap();
    let h = setup_at(due - TimeDelta::hours(1), CalendarZone::utc()).await;
    let task = h.completed_recurring(Recurrence::Monthly, due).await;
    h.clock.set(Utc.with_ymd_and_hms(2025, 2, 28, 9, 0, 0).unwrap());

    Reconciler::new(h.lifecycle.clone()).run_pass().await.unwrap();
    let stored = h.lifecycle.db().get_task(task.id).unwrap().unwrap();
    let expected = Utc.with_ymd_and_hms(2025, 3, 28, 8, 0, 0).unwrap();
    assert_eq!(stored.due_date, Some(expected.timestamp_millis()));
}

#[tokio::test]
async fn wall_clock_time_is_kept_in_the_calendar_zone() {
    let zone = CalendarZone::Fixed(FixedOffset::east_opt(-5 * 3600).unwrap());
    // 22:00 at UTC-5 is 03:00 UTC the next day.
    let due = Utc.with_ymd_and_hms(2025, 3, 1, 3, 0, 0).unwrap();
    let h = setup_at(due - TimeDelta::hours(1), zone).await;
    let task = h.completed_recurring(Recurrence::Daily, due).await;
    h.clock.set(due + TimeDelta::hours(30));

    Reconciler::new(h.lifecycle.clone()).run_pass().await.unwrap();
    let stored = h.lifecycle.db().get_task(task.id).unwrap().unwrap();
    assert_eq!(stored.due_date, Some((due + TimeDelta::days(2)).timestamp_millis()));
}

#[tokio::test]
async fn trashed_and_non_recurring_tasks_are_ignored() {
    let h = setup().await;
    let trashed = h.completed_recurring(Recurrence::Daily, due_day()).await;
    h.lifecycle
        .move_to_trash(polar_core::types::OwnerKind::Task, trashed.id)
        .await
        .unwrap();
    let one_off = h.completed_recurring(Recurrence::None, due_day()).await;
    h.clock.set(due_day() + TimeDelta::days(5));

    let report = Reconciler::new(h.lifecycle.clone()).run_pass().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert!(h.lifecycle.db().get_task(trashed.id).unwrap().unwrap().completed);
    assert!(h.lifecycle.db().get_task(one_off.id).unwrap().unwrap().completed);
}

#[tokio::test]
async fn scheduler_outage_still_resets_the_task() {
    let h = setup().await;
    let task = h.completed_recurring(Recurrence::Daily, due_day()).await;
    h.clock.set(due_day() + TimeDelta::days(2));
    h.triggers.set_unavailable(true);

    let report = Reconciler::new(h.lifecycle.clone()).run_pass().await.unwrap();
    assert_eq!(report.reset, 1);
    assert_eq!(report.failed, 0);
    assert!(!h.lifecycle.db().get_task(task.id).unwrap().unwrap().completed);
}

#[tokio::test]
async fn background_loop_runs_on_startup_and_stops_on_shutdown() {
    let h = setup().await;
    let task = h.completed_recurring(Recurrence::Daily, due_day()).await;
    h.clock.set(due_day() + TimeDelta::days(1) + TimeDelta::minutes(1));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = Reconciler::new(h.lifecycle.clone())
        .with_interval(Duration::from_secs(3600))
        .spawn(shutdown_rx);

    let mut reset = false;
    for _ in 0..100 {
        if !h.lifecycle.db().get_task(task.id).unwrap().unwrap().completed {
            reset = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(reset, "startup pass did not run");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reconciler did not stop")
        .unwrap();
}
