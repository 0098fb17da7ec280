//! In-process trigger facility on tokio timers.
//!
//! Each armed slot owns one sleeping task. When it wakes it emits a
//! [`FiredTrigger`] on the channel handed out by [`TimerScheduler::new`].
//! Without exact capability, delays are rounded up to the next multiple of
//! the configured slack so wake-ups batch together.

use super::{ScheduleOutcome, TriggerError, TriggerOwner, TriggerScheduler, TriggerSlot};
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A trigger that reached its instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredTrigger {
    pub owner: TriggerOwner,
    /// Instant the trigger was armed for.
    pub fire_at: DateTime<Utc>,
}

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

type TimerTable = Arc<Mutex<HashMap<TriggerSlot, ArmedTimer>>>;

pub struct TimerScheduler {
    clock: Arc<dyn Clock>,
    exact: AtomicBool,
    inexact_slack: Duration,
    timers: TimerTable,
    generation: AtomicU64,
    fired_tx: mpsc::UnboundedSender<FiredTrigger>,
}

impl TimerScheduler {
    /// Create the scheduler and the receiver that fired triggers arrive on.
    pub fn new(
        clock: Arc<dyn Clock>,
        exact: bool,
        inexact_slack: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<FiredTrigger>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            clock,
            exact: AtomicBool::new(exact),
            inexact_slack,
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
            fired_tx,
        };
        (scheduler, fired_rx)
    }

    /// Grant or revoke exact capability at runtime.
    pub fn set_exact(&self, exact: bool) {
        self.exact.store(exact, Ordering::SeqCst);
    }

    /// Number of timers currently armed.
    pub fn armed_count(&self) -> usize {
        lock_table(&self.timers).len()
    }

    fn delay_for(&self, fire_at: DateTime<Utc>, exact: bool) -> Duration {
        let delay = (fire_at - self.clock.now()).to_std().unwrap_or(Duration::ZERO);
        if exact || self.inexact_slack.is_zero() {
            return delay;
        }
        let slack = self.inexact_slack.as_millis().max(1);
        let windows = delay.as_millis().div_ceil(slack);
        Duration::from_millis(u64::try_from(windows * slack).unwrap_or(u64::MAX))
    }
}

fn lock_table(
    table: &Mutex<HashMap<TriggerSlot, ArmedTimer>>,
) -> std::sync::MutexGuard<'_, HashMap<TriggerSlot, ArmedTimer>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TriggerScheduler for TimerScheduler {
    fn can_schedule_exact(&self) -> bool {
        self.exact.load(Ordering::SeqCst)
    }

    async fn schedule(
        &self,
        owner: TriggerOwner,
        fire_at: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, TriggerError> {
        if fire_at <= self.clock.now() {
            debug!(%owner, %fire_at, "Not arming trigger in the past");
            return Ok(ScheduleOutcome::SkippedPast);
        }
        if self.fired_tx.is_closed() {
            return Err(TriggerError::Unavailable("fired-trigger receiver dropped".into()));
        }

        let exact = self.can_schedule_exact();
        let delay = self.delay_for(fire_at, exact);
        let slot = owner.slot();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let timers = Arc::clone(&self.timers);
        let fired_tx = self.fired_tx.clone();

        // Hold the table lock across spawn so the timer cannot fire and look
        // itself up before it is registered.
        let mut table = lock_table(&self.timers);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut table = lock_table(&timers);
                match table.get(&slot) {
                    Some(armed) if armed.generation == generation => {
                        table.remove(&slot);
                    }
                    _ => return,
                }
            }
            if fired_tx.send(FiredTrigger { owner, fire_at }).is_err() {
                warn!(%owner, "Trigger fired with no receiver");
            }
        });
        if let Some(previous) = table.insert(slot, ArmedTimer { generation, handle }) {
            previous.handle.abort();
        }
        drop(table);

        debug!(%owner, %fire_at, exact, "Armed trigger");
        Ok(if exact {
            ScheduleOutcome::Exact
        } else {
            ScheduleOutcome::Inexact
        })
    }

    async fn cancel(&self, owner: TriggerOwner) -> Result<(), TriggerError> {
        if let Some(armed) = lock_table(&self.timers).remove(&owner.slot()) {
            armed.handle.abort();
            debug!(%owner, "Cancelled trigger");
        }
        Ok(())
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        for (_, armed) in lock_table(&self.timers).drain() {
            armed.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use chrono::TimeDelta;

    fn scheduler(exact: bool) -> (TimerScheduler, mpsc::UnboundedReceiver<FiredTrigger>) {
        TimerScheduler::new(Arc::new(SystemClock), exact, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn fires_once_at_the_requested_instant() {
        let (scheduler, mut fired) = scheduler(true);
        let owner = TriggerOwner::task(3);
        let at = Utc::now() + TimeDelta::milliseconds(40);

        let outcome = scheduler.schedule(owner, at).await.unwrap();
        assert_eq!(outcome, ScheduleOutcome::Exact);
        assert_eq!(scheduler.armed_count(), 1);

        let event = tokio::time::timeout(Duration::from_secs(2), fired.recv())
            .await
            .expect("trigger did not fire")
            .expect("channel closed");
        assert_eq!(event.owner, owner);
        assert_eq!(event.fire_at, at);
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_trigger_never_fires() {
        let (scheduler, mut fired) = scheduler(true);
        let owner = TriggerOwner::reminder(3);
        scheduler
            .schedule(owner, Utc::now() + TimeDelta::milliseconds(30))
            .await
            .unwrap();
        scheduler.cancel(owner).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(150), fired.recv()).await;
        assert!(result.is_err(), "cancelled trigger fired");
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test]
    async fn rescheduling_keeps_only_the_latest_timer() {
        let (scheduler, mut fired) = scheduler(true);
        let owner = TriggerOwner::task(8);
        let later = Utc::now() + TimeDelta::milliseconds(80);
        scheduler
            .schedule(owner, Utc::now() + TimeDelta::milliseconds(20))
            .await
            .unwrap();
        scheduler.schedule(owner, later).await.unwrap();
        assert_eq!(scheduler.armed_count(), 1);

        let event = tokio::time::timeout(Duration::from_secs(2), fired.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.fire_at, later);
    }

    #[tokio::test]
    async fn past_and_inexact_requests() {
        let (scheduler, _fired) = scheduler(false);
        let past = scheduler
            .schedule(TriggerOwner::task(1), Utc::now() - TimeDelta::seconds(1))
            .await
            .unwrap();
        assert_eq!(past, ScheduleOutcome::SkippedPast);

        let future = scheduler
            .schedule(TriggerOwner::task(1), Utc::now() + TimeDelta::hours(1))
            .await
            .unwrap();
        assert_eq!(future, ScheduleOutcome::Inexact);
        scheduler.cancel(TriggerOwner::task(1)).await.unwrap();
    }

    #[test]
    fn inexact_delay_rounds_up_to_slack() {
        let (scheduler, _fired) =
            TimerScheduler::new(Arc::new(SystemClock), false, Duration::from_secs(600));
        let at = Utc::now() + TimeDelta::seconds(61);
        let delay = scheduler.delay_for(at, false);
        assert_eq!(delay, Duration::from_secs(600));
        let exact = scheduler.delay_for(at, true);
        assert!(exact <= Duration::from_secs(61));
    }
}
