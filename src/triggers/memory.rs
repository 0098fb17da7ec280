//! In-memory trigger scheduler.
//!
//! Records armed slots without waking anything. Used by tests and by dry
//! runs that must not arm real timers.

use super::{FiredTrigger, ScheduleOutcome, TriggerError, TriggerOwner, TriggerScheduler, TriggerSlot};
use crate::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub struct MemoryScheduler {
    clock: Arc<dyn Clock>,
    exact: AtomicBool,
    unavailable: AtomicBool,
    pending: Mutex<BTreeMap<TriggerSlot, DateTime<Utc>>>,
    cancel_calls: AtomicUsize,
}

impl MemoryScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            exact: AtomicBool::new(true),
            unavailable: AtomicBool::new(false),
            pending: Mutex::new(BTreeMap::new()),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    /// Toggle the exact-delivery capability, as a permission change would.
    pub fn set_exact(&self, exact: bool) {
        self.exact.store(exact, Ordering::SeqCst);
    }

    /// Make every call fail with [`TriggerError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Instant the owner's trigger is armed for, if any.
    pub fn armed_at(&self, owner: TriggerOwner) -> Option<DateTime<Utc>> {
        self.lock().get(&owner.slot()).copied()
    }

    pub fn is_armed(&self, owner: TriggerOwner) -> bool {
        self.armed_at(owner).is_some()
    }

    pub fn armed_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of cancel requests received, including no-op ones.
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// Remove and return every trigger due at or before `now`, oldest first.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Vec<FiredTrigger> {
        let mut pending = self.lock();
        let due: Vec<(TriggerSlot, DateTime<Utc>)> = pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(slot, at)| (*slot, *at))
            .collect();
        for (slot, _) in &due {
            pending.remove(slot);
        }
        let mut fired: Vec<FiredTrigger> = due
            .into_iter()
            .map(|(slot, fire_at)| FiredTrigger {
                owner: slot.owner(),
                fire_at,
            })
            .collect();
        fired.sort_by_key(|f| f.fire_at);
        fired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<TriggerSlot, DateTime<Utc>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), TriggerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TriggerError::Unavailable("memory scheduler disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TriggerScheduler for MemoryScheduler {
    fn can_schedule_exact(&self) -> bool {
        self.exact.load(Ordering::SeqCst)
    }

    async fn schedule(
        &self,
        owner: TriggerOwner,
        fire_at: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, TriggerError> {
        self.check_available()?;
        if fire_at <= self.clock.now() {
            return Ok(ScheduleOutcome::SkippedPast);
        }
        self.lock().insert(owner.slot(), fire_at);
        if self.can_schedule_exact() {
            Ok(ScheduleOutcome::Exact)
        } else {
            Ok(ScheduleOutcome::Inexact)
        }
    }

    async fn cancel(&self, owner: TriggerOwner) -> Result<(), TriggerError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.lock().remove(&owner.slot());
        Ok(())
    }
}
