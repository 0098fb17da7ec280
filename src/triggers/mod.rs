//! Trigger scheduler contract.
//!
//! The engine reaches the host's alarm/timer facility only through
//! [`TriggerScheduler`]. Every owner maps to exactly one scheduler slot, so
//! re-scheduling replaces and cancelling finds what was scheduled, across
//! restarts as well.

pub mod memory;
pub mod timer;

use crate::types::OwnerKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::MemoryScheduler;
pub use timer::{FiredTrigger, TimerScheduler};

/// The entity a trigger belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerOwner {
    pub kind: OwnerKind,
    pub id: i64,
}

impl TriggerOwner {
    pub fn task(id: i64) -> Self {
        Self {
            kind: OwnerKind::Task,
            id,
        }
    }

    pub fn reminder(id: i64) -> Self {
        Self {
            kind: OwnerKind::Reminder,
            id,
        }
    }

    /// Scheduler slot for this owner.
    pub fn slot(&self) -> TriggerSlot {
        TriggerSlot::for_owner(*self)
    }
}

impl std::fmt::Display for TriggerOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Identifier of one pending wake-up in the host facility.
///
/// The owner id is shifted left one bit and the low bit carries the owner
/// kind, so task and reminder ids never share a slot and the mapping is a
/// pure function of the owner. Ids are store row ids and therefore positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriggerSlot(u64);

impl TriggerSlot {
    pub fn for_owner(owner: TriggerOwner) -> Self {
        let kind_bit = match owner.kind {
            OwnerKind::Task => 0,
            OwnerKind::Reminder => 1,
        };
        TriggerSlot(((owner.id as u64) << 1) | kind_bit)
    }

    /// Recover the owner a slot was derived from.
    pub fn owner(&self) -> TriggerOwner {
        let id = (self.0 >> 1) as i64;
        if self.0 & 1 == 0 {
            TriggerOwner::task(id)
        } else {
            TriggerOwner::reminder(id)
        }
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// How a schedule request was honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleOutcome {
    /// Armed for delivery at the requested instant.
    Exact,
    /// Armed, but the host may deliver late (exact capability missing).
    Inexact,
    /// Not armed: the requested instant is not in the future.
    SkippedPast,
}

impl ScheduleOutcome {
    pub fn is_armed(&self) -> bool {
        !matches!(self, ScheduleOutcome::SkippedPast)
    }
}

/// Failure of the scheduling facility itself.
///
/// A missing exact-alarm capability is not an error; implementations
/// downgrade to [`ScheduleOutcome::Inexact`] instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TriggerError {
    /// The host refused to arm any trigger for this owner.
    #[error("scheduling denied for {0}")]
    Denied(TriggerOwner),

    /// The facility could not be reached.
    #[error("trigger facility unavailable: {0}")]
    Unavailable(String),
}

/// Host wake-up facility as seen by the engine.
#[async_trait]
pub trait TriggerScheduler: Send + Sync {
    /// Whether exact delivery is currently available.
    fn can_schedule_exact(&self) -> bool;

    /// Arm (or re-arm) the owner's trigger. `fire_at <= now` is a no-op that
    /// reports [`ScheduleOutcome::SkippedPast`].
    async fn schedule(
        &self,
        owner: TriggerOwner,
        fire_at: DateTime<Utc>,
    ) -> Result<ScheduleOutcome, TriggerError>;

    /// Disarm the owner's trigger. Succeeds when nothing was armed.
    async fn cancel(&self, owner: TriggerOwner) -> Result<(), TriggerError>;
}
