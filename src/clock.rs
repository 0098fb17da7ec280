//! Time source and calendar zone.
//!
//! Everything that compares against "now" or does calendar arithmetic takes a
//! [`Clock`] so tests can pin and advance time.

use crate::recurrence::{self, RecurrenceRule};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};
use std::sync::{Mutex, PoisonError};

/// Zone in which calendar days and months are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarZone {
    /// The host's local time zone, DST rules included.
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl CalendarZone {
    pub fn utc() -> Self {
        CalendarZone::Fixed(Utc.fix())
    }

    /// Calendar date of an instant in this zone.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            CalendarZone::Local => instant.with_timezone(&Local).date_naive(),
            CalendarZone::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        }
    }

    /// Next occurrence of `previous` under `rule`, counted on this zone's calendar.
    pub fn next_occurrence(&self, previous: DateTime<Utc>, rule: RecurrenceRule) -> DateTime<Utc> {
        match self {
            CalendarZone::Local => {
                recurrence::next_occurrence(&previous.with_timezone(&Local), rule).with_timezone(&Utc)
            }
            CalendarZone::Fixed(offset) => {
                recurrence::next_occurrence(&previous.with_timezone(offset), rule).with_timezone(&Utc)
            }
        }
    }

    /// First occurrence strictly after `now`, and how many occurrences were
    /// passed over on the way (the returned one included).
    pub fn first_occurrence_after(
        &self,
        anchor: DateTime<Utc>,
        rule: RecurrenceRule,
        now: DateTime<Utc>,
    ) -> (DateTime<Utc>, u32) {
        match self {
            CalendarZone::Local => {
                let (next, steps) = recurrence::first_occurrence_after(
                    &anchor.with_timezone(&Local),
                    rule,
                    &now.with_timezone(&Local),
                );
                (next.with_timezone(&Utc), steps)
            }
            CalendarZone::Fixed(offset) => {
                let (next, steps) = recurrence::first_occurrence_after(
                    &anchor.with_timezone(offset),
                    rule,
                    &now.with_timezone(offset),
                );
                (next.with_timezone(&Utc), steps)
            }
        }
    }
}

/// Source of the current instant and calendar zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn zone(&self) -> CalendarZone;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Today's date in the clock's zone.
    fn today(&self) -> NaiveDate {
        self.zone().date_of(self.now())
    }
}

/// Wall clock in the host's local zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn zone(&self) -> CalendarZone {
        CalendarZone::Local
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    zone: CalendarZone,
}

impl ManualClock {
    /// A clock pinned at `now`, counting calendar days in UTC.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_zone(now, CalendarZone::utc())
    }

    pub fn with_zone(now: DateTime<Utc>, zone: CalendarZone) -> Self {
        Self {
            now: Mutex::new(now),
            zone,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::TimeDelta) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn zone(&self) -> CalendarZone {
        self.zone
    }
}

/// Convert stored milliseconds to an instant, saturating outside chrono's range.
pub fn instant_from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(if ms < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 1, 14, 23, 30, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 14).unwrap());

        clock.advance(chrono::TimeDelta::hours(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(clock.now_ms(), start.timestamp_millis() + 3_600_000);
    }

    #[test]
    fn fixed_zone_shifts_the_calendar_day() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 14, 23, 30, 0).unwrap();
        let tokyo = CalendarZone::Fixed(FixedOffset::east_opt(9 * 3600).unwrap());
        assert_eq!(tokyo.date_of(instant), NaiveDate::from_ymd_opt(2025, 1, 15).unwrap());
        assert_eq!(
            CalendarZone::utc().date_of(instant),
            NaiveDate::from_ymd_opt(2025, 1, 14).unwrap()
        );
    }

    #[test]
    fn instant_from_ms_round_trips() {
        let instant = Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap();
        assert_eq!(instant_from_ms(instant.timestamp_millis()), instant);
    }
}
