//! Recurrence calculator.
//!
//! Pure calendar arithmetic over wall-clock time in the instant's own zone.
//! Monthly steps keep the day of month when the target month has it and clamp
//! to the target month's last day otherwise; the clamp is not carried forward
//! (Jan 31 -> Feb 28 -> Mar 28).

use chrono::{DateTime, Days, LocalResult, Months, TimeZone};
use serde::{Deserialize, Serialize};

/// How far one occurrence is from the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceRule {
    Daily,
    Weekly,
    Monthly,
}

/// Upper bound on catch-up steps taken in one call.
///
/// A daily task untouched for a century needs ~36 500 steps; anything past
/// this bound is treated as corrupt data and stops advancing.
pub const MAX_CATCH_UP_STEPS: u32 = 100_000;

/// Next occurrence after `previous` under `rule`.
///
/// Never looks at the current time. The result is strictly later than
/// `previous` for every instant at least one month inside chrono's
/// representable range; at the very edge of that range `previous` is
/// returned unchanged.
///
/// A wall-clock time that does not exist in the zone (DST gap) resolves to the
/// same elapsed duration as the calendar step; an ambiguous one (DST overlap)
/// resolves to the earlier instant.
pub fn next_occurrence<Tz: TimeZone>(previous: &DateTime<Tz>, rule: RecurrenceRule) -> DateTime<Tz> {
    let wall = previous.naive_local();
    let advanced = match rule {
        RecurrenceRule::Daily => wall.checked_add_days(Days::new(1)),
        RecurrenceRule::Weekly => wall.checked_add_days(Days::new(7)),
        RecurrenceRule::Monthly => wall.checked_add_months(Months::new(1)),
    };
    let Some(advanced) = advanced else {
        return previous.clone();
    };

    match previous.timezone().from_local_datetime(&advanced) {
        LocalResult::Single(next) => next,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => previous.clone() + (advanced - wall),
    }
}

/// Walk occurrences from `anchor` until one lands strictly after `now`.
///
/// Returns that occurrence and the number of steps taken (at least one).
pub fn first_occurrence_after<Tz: TimeZone>(
    anchor: &DateTime<Tz>,
    rule: RecurrenceRule,
    now: &DateTime<Tz>,
) -> (DateTime<Tz>, u32) {
    let mut current = next_occurrence(anchor, rule);
    let mut steps = 1;
    while current <= *now && steps < MAX_CATCH_UP_STEPS {
        let next = next_occurrence(&current, rule);
        if next <= current {
            break;
        }
        current = next;
        steps += 1;
    }
    (current, steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, Utc};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_and_weekly_add_calendar_days() {
        let due = utc(2025, 1, 14, 9, 30);
        assert_eq!(next_occurrence(&due, RecurrenceRule::Daily), utc(2025, 1, 15, 9, 30));
        assert_eq!(next_occurrence(&due, RecurrenceRule::Weekly), utc(2025, 1, 21, 9, 30));
        assert_eq!(
            next_occurrence(&utc(2024, 12, 31, 23, 0), RecurrenceRule::Daily),
            utc(2025, 1, 1, 23, 0)
        );
    }

    #[test]
    fn monthly_keeps_day_of_month() {
        assert_eq!(
            next_occurrence(&utc(2025, 3, 15, 8, 0), RecurrenceRule::Monthly),
            utc(2025, 4, 15, 8, 0)
        );
        assert_eq!(
            next_occurrence(&utc(2025, 12, 5, 8, 0), RecurrenceRule::Monthly),
            utc(2026, 1, 5, 8, 0)
        );
    }

    #[test]
    fn monthly_clamps_to_last_day_of_shorter_month() {
        assert_eq!(
            next_occurrence(&utc(2025, 1, 31, 10, 0), RecurrenceRule::Monthly),
            utc(2025, 2, 28, 10, 0)
        );
        assert_eq!(
            next_occurrence(&utc(2024, 1, 31, 10, 0), RecurrenceRule::Monthly),
            utc(2024, 2, 29, 10, 0)
        );
        assert_eq!(
            next_occurrence(&utc(2025, 3, 31, 10, 0), RecurrenceRule::Monthly),
            utc(2025, 4, 30, 10, 0)
        );
    }

    #[test]
    fn monthly_clamp_does_not_stick() {
        let feb = next_occurrence(&utc(2025, 1, 31, 10, 0), RecurrenceRule::Monthly);
        assert_eq!(next_occurrence(&feb, RecurrenceRule::Monthly), utc(2025, 3, 28, 10, 0));
    }

    #[test]
    fn result_is_always_later() {
        let rules = [RecurrenceRule::Daily, RecurrenceRule::Weekly, RecurrenceRule::Monthly];
        let mut due = utc(2023, 1, 29, 0, 0);
        for _ in 0..400 {
            for rule in rules {
                assert!(next_occurrence(&due, rule) > due, "{rule:?} from {due}");
            }
            due = next_occurrence(&due, RecurrenceRule::Daily);
        }
    }

    #[test]
    fn wall_clock_is_kept_in_a_fixed_offset() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let due = offset.with_ymd_and_hms(2025, 1, 31, 22, 0, 0).unwrap();
        let next = next_occurrence(&due, RecurrenceRule::Monthly);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        assert_eq!(next.naive_local().time(), due.naive_local().time());
    }

    #[test]
    fn catch_up_lands_strictly_after_now() {
        let due = utc(2025, 1, 10, 9, 0);
        let now = utc(2025, 1, 13, 9, 0);
        let (next, steps) = first_occurrence_after(&due, RecurrenceRule::Daily, &now);
        assert_eq!(next, utc(2025, 1, 14, 9, 0));
        assert_eq!(steps, 4);
    }

    #[test]
    fn catch_up_takes_one_step_when_next_is_future() {
        let due = utc(2025, 1, 10, 9, 0);
        let now = utc(2025, 1, 10, 12, 0);
        let (next, steps) = first_occurrence_after(&due, RecurrenceRule::Weekly, &now);
        assert_eq!(next, utc(2025, 1, 17, 9, 0));
        assert_eq!(steps, 1);
    }
}
