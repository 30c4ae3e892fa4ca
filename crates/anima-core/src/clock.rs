//! Epoch-day keys and wall-clock trigger arithmetic.
//!
//! Everything here is pure and generic over [`chrono::TimeZone`], so callers
//! pass `Local` in production and fixed or named zones in tests. Conversion
//! from a wall-clock reading to an instant always goes through
//! `TimeZone::from_local_datetime`; no code here adds 24 hours to an instant.

use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::error::ClockError;

/// `num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Longest DST gap we walk across when a wall-clock time does not exist.
const MAX_GAP_MINUTES: i64 = 180;

/// Days to search forward. Two covers every ordinary case; the third absorbs
/// zones that skipped a whole calendar day.
const MAX_SEARCH_DAYS: usize = 3;

/// Epoch day of today's local date.
pub fn today_key() -> i64 {
    epoch_day_of(&Local::now())
}

/// Epoch day of the calendar date `at` falls on, in `at`'s own time zone.
pub fn epoch_day_of<Tz: TimeZone>(at: &DateTime<Tz>) -> i64 {
    epoch_day_of_date(at.date_naive())
}

pub fn epoch_day_of_date(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE
}

/// Calendar date for an epoch day, `None` if outside chrono's range.
pub fn date_for_epoch_day(epoch_day: i64) -> Option<NaiveDate> {
    let days_from_ce = i32::try_from(epoch_day.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days_from_ce)
}

/// Inclusive epoch-day range `(first, last)` covering a calendar month.
///
/// `month` is 1-based.
pub fn epoch_day_range_for_month(year: i32, month: u32) -> Result<(i64, i64), ClockError> {
    let invalid = || ClockError::InvalidMonth { year, month };
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let last = next_first.pred_opt().ok_or_else(invalid)?;
    Ok((epoch_day_of_date(first), epoch_day_of_date(last)))
}

/// Next instant whose wall-clock reading is `hour:minute:00`, strictly after
/// `now`.
///
/// A target equal to `now` counts as already passed and rolls to the next
/// day. On a fall-back day the earlier of the two readings is the only
/// candidate, so a reminder never fires twice in the repeated hour. On a
/// spring-forward day a target inside the gap resolves to the first valid
/// minute after it.
pub fn next_occurrence<Tz: TimeZone>(
    hour: u32,
    minute: u32,
    now: &DateTime<Tz>,
) -> Result<DateTime<Tz>, ClockError> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or(ClockError::InvalidTime { hour, minute })?;
    let tz = now.timezone();
    let mut date = now.date_naive();

    for _ in 0..MAX_SEARCH_DAYS {
        if let Some(candidate) = resolve_local(&tz, date.and_time(time)) {
            if candidate > *now {
                return Ok(candidate);
            }
        }
        date = date
            .succ_opt()
            .ok_or_else(|| ClockError::Unresolvable(format!("{date} {time}")))?;
    }

    Err(ClockError::Unresolvable(format!("{date} {time}")))
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=MAX_GAP_MINUTES)
            .find_map(|m| tz.from_local_datetime(&(local + Duration::minutes(m))).earliest()),
    }
}
