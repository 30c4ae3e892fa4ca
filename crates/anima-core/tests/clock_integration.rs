//! Next-occurrence behavior across fixed offsets and real DST zones.

use anima_core::clock::{date_for_epoch_day, epoch_day_of, epoch_day_of_date, epoch_day_range_for_month, next_occurrence};
use chrono::{Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Europe::Berlin;
use proptest::prelude::*;

proptest! {
    #[test]
    fn next_occurrence_properties_in_fixed_offsets(
        secs in 0i64..4_102_444_800,
        offset_min in -720i32..=840,
        hour in 0u32..24,
        minute in 0u32..60,
    ) {
        let tz = FixedOffset::east_opt(offset_min * 60).unwrap();
        let now = Utc.timestamp_opt(secs, 0).unwrap().with_timezone(&tz);

        let next = next_occurrence(hour, minute, &now).unwrap();

        prop_assert!(next > now);
        prop_assert_eq!(next.hour(), hour);
        prop_assert_eq!(next.minute(), minute);
        prop_assert_eq!(next.second(), 0);
        // Earliest: one day earlier would not be after now.
        prop_assert!(next - Duration::days(1) <= now);
        // Feeding the result back gives exactly one day later.
        prop_assert_eq!(next_occurrence(hour, minute, &next).unwrap(), next + Duration::days(1));
    }

    #[test]
    fn next_occurrence_is_within_a_day_in_dst_zones(
        secs in 0i64..4_102_444_800,
        hour in 0u32..24,
        minute in 0u32..60,
    ) {
        let now = Utc.timestamp_opt(secs, 0).unwrap().with_timezone(&Berlin);
        let next = next_occurrence(hour, minute, &now).unwrap();

        prop_assert!(next > now);
        prop_assert!(next - now <= Duration::hours(25));
    }

    #[test]
    fn epoch_day_roundtrips_through_dates(day in -100_000i64..100_000) {
        let date = date_for_epoch_day(day).unwrap();
        prop_assert_eq!(epoch_day_of_date(date), day);
    }
}

#[test]
fn spring_forward_gap_uses_first_valid_minute() {
    let now = New_York.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap();

    let next = next_occurrence(2, 30, &now).unwrap();

    assert_eq!(next, New_York.with_ymd_and_hms(2025, 3, 9, 3, 0, 0).unwrap());
    assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 3, 9, 7, 0, 0).unwrap());
}

#[test]
fn fall_back_fires_once_in_repeated_hour() {
    let before = New_York.with_ymd_and_hms(2025, 11, 2, 0, 0, 0).unwrap();

    let first = next_occurrence(1, 30, &before).unwrap();
    assert_eq!(first.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 11, 2, 5, 30, 0).unwrap());

    // Re-arming from the fire time skips the second 01:30.
    let second = next_occurrence(1, 30, &first).unwrap();
    assert_eq!(second.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 11, 3, 6, 30, 0).unwrap());

    // Starting inside the repeated hour (standard time) also rolls forward.
    let inside = Utc.with_ymd_and_hms(2025, 11, 2, 6, 10, 0).unwrap().with_timezone(&New_York);
    assert_eq!(next_occurrence(1, 30, &inside).unwrap(), second);
}

#[test]
fn evening_reminder_across_spring_forward_keeps_wall_clock() {
    let now = New_York.with_ymd_and_hms(2025, 3, 8, 20, 0, 0).unwrap();

    let next = next_occurrence(20, 0, &now).unwrap();

    assert_eq!(next, New_York.with_ymd_and_hms(2025, 3, 9, 20, 0, 0).unwrap());
    assert_eq!(next - now, Duration::hours(23));
}

#[test]
fn epoch_day_uses_local_date_not_utc_date() {
    // 23:30 in New York is already the next day in UTC.
    let late = New_York.with_ymd_and_hms(2025, 6, 14, 23, 30, 0).unwrap();
    let expected = epoch_day_of_date(NaiveDate::from_ymd_opt(2025, 6, 14).unwrap());
    assert_eq!(epoch_day_of(&late), expected);
    assert_eq!(epoch_day_of(&late.with_timezone(&Utc)), expected + 1);
}

#[test]
fn month_range_covers_february_in_leap_year() {
    let (first, last) = epoch_day_range_for_month(2024, 2).unwrap();
    assert_eq!(last - first, 28);
    assert_eq!(date_for_epoch_day(first), NaiveDate::from_ymd_opt(2024, 2, 1));
    assert_eq!(date_for_epoch_day(last), NaiveDate::from_ymd_opt(2024, 2, 29));
    assert!(epoch_day_range_for_month(2024, 13).is_err());
}
