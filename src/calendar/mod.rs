//! Program-day arithmetic
//!
//! Maps a program's begin date and "today" onto 1-based day numbers, computes
//! which day numbers are still pending for a subscriber, and derives the
//! canonical commit timestamp for a delivered day.
//!
//! Day 1 is the begin date itself; a day number below 1 means the program has
//! not started yet.

use chrono::{Duration, Local, NaiveDate, TimeZone};

/// Folder name for a program day, e.g. `3` -> `"3_day"`.
pub fn day_folder(day: u32) -> String {
    format!("{day}_day")
}

/// Remote folder path for a program day, e.g. `("course_a", 3)` -> `"course_a/3_day"`.
pub fn folder_path(program_key: &str, day: u32) -> String {
    format!("{}/{}", program_key, day_folder(day))
}

/// 1-based day number of `as_of` within a program starting at `begin`.
///
/// Returns a value < 1 when `as_of` precedes `begin`. Callers computing
/// deliveries must treat that as "nothing to deliver yet".
pub fn day_number(begin: NaiveDate, as_of: NaiveDate) -> i64 {
    (as_of - begin).num_days() + 1
}

/// Unix timestamp marking a day as delivered: the end-of-day instant
/// (23:59:59 local) of `begin + (day - 1)`.
///
/// Using end of day keeps the stored timestamp inside the delivered day's
/// window, so converting it back to a day number can never land on an earlier
/// or later day.
pub fn delivered_at(begin: NaiveDate, day: u32) -> i64 {
    let date = begin + Duration::days(i64::from(day) - 1);
    let dt = date
        .and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| date.and_hms_opt(0, 0, 0).expect("midnight is always valid"));

    // DST transitions can make a local wall-clock time ambiguous or missing;
    // earliest() picks a deterministic instant in both cases.
    Local
        .from_local_datetime(&dt)
        .earliest()
        .map(|local| local.timestamp())
        .unwrap_or_else(|| dt.and_utc().timestamp())
}

/// Convert a stored delivery timestamp back to a local calendar date.
///
/// Returns `None` for timestamps outside chrono's representable range; the
/// caller treats that the same as "never delivered".
fn timestamp_date(ts: i64) -> Option<NaiveDate> {
    Local.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}

/// Day number a stored delivery timestamp corresponds to.
pub fn day_of_timestamp(begin: NaiveDate, ts: i64) -> Option<i64> {
    timestamp_date(ts).map(|date| day_number(begin, date))
}

/// Day numbers that should be delivered, in ascending order.
///
/// * no `last_delivered` -> every day from 1 to the current day
/// * corrupted or future `last_delivered` -> every day again (redelivering is
///   safer than silently dropping days)
/// * otherwise -> the days strictly after the last delivered one
pub fn pending_days(begin: NaiveDate, last_delivered: Option<i64>, as_of: NaiveDate) -> Vec<u32> {
    let current = day_number(begin, as_of);
    if current < 1 {
        return Vec::new();
    }
    let current = current as u32;

    let full_window = || (1..=current).collect::<Vec<u32>>();

    let Some(ts) = last_delivered else {
        return full_window();
    };

    let Some(last_date) = timestamp_date(ts) else {
        return full_window();
    };

    let last_day = day_number(begin, last_date);
    if last_day < 1 || last_day > i64::from(current) {
        return full_window();
    }
    let last_day = last_day as u32;

    if last_day >= current {
        return Vec::new();
    }

    (last_day + 1..=current).collect()
}
