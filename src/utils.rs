use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    first_of_month(next_year, next_month).pred_opt().unwrap_or(NaiveDate::MAX)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).day()
}

/// First day of a month. Months outside 1..=12 are normalized by carrying
/// into the year.
pub fn first_of_month(year: i32, month: u32) -> NaiveDate {
    let index = month_index(year, 1) + month as i64 - 1;
    date_from_month_index(index, 1)
}

/// Shifts a date by a signed number of months, clamping the day to the
/// length of the target month (Jan 31 + 1 month = Feb 28/29).
pub fn shift_months(date: NaiveDate, months: i64) -> NaiveDate {
    let target = month_index(date.year(), date.month()).saturating_add(months);
    date_from_month_index(target, date.day())
}

/// Months since year 0, so month arithmetic can be done on one integer.
pub fn month_index(year: i32, month: u32) -> i64 {
    year as i64 * 12 + month as i64 - 1
}

/// Day `day` (clamped) of the month with the given [`month_index`].
/// Saturates at the ends of the supported calendar.
pub fn date_from_month_index(index: i64, day: u32) -> NaiveDate {
    checked_date_from_month_index(index, day).unwrap_or(if index < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Like [`date_from_month_index`], but `None` outside chrono's date range.
pub fn checked_date_from_month_index(index: i64, day: u32) -> Option<NaiveDate> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    let month = index.rem_euclid(12) as u32 + 1;
    let day = day.min(days_in_month_raw(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// [`shift_months`] that reports overflow instead of saturating.
pub fn checked_shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let target = month_index(date.year(), date.month()).checked_add(months)?;
    checked_date_from_month_index(target, date.day())
}

fn days_in_month_raw(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
                29
            } else {
                28
            }
        }
    }
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i64 {
    month_index(end.year(), end.month()) - month_index(start.year(), start.month())
}

/// Monday of the week containing `date`. Sunday belongs to the week that
/// started six days earlier.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// The 1st or the 16th of the month, whichever half contains `date`.
pub fn start_of_fortnight(date: NaiveDate) -> NaiveDate {
    let day = if date.day() <= 15 { 1 } else { 16 };
    NaiveDate::from_ymd_opt(date.year(), date.month(), day).unwrap_or(date)
}

/// Converts a UTC instant into the local calendar date for a stored UTC
/// offset expressed in hours.
pub fn today_in_timezone(now: DateTime<Utc>, utc_offset_hours: i32) -> NaiveDate {
    (now + Duration::hours(utc_offset_hours as i64)).date_naive()
}

pub fn short_month_name(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    NAMES[((month + 11) % 12) as usize]
}
