use chrono::{Datelike, NaiveDate, Weekday};

pub const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub const WEEKDAY_HEADINGS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// 1-indexed position of `date` within its year.
pub fn day_of_year(date: NaiveDate) -> u32 {
    date.ordinal()
}

/// Inverse of [`day_of_year`]. Ordinals outside `1..=days_in_year(year)`
/// yield `None` instead of rolling over into a neighbouring year.
pub fn date_from_day_of_year(year: i32, ordinal: u32) -> Option<NaiveDate> {
    if ordinal == 0 || ordinal > days_in_year(year) {
        return None;
    }
    NaiveDate::from_yo_opt(year, ordinal)
}

pub fn date_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", date.year(), date.month(), date.day())
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(key, "%Y-%m-%d").ok()?;
    // chrono accepts unpadded fields; keys must round-trip exactly
    (date_key(date) == key).then_some(date)
}

/// Monday = 0 .. Sunday = 6.
pub fn monday_index(date: NaiveDate) -> u32 {
    (date.weekday().num_days_from_sunday() + 6) % 7
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn first_of_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

pub fn last_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }?;
    next.pred_opt()
}

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("???")
}

/// "March 4"
pub fn format_long(date: NaiveDate) -> String {
    date.format("%B %-d").to_string()
}

/// "Tuesday, March 4"
pub fn format_with_weekday(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}
