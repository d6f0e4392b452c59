//! Grid layout for one year of day dots.
//!
//! Two shapes share the same per-day classification: a continuous stream of
//! seven-column weeks ([`compute_grid`] with [`month_spans`] for the month
//! labels) and twelve separate month blocks ([`month_blocks`]). Weeks always
//! start on Monday.

use crate::calendar::{
    date_from_day_of_year, date_key, day_of_year, days_in_year, first_of_year, is_weekend,
    last_of_month, month_name, monday_index,
};
use crate::model::{DateKey, DayAnnotation};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellFlags {
    pub weekend: bool,
    /// Reached: before today, or today itself.
    pub past: bool,
    pub today: bool,
    pub month_start: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub date_key: DateKey,
    pub ordinal: u32,
    /// Monday = 0 .. Sunday = 6
    pub weekday: u32,
    pub flags: CellFlags,
    pub annotation: Option<DayAnnotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Alignment filler before the first day; carries no date.
    Padding,
    Day(DayCell),
}

impl Cell {
    pub fn day(&self) -> Option<&DayCell> {
        match self {
            Cell::Day(day) => Some(day),
            Cell::Padding => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSpan {
    pub month: u32,
    pub name: &'static str,
    pub start_week: u32,
    pub weeks: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthBlock {
    pub month: u32,
    pub name: &'static str,
    pub cells: Vec<Cell>,
}

impl MonthBlock {
    pub fn weeks(&self) -> std::slice::Chunks<'_, Cell> {
        self.cells.chunks(7)
    }
}

pub fn compute_grid(
    year: i32,
    days: &BTreeMap<DateKey, DayAnnotation>,
    today: NaiveDate,
) -> Vec<Cell> {
    let Some(jan1) = first_of_year(year) else {
        return Vec::new();
    };
    let padding = monday_index(jan1) as usize;
    let total = days_in_year(year);
    let mut cells = Vec::with_capacity(padding + total as usize);
    cells.extend(std::iter::repeat(Cell::Padding).take(padding));

    let mut last_month = None;
    for ordinal in 1..=total {
        let Some(date) = date_from_day_of_year(year, ordinal) else {
            continue;
        };
        let month_start = last_month != Some(date.month());
        last_month = Some(date.month());
        cells.push(Cell::Day(day_cell(date, days, today, month_start)));
    }
    cells
}

/// Week index and span of each month within the continuous grid.
pub fn month_spans(year: i32) -> Vec<MonthSpan> {
    let Some(jan1) = first_of_year(year) else {
        return Vec::new();
    };
    let start = monday_index(jan1);
    let week_of = |date: NaiveDate| (day_of_year(date) + start - 1) / 7;
    (1..=12)
        .filter_map(|month| {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            let last = last_of_month(year, month)?;
            let start_week = week_of(first);
            Some(MonthSpan {
                month,
                name: month_name(month),
                start_week,
                weeks: week_of(last) - start_week + 1,
            })
        })
        .collect()
}

pub fn month_blocks(
    year: i32,
    days: &BTreeMap<DateKey, DayAnnotation>,
    today: NaiveDate,
) -> Vec<MonthBlock> {
    (1..=12)
        .filter_map(|month| {
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            let mut cells: Vec<Cell> = std::iter::repeat(Cell::Padding)
                .take(monday_index(first) as usize)
                .collect();
            cells.extend(
                first
                    .iter_days()
                    .take_while(|d| d.month() == month)
                    .map(|d| Cell::Day(day_cell(d, days, today, d.day() == 1))),
            );
            Some(MonthBlock {
                month,
                name: month_name(month),
                cells,
            })
        })
        .collect()
}

fn day_cell(
    date: NaiveDate,
    days: &BTreeMap<DateKey, DayAnnotation>,
    today: NaiveDate,
    month_start: bool,
) -> DayCell {
    let key = date_key(date);
    let ordinal = day_of_year(date);
    let position = (date.year(), ordinal);
    let now = (today.year(), day_of_year(today));
    DayCell {
        date,
        ordinal,
        weekday: monday_index(date),
        flags: CellFlags {
            weekend: is_weekend(date),
            past: position <= now,
            today: position == now,
            month_start,
        },
        annotation: days.get(&key).cloned(),
        date_key: key,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    InProgress {
        days_passed: u32,
        days_remaining: u32,
        total_days: u32,
        percentage: f64,
    },
    Complete,
    NotStarted {
        total_days: u32,
    },
}

impl Progress {
    pub fn remaining_label(&self) -> String {
        match self {
            Progress::InProgress { days_remaining, .. } => format!(
                "{} day{} left",
                days_remaining,
                if *days_remaining == 1 { "" } else { "s" }
            ),
            Progress::Complete => "Complete".into(),
            Progress::NotStarted { total_days } => format!("{} days", total_days),
        }
    }

    pub fn percentage_label(&self) -> String {
        match self {
            Progress::InProgress { percentage, .. } => format!("{:.1}%", percentage),
            Progress::Complete => "100%".into(),
            Progress::NotStarted { .. } => "0%".into(),
        }
    }

    /// 0.0 ..= 1.0, for gauges. Unrounded, unlike the percentage.
    pub fn ratio(&self) -> f64 {
        match self {
            Progress::InProgress {
                days_passed,
                total_days,
                ..
            } => *days_passed as f64 / *total_days as f64,
            Progress::Complete => 1.0,
            Progress::NotStarted { .. } => 0.0,
        }
    }
}

pub fn progress(year: i32, today: NaiveDate) -> Progress {
    let total_days = days_in_year(year);
    match year.cmp(&today.year()) {
        std::cmp::Ordering::Equal => {
            let current = day_of_year(today);
            let days_passed = current - 1;
            Progress::InProgress {
                days_passed,
                days_remaining: total_days - current + 1,
                total_days,
                percentage: round1(days_passed as f64 / total_days as f64 * 100.0),
            }
        }
        std::cmp::Ordering::Less => Progress::Complete,
        std::cmp::Ordering::Greater => Progress::NotStarted { total_days },
    }
}

/// Nudge shown while nothing has been marked yet.
pub fn hint_text(
    days: &BTreeMap<DateKey, DayAnnotation>,
    year: i32,
    today: NaiveDate,
) -> Option<&'static str> {
    if !days.is_empty() {
        return None;
    }
    let current = day_of_year(today);
    let total = days_in_year(year);
    Some(if current <= 7 {
        "A fresh year awaits! ✨ Tap any day to begin."
    } else if current + 7 >= total {
        "The year is almost complete! 🌟 Mark your memories."
    } else {
        "Tap any day to mark it ✨"
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
