use crate::calendar::{self, date_key};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

pub type DateKey = String;

pub const DEFAULT_EMOJIS: &str = "❤️😊⭐🎉💪🌸☀️🌙✨🌈💜🍀";
pub const DEFAULT_THEME: &str = "sakura";

pub static PALETTE: [&str; 8] = [
    "#FFB7C5", // soft pink
    "#98E4C9", // mint
    "#C9B1FF", // lavender
    "#FFCCB3", // peach
    "#FFE066", // sunny yellow
    "#7DD3C0", // teal
    "#FF9AA2", // coral
    "#B5EAD7", // sage
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub id: &'static str,
    pub name: &'static str,
    /// accent, background, highlight
    pub colors: [&'static str; 3],
}

pub static THEMES: [Theme; 4] = [
    Theme {
        id: "sakura",
        name: "Sakura",
        colors: ["#FFB7C5", "#FFF8F0", "#E8D5E7"],
    },
    Theme {
        id: "mint",
        name: "Mint Dream",
        colors: ["#98E4C9", "#F0FFF4", "#C5E8F7"],
    },
    Theme {
        id: "lavender",
        name: "Lavender Haze",
        colors: ["#C9B1FF", "#F8F4FF", "#FFD6E8"],
    },
    Theme {
        id: "honey",
        name: "Honey Morning",
        colors: ["#FFCCB3", "#FFFBF0", "#FFF2C9"],
    },
];

pub fn find_theme(id: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|t| t.id == id)
}

pub fn theme_or_default(id: &str) -> &'static Theme {
    find_theme(id).unwrap_or(&THEMES[0])
}

/// Canonical palette entry for `input`, ignoring case and a missing `#`.
pub fn palette_color(input: &str) -> Option<&'static str> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    PALETTE
        .iter()
        .copied()
        .find(|c| c[1..].eq_ignore_ascii_case(hex))
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DayAnnotation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DayAnnotation {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.emoji.is_none() && self.note.is_none()
    }

    fn drop_blank_fields(&mut self) {
        for field in [&mut self.color, &mut self.emoji, &mut self.note] {
            if field.as_deref().is_some_and(str::is_empty) {
                *field = None;
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YearProgressState {
    pub year: i32,
    pub days: BTreeMap<DateKey, DayAnnotation>,
    pub theme: String,
    pub emojis: String,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum StateError {
    #[error("color {0} is not in the palette")]
    UnknownColor(String),
    #[error("{0:?} is not a single emoji")]
    InvalidEmoji(String),
    #[error("year {0} is outside 1..=9999")]
    YearOutOfRange(i32),
}

#[derive(thiserror::Error, Debug)]
pub enum ShapeError {
    #[error("field `{0}` has the wrong type")]
    WrongType(&'static str),
    #[error("year {0} is outside 1..=9999")]
    YearOutOfRange(i64),
    #[error("`{0}` is not a YYYY-MM-DD date key")]
    BadDateKey(String),
    #[error("entry for {key} is malformed: {source}")]
    BadDay {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("field `lastUpdated` is malformed: {0}")]
    BadTimestamp(#[source] serde_json::Error),
}

impl YearProgressState {
    pub fn default_for(today: NaiveDate) -> Self {
        YearProgressState {
            year: today.year(),
            days: BTreeMap::new(),
            theme: DEFAULT_THEME.to_string(),
            emojis: DEFAULT_EMOJIS.to_string(),
            last_updated: None,
        }
    }

    pub fn annotation(&self, date: NaiveDate) -> Option<&DayAnnotation> {
        self.days.get(&date_key(date))
    }

    pub fn theme(&self) -> &'static Theme {
        theme_or_default(&self.theme)
    }

    /// Applies `f` to the day's annotation, creating it if needed, and
    /// removes the entry again if nothing is left.
    pub fn update_day<F>(&mut self, date: NaiveDate, f: F)
    where
        F: FnOnce(&mut DayAnnotation),
    {
        let key = date_key(date);
        let mut day = self.days.remove(&key).unwrap_or_default();
        f(&mut day);
        day.drop_blank_fields();
        if !day.is_empty() {
            self.days.insert(key, day);
        }
    }

    pub fn toggle_color(&mut self, date: NaiveDate, color: &str) -> Result<(), StateError> {
        let color =
            palette_color(color).ok_or_else(|| StateError::UnknownColor(color.to_string()))?;
        self.update_day(date, |day| toggle(&mut day.color, color));
        Ok(())
    }

    pub fn toggle_emoji(&mut self, date: NaiveDate, emoji: &str) -> Result<(), StateError> {
        if !is_single_grapheme(emoji) {
            return Err(StateError::InvalidEmoji(emoji.to_string()));
        }
        self.update_day(date, |day| toggle(&mut day.emoji, emoji));
        Ok(())
    }

    pub fn set_note(&mut self, date: NaiveDate, text: &str) {
        let trimmed = text.trim();
        self.update_day(date, |day| {
            day.note = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        });
    }

    pub fn set_year(&mut self, year: i32) -> Result<(), StateError> {
        if !(1..=9999).contains(&year) {
            return Err(StateError::YearOutOfRange(year));
        }
        self.year = year;
        Ok(())
    }

    /// Returns false, leaving the state alone, for ids outside the catalog.
    pub fn set_theme(&mut self, id: &str) -> bool {
        match find_theme(id) {
            Some(theme) => {
                self.theme = theme.id.to_string();
                true
            }
            None => false,
        }
    }

    pub fn set_emoji_palette(&mut self, raw: &str) {
        let cleaned = clean_emoji_palette(raw).concat();
        self.emojis = if cleaned.is_empty() {
            DEFAULT_EMOJIS.to_string()
        } else {
            cleaned
        };
    }

    pub fn emoji_palette(&self) -> Vec<String> {
        let palette = clean_emoji_palette(&self.emojis);
        if palette.is_empty() {
            clean_emoji_palette(DEFAULT_EMOJIS)
        } else {
            palette
        }
    }

    /// Restores the invariants a hand-edited or imported snapshot may break.
    pub fn normalize(&mut self) {
        if find_theme(&self.theme).is_none() {
            self.theme = DEFAULT_THEME.to_string();
        }
        if self.emojis.trim().is_empty() {
            self.emojis = DEFAULT_EMOJIS.to_string();
        }
        for day in self.days.values_mut() {
            day.drop_blank_fields();
        }
        self.days.retain(|_, day| !day.is_empty());
    }
}

/// Shallow, field-by-field merge of a persisted or imported object over
/// `base`. Each present field replaces the base value wholesale; `days` is
/// never merged entry by entry. Unknown keys are ignored. A falsy `year`
/// becomes `today`'s year.
pub fn overlay_defaults(
    base: &YearProgressState,
    overlay: &Map<String, Value>,
    today: NaiveDate,
) -> Result<YearProgressState, ShapeError> {
    let mut merged = base.clone();
    for (key, value) in overlay {
        match key.as_str() {
            "year" => merged.year = overlay_year(value, today)?,
            "days" => merged.days = overlay_days(value)?,
            "theme" => merged.theme = string_field("theme", value)?,
            "emojis" => merged.emojis = string_field("emojis", value)?,
            "lastUpdated" => {
                merged.last_updated =
                    serde_json::from_value(value.clone()).map_err(ShapeError::BadTimestamp)?
            }
            _ => {}
        }
    }
    merged.normalize();
    Ok(merged)
}

fn overlay_year(value: &Value, today: NaiveDate) -> Result<i32, ShapeError> {
    if is_falsy(value) {
        return Ok(today.year());
    }
    let year = value.as_i64().ok_or(ShapeError::WrongType("year"))?;
    if !(1..=9999).contains(&year) {
        return Err(ShapeError::YearOutOfRange(year));
    }
    Ok(year as i32)
}

fn overlay_days(value: &Value) -> Result<BTreeMap<DateKey, DayAnnotation>, ShapeError> {
    let entries = value.as_object().ok_or(ShapeError::WrongType("days"))?;
    let mut days = BTreeMap::new();
    for (key, entry) in entries {
        if calendar::parse_date_key(key).is_none() {
            return Err(ShapeError::BadDateKey(key.clone()));
        }
        if !entry.is_object() {
            return Err(ShapeError::WrongType("days"));
        }
        let day: DayAnnotation =
            serde_json::from_value(entry.clone()).map_err(|source| ShapeError::BadDay {
                key: key.clone(),
                source,
            })?;
        days.insert(key.clone(), day);
    }
    Ok(days)
}

fn string_field(name: &'static str, value: &Value) -> Result<String, ShapeError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(ShapeError::WrongType(name))
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn toggle(field: &mut Option<String>, value: &str) {
    if field.as_deref() == Some(value) {
        *field = None;
    } else {
        *field = Some(value.to_string());
    }
}

pub fn is_single_grapheme(text: &str) -> bool {
    let mut clusters = text.graphemes(true);
    matches!((clusters.next(), clusters.next()), (Some(g), None) if !g.trim().is_empty())
}

/// Splits into user-perceived characters, dropping whitespace and repeats.
pub fn clean_emoji_palette(raw: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for cluster in raw.graphemes(true) {
        if cluster.trim().is_empty() || seen.iter().any(|s| s == cluster) {
            continue;
        }
        seen.push(cluster.to_string());
    }
    seen
}

/// The years offered by the year selector: this year and the two before.
pub fn selectable_years(today: NaiveDate) -> [i32; 3] {
    let year = today.year();
    [year, year - 1, year - 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fresh() -> YearProgressState {
        YearProgressState::default_for(ymd(2025, 6, 1))
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults_use_current_year_and_catalog() {
        let state = fresh();
        assert_eq!(state.year, 2025);
        assert!(state.days.is_empty());
        assert_eq!(state.theme, "sakura");
        assert_eq!(state.emojis, DEFAULT_EMOJIS);
        assert_eq!(state.last_updated, None);
        assert_eq!(state.emoji_palette().len(), 12);
    }

    #[test]
    fn same_color_twice_clears_the_day() {
        let mut state = fresh();
        let day = ymd(2025, 3, 4);
        state.toggle_color(day, "#FFB7C5").unwrap();
        assert_eq!(
            state.annotation(day).and_then(|d| d.color.as_deref()),
            Some("#FFB7C5")
        );
        state.toggle_color(day, "#FFB7C5").unwrap();
        assert!(!state.days.contains_key("2025-03-04"));
    }

    #[test]
    fn different_color_replaces() {
        let mut state = fresh();
        let day = ymd(2025, 3, 4);
        state.toggle_color(day, "#FFB7C5").unwrap();
        state.toggle_color(day, "#98e4c9").unwrap();
        assert_eq!(state.days["2025-03-04"].color.as_deref(), Some("#98E4C9"));
    }

    #[test]
    fn fields_are_independent() {
        let mut state = fresh();
        let day = ymd(2025, 3, 4);
        state.toggle_color(day, "#C9B1FF").unwrap();
        state.toggle_emoji(day, "⭐").unwrap();
        state.toggle_color(day, "#C9B1FF").unwrap();
        let entry = state.annotation(day).unwrap();
        assert_eq!(entry.color, None);
        assert_eq!(entry.emoji.as_deref(), Some("⭐"));
        state.toggle_emoji(day, "⭐").unwrap();
        assert!(state.days.is_empty());
    }

    #[test]
    fn rejects_colors_outside_palette() {
        let mut state = fresh();
        let err = state.toggle_color(ymd(2025, 1, 1), "#000000").unwrap_err();
        assert_eq!(err, StateError::UnknownColor("#000000".into()));
        assert!(state.days.is_empty());
    }

    #[test]
    fn emoji_must_be_one_cluster() {
        let mut state = fresh();
        let day = ymd(2025, 1, 1);
        state.toggle_emoji(day, "❤️").unwrap();
        assert!(matches!(
            state.toggle_emoji(day, "ab"),
            Err(StateError::InvalidEmoji(_))
        ));
        assert!(matches!(
            state.toggle_emoji(day, " "),
            Err(StateError::InvalidEmoji(_))
        ));
        assert_eq!(state.days["2025-01-01"].emoji.as_deref(), Some("❤️"));
    }

    #[test]
    fn notes_are_trimmed_and_blank_clears() {
        let mut state = fresh();
        let day = ymd(2025, 2, 2);
        state.set_note(day, "  coffee with mum \n");
        assert_eq!(state.days["2025-02-02"].note.as_deref(), Some("coffee with mum"));
        state.set_note(day, "   ");
        assert!(state.days.is_empty());
    }

    #[test]
    fn year_changes_keep_other_years() {
        let mut state = fresh();
        state.toggle_color(ymd(2024, 5, 5), "#FFE066").unwrap();
        state.set_year(2024).unwrap();
        state.set_year(2025).unwrap();
        assert_eq!(state.year, 2025);
        assert!(state.days.contains_key("2024-05-05"));
        assert_eq!(state.set_year(0), Err(StateError::YearOutOfRange(0)));
        assert_eq!(state.year, 2025);
    }

    #[test]
    fn unknown_theme_is_ignored() {
        let mut state = fresh();
        assert!(state.set_theme("mint"));
        assert!(!state.set_theme("neon"));
        assert_eq!(state.theme, "mint");
        assert_eq!(state.theme().name, "Mint Dream");
    }

    #[test]
    fn emoji_palette_dedupes_by_grapheme() {
        let mut state = fresh();
        state.set_emoji_palette("❤️❤️😊 😊");
        assert_eq!(state.emoji_palette(), vec!["❤️", "😊"]);
        assert_eq!(state.emojis, "❤️😊");
    }

    #[test]
    fn emoji_palette_keeps_compound_emoji_whole() {
        let mut state = fresh();
        state.set_emoji_palette("👩‍👩‍👧 🇳🇿👍🏽");
        assert_eq!(state.emoji_palette(), vec!["👩‍👩‍👧", "🇳🇿", "👍🏽"]);
    }

    #[test]
    fn blank_emoji_palette_falls_back() {
        let mut state = fresh();
        state.set_emoji_palette(" \t ");
        assert_eq!(state.emojis, DEFAULT_EMOJIS);
    }

    #[test]
    fn overlay_replaces_fields_shallowly() {
        let mut base = fresh();
        base.toggle_color(ymd(2025, 1, 1), "#FFB7C5").unwrap();
        let merged = overlay_defaults(
            &base,
            &object(json!({
                "days": { "2025-02-01": { "emoji": "🌙" } },
                "theme": "honey"
            })),
            ymd(2025, 6, 1),
        )
        .unwrap();
        assert_eq!(merged.theme, "honey");
        assert_eq!(merged.emojis, DEFAULT_EMOJIS);
        assert!(!merged.days.contains_key("2025-01-01"));
        assert_eq!(merged.days["2025-02-01"].emoji.as_deref(), Some("🌙"));
    }

    #[test]
    fn overlay_forces_falsy_year() {
        let base = YearProgressState::default_for(ymd(2020, 1, 1));
        for year in [json!(null), json!(0), json!(false), json!("")] {
            let merged =
                overlay_defaults(&base, &object(json!({ "year": year })), ymd(2026, 3, 3))
                    .unwrap();
            assert_eq!(merged.year, 2026);
        }
        let kept = overlay_defaults(&base, &object(json!({ "year": 2019 })), ymd(2026, 3, 3))
            .unwrap();
        assert_eq!(kept.year, 2019);
    }

    #[test]
    fn overlay_falls_back_from_unknown_theme() {
        let merged =
            overlay_defaults(&fresh(), &object(json!({ "theme": "neon" })), ymd(2025, 1, 1))
                .unwrap();
        assert_eq!(merged.theme, DEFAULT_THEME);
    }

    #[test]
    fn overlay_rejects_malformed_inner_shapes() {
        let today = ymd(2025, 1, 1);
        let cases = [
            json!({ "days": [] }),
            json!({ "days": { "yesterday": { "note": "x" } } }),
            json!({ "days": { "2025-01-01": "pink" } }),
            json!({ "days": { "2025-01-01": { "color": 7 } } }),
            json!({ "theme": 3 }),
            json!({ "emojis": ["❤️"] }),
            json!({ "year": "2024" }),
            json!({ "year": 123456 }),
            json!({ "lastUpdated": "last tuesday" }),
        ];
        for case in cases {
            assert!(
                overlay_defaults(&fresh(), &object(case.clone()), today).is_err(),
                "{}",
                case
            );
        }
    }

    #[test]
    fn overlay_prunes_empty_entries() {
        let merged = overlay_defaults(
            &fresh(),
            &object(json!({
                "days": {
                    "2025-01-01": {},
                    "2025-01-02": { "note": "" },
                    "2025-01-03": { "note": "kept", "emoji": "" }
                },
                "shareCode": "ignored"
            })),
            ymd(2025, 1, 1),
        )
        .unwrap();
        assert_eq!(merged.days.len(), 1);
        assert_eq!(merged.days["2025-01-03"].emoji, None);
    }

    #[test]
    fn serializes_with_browser_field_names() {
        let mut state = fresh();
        state.toggle_emoji(ymd(2025, 1, 1), "✨").unwrap();
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["year"], json!(2025));
        assert_eq!(value["lastUpdated"], Value::Null);
        assert_eq!(value["days"]["2025-01-01"], json!({ "emoji": "✨" }));
    }

    #[test]
    fn palette_color_is_case_insensitive() {
        assert_eq!(palette_color("ffb7c5"), Some("#FFB7C5"));
        assert_eq!(palette_color(" #b5ead7 "), Some("#B5EAD7"));
        assert_eq!(palette_color("#123456"), None);
    }

    #[test]
    fn year_selector_offers_three_years() {
        assert_eq!(selectable_years(ymd(2026, 10, 16)), [2026, 2025, 2024]);
    }
}
