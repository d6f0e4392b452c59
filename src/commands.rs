use crate::calendar::{self, format_with_weekday, WEEKDAY_HEADINGS};
use crate::cli::Layout;
use crate::grid::{self, Cell, DayCell};
use crate::model::{find_theme, is_single_grapheme, palette_color, StateError, THEMES};
use crate::storage::{StateLocation, EXPORT_MIME};
use crate::store::{today, AnnotationStore};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use std::env;
use std::path::PathBuf;

pub fn tui(location: StateLocation) -> Result<()> {
    ui::run(AnnotationStore::open(location))
}

pub fn show(location: StateLocation, year: Option<i32>, layout: Layout) -> Result<()> {
    let store = AnnotationStore::open(location);
    let state = store.state();
    let year = year.unwrap_or(state.year);
    let today = today();
    let summary = grid::progress(year, today);
    println!(
        "{}  {}  {}",
        year,
        summary.remaining_label(),
        summary.percentage_label()
    );
    match layout {
        Layout::Continuous => {
            let cells = grid::compute_grid(year, &state.days, today);
            print_continuous(&cells);
        }
        Layout::Monthly => {
            for block in grid::month_blocks(year, &state.days, today) {
                println!();
                println!("{}", block.name);
                println!("{}", WEEKDAY_HEADINGS.join(" "));
                for week in block.weeks() {
                    println!("{}", week.iter().map(cell_glyph).collect::<String>());
                }
            }
        }
    }
    if let Some(hint) = grid::hint_text(&state.days, year, today) {
        println!();
        println!("{}", hint);
    }
    Ok(())
}

pub fn progress(location: StateLocation) -> Result<()> {
    let store = AnnotationStore::open(location);
    let year = store.state().year;
    let summary = grid::progress(year, today());
    println!(
        "{}: {} ({})",
        year,
        summary.remaining_label(),
        summary.percentage_label()
    );
    Ok(())
}

pub fn mark(
    location: StateLocation,
    date: String,
    color: Option<String>,
    emoji: Option<String>,
    note: Option<String>,
) -> Result<()> {
    let day = parse_day(&date)?;
    if color.is_none() && emoji.is_none() && note.is_none() {
        bail!("nothing to mark: pass --color, --emoji or --note");
    }
    // reject bad arguments before anything is saved
    let color = color
        .map(|c| palette_color(&c).ok_or(StateError::UnknownColor(c)))
        .transpose()
        .with_context(|| format!("setting color on {}", date))?;
    if let Some(emoji) = emoji.as_deref().filter(|e| !is_single_grapheme(e)) {
        return Err(StateError::InvalidEmoji(emoji.to_string()))
            .with_context(|| format!("setting emoji on {}", date));
    }
    let mut store = AnnotationStore::open(location);
    if let Some(color) = color {
        store.set_color(day, color)?;
    }
    if let Some(emoji) = emoji {
        store.set_emoji(day, &emoji)?;
    }
    if let Some(note) = note {
        store.set_note(day, &note);
    }
    print_day(&store, day);
    Ok(())
}

pub fn day(location: StateLocation, date: String) -> Result<()> {
    let day = parse_day(&date)?;
    let store = AnnotationStore::open(location);
    print_day(&store, day);
    Ok(())
}

pub fn year(location: StateLocation, year: i32) -> Result<()> {
    let mut store = AnnotationStore::open(location);
    store.set_year(year)?;
    println!("Viewing {}", year);
    Ok(())
}

pub fn theme(location: StateLocation, id: String) -> Result<()> {
    let theme = find_theme(&id).ok_or_else(|| {
        let known = THEMES.iter().map(|t| t.id).collect::<Vec<_>>().join(", ");
        anyhow!("unknown theme {} (choose from {})", id, known)
    })?;
    let mut store = AnnotationStore::open(location);
    store.set_theme(theme.id);
    println!("Theme set to {}", theme.name);
    Ok(())
}

pub fn emojis(location: StateLocation, raw: String) -> Result<()> {
    let mut store = AnnotationStore::open(location);
    store.set_emoji_palette(&raw);
    println!("Emoji palette: {}", store.state().emoji_palette().join(" "));
    Ok(())
}

pub fn export(location: StateLocation, out: Option<PathBuf>) -> Result<()> {
    let store = AnnotationStore::open(location);
    let path = match out {
        Some(path) => path,
        None => env::current_dir()?.join(store.export_file_name()),
    };
    store
        .export_to(&path)
        .with_context(|| format!("exporting to {:?}", path))?;
    println!("Exported backup to {} ({})", path.display(), EXPORT_MIME);
    Ok(())
}

pub fn import(location: StateLocation, path: PathBuf) -> Result<()> {
    let mut store = AnnotationStore::open(location);
    store
        .import_file(&path)
        .with_context(|| format!("importing {:?}", path))?;
    println!("Your data has been restored! 🎉");
    Ok(())
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    calendar::parse_date_key(raw.trim())
        .ok_or_else(|| anyhow!("invalid date (use YYYY-MM-DD): {}", raw))
}

fn print_day(store: &AnnotationStore, day: NaiveDate) {
    println!(
        "{} (day {})",
        format_with_weekday(day),
        calendar::day_of_year(day)
    );
    match store.state().annotation(day) {
        None => println!("  (unmarked)"),
        Some(entry) => {
            if let Some(color) = &entry.color {
                println!("  color: {}", color);
            }
            if let Some(emoji) = &entry.emoji {
                println!("  emoji: {}", emoji);
            }
            if let Some(note) = &entry.note {
                println!("  note: {}", note);
            }
        }
    }
}

fn print_continuous(cells: &[Cell]) {
    println!("     {}", WEEKDAY_HEADINGS.join(" "));
    for week in cells.chunks(7) {
        let label = week
            .iter()
            .filter_map(Cell::day)
            .find(|d| d.flags.month_start)
            .map(|d| calendar::month_name(d.date.month()))
            .unwrap_or("");
        println!(
            "{:<4} {}",
            label,
            week.iter().map(cell_glyph).collect::<String>()
        );
    }
}

fn cell_glyph(cell: &Cell) -> String {
    match cell {
        Cell::Padding => "   ".into(),
        Cell::Day(day) => day_glyph(day),
    }
}

fn day_glyph(day: &DayCell) -> String {
    let annotation = day.annotation.as_ref();
    if let Some(emoji) = annotation.and_then(|a| a.emoji.as_deref()) {
        // emoji render two columns wide
        return format!("{} ", emoji);
    }
    let glyph = if day.flags.today {
        '◎'
    } else if annotation.is_some_and(|a| a.color.is_some()) {
        '●'
    } else if annotation.is_some_and(|a| a.note.is_some()) {
        '✎'
    } else if day.flags.past {
        '•'
    } else {
        '·'
    };
    format!("{}  ", glyph)
}
