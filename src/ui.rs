use crate::calendar::{self, day_of_year, days_in_year, format_with_weekday, WEEKDAY_HEADINGS};
use crate::grid::{self, Cell, DayCell};
use crate::model::{selectable_years, Theme, PALETTE, THEMES};
use crate::storage::StateScope;
use crate::store::{today, AnnotationStore};
use anyhow::Result;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap};
use ratatui::Terminal;
use std::env;
use std::io::{stdout, Stdout};
use std::path::Path;
use std::time::{Duration, Instant};
use unicode_segmentation::UnicodeSegmentation;

const RESTORED: &str = "Your data has been restored! 🎉";
const IMPORT_FAILED: &str =
    "Oops! That file doesn't look right. Please try a different backup file.";

pub fn run(store: AnnotationStore) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(store, today());
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    store: AnnotationStore,
    today: NaiveDate,
    cursor: NaiveDate,
    view: ViewMode,
    mode: Mode,
    status: String,
    last_save: Instant,
}

enum Mode {
    Normal,
    Day(DayPopup),
    Settings(SettingsPanel),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ViewMode {
    Stream,
    Months,
}

impl ViewMode {
    fn label(&self) -> &'static str {
        match self {
            ViewMode::Stream => "year",
            ViewMode::Months => "months",
        }
    }

    fn toggled(self) -> Self {
        match self {
            ViewMode::Stream => ViewMode::Months,
            ViewMode::Months => ViewMode::Stream,
        }
    }
}

/// The day a popup was opened for.
#[derive(Clone, Debug, PartialEq, Eq)]
struct SelectedDay {
    day_number: u32,
    date: NaiveDate,
    date_key: String,
}

impl SelectedDay {
    fn new(date: NaiveDate) -> Self {
        SelectedDay {
            day_number: day_of_year(date),
            date,
            date_key: calendar::date_key(date),
        }
    }
}

struct DayPopup {
    selected: SelectedDay,
    focus: PopupFocus,
    color_idx: usize,
    emoji_idx: usize,
    /// Buffered until the popup closes.
    note: FieldValue,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum PopupFocus {
    Colors,
    Emojis,
    Note,
}

struct SettingsPanel {
    focus: SettingsFocus,
    theme_idx: usize,
    year_idx: usize,
    emojis: FieldValue,
    import_path: FieldValue,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum SettingsFocus {
    Theme,
    Year,
    Emojis,
    Export,
    Import,
}

impl DayPopup {
    fn next_focus(&mut self) {
        self.focus = match self.focus {
            PopupFocus::Colors => PopupFocus::Emojis,
            PopupFocus::Emojis => PopupFocus::Note,
            PopupFocus::Note => PopupFocus::Colors,
        };
    }

    fn prev_focus(&mut self) {
        self.focus = match self.focus {
            PopupFocus::Colors => PopupFocus::Note,
            PopupFocus::Emojis => PopupFocus::Colors,
            PopupFocus::Note => PopupFocus::Emojis,
        };
    }
}

impl SettingsPanel {
    fn next_focus(&mut self) {
        self.focus = match self.focus {
            SettingsFocus::Theme => SettingsFocus::Year,
            SettingsFocus::Year => SettingsFocus::Emojis,
            SettingsFocus::Emojis => SettingsFocus::Export,
            SettingsFocus::Export => SettingsFocus::Import,
            SettingsFocus::Import => SettingsFocus::Theme,
        };
    }

    fn prev_focus(&mut self) {
        self.focus = match self.focus {
            SettingsFocus::Theme => SettingsFocus::Import,
            SettingsFocus::Year => SettingsFocus::Theme,
            SettingsFocus::Emojis => SettingsFocus::Year,
            SettingsFocus::Export => SettingsFocus::Emojis,
            SettingsFocus::Import => SettingsFocus::Export,
        };
    }

    fn active_field_mut(&mut self) -> Option<&mut FieldValue> {
        match self.focus {
            SettingsFocus::Emojis => Some(&mut self.emojis),
            SettingsFocus::Import => Some(&mut self.import_path),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    /// Shared editing keys; returns false for keys it does not handle.
    fn handle_key(&mut self, key: KeyEvent, multiline: bool) -> bool {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Enter if multiline => self.insert_char('\n'),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert_char(c)
            }
            _ => return false,
        }
        true
    }
}

impl App {
    fn new(store: AnnotationStore, today: NaiveDate) -> Self {
        let location = store.location();
        let status = match location.scope {
            StateScope::Default => format!("Loaded {}", location.path.display()),
            StateScope::Custom => format!("Loaded custom file {}", location.path.display()),
        };
        let mut app = App {
            store,
            today,
            cursor: today,
            view: ViewMode::Stream,
            mode: Mode::Normal,
            status,
            last_save: Instant::now(),
        };
        app.reset_cursor();
        app
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.today = today();
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Day(_) => self.handle_popup_key(key),
            Mode::Settings(_) => self.handle_settings_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Left | KeyCode::Char('h') => self.shift_cursor(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.shift_cursor(-7),
            KeyCode::Down | KeyCode::Char('j') => self.shift_cursor(7),
            KeyCode::Char('t') => {
                self.reset_cursor();
                self.status = format!("Jumped to {}", calendar::format_long(self.cursor));
            }
            KeyCode::Char('v') => {
                self.view = self.view.toggled();
                self.status = format!("Switched to {} view", self.view.label());
            }
            KeyCode::Char('[') => self.change_year(self.store.state().year - 1),
            KeyCode::Char(']') => self.change_year(self.store.state().year + 1),
            KeyCode::Enter | KeyCode::Char(' ') => self.open_popup(),
            KeyCode::Char('s') => self.open_settings(),
            _ => {}
        }
        Ok(false)
    }

    fn handle_popup_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut close = false;
        if let Mode::Day(popup) = &mut mode {
            close = self.process_popup_key(popup, key);
        }
        if !close {
            self.mode = mode;
        }
        Ok(false)
    }

    fn process_popup_key(&mut self, popup: &mut DayPopup, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.close_popup(popup);
                return true;
            }
            KeyCode::Tab => popup.next_focus(),
            KeyCode::BackTab => popup.prev_focus(),
            _ if popup.focus == PopupFocus::Note => {
                popup.note.handle_key(key, true);
            }
            KeyCode::Char(c @ '1'..='8') => {
                popup.color_idx = c as usize - '1' as usize;
                self.apply_color(popup);
            }
            KeyCode::Left | KeyCode::Char('h') => self.shift_popup_choice(popup, -1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_popup_choice(popup, 1),
            KeyCode::Enter | KeyCode::Char(' ') => match popup.focus {
                PopupFocus::Colors => self.apply_color(popup),
                PopupFocus::Emojis => self.apply_emoji(popup),
                PopupFocus::Note => {}
            },
            _ => {}
        }
        false
    }

    fn handle_settings_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut close = false;
        if let Mode::Settings(panel) = &mut mode {
            close = self.process_settings_key(panel, key);
        }
        if !close {
            self.mode = mode;
        }
        Ok(false)
    }

    fn process_settings_key(&mut self, panel: &mut SettingsPanel, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.close_settings(panel);
                return true;
            }
            KeyCode::Tab => panel.next_focus(),
            KeyCode::BackTab => panel.prev_focus(),
            KeyCode::Enter if panel.focus == SettingsFocus::Export => {
                self.close_settings(panel);
                self.export_backup();
                return true;
            }
            KeyCode::Enter if panel.focus == SettingsFocus::Import => {
                return self.import_backup(panel.import_path.value.trim());
            }
            _ => {
                if let Some(field) = panel.active_field_mut() {
                    field.handle_key(key, false);
                    return false;
                }
                let delta = match key.code {
                    KeyCode::Left | KeyCode::Char('h') => -1,
                    KeyCode::Right | KeyCode::Char('l') => 1,
                    _ => return false,
                };
                match panel.focus {
                    SettingsFocus::Theme => {
                        panel.theme_idx = wrap_index(panel.theme_idx, delta, THEMES.len());
                        let theme = THEMES[panel.theme_idx];
                        if self.store.set_theme(theme.id) {
                            self.after_change(format!("Theme set to {}", theme.name));
                        }
                    }
                    SettingsFocus::Year => {
                        let years = selectable_years(self.today);
                        panel.year_idx = wrap_index(panel.year_idx, delta, years.len());
                        self.change_year(years[panel.year_idx]);
                    }
                    _ => {}
                }
            }
        }
        false
    }

    fn open_popup(&mut self) {
        let selected = SelectedDay::new(self.cursor);
        let existing = self.store.state().annotation(selected.date).cloned();
        let palette = self.store.state().emoji_palette();
        let existing = existing.unwrap_or_default();
        let color_idx = existing
            .color
            .as_deref()
            .and_then(|c| PALETTE.iter().position(|p| *p == c))
            .unwrap_or(0);
        let emoji_idx = existing
            .emoji
            .as_deref()
            .and_then(|e| palette.iter().position(|p| p == e))
            .unwrap_or(0);
        self.status = format!("Editing {}", format_with_weekday(selected.date));
        self.mode = Mode::Day(DayPopup {
            selected,
            focus: PopupFocus::Colors,
            color_idx,
            emoji_idx,
            note: FieldValue::new(existing.note.as_deref().unwrap_or_default()),
        });
    }

    fn close_popup(&mut self, popup: &DayPopup) {
        self.store.set_note(popup.selected.date, &popup.note.value);
        self.after_change(format!("Saved {}", calendar::format_long(popup.selected.date)));
    }

    fn open_settings(&mut self) {
        let state = self.store.state();
        let theme_idx = THEMES.iter().position(|t| t.id == state.theme).unwrap_or(0);
        let year_idx = selectable_years(self.today)
            .iter()
            .position(|y| *y == state.year)
            .unwrap_or(0);
        self.mode = Mode::Settings(SettingsPanel {
            focus: SettingsFocus::Theme,
            theme_idx,
            year_idx,
            emojis: FieldValue::new(&state.emojis),
            import_path: FieldValue::new(""),
        });
        self.status = "Settings".into();
    }

    fn close_settings(&mut self, panel: &SettingsPanel) {
        self.store.set_emoji_palette(&panel.emojis.value);
        self.after_change("Settings saved");
    }

    fn apply_color(&mut self, popup: &DayPopup) {
        let Some(color) = PALETTE.get(popup.color_idx) else {
            return;
        };
        match self.store.set_color(popup.selected.date, color) {
            Ok(()) => self.after_change(format!(
                "Toggled {} on {}",
                color, popup.selected.date_key
            )),
            Err(err) => self.status = err.to_string(),
        }
    }

    fn apply_emoji(&mut self, popup: &DayPopup) {
        let palette = self.store.state().emoji_palette();
        let Some(emoji) = palette.get(popup.emoji_idx) else {
            return;
        };
        match self.store.set_emoji(popup.selected.date, emoji) {
            Ok(()) => self.after_change(format!(
                "Toggled {} on {}",
                emoji, popup.selected.date_key
            )),
            Err(err) => self.status = err.to_string(),
        }
    }

    fn shift_popup_choice(&self, popup: &mut DayPopup, delta: isize) {
        match popup.focus {
            PopupFocus::Colors => {
                popup.color_idx = wrap_index(popup.color_idx, delta, PALETTE.len());
            }
            PopupFocus::Emojis => {
                let len = self.store.state().emoji_palette().len();
                popup.emoji_idx = wrap_index(popup.emoji_idx, delta, len);
            }
            PopupFocus::Note => {}
        }
    }

    fn export_backup(&mut self) {
        let dir = env::current_dir().unwrap_or_default();
        let path = dir.join(self.store.export_file_name());
        match self.store.export_to(&path) {
            Ok(()) => self.status = format!("Exported backup to {}", path.display()),
            Err(err) => {
                tracing::error!(%err, "export failed");
                self.status = format!("Export failed: {}", err);
            }
        }
    }

    /// Returns true when settings should close.
    fn import_backup(&mut self, raw_path: &str) -> bool {
        if raw_path.is_empty() {
            self.status = "Type the path of a backup file first".into();
            return false;
        }
        match self.store.import_file(Path::new(raw_path)) {
            Ok(()) => {
                self.reset_cursor();
                self.after_change(RESTORED);
                true
            }
            Err(err) => {
                tracing::warn!(%err, path = raw_path, "import failed");
                self.status = IMPORT_FAILED.into();
                false
            }
        }
    }

    fn change_year(&mut self, year: i32) {
        if year == self.store.state().year {
            return;
        }
        match self.store.set_year(year) {
            Ok(()) => {
                self.reset_cursor();
                self.after_change(format!("Viewing {}", year));
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    /// Today when viewing the current year, otherwise January 1.
    fn reset_cursor(&mut self) {
        let year = self.store.state().year;
        self.cursor = if year == self.today.year() {
            self.today
        } else {
            calendar::first_of_year(year).unwrap_or(self.today)
        };
    }

    fn shift_cursor(&mut self, days: i64) {
        if let Some(next) = self.cursor.checked_add_signed(ChronoDuration::days(days)) {
            if next.year() == self.store.state().year {
                self.cursor = next;
            }
        }
    }

    fn after_change(&mut self, message: impl Into<String>) {
        if self.store.save_failed() {
            self.status = "Could not save; changes are kept in memory only".into();
        } else {
            self.last_save = Instant::now();
            self.status = message.into();
        }
    }

    fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Min(10),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_progress(f, layout[1]);
        match self.view {
            ViewMode::Stream => self.draw_stream(f, layout[2]),
            ViewMode::Months => self.draw_months(f, layout[2]),
        }
        self.draw_footer(f, layout[3]);

        match &self.mode {
            Mode::Day(popup) => self.draw_popup(f, popup),
            Mode::Settings(panel) => self.draw_settings(f, panel),
            Mode::Normal => {}
        }
    }

    fn theme(&self) -> &'static Theme {
        self.store.state().theme()
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let state = self.store.state();
        let accent = hex_color(self.theme().colors[0]);
        let saved = if self.store.save_failed() {
            Span::styled("not saved", Style::default().fg(Color::LightRed))
        } else {
            Span::styled(
                format!("saved {}", format_elapsed(self.last_save)),
                Style::default().fg(Color::Gray),
            )
        };
        let title = Line::from(vec![
            Span::styled(
                "year-progress ",
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                state.year.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(self.theme().name, Style::default().fg(accent)),
            Span::raw("  •  "),
            Span::styled(
                format!("{}", self.store.location().path.display()),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            saved,
            Span::raw("  •  "),
            Span::styled(
                format!("view {}", self.view.label()),
                Style::default().fg(Color::Magenta),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_progress(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let summary = grid::progress(self.store.state().year, self.today);
        let gauge = Gauge::default()
            .gauge_style(
                Style::default()
                    .fg(hex_color(self.theme().colors[0]))
                    .bg(Color::Rgb(30, 30, 36)),
            )
            .ratio(summary.ratio().clamp(0.0, 1.0))
            .label(format!(
                "{}  ·  {}",
                summary.remaining_label(),
                summary.percentage_label()
            ));
        f.render_widget(gauge, area);
    }

    fn draw_stream(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let state = self.store.state();
        let cells = grid::compute_grid(state.year, &state.days, self.today);
        let weeks = cells.len().div_ceil(7);

        let accent = hex_color(self.theme().colors[0]);
        let mut labels = vec![Span::raw("    ")];
        let mut column = 0;
        for span in grid::month_spans(state.year) {
            let start = span.start_week as usize * 2;
            labels.push(Span::raw(" ".repeat(start.saturating_sub(column))));
            // never wider than the month's own columns
            let name = span
                .name
                .chars()
                .take(span.weeks as usize * 2)
                .collect::<String>();
            column = start.max(column) + name.chars().count();
            let style = if span.month == self.cursor.month() {
                Style::default().fg(accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            labels.push(Span::styled(name, style));
        }

        let mut lines = vec![Line::from(labels)];
        for (row, heading) in WEEKDAY_HEADINGS.iter().enumerate() {
            let mut spans = vec![Span::styled(
                format!("{}  ", heading),
                Style::default().fg(Color::DarkGray),
            )];
            for week in 0..weeks {
                spans.push(match cells.get(week * 7 + row) {
                    Some(cell) => self.cell_span(cell, 2),
                    None => Span::raw("  "),
                });
            }
            lines.push(Line::from(spans));
        }

        let block = Block::default()
            .title(Span::styled(
                format!("{} in dots", state.year),
                Style::default().fg(accent).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        f.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn draw_months(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let state = self.store.state();
        let blocks = grid::month_blocks(state.year, &state.days, self.today);
        let accent = hex_color(self.theme().colors[0]);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Ratio(1, 3); 3])
            .split(area);
        for (row_idx, row_area) in rows.iter().enumerate() {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Ratio(1, 4); 4])
                .split(*row_area);
            for (col_idx, col_area) in columns.iter().enumerate() {
                let Some(month) = blocks.get(row_idx * 4 + col_idx) else {
                    continue;
                };
                let heading = WEEKDAY_HEADINGS
                    .iter()
                    .map(|h| format!("{} ", h))
                    .collect::<String>();
                let mut lines = vec![Line::from(Span::styled(
                    heading,
                    Style::default().fg(Color::DarkGray),
                ))];
                for week in month.weeks() {
                    lines.push(Line::from(
                        week.iter().map(|c| self.cell_span(c, 3)).collect::<Vec<_>>(),
                    ));
                }
                let focused = self.cursor.month() == month.month;
                let block = Block::default()
                    .title(Span::styled(
                        month.name,
                        Style::default()
                            .fg(if focused { accent } else { Color::Gray })
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(if focused {
                        accent
                    } else {
                        Color::DarkGray
                    }));
                f.render_widget(Paragraph::new(lines).block(block), *col_area);
            }
        }
    }

    fn cell_span(&self, cell: &Cell, width: usize) -> Span<'static> {
        match cell {
            Cell::Padding => Span::raw(" ".repeat(width)),
            Cell::Day(day) => day_span(day, self.theme(), day.date == self.cursor, width),
        }
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = Paragraph::new(self.detail_line())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray))
                    .title(calendar::format_long(self.cursor)),
            );
        f.render_widget(detail, bottom[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str, color: Color| Span::styled(k, Style::default().fg(color));
        let spans = match self.mode {
            Mode::Normal => vec![
                key("←↑↓→ / h j k l", Color::LightCyan),
                Span::raw(" move  "),
                key("Enter", Color::LightYellow),
                Span::raw(" mark day  "),
                key("t", Color::LightCyan),
                Span::raw(" today  "),
                key("[ ]", Color::LightCyan),
                Span::raw(" year  "),
                key("v", Color::LightMagenta),
                Span::raw(" layout  "),
                key("s", Color::LightGreen),
                Span::raw(" settings  "),
                key("q", Color::LightRed),
                Span::raw(" quit"),
            ],
            Mode::Day(_) => vec![
                key("Tab", Color::LightCyan),
                Span::raw(" focus  "),
                key("←→", Color::LightCyan),
                Span::raw(" choose  "),
                key("Enter/Space", Color::LightYellow),
                Span::raw(" toggle  "),
                key("1-8", Color::LightMagenta),
                Span::raw(" color  "),
                key("Esc", Color::LightRed),
                Span::raw(" close and save note"),
            ],
            Mode::Settings(_) => vec![
                key("Tab", Color::LightCyan),
                Span::raw(" focus  "),
                key("←→", Color::LightCyan),
                Span::raw(" choose  "),
                key("Enter", Color::LightYellow),
                Span::raw(" export/import  "),
                key("Esc", Color::LightRed),
                Span::raw(" close"),
            ],
        };
        Line::from(spans)
    }

    fn detail_line(&self) -> Line<'static> {
        let state = self.store.state();
        if let Some(hint) = grid::hint_text(&state.days, state.year, self.today) {
            return Line::from(Span::styled(
                hint,
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            ));
        }
        let cells = grid::compute_grid(state.year, &state.days, self.today);
        let Some(day) = cells
            .iter()
            .filter_map(Cell::day)
            .find(|d| d.date == self.cursor)
        else {
            return Line::from("");
        };
        let mut spans = vec![Span::styled(
            format!(
                "{} {}  day {} of {}",
                WEEKDAY_HEADINGS[day.weekday as usize],
                day.date_key,
                day.ordinal,
                days_in_year(state.year)
            ),
            Style::default().fg(Color::Gray),
        )];
        if let Some(annotation) = &day.annotation {
            if let Some(emoji) = &annotation.emoji {
                spans.push(Span::raw(format!("  {}", emoji)));
            }
            if let Some(color) = &annotation.color {
                spans.push(Span::raw("  "));
                spans.push(Span::styled("●", Style::default().fg(hex_color(color))));
            }
            if let Some(note) = &annotation.note {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(
                    note.replace('\n', " "),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
                ));
            }
        }
        Line::from(spans)
    }

    fn draw_popup(&self, f: &mut ratatui::Frame<'_>, popup: &DayPopup) {
        let area = centered_rect(60, 60, f.size());
        let accent = hex_color(self.theme().colors[0]);
        let current = self
            .store
            .state()
            .annotation(popup.selected.date)
            .cloned()
            .unwrap_or_default();

        let mut lines = vec![
            Line::from(vec![
                Span::styled(
                    format_with_weekday(popup.selected.date),
                    Style::default().fg(accent).add_modifier(Modifier::BOLD),
                ),
                Span::styled(
                    format!("  day {}", popup.selected.day_number),
                    Style::default().fg(Color::DarkGray),
                ),
            ]),
            Line::from(""),
            section_label("Color", popup.focus == PopupFocus::Colors),
        ];

        let mut swatches = Vec::new();
        for (idx, color) in PALETTE.iter().enumerate() {
            let chosen = current.color.as_deref() == Some(*color);
            let under_cursor = popup.focus == PopupFocus::Colors && idx == popup.color_idx;
            swatches.push(Span::raw(if under_cursor { "▸" } else { " " }));
            swatches.push(Span::styled(
                if chosen { "◉◉" } else { "██" },
                Style::default().fg(hex_color(color)),
            ));
            swatches.push(Span::styled(
                format!("{} ", idx + 1),
                Style::default().fg(Color::DarkGray),
            ));
        }
        lines.push(Line::from(swatches));
        lines.push(Line::from(""));
        lines.push(section_label("Emoji", popup.focus == PopupFocus::Emojis));

        let mut emojis = Vec::new();
        for (idx, emoji) in self.store.state().emoji_palette().into_iter().enumerate() {
            let chosen = current.emoji.as_deref() == Some(emoji.as_str());
            let under_cursor = popup.focus == PopupFocus::Emojis && idx == popup.emoji_idx;
            emojis.push(Span::raw(if under_cursor { "▸" } else { " " }));
            let style = if chosen {
                Style::default().bg(accent)
            } else {
                Style::default()
            };
            emojis.push(Span::styled(emoji, style));
        }
        lines.push(Line::from(emojis));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            section_label_span("Note", popup.focus == PopupFocus::Note),
            Span::styled(
                format!("  {} chars", popup.note.char_count()),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        let note_text = if popup.focus == PopupFocus::Note {
            popup.note.with_caret()
        } else {
            popup.note.value.clone()
        };
        for line in note_text.split('\n') {
            lines.push(Line::from(Span::styled(
                format!("  {}", line),
                Style::default().fg(Color::White),
            )));
        }

        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        "Mark day",
                        Style::default().fg(accent).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(accent)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_settings(&self, f: &mut ratatui::Frame<'_>, panel: &SettingsPanel) {
        let area = centered_rect(70, 60, f.size());
        let accent = hex_color(self.theme().colors[0]);
        let state = self.store.state();

        let mut lines = vec![section_label("Theme", panel.focus == SettingsFocus::Theme)];
        let mut themes = Vec::new();
        for theme in THEMES.iter() {
            let active = theme.id == state.theme;
            themes.push(Span::raw(if active { " ▸" } else { "  " }));
            for color in theme.colors {
                themes.push(Span::styled("●", Style::default().fg(hex_color(color))));
            }
            themes.push(Span::styled(
                format!(" {} ", theme.name),
                if active {
                    Style::default().fg(accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                },
            ));
        }
        lines.push(Line::from(themes));
        lines.push(Line::from(""));

        lines.push(section_label("Year", panel.focus == SettingsFocus::Year));
        let years = selectable_years(self.today)
            .iter()
            .map(|year| {
                let style = if *year == state.year {
                    Style::default().fg(accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Span::styled(format!("  {}  ", year), style)
            })
            .collect::<Vec<_>>();
        lines.push(Line::from(years));
        lines.push(Line::from(""));

        lines.extend(field_lines(
            "Emoji palette",
            &panel.emojis,
            panel.focus == SettingsFocus::Emojis,
        ));
        lines.push(Line::from(""));
        lines.push(section_label(
            "Export backup (Enter)",
            panel.focus == SettingsFocus::Export,
        ));
        lines.push(Line::from(Span::styled(
            format!("  writes {}", self.store.export_file_name()),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::from(""));
        lines.extend(field_lines(
            "Import backup from path (Enter)",
            &panel.import_path,
            panel.focus == SettingsFocus::Import,
        ));

        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        "Settings",
                        Style::default().fg(accent).add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(accent)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn day_span(day: &DayCell, theme: &Theme, under_cursor: bool, width: usize) -> Span<'static> {
    let annotation = day.annotation.as_ref();
    let text = match annotation.and_then(|a| a.emoji.as_deref()) {
        // emoji occupy two columns
        Some(emoji) => format!("{}{}", emoji, " ".repeat(width.saturating_sub(2))),
        None => {
            let glyph = if day.flags.today {
                '◉'
            } else if day.flags.past || annotation.is_some_and(|a| a.color.is_some()) {
                '●'
            } else {
                '○'
            };
            format!("{}{}", glyph, " ".repeat(width.saturating_sub(1)))
        }
    };

    let fg = match annotation.and_then(|a| a.color.as_deref()) {
        Some(color) => hex_color(color),
        None if day.flags.today => Color::White,
        None if day.flags.past => hex_color(theme.colors[0]),
        None => Color::DarkGray,
    };
    let mut style = Style::default().fg(fg);
    if day.flags.today {
        style = style.add_modifier(Modifier::BOLD);
    }
    if day.flags.weekend && !day.flags.past && annotation.is_none() {
        style = style.add_modifier(Modifier::DIM);
    }
    if annotation.is_some_and(|a| a.note.is_some()) {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    if under_cursor {
        style = style.bg(hex_color(theme.colors[2])).fg(Color::Black);
    }
    Span::styled(text, style)
}

fn section_label(label: &str, active: bool) -> Line<'static> {
    Line::from(section_label_span(label, active))
}

fn section_label_span(label: &str, active: bool) -> Span<'static> {
    Span::styled(
        format!("{}{}", if active { "▶ " } else { "  " }, label),
        Style::default()
            .fg(if active { Color::Cyan } else { Color::Gray })
            .add_modifier(Modifier::BOLD),
    )
}

fn field_lines(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    vec![
        section_label(label, active),
        Line::from(Span::styled(
            format!("  {}", text),
            Style::default().fg(if active { Color::White } else { Color::Gray }),
        )),
    ]
}

fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return Color::White;
    }
    match u32::from_str_radix(digits, 16) {
        Ok(rgb) => Color::Rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8),
        Err(_) => Color::White,
    }
}

fn wrap_index(idx: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (idx as isize + delta).rem_euclid(len as isize) as usize
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|g| cursor + g.len())
        .unwrap_or(text.len())
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
