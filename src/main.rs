mod calendar;
mod cli;
mod commands;
mod grid;
mod model;
mod storage;
mod store;
mod ui;

use anyhow::Result;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui);
    let location = storage::locate_state(args.file)?;
    init_logging(&location, matches!(command, cli::Command::Tui));

    match command {
        cli::Command::Tui => commands::tui(location),
        cli::Command::Show { year, layout } => commands::show(location, year, layout),
        cli::Command::Progress => commands::progress(location),
        cli::Command::Mark {
            date,
            color,
            emoji,
            note,
        } => commands::mark(location, date, color, emoji, note),
        cli::Command::Day { date } => commands::day(location, date),
        cli::Command::Year { year } => commands::year(location, year),
        cli::Command::Theme { id } => commands::theme(location, id),
        cli::Command::Emojis { emojis } => commands::emojis(location, emojis),
        cli::Command::Export { out } => commands::export(location, out),
        cli::Command::Import { path } => commands::import(location, path),
    }
}

/// The TUI owns the terminal, so it logs to a file beside the snapshot.
/// One-shot commands log warnings to stderr.
fn init_logging(location: &storage::StateLocation, interactive: bool) {
    if !interactive {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("year_progress=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    }

    let log_path = location.log_path();
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        return;
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("year_progress=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}
