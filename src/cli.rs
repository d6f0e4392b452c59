use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "year-progress",
    version,
    about = "Your year as a grid of dots, one per day"
)]
pub struct Cli {
    /// Snapshot file to use instead of the default data directory
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Layout {
    /// One continuous stream of Monday-first weeks
    Continuous,
    /// Twelve month blocks with their own weekday headers
    Monthly,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch the interactive grid
    Tui,
    /// Print the year grid
    Show {
        /// Year to show (defaults to the selected year)
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_enum, default_value_t = Layout::Continuous)]
        layout: Layout,
    },
    /// Print how much of the selected year has gone by
    Progress,
    /// Mark a day; giving the current color or emoji again clears it
    Mark {
        /// Day in YYYY-MM-DD format
        date: String,
        /// Palette color, e.g. "#FFB7C5"
        #[arg(long)]
        color: Option<String>,
        /// A single emoji
        #[arg(long)]
        emoji: Option<String>,
        /// Note text; an empty string removes the note
        #[arg(long)]
        note: Option<String>,
    },
    /// Show one day's color, emoji and note
    Day {
        /// Day in YYYY-MM-DD format
        date: String,
    },
    /// Select the year to view
    Year { year: i32 },
    /// Switch color theme (sakura, mint, lavender, honey)
    Theme { id: String },
    /// Replace the emoji palette, e.g. "❤️😊⭐"
    Emojis { emojis: String },
    /// Write a JSON backup
    Export {
        /// Output path (defaults to year-progress-backup-<year>.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Restore from a JSON backup
    Import { path: PathBuf },
}
