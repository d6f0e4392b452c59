use crate::model::{overlay_defaults, ShapeError, YearProgressState};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Storage key of the snapshot; also the file stem on disk.
pub const STORAGE_KEY: &str = "yearProgress";
pub const EXPORT_MIME: &str = "application/json";
const LOG_FILE: &str = "year-progress.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateScope {
    Default,
    Custom,
}

#[derive(Debug, Clone)]
pub struct StateLocation {
    pub path: PathBuf,
    pub scope: StateScope,
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("reading {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("snapshot {path:?} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("writing {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("encoding snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ImportError {
    #[error("could not read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("backup is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("backup must be a JSON object")]
    NotAnObject,
    #[error("backup has an invalid shape: {0}")]
    InvalidShape(#[from] ShapeError),
}

impl StateLocation {
    pub fn custom(path: impl Into<PathBuf>) -> Self {
        StateLocation {
            path: path.into(),
            scope: StateScope::Custom,
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.path
            .parent()
            .map(|p| p.join(LOG_FILE))
            .unwrap_or_else(|| PathBuf::from(LOG_FILE))
    }
}

pub fn locate_state(custom: Option<PathBuf>) -> Result<StateLocation> {
    if let Some(path) = custom {
        return Ok(StateLocation::custom(path));
    }
    let dirs = ProjectDirs::from("", "", "year-progress").context("locating data directory")?;
    Ok(StateLocation {
        path: dirs.data_dir().join(format!("{}.json", STORAGE_KEY)),
        scope: StateScope::Default,
    })
}

/// Reads the persisted snapshot overlaid on the defaults. `Ok(None)` when
/// nothing has been saved yet.
pub fn try_load_state(
    location: &StateLocation,
    today: NaiveDate,
) -> Result<Option<YearProgressState>, StorageError> {
    if !location.path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(&location.path).map_err(|source| StorageError::Read {
        path: location.path.clone(),
        source,
    })?;
    let corrupt = |reason: String| StorageError::Corrupt {
        path: location.path.clone(),
        reason,
    };
    let value: Value = serde_json::from_str(&data).map_err(|e| corrupt(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| corrupt("not a JSON object".into()))?;
    let state = overlay_defaults(&YearProgressState::default_for(today), object, today)
        .map_err(|e| corrupt(e.to_string()))?;
    Ok(Some(state))
}

/// Never fails: a missing or unreadable snapshot yields the defaults.
pub fn load_state(location: &StateLocation, today: NaiveDate) -> YearProgressState {
    match try_load_state(location, today) {
        Ok(Some(state)) => {
            tracing::info!(
                path = %location.path.display(),
                days = state.days.len(),
                "loaded snapshot"
            );
            state
        }
        Ok(None) => {
            tracing::info!(path = %location.path.display(), "no snapshot yet, using defaults");
            YearProgressState::default_for(today)
        }
        Err(err) => {
            tracing::error!(%err, "failed to load state, using defaults");
            YearProgressState::default_for(today)
        }
    }
}

pub fn save_state(
    location: &StateLocation,
    state: &mut YearProgressState,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    state.last_updated = Some(now);
    let serialized = serde_json::to_string(state)?;
    write_file(&location.path, serialized.as_bytes())
}

pub fn export_snapshot(state: &YearProgressState) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec_pretty(state)?)
}

pub fn export_file_name(year: i32) -> String {
    format!("year-progress-backup-{}.json", year)
}

pub fn write_export(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    write_file(path, bytes)
}

/// Accepts any JSON object; everything else is rejected before the state
/// is touched.
pub fn parse_snapshot(bytes: &[u8]) -> Result<Map<String, Value>, ImportError> {
    let value: Value = serde_json::from_slice(bytes).map_err(ImportError::Parse)?;
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(ImportError::NotAnObject),
    }
}

pub fn read_import_file(path: &Path) -> Result<Vec<u8>, ImportError> {
    fs::read(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let write_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, bytes).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn missing_snapshot_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let location = StateLocation::custom(dir.path().join("yearProgress.json"));
        assert!(try_load_state(&location, today()).unwrap().is_none());
        assert_eq!(
            load_state(&location, today()),
            YearProgressState::default_for(today())
        );
    }

    #[test]
    fn save_then_load_round_trips_and_stamps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let location = StateLocation::custom(dir.path().join("nested/yearProgress.json"));
        let mut state = YearProgressState::default_for(today());
        state
            .toggle_color(today(), "#FFE066")
            .expect("palette color");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        save_state(&location, &mut state, now).unwrap();
        assert_eq!(state.last_updated, Some(now));

        let loaded = load_state(&location, today());
        assert_eq!(loaded, state);
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let location = StateLocation::custom(dir.path().join("yearProgress.json"));
        fs::write(&location.path, "{ not json").unwrap();
        assert!(matches!(
            try_load_state(&location, today()),
            Err(StorageError::Corrupt { .. })
        ));
        assert_eq!(
            load_state(&location, today()),
            YearProgressState::default_for(today())
        );
    }

    #[test]
    fn partial_snapshot_is_overlaid_on_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let location = StateLocation::custom(dir.path().join("yearProgress.json"));
        fs::write(
            &location.path,
            r#"{"year":0,"theme":"lavender","days":{"2025-01-02":{"note":"hi"}}}"#,
        )
        .unwrap();
        let state = load_state(&location, today());
        assert_eq!(state.year, 2025);
        assert_eq!(state.theme, "lavender");
        assert_eq!(state.days["2025-01-02"].note.as_deref(), Some("hi"));
        assert_eq!(state.emojis, crate::model::DEFAULT_EMOJIS);
    }

    #[test]
    fn reads_snapshots_written_by_the_browser() {
        let dir = tempfile::tempdir().expect("tempdir");
        let location = StateLocation::custom(dir.path().join("yearProgress.json"));
        fs::write(
            &location.path,
            r#"{"year":2024,"days":{},"theme":"sakura","emojis":"❤️😊","lastUpdated":"2024-12-31T23:59:59.123Z"}"#,
        )
        .unwrap();
        let state = try_load_state(&location, today()).unwrap().unwrap();
        assert_eq!(state.year, 2024);
        assert!(state.last_updated.is_some());
    }

    #[test]
    fn save_reports_unwritable_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let location = StateLocation::custom(blocker.join("yearProgress.json"));
        let mut state = YearProgressState::default_for(today());
        assert!(matches!(
            save_state(&location, &mut state, Utc::now()),
            Err(StorageError::Write { .. })
        ));
    }

    #[test]
    fn export_is_pretty_json_with_backup_name() {
        let state = YearProgressState::default_for(today());
        let bytes = export_snapshot(&state).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\n  \"year\": 2025"));
        assert_eq!(export_file_name(2025), "year-progress-backup-2025.json");
    }

    #[test]
    fn parse_snapshot_accepts_only_objects() {
        assert!(matches!(
            parse_snapshot(b"not json"),
            Err(ImportError::Parse(_))
        ));
        assert!(matches!(parse_snapshot(b"[]"), Err(ImportError::NotAnObject)));
        assert!(matches!(parse_snapshot(b"42"), Err(ImportError::NotAnObject)));
        assert!(parse_snapshot(b"{}").unwrap().is_empty());
    }

    #[test]
    fn log_file_sits_next_to_snapshot() {
        let location = StateLocation::custom("/tmp/yp/yearProgress.json");
        assert_eq!(location.log_path(), PathBuf::from("/tmp/yp/year-progress.log"));
    }
}
