use crate::model::{overlay_defaults, StateError, YearProgressState};
use crate::storage::{
    export_file_name, export_snapshot, load_state, parse_snapshot, read_import_file, save_state,
    write_export, ImportError, StateLocation, StorageError,
};
use chrono::{Datelike, Local, NaiveDate, Utc};
use std::path::Path;

/// Owns the single live `YearProgressState` and where it is persisted.
/// Every intent mutates the state, then saves; saving is best-effort.
#[derive(Debug)]
pub struct AnnotationStore {
    state: YearProgressState,
    location: StateLocation,
    save_failed: bool,
}

impl AnnotationStore {
    pub fn open(location: StateLocation) -> Self {
        let state = load_state(&location, today());
        AnnotationStore {
            state,
            location,
            save_failed: false,
        }
    }

    pub fn state(&self) -> &YearProgressState {
        &self.state
    }

    pub fn location(&self) -> &StateLocation {
        &self.location
    }

    /// Whether the most recent save attempt failed.
    pub fn save_failed(&self) -> bool {
        self.save_failed
    }

    /// Persists now. Errors are logged and reported as `false`.
    pub fn save(&mut self) -> bool {
        self.save_failed = match self.try_save() {
            Ok(()) => false,
            Err(err) => {
                tracing::error!(%err, "failed to save state");
                true
            }
        };
        !self.save_failed
    }

    pub fn try_save(&mut self) -> Result<(), StorageError> {
        save_state(&self.location, &mut self.state, Utc::now())?;
        tracing::debug!(path = %self.location.path.display(), "saved state");
        Ok(())
    }

    pub fn set_color(&mut self, date: NaiveDate, color: &str) -> Result<(), StateError> {
        self.state.toggle_color(date, color)?;
        self.save();
        Ok(())
    }

    pub fn set_emoji(&mut self, date: NaiveDate, emoji: &str) -> Result<(), StateError> {
        self.state.toggle_emoji(date, emoji)?;
        self.save();
        Ok(())
    }

    pub fn set_note(&mut self, date: NaiveDate, text: &str) {
        self.state.set_note(date, text);
        self.save();
    }

    pub fn set_year(&mut self, year: i32) -> Result<(), StateError> {
        self.state.set_year(year)?;
        self.save();
        Ok(())
    }

    pub fn set_theme(&mut self, id: &str) -> bool {
        if !self.state.set_theme(id) {
            tracing::warn!(theme = id, "ignoring unknown theme");
            return false;
        }
        self.save();
        true
    }

    pub fn set_emoji_palette(&mut self, raw: &str) {
        self.state.set_emoji_palette(raw);
        self.save();
    }

    pub fn export_snapshot(&self) -> Result<Vec<u8>, StorageError> {
        export_snapshot(&self.state)
    }

    pub fn export_file_name(&self) -> String {
        export_file_name(self.state.year)
    }

    pub fn export_to(&self, path: &Path) -> Result<(), StorageError> {
        write_export(path, &self.export_snapshot()?)?;
        tracing::info!(path = %path.display(), "exported snapshot");
        Ok(())
    }

    /// Replaces the state with the imported object overlaid on it. The view
    /// always returns to the current year, whatever `year` the backup holds.
    /// On error nothing changes.
    pub fn import_snapshot(&mut self, bytes: &[u8]) -> Result<(), ImportError> {
        let mut object = parse_snapshot(bytes)?;
        object.remove("year");
        let today = today();
        let mut merged = overlay_defaults(&self.state, &object, today)?;
        merged.year = today.year();
        self.state = merged;
        tracing::info!(days = self.state.days.len(), "imported snapshot");
        self.save();
        Ok(())
    }

    pub fn import_file(&mut self, path: &Path) -> Result<(), ImportError> {
        let bytes = read_import_file(path)?;
        self.import_snapshot(&bytes)
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::try_load_state;
    use std::fs;

    fn store_in(dir: &tempfile::TempDir) -> AnnotationStore {
        AnnotationStore::open(StateLocation::custom(dir.path().join("yearProgress.json")))
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn intents_are_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        let day = ymd(2025, 3, 4);
        store.set_color(day, "#FFB7C5").unwrap();
        store.set_emoji(day, "🎉").unwrap();
        store.set_note(day, " party ");

        let reopened = store_in(&dir);
        let entry = reopened.state().annotation(day).unwrap();
        assert_eq!(entry.color.as_deref(), Some("#FFB7C5"));
        assert_eq!(entry.emoji.as_deref(), Some("🎉"));
        assert_eq!(entry.note.as_deref(), Some("party"));
        assert!(reopened.state().last_updated.is_some());
    }

    #[test]
    fn color_toggle_removes_persisted_day() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        let day = ymd(2025, 3, 4);
        store.set_color(day, "#FFB7C5").unwrap();
        store.set_color(day, "#FFB7C5").unwrap();
        assert!(store_in(&dir).state().days.is_empty());
    }

    #[test]
    fn unknown_theme_is_not_saved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        assert!(!store.set_theme("neon"));
        assert!(!store.location().path.exists());
        assert!(store.set_theme("honey"));
        assert_eq!(store_in(&dir).state().theme, "honey");
    }

    #[test]
    fn independent_stores_do_not_share_state() {
        let a_dir = tempfile::tempdir().expect("tempdir");
        let b_dir = tempfile::tempdir().expect("tempdir");
        let mut a = store_in(&a_dir);
        let b = store_in(&b_dir);
        a.set_note(ymd(2025, 1, 1), "only in a");
        assert_eq!(a.state().days.len(), 1);
        assert!(b.state().days.is_empty());
    }

    #[test]
    fn rejected_imports_leave_state_alone() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.set_note(ymd(2024, 7, 7), "keep me");
        store.set_year(2024).unwrap();
        let before = store.state().clone();

        assert!(matches!(
            store.import_snapshot(b"not json"),
            Err(ImportError::Parse(_))
        ));
        assert!(matches!(
            store.import_snapshot(b"[]"),
            Err(ImportError::NotAnObject)
        ));
        assert!(matches!(
            store.import_snapshot(br#"{"days":{"2024-07-07":{"note":5}}}"#),
            Err(ImportError::InvalidShape(_))
        ));
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn import_resets_year_and_saves() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store
            .import_snapshot(
                r#"{"year":1999,"theme":"mint","days":{"1999-12-31":{"emoji":"✨"}}}"#
                    .as_bytes(),
            )
            .unwrap();
        let current = today().year();
        assert_eq!(store.state().year, current);
        assert_eq!(store.state().theme, "mint");
        let saved = try_load_state(store.location(), today()).unwrap().unwrap();
        assert_eq!(saved.year, current);
        assert_eq!(saved.days["1999-12-31"].emoji.as_deref(), Some("✨"));
    }

    #[test]
    fn imported_year_is_ignored_whatever_its_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        store.set_year(2020).unwrap();
        store
            .import_snapshot(br#"{"year":"2024","theme":"mint"}"#)
            .unwrap();
        assert_eq!(store.state().year, today().year());
        assert_eq!(store.state().theme, "mint");
        store.import_snapshot(br#"{"year":12345}"#).unwrap();
        store.import_snapshot(br#"{"year":2024.0}"#).unwrap();
        assert_eq!(store.state().year, today().year());
    }

    #[test]
    fn export_then_import_into_fresh_store() {
        let src_dir = tempfile::tempdir().expect("tempdir");
        let dst_dir = tempfile::tempdir().expect("tempdir");
        let mut source = store_in(&src_dir);
        source.set_emoji_palette("🌸🌙");
        source.set_color(ymd(2025, 2, 14), "#FF9AA2").unwrap();
        let backup = src_dir.path().join(source.export_file_name());
        source.export_to(&backup).unwrap();
        assert!(fs::read_to_string(&backup).unwrap().starts_with("{\n"));

        let mut target = store_in(&dst_dir);
        target.import_file(&backup).unwrap();
        assert_eq!(target.state().days, source.state().days);
        assert_eq!(target.state().emojis, "🌸🌙");
    }

    #[test]
    fn missing_import_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(&dir);
        assert!(matches!(
            store.import_file(&dir.path().join("nope.json")),
            Err(ImportError::Read { .. })
        ));
    }

    #[test]
    fn failed_save_does_not_interrupt_intents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let mut store =
            AnnotationStore::open(StateLocation::custom(blocker.join("yearProgress.json")));
        store.set_note(ymd(2025, 1, 1), "still here");
        assert_eq!(store.state().days.len(), 1);
        assert!(store.save_failed());
        assert!(!store.save());
    }
}
