//! Key-value persistence for the session, best score and preferences.
//!
//! The three records live under independent keys so that starting a new
//! game never touches the best score, and applying preferences never
//! touches the board.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::grid::{Grid, GridSize};
use crate::prefs::Preferences;
use crate::validate::{parse_saved_session, SavedSession};

/// Key of the session record: `{grid, score, size}`.
pub const SESSION_KEY: &str = "p2048_state_v6";
/// Key of the best score, stored as a decimal string.
pub const BEST_KEY: &str = "p2048_best_v6";
/// Key of the preferences record: `{size, theme, sound}`.
pub const PREFS_KEY: &str = "p2048_prefs_v6";

/// A string-to-string store such as browser `localStorage` or a JSON file.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Volatile store, used by tests and headless embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

/// Parse a best score the lenient way: leading whitespace is skipped, the
/// leading run of digits is used, and anything unreadable counts as 0.
/// A digit run too long for a `u64` saturates.
pub fn parse_best(raw: &str) -> u64 {
    let trimmed = raw.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    match digits[..end].parse() {
        Ok(best) => best,
        Err(_) if end > 0 => u64::MAX,
        Err(_) => 0,
    }
}

/// Typed access to the three records over any [`KeyValueStore`].
#[derive(Debug)]
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// The saved session, or `None` when absent, unreadable or invalid.
    pub fn load_session(&self, configured: GridSize) -> Option<SavedSession> {
        let raw = match self.store.get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(%err, "could not read saved session");
                return None;
            }
        };
        match parse_saved_session(&raw, configured) {
            Ok(saved) => Some(saved),
            Err(reason) => {
                debug!(%reason, "discarding saved session");
                None
            }
        }
    }

    pub fn save_session(&mut self, grid: &Grid, score: u64) -> Result<(), StoreError> {
        let record = serde_json::json!({
            "grid": grid.rows(),
            "score": score,
            "size": grid.size().get(),
        });
        self.store.set(SESSION_KEY, &record.to_string())
    }

    pub fn load_best(&self) -> u64 {
        match self.store.get(BEST_KEY) {
            Ok(raw) => raw.as_deref().map_or(0, parse_best),
            Err(err) => {
                warn!(%err, "could not read best score");
                0
            }
        }
    }

    pub fn save_best(&mut self, best: u64) -> Result<(), StoreError> {
        self.store.set(BEST_KEY, &best.to_string())
    }

    pub fn load_preferences(&self) -> Preferences {
        match self.store.get(PREFS_KEY) {
            Ok(Some(raw)) => Preferences::parse(&raw),
            Ok(None) => Preferences::default(),
            Err(err) => {
                warn!(%err, "could not read preferences");
                Preferences::default()
            }
        }
    }

    pub fn save_preferences(&mut self, prefs: &Preferences) -> Result<(), StoreError> {
        self.store.set(PREFS_KEY, &prefs.to_json())
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::Theme;

    #[test]
    fn test_parse_best() {
        assert_eq!(parse_best("2048"), 2048);
        assert_eq!(parse_best("  17abc"), 17);
        assert_eq!(parse_best("+8"), 8);
        assert_eq!(parse_best("-5"), 0);
        assert_eq!(parse_best(""), 0);
        assert_eq!(parse_best("NaN"), 0);
        assert_eq!(parse_best("99999999999999999999999"), u64::MAX);
        assert_eq!(parse_best("000000000000000000000042"), 42);
    }

    #[test]
    fn test_session_record_shape() {
        let mut p = Persistence::new(MemoryStore::new());
        let grid = Grid::from_rows(vec![vec![2, 0], vec![0, 4]]).unwrap();
        p.save_session(&grid, 36).unwrap();

        let raw = p.store().get(SESSION_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["size"], 2);
        assert_eq!(value["score"], 36);
        assert_eq!(value["grid"][1][1], 4);

        let saved = p.load_session(GridSize::default()).unwrap();
        assert_eq!(saved.grid, grid);
        assert_eq!(saved.score, 36);
    }

    #[test]
    fn test_invalid_session_reads_as_absent() {
        let mut store = MemoryStore::new();
        store
            .set(SESSION_KEY, r#"{"grid":[[0]],"score":0,"size":4}"#)
            .unwrap();
        let p = Persistence::new(store);
        assert_eq!(p.load_session(GridSize::default()), None);
    }

    #[test]
    fn test_best_is_independent_of_session() {
        let mut p = Persistence::new(MemoryStore::new());
        assert_eq!(p.load_best(), 0);
        p.save_best(512).unwrap();
        p.save_session(&Grid::empty(GridSize::default()), 0).unwrap();
        assert_eq!(p.store().len(), 2);
        assert_eq!(p.load_best(), 512);
    }

    #[test]
    fn test_preferences_round_trip() {
        let mut p = Persistence::new(MemoryStore::new());
        assert_eq!(p.load_preferences(), Preferences::default());
        let prefs = Preferences {
            size: GridSize::new(5).unwrap(),
            theme: Theme::Dark,
            sound: false,
        };
        p.save_preferences(&prefs).unwrap();
        assert_eq!(p.load_preferences(), prefs);
    }

    #[test]
    fn test_clear_removes_everything() {
        let mut p = Persistence::new(MemoryStore::new());
        p.save_best(4).unwrap();
        p.save_preferences(&Preferences::default()).unwrap();
        p.clear().unwrap();
        assert!(p.store().is_empty());
    }
}
