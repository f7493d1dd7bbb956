//! The game session: current board, score, best score and the one-step
//! undo slot, plus the persistence that follows every committed change.
//!
//! Moves, undos and restarts each run to completion before returning; the
//! session is driven by a single owner and never shared.

use tracing::{debug, info, warn};

use crate::error::NotifyError;
use crate::grid::{Grid, GridSize};
use crate::prefs::Preferences;
use crate::random::RandomSource;
use crate::snapshot::{RenderSnapshot, TerminalNotice};
use crate::store::{KeyValueStore, Persistence};
use crate::Direction;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created but [`Session::start`] not yet called.
    Uninitialized,
    Playing,
    GameOver,
}

/// Outcome of [`Session::apply_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveReport {
    /// The board would not change; nothing was recorded.
    Ignored,
    Moved { score_delta: u64, game_over: bool },
}

impl MoveReport {
    pub fn changed(&self) -> bool {
        matches!(self, MoveReport::Moved { .. })
    }
}

/// Side-channel events for audio and other fire-and-forget feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Merged { count: u32 },
    Moved { direction: Direction },
    GameOver { score: u64 },
}

/// Receiver of [`SessionEvent`]s. Errors are logged and dropped; they
/// never reach the player or alter the session.
pub trait Notifier {
    fn notify(&mut self, event: &SessionEvent) -> Result<(), NotifyError>;
}

/// Notifier that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Notifier for Silent {
    fn notify(&mut self, _event: &SessionEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct UndoSnapshot {
    grid: Grid,
    score: u64,
}

pub struct Session<S, R, N = Silent> {
    persistence: Persistence<S>,
    rng: R,
    notifier: N,
    size: GridSize,
    grid: Grid,
    score: u64,
    best: u64,
    undo: Option<UndoSnapshot>,
    phase: Phase,
}

impl<S: KeyValueStore, R: RandomSource> Session<S, R, Silent> {
    /// A session that will play on `size` boards. Call [`Session::start`]
    /// before moving.
    pub fn new(store: S, rng: R, size: GridSize) -> Self {
        Self {
            persistence: Persistence::new(store),
            rng,
            notifier: Silent,
            size,
            grid: Grid::empty(size),
            score: 0,
            best: 0,
            undo: None,
            phase: Phase::Uninitialized,
        }
    }

    /// Like [`Session::new`], with the board size taken from the stored
    /// preferences.
    pub fn open(store: S, rng: R) -> Self {
        let persistence = Persistence::new(store);
        let size = persistence.load_preferences().size;
        Self::new(persistence.into_inner(), rng, size)
    }
}

impl<S: KeyValueStore, R: RandomSource, N: Notifier> Session<S, R, N> {
    /// Replace the notifier, keeping all state.
    pub fn with_notifier<M: Notifier>(self, notifier: M) -> Session<S, R, M> {
        Session {
            persistence: self.persistence,
            rng: self.rng,
            notifier,
            size: self.size,
            grid: self.grid,
            score: self.score,
            best: self.best,
            undo: self.undo,
            phase: self.phase,
        }
    }

    // -------------------------------------------------------------------------
    // Player actions
    // -------------------------------------------------------------------------

    /// Resume the saved game, or start a new one.
    ///
    /// With `new_game == false` a valid saved session is restored; an absent
    /// or invalid one silently falls through to a fresh board with two tiles.
    pub fn start(&mut self, new_game: bool) {
        self.undo = None;

        if !new_game {
            if let Some(saved) = self.persistence.load_session(self.size) {
                self.size = saved.grid.size();
                self.grid = saved.grid;
                self.score = saved.score;
                self.best = self.persistence.load_best().max(self.score);
                self.phase = Phase::Playing;
                info!(size = %self.size, score = self.score, "restored saved game");
                return;
            }
        }

        let mut grid = Grid::empty(self.size);
        grid.add_random_tile(&mut self.rng);
        grid.add_random_tile(&mut self.rng);
        self.grid = grid;
        self.score = 0;
        self.best = self.persistence.load_best();
        self.phase = Phase::Playing;
        self.persist();
        info!(size = %self.size, "started new game");
    }

    /// Slide the board. A move that changes nothing is ignored entirely.
    pub fn apply_move(&mut self, direction: Direction) -> MoveReport {
        if self.phase == Phase::Uninitialized {
            return MoveReport::Ignored;
        }

        let shift = self.grid.shift(direction, self.score);
        if !shift.changed {
            return MoveReport::Ignored;
        }

        let previous = UndoSnapshot {
            grid: std::mem::replace(&mut self.grid, shift.grid),
            score: self.score,
        };
        self.score = shift.score;
        self.grid.add_random_tile(&mut self.rng);
        self.best = self.best.max(self.score);
        self.persist();
        self.undo = Some(previous);

        if shift.merges > 0 {
            self.emit(SessionEvent::Merged {
                count: shift.merges,
            });
        }
        self.emit(SessionEvent::Moved { direction });

        let game_over = !self.grid.can_move();
        if game_over {
            self.phase = Phase::GameOver;
            info!(score = self.score, max_tile = self.grid.max_tile(), "game over");
            self.emit(SessionEvent::GameOver { score: self.score });
        }

        MoveReport::Moved {
            score_delta: shift.score_delta,
            game_over,
        }
    }

    /// Step back to the board before the last move. Returns `false` (and
    /// does nothing) when there is no move to undo.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.undo.take() else {
            return false;
        };
        self.grid = snapshot.grid;
        self.score = snapshot.score;
        if let Err(err) = self.persistence.save_session(&self.grid, self.score) {
            warn!(%err, "could not save session after undo");
        }
        self.phase = Phase::Playing;
        true
    }

    /// Switch board size. Always starts a new game.
    pub fn change_size(&mut self, n: usize) {
        self.size = GridSize::clamped(n);
        self.start(true);
    }

    /// Store `prefs` and start a new game at the preferred size.
    pub fn apply_preferences(&mut self, prefs: &Preferences) {
        if let Err(err) = self.persistence.save_preferences(prefs) {
            warn!(%err, "could not save preferences");
        }
        self.change_size(prefs.size.get());
    }

    /// Forget every stored record, including the best score and
    /// preferences, and start over on a default board.
    pub fn hard_reset(&mut self) {
        if let Err(err) = self.persistence.clear() {
            warn!(%err, "could not clear storage");
        }
        self.size = Preferences::default().size;
        self.start(true);
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    pub fn snapshot(&self) -> RenderSnapshot {
        RenderSnapshot {
            size: self.size.get(),
            rows: self.grid.rows(),
            score: self.score,
            best: self.best,
            can_undo: self.can_undo(),
            terminal: (self.phase == Phase::GameOver).then(TerminalNotice::game_over),
        }
    }

    pub fn preferences(&self) -> Preferences {
        self.persistence.load_preferences()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn best(&self) -> u64 {
        self.best
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn can_undo(&self) -> bool {
        self.undo.is_some()
    }

    pub fn store(&self) -> &S {
        self.persistence.store()
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    // -------------------------------------------------------------------------
    // Private methods
    // -------------------------------------------------------------------------

    fn persist(&mut self) {
        if let Err(err) = self.persistence.save_session(&self.grid, self.score) {
            warn!(%err, "could not save session");
        }
        if let Err(err) = self.persistence.save_best(self.best) {
            warn!(%err, "could not save best score");
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        if let Err(err) = self.notifier.notify(&event) {
            debug!(%err, ?event, "notifier failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use crate::store::{MemoryStore, BEST_KEY, PREFS_KEY, SESSION_KEY};
    use crate::Theme;
    use std::collections::VecDeque;

    /// Always picks the first empty cell and spawns 2s unless told otherwise.
    #[derive(Default)]
    struct Scripted {
        fours: VecDeque<bool>,
    }

    impl RandomSource for Scripted {
        fn pick_index(&mut self, _len: usize) -> usize {
            0
        }

        fn four_tile(&mut self) -> bool {
            self.fours.pop_front().unwrap_or(false)
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<SessionEvent>,
    }

    impl Notifier for Recorder {
        fn notify(&mut self, event: &SessionEvent) -> Result<(), NotifyError> {
            self.events.push(*event);
            Ok(())
        }
    }

    struct Broken;

    impl Notifier for Broken {
        fn notify(&mut self, _event: &SessionEvent) -> Result<(), NotifyError> {
            Err(NotifyError("audio device missing".into()))
        }
    }

    fn saved_store(record: &str, best: Option<&str>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(SESSION_KEY, record).unwrap();
        if let Some(best) = best {
            store.set(BEST_KEY, best).unwrap();
        }
        store
    }

    fn resumed(record: &str) -> Session<MemoryStore, Scripted> {
        let mut session = Session::new(
            saved_store(record, None),
            Scripted::default(),
            GridSize::default(),
        );
        session.start(false);
        session
    }

    // -------------------------------------------------------------------------
    // start
    // -------------------------------------------------------------------------

    #[test]
    fn test_new_game_has_two_tiles() {
        let mut session = Session::new(MemoryStore::new(), SeededRandom::new(42), GridSize::default());
        assert_eq!(session.phase(), Phase::Uninitialized);
        session.start(true);

        assert_eq!(session.phase(), Phase::Playing);
        assert_eq!(session.grid().empty_count(), 14);
        assert_eq!(session.score(), 0);
        assert!(!session.can_undo());
        assert!(session.store().get(SESSION_KEY).unwrap().is_some());
        assert_eq!(session.store().get(BEST_KEY).unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn test_start_restores_valid_state() {
        let session = resumed(r#"{"grid":[[2,0,0],[0,4,0],[0,0,8]],"score":20,"size":3}"#);
        assert_eq!(session.size().get(), 3);
        assert_eq!(session.score(), 20);
        assert_eq!(session.best(), 20);
        assert_eq!(session.grid().get(2, 2), Some(8));
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn test_restored_max_score_survives_merge() {
        let mut session = resumed(r#"{"grid":[[2,2],[0,0]],"score":18446744073709551615,"size":2}"#);
        assert_eq!(session.score(), u64::MAX);

        let report = session.apply_move(Direction::Left);
        assert_eq!(
            report,
            MoveReport::Moved {
                score_delta: 4,
                game_over: false
            }
        );
        assert_eq!(session.score(), u64::MAX);
        assert_eq!(session.best(), u64::MAX);
        assert_eq!(session.grid().get(0, 0), Some(4));
    }

    #[test]
    fn test_start_rejects_mismatched_rows() {
        let session = resumed(r#"{"grid":[[2,0,0,0],[0,0,0,0]],"score":64,"size":4}"#);
        assert_eq!(session.size().get(), 4);
        assert_eq!(session.score(), 0);
        assert_eq!(session.grid().empty_count(), 14);
    }

    #[test]
    fn test_start_new_game_ignores_saved_state() {
        let mut session = Session::new(
            saved_store(r#"{"grid":[[2,2],[0,0]],"score":8,"size":2}"#, Some("100")),
            Scripted::default(),
            GridSize::default(),
        );
        session.start(true);
        assert_eq!(session.size().get(), 4);
        assert_eq!(session.score(), 0);
        assert_eq!(session.best(), 100);
    }

    #[test]
    fn test_open_uses_stored_size() {
        let mut store = MemoryStore::new();
        store
            .set(PREFS_KEY, r#"{"size":6,"theme":"dark","sound":false}"#)
            .unwrap();
        let mut session = Session::open(store, Scripted::default());
        session.start(false);
        assert_eq!(session.size().get(), 6);
        assert_eq!(session.preferences().theme, Theme::Dark);
    }

    // -------------------------------------------------------------------------
    // apply_move
    // -------------------------------------------------------------------------

    #[test]
    fn test_move_before_start_is_ignored() {
        let mut session = Session::new(MemoryStore::new(), Scripted::default(), GridSize::default());
        assert_eq!(session.apply_move(Direction::Left), MoveReport::Ignored);
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_noop_move_records_nothing() {
        let mut session = resumed(r#"{"grid":[[2,0],[4,0]],"score":0,"size":2}"#);
        let before = session.store().clone();

        assert_eq!(session.apply_move(Direction::Left), MoveReport::Ignored);
        assert_eq!(session.store(), &before);
        assert!(!session.can_undo());
    }

    #[test]
    fn test_move_commits_score_tile_and_undo() {
        let mut session = resumed(r#"{"grid":[[2,2,0],[0,0,0],[0,0,4]],"score":10,"size":3}"#);
        let report = session.apply_move(Direction::Left);

        assert_eq!(
            report,
            MoveReport::Moved {
                score_delta: 4,
                game_over: false
            }
        );
        assert_eq!(session.score(), 14);
        assert_eq!(session.best(), 14);
        // merged tile plus the spawned 2 in the first empty cell
        assert_eq!(
            session.grid().rows(),
            vec![vec![4, 2, 0], vec![0, 0, 0], vec![4, 0, 0]]
        );
        assert!(session.can_undo());

        let stored = session.store().get(SESSION_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(value["score"], 14);
        assert_eq!(value["grid"][0][1], 2);
        assert_eq!(session.store().get(BEST_KEY).unwrap().as_deref(), Some("14"));
    }

    #[test]
    fn test_move_into_stuck_board_ends_game() {
        let mut session = resumed(r#"{"grid":[[4,4],[2,8]],"score":0,"size":2}"#)
            .with_notifier(Recorder::default());
        let report = session.apply_move(Direction::Left);

        assert_eq!(
            report,
            MoveReport::Moved {
                score_delta: 8,
                game_over: true
            }
        );
        assert_eq!(session.grid().rows(), vec![vec![8, 2], vec![2, 8]]);
        assert_eq!(session.phase(), Phase::GameOver);

        let snap = session.snapshot();
        assert_eq!(snap.terminal, Some(TerminalNotice::game_over()));
        assert_eq!(
            session.notifier().events,
            vec![
                SessionEvent::Merged { count: 1 },
                SessionEvent::Moved {
                    direction: Direction::Left
                },
                SessionEvent::GameOver { score: 8 },
            ]
        );
    }

    #[test]
    fn test_failing_notifier_does_not_block_move() {
        let mut session = resumed(r#"{"grid":[[2,2],[0,0]],"score":0,"size":2}"#).with_notifier(Broken);
        assert!(session.apply_move(Direction::Left).changed());
        assert_eq!(session.score(), 4);
        assert!(session.can_undo());
    }

    // -------------------------------------------------------------------------
    // undo
    // -------------------------------------------------------------------------

    #[test]
    fn test_undo_restores_pre_move_state_once() {
        let mut session = resumed(r#"{"grid":[[2,2,0],[0,0,0],[0,0,4]],"score":10,"size":3}"#);
        let grid_before = session.grid().clone();

        session.apply_move(Direction::Left);
        assert!(session.undo());
        assert_eq!(session.grid(), &grid_before);
        assert_eq!(session.score(), 10);
        // best stays at the high-water mark
        assert_eq!(session.best(), 14);

        let stored = session.store().get(SESSION_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(value["score"], 10);

        let again = session.snapshot();
        assert!(!session.undo());
        assert_eq!(session.snapshot(), again);
    }

    #[test]
    fn test_undo_keeps_only_latest_move() {
        let mut session = resumed(r#"{"grid":[[2,2,0],[0,0,0],[0,0,0]],"score":0,"size":3}"#);
        session.apply_move(Direction::Left);
        let after_first = session.grid().clone();
        let score_after_first = session.score();
        session.apply_move(Direction::Down);

        assert!(session.undo());
        assert_eq!(session.grid(), &after_first);
        assert_eq!(session.score(), score_after_first);
        assert!(!session.undo());
    }

    #[test]
    fn test_undo_leaves_game_over() {
        let mut session = resumed(r#"{"grid":[[4,4],[2,8]],"score":0,"size":2}"#);
        session.apply_move(Direction::Left);
        assert_eq!(session.phase(), Phase::GameOver);

        assert!(session.undo());
        assert_eq!(session.phase(), Phase::Playing);
        assert!(session.snapshot().terminal.is_none());
    }

    #[test]
    fn test_new_game_clears_undo() {
        let mut session = resumed(r#"{"grid":[[2,2],[0,0]],"score":0,"size":2}"#);
        session.apply_move(Direction::Left);
        session.start(true);
        assert!(!session.can_undo());
        assert!(!session.undo());
    }

    // -------------------------------------------------------------------------
    // size, preferences, reset
    // -------------------------------------------------------------------------

    #[test]
    fn test_change_size_starts_fresh() {
        let mut session = resumed(r#"{"grid":[[2,2],[0,0]],"score":0,"size":2}"#);
        session.apply_move(Direction::Left);
        session.change_size(5);

        assert_eq!(session.size().get(), 5);
        assert_eq!(session.grid().size().get(), 5);
        assert_eq!(session.score(), 0);
        assert_eq!(session.best(), 4);
        assert!(!session.can_undo());

        session.change_size(40);
        assert_eq!(session.size().get(), 8);
    }

    #[test]
    fn test_apply_preferences_persists_and_resizes() {
        let mut session = Session::new(MemoryStore::new(), Scripted::default(), GridSize::default());
        session.start(false);
        let prefs = Preferences {
            size: GridSize::new(3).unwrap(),
            theme: Theme::Light,
            sound: false,
        };
        session.apply_preferences(&prefs);

        assert_eq!(session.size().get(), 3);
        assert_eq!(session.preferences(), prefs);
    }

    #[test]
    fn test_hard_reset_forgets_best_and_prefs() {
        let mut store = saved_store(r#"{"grid":[[2,2],[0,0]],"score":0,"size":2}"#, Some("900"));
        store
            .set(PREFS_KEY, r#"{"size":2,"theme":"dark","sound":true}"#)
            .unwrap();
        let mut session = Session::new(store, Scripted::default(), GridSize::new(2).unwrap());
        session.start(false);
        assert_eq!(session.best(), 900);

        session.hard_reset();
        assert_eq!(session.best(), 0);
        assert_eq!(session.size().get(), 4);
        assert_eq!(session.preferences(), Preferences::default());
        assert!(session.store().get(PREFS_KEY).unwrap().is_none());
    }

    #[test]
    fn test_snapshot_reflects_session() {
        let mut session = resumed(r#"{"grid":[[2,2],[0,0]],"score":6,"size":2}"#);
        session.apply_move(Direction::Left);
        let snap = session.snapshot();
        assert_eq!(snap.size, 2);
        assert_eq!(snap.rows, session.grid().rows());
        assert_eq!(snap.score, 10);
        assert_eq!(snap.best, 10);
        assert!(snap.can_undo);
        assert!(!snap.is_terminal());
    }
}
