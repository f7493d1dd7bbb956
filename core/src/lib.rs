//! # p2048 core
//!
//! Engine and session rules for a single-player 2048-style puzzle on an
//! NxN board (2 ≤ N ≤ 8). Front-ends (the terminal binary, the browser
//! bridge) feed directions in and render the [`RenderSnapshot`] that comes
//! back; everything else lives here.
//!
//! ## Example
//!
//! ```rust
//! use p2048_core::{Direction, GridSize, MemoryStore, SeededRandom, Session};
//!
//! let mut session = Session::new(MemoryStore::new(), SeededRandom::new(42), GridSize::default());
//! session.start(true);
//! session.apply_move(Direction::Left);
//! println!("Score: {}, Best: {}", session.score(), session.best());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod error;
pub mod grid;
pub mod input;
pub mod offline;
pub mod prefs;
pub mod random;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod validate;

pub use error::{CacheError, NotifyError, RejectReason, StoreError};
pub use grid::{compress_line, Grid, GridSize, LineCompression, Shift, MAX_TILE};
pub use input::{swipe_direction, SWIPE_THRESHOLD};
pub use prefs::{Preferences, Theme};
pub use random::{RandomSource, SeededRandom};
pub use session::{MoveReport, Notifier, Phase, Session, SessionEvent, Silent};
pub use snapshot::{RenderSnapshot, TerminalNotice};
pub use store::{KeyValueStore, MemoryStore, Persistence};

/// The four possible move directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Direction {
    /// Convert a u8 to a Direction (0=Up, 1=Down, 2=Left, 3=Right).
    /// Returns None for invalid values.
    pub fn from_u8(value: u8) -> Option<Direction> {
        match value {
            0 => Some(Direction::Up),
            1 => Some(Direction::Down),
            2 => Some(Direction::Left),
            3 => Some(Direction::Right),
            _ => None,
        }
    }

    /// Get all four directions.
    pub fn all() -> [Direction; 4] {
        [
            Direction::Up,
            Direction::Down,
            Direction::Left,
            Direction::Right,
        ]
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        })
    }
}
