//! Mapping raw player input to directions.

use std::cmp::Ordering;

use crate::Direction;

/// Minimum swipe travel, in pixels along the dominant axis.
pub const SWIPE_THRESHOLD: f64 = 24.0;

impl Direction {
    /// Map a key name to a direction, ignoring case.
    ///
    /// Arrow keys plus two alternate sets: WASD and the vi keys `hjkl`.
    /// Key names follow the DOM `KeyboardEvent.key` spelling (`ArrowLeft`).
    pub fn from_key(key: &str) -> Option<Direction> {
        match key.to_ascii_lowercase().as_str() {
            "arrowleft" | "a" | "h" => Some(Direction::Left),
            "arrowright" | "d" | "l" => Some(Direction::Right),
            "arrowup" | "w" | "k" => Some(Direction::Up),
            "arrowdown" | "s" | "j" => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Direction of a swipe from its total displacement, or `None` for a tap.
///
/// Screen coordinates: positive `dy` points down. When both axes moved the
/// same distance the vertical axis wins.
pub fn swipe_direction(dx: f64, dy: f64) -> Option<Direction> {
    let (ax, ay) = (dx.abs(), dy.abs());
    if ax.max(ay).partial_cmp(&SWIPE_THRESHOLD) != Some(Ordering::Greater) {
        return None;
    }
    Some(if ax > ay {
        if dx > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if dy > 0.0 {
        Direction::Down
    } else {
        Direction::Up
    })
}
