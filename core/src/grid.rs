//! The grid engine: pure transformations over an NxN board.
//!
//! Every direction is handled as a left compaction. The board is rotated
//! clockwise a fixed number of quarter turns so that the requested direction
//! points left, each row goes through [`compress_line`], and the board is
//! rotated back. This keeps merge semantics in a single function.
//!
//! | direction | turns before | turns after |
//! |-----------|--------------|-------------|
//! | left      | 0            | 0           |
//! | down      | 1            | 3           |
//! | right     | 2            | 2           |
//! | up        | 3            | 1           |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::random::RandomSource;
use crate::Direction;

/// Smallest supported board edge.
pub const MIN_SIZE: usize = 2;
/// Largest supported board edge.
pub const MAX_SIZE: usize = 8;
/// Board edge used when nothing else is configured.
pub const DEFAULT_SIZE: usize = 4;

/// Edge length of a square board, always within `MIN_SIZE..=MAX_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct GridSize(usize);

impl GridSize {
    /// Returns `None` when `n` is outside the supported range.
    pub fn new(n: usize) -> Option<Self> {
        (MIN_SIZE..=MAX_SIZE).contains(&n).then_some(Self(n))
    }

    /// Clamp any requested edge into the supported range.
    pub fn clamped(n: usize) -> Self {
        Self(n.clamp(MIN_SIZE, MAX_SIZE))
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self(DEFAULT_SIZE)
    }
}

impl TryFrom<usize> for GridSize {
    type Error = String;

    fn try_from(n: usize) -> Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| format!("grid size {n} outside {MIN_SIZE}..={MAX_SIZE}"))
    }
}

impl From<GridSize> for usize {
    fn from(size: GridSize) -> usize {
        size.0
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.0)
    }
}

/// A square board stored in row-major order. Zero is an empty cell.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Grid {
    size: GridSize,
    cells: Vec<u32>,
}

/// Result of compacting a single line toward index 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCompression {
    pub line: Vec<u32>,
    pub score_delta: u64,
    pub merges: u32,
}

/// Result of [`Grid::shift`]. The grid has not had a random tile added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub grid: Grid,
    /// Input score plus `score_delta`, saturating at `u64::MAX`.
    pub score: u64,
    pub score_delta: u64,
    pub merges: u32,
    /// Whether any cell differs from the input board.
    pub changed: bool,
}

/// Slide a line toward index 0, merging equal neighbours once per move.
///
/// `[2, 2, 2, 2]` becomes `[4, 4, 0, 0]`: a tile produced by a merge never
/// merges again in the same pass. Tiles above [`MAX_TILE`] have no double
/// that fits a cell and slide without merging.
pub fn compress_line(line: &[u32]) -> LineCompression {
    let tiles: Vec<u32> = line.iter().copied().filter(|&v| v != 0).collect();
    let mut out = Vec::with_capacity(line.len());
    let mut score_delta = 0u64;
    let mut merges = 0u32;

    let mut i = 0;
    while i < tiles.len() {
        let merged = tiles
            .get(i + 1)
            .filter(|&&next| next == tiles[i])
            .and_then(|_| merge_value(tiles[i]));
        if let Some(merged) = merged {
            out.push(merged);
            score_delta += u64::from(merged);
            merges += 1;
            i += 2;
        } else {
            out.push(tiles[i]);
            i += 1;
        }
    }
    out.resize(line.len(), 0);

    LineCompression {
        line: out,
        score_delta,
        merges,
    }
}

/// Largest tile that can still merge: its double is the biggest power of
/// two a cell holds.
pub const MAX_TILE: u32 = 1 << 30;

fn merge_value(tile: u32) -> Option<u32> {
    (tile <= MAX_TILE).then(|| tile * 2)
}

fn mergeable(a: u32, b: u32) -> bool {
    a == b && merge_value(a).is_some()
}

fn quarter_turns(direction: Direction) -> usize {
    match direction {
        Direction::Left => 0,
        Direction::Down => 1,
        Direction::Right => 2,
        Direction::Up => 3,
    }
}

impl Grid {
    /// An all-empty board.
    pub fn empty(size: GridSize) -> Self {
        let n = size.get();
        Self {
            size,
            cells: vec![0; n * n],
        }
    }

    /// Build a board from rows. Returns `None` unless the rows form a square
    /// of a supported size.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Option<Self> {
        let size = GridSize::new(rows.len())?;
        if rows.iter().any(|row| row.len() != size.get()) {
            return None;
        }
        Some(Self {
            size,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// Value at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<u32> {
        let n = self.size.get();
        (row < n && col < n).then(|| self.cells[row * n + col])
    }

    /// Copy of the board as nested rows.
    pub fn rows(&self) -> Vec<Vec<u32>> {
        self.cells
            .chunks(self.size.get())
            .map(<[u32]>::to_vec)
            .collect()
    }

    pub fn max_tile(&self) -> u32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v == 0).count()
    }

    /// Place a 2 (or, rarely, a 4) in a uniformly chosen empty cell.
    ///
    /// A full board is left untouched and `None` is returned.
    pub fn add_random_tile<R: RandomSource>(&mut self, rng: &mut R) -> Option<(usize, usize)> {
        let empties: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 0)
            .map(|(i, _)| i)
            .collect();

        if empties.is_empty() {
            return None;
        }

        let idx = empties[rng.pick_index(empties.len())];
        self.cells[idx] = if rng.four_tile() { 4 } else { 2 };
        let n = self.size.get();
        Some((idx / n, idx % n))
    }

    /// True while an empty cell exists or two orthogonal neighbours are equal.
    pub fn can_move(&self) -> bool {
        let n = self.size.get();
        for r in 0..n {
            for c in 0..n {
                let v = self.cells[r * n + c];
                if v == 0 {
                    return true;
                }
                if c + 1 < n && mergeable(v, self.cells[r * n + c + 1]) {
                    return true;
                }
                if r + 1 < n && mergeable(v, self.cells[(r + 1) * n + c]) {
                    return true;
                }
            }
        }
        false
    }

    /// The board turned a quarter clockwise.
    pub fn rotated(&self) -> Self {
        let n = self.size.get();
        let mut out = vec![0; n * n];
        for r in 0..n {
            for c in 0..n {
                out[c * n + (n - 1 - r)] = self.cells[r * n + c];
            }
        }
        Self {
            size: self.size,
            cells: out,
        }
    }

    fn rotated_times(&self, turns: usize) -> Self {
        let mut grid = self.clone();
        for _ in 0..turns {
            grid = grid.rotated();
        }
        grid
    }

    /// Slide every tile toward `direction`, merging as it goes.
    pub fn shift(&self, direction: Direction, score: u64) -> Shift {
        let turns = quarter_turns(direction);
        let before = self.rotated_times(turns);
        let n = self.size.get();

        let mut after = before.clone();
        let mut score_delta = 0u64;
        let mut merges = 0;
        for row in after.cells.chunks_mut(n) {
            let compressed = compress_line(row);
            row.copy_from_slice(&compressed.line);
            score_delta = score_delta.saturating_add(compressed.score_delta);
            merges += compressed.merges;
        }

        let changed = after.cells != before.cells;
        Shift {
            grid: after.rotated_times((4 - turns) % 4),
            score: score.saturating_add(score_delta),
            score_delta,
            merges,
            changed,
        }
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Grid {{ size: {} }}", self.size)?;
        for row in self.cells.chunks(self.size.get()) {
            for &val in row {
                if val == 0 {
                    write!(f, "    .")?;
                } else {
                    write!(f, "{:5}", val)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.size.get();
        let rule = format!("+{}", "------+".repeat(n));
        writeln!(f, "{rule}")?;
        for row in self.cells.chunks(n) {
            write!(f, "|")?;
            for &val in row {
                if val == 0 {
                    write!(f, "      |")?;
                } else {
                    write!(f, "{:^6}|", val)?;
                }
            }
            writeln!(f)?;
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
