//! Randomness used for tile placement.
//!
//! Tile spawning is the only non-deterministic step of the engine, so it
//! goes through [`RandomSource`]. Production code uses [`SeededRandom`];
//! tests can script exact picks.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Probability that a freshly spawned tile is a 4 instead of a 2.
pub const FOUR_PROBABILITY: f64 = 0.1;

/// Source of the two random decisions needed to spawn a tile.
pub trait RandomSource {
    /// Uniform index in `0..len`. Only called with `len > 0`.
    fn pick_index(&mut self, len: usize) -> usize;

    /// Whether the next tile should be a 4.
    fn four_tile(&mut self) -> bool;
}

/// Deterministic, seedable randomness backed by `SmallRng`.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: SmallRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick_index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    fn four_tile(&mut self) -> bool {
        self.rng.gen_bool(FOUR_PROBABILITY)
    }
}
