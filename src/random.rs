// src/random.rs

//! Seeded random state owned by a process group.
//!
//! Nothing in the crate touches a thread-local or global generator. Each
//! recursion carries its own [`RandomContext`], and draws that must agree
//! across ranks are broadcast from the grid root.

use crate::comm::{Communicator, Grid};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const DEFAULT_SEED: u64 = 0x5EED_CAFE;

#[derive(Clone, Debug)]
pub struct RandomContext {
    rng: ChaCha8Rng,
}

impl RandomContext {
    pub fn seeded(seed: u64) -> Self {
        RandomContext {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws a value on every rank and keeps the root's, so the whole grid
    /// continues with bit-identical randomness.
    pub fn shared_draw<C, T, D>(&mut self, grid: &Grid<'_, C>, draw: D) -> T
    where
        C: Communicator,
        T: Clone + Send + 'static,
        D: FnOnce(&mut ChaCha8Rng) -> T,
    {
        let mut value = draw(&mut self.rng);
        grid.comm().broadcast(0, &mut value);
        value
    }

    /// A fresh seed agreed on by the whole grid, for generators that must be
    /// replayed identically on every rank (e.g. Haar sampling).
    pub fn shared_seed<C: Communicator>(&mut self, grid: &Grid<'_, C>) -> u64 {
        self.shared_draw(grid, |rng| rng.gen::<u64>())
    }
}

impl Default for RandomContext {
    fn default() -> Self {
        RandomContext::seeded(DEFAULT_SEED)
    }
}
