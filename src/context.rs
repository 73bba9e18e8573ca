// src/context.rs

use crate::comm::{Communicator, Grid, SelfComm};
use crate::random::RandomContext;

/// Everything a process group threads through one recursion: its grid and its
/// own random state.
pub struct SdcContext<'c, C: Communicator> {
    pub grid: Grid<'c, C>,
    pub random: RandomContext,
}

impl SdcContext<'static, SelfComm> {
    /// Single-process context seeded with `seed`.
    pub fn local(seed: u64) -> Self {
        SdcContext {
            grid: Grid::local(),
            random: RandomContext::seeded(seed),
        }
    }
}

impl<'c, C: Communicator> SdcContext<'c, C> {
    pub fn new(grid: Grid<'c, C>, random: RandomContext) -> Self {
        SdcContext { grid, random }
    }
}
