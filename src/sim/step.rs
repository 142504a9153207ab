//! One movement pass: settled grains slide, falling grains drop, roll off obstacles or settle.

use super::config::SimConfig;
use super::dice::Dice;
use super::grid::Grid;
use super::particle::GrainState;
use super::slope;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Some grain changed position this pass.
    pub moved: bool,
    /// Grains that went Falling → Settled this pass.
    pub settled: usize,
}

/// Advance every grain once, in collection order.
///
/// A falling grain whose cell below is claimed by another falling grain waits; it neither
/// moves nor settles. Blocks are inserted bottom row first so they fall as one.
pub fn step<D: Dice>(grid: &mut Grid, config: &SimConfig, dice: &mut D) -> StepOutcome {
    let (w, h) = grid.dims();
    let mut out = StepOutcome::default();

    for i in 0..grid.len() {
        let p = &grid.particles()[i];
        let state = p.state;
        let Some(cell) = grid.cell_of(p) else {
            continue;
        };
        let below = cell.offset(0, 1, w, h);

        match state {
            GrainState::Settled => {
                // Support vanished (slide or removal underneath): fall again.
                if below.is_some_and(|b| !grid.occupied(b)) {
                    grid.release(i, cell);
                    continue;
                }
                let dir = slope::direction(grid, cell, config.height_threshold, dice);
                if dir != 0 && dice.roll(config.slide_chance) {
                    grid.release(i, cell);
                    if let Some(to) = cell.offset(dir, 0, w, h) {
                        if !grid.claimed(to) {
                            grid.shift(i, to);
                            out.moved = true;
                        }
                    }
                }
            }
            GrainState::Falling => match below {
                Some(b) if !grid.occupied(b) => {
                    if grid.claimed(b) {
                        continue;
                    }
                    if config.jitter_chance > 0.0 && dice.roll(config.jitter_chance) {
                        let side = dice.side();
                        if let Some(diag) = cell.offset(side, 1, w, h) {
                            if !grid.claimed(diag) {
                                grid.shift(i, diag);
                                out.moved = true;
                                continue;
                            }
                        }
                    }
                    grid.shift(i, b);
                    out.moved = true;
                }
                _ => {
                    let dir = slope::direction(grid, cell, config.height_threshold, dice);
                    if dir != 0 {
                        if let Some(to) = cell.offset(dir, 0, w, h) {
                            if !grid.claimed(to) {
                                grid.shift(i, to);
                                out.moved = true;
                                continue;
                            }
                        }
                    }
                    grid.settle(i, cell);
                    out.settled += 1;
                }
            },
        }
    }
    out
}
