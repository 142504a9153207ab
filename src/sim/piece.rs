//! Player-steered block of grains.

use super::grid::Grid;
use super::particle::{Cell, GrainState, ParticleId};
use std::collections::HashSet;

/// Build a `size x size` block of one colour centred at pixel `center_x`, top-aligned.
/// Off-grid or claimed cells are skipped, so the block may be partial. Rows are inserted
/// bottom first so the block falls together.
pub fn spawn_block(grid: &mut Grid, center_x: f32, size: usize, color: u8) -> Vec<ParticleId> {
    let cs = grid.cell_size();
    let start_x = center_x - (size as f32 * cs) / 2.0;
    let mut ids = Vec::with_capacity(size * size);
    for row in (0..size).rev() {
        for col in 0..size {
            let x = start_x + col as f32 * cs;
            let y = row as f32 * cs;
            if let Some(id) = grid.insert(x, y, color) {
                ids.push(id);
            }
        }
    }
    ids
}

#[derive(Debug, Clone)]
pub struct ActivePiece {
    members: Vec<ParticleId>,
    can_move: bool,
}

impl ActivePiece {
    pub fn new(members: Vec<ParticleId>) -> Self {
        Self {
            members,
            can_move: true,
        }
    }

    #[inline]
    pub fn members(&self) -> &[ParticleId] {
        &self.members
    }

    #[inline]
    pub fn can_move(&self) -> bool {
        self.can_move
    }

    /// `(collection index, cell, state)` of every member still present.
    fn locate(&self, grid: &Grid) -> Vec<(usize, Cell, GrainState)> {
        let ids: HashSet<ParticleId> = self.members.iter().copied().collect();
        grid.particles()
            .iter()
            .enumerate()
            .filter(|(_, p)| ids.contains(&p.id))
            .filter_map(|(i, p)| grid.cell_of(p).map(|c| (i, c, p.state)))
            .collect()
    }

    /// Lateral control ends for good once any member has nothing free beneath it.
    pub fn check_landing(&mut self, grid: &Grid) {
        if !self.can_move {
            return;
        }
        let (w, h) = grid.dims();
        let landed = self
            .locate(grid)
            .iter()
            .any(|&(_, cell, _)| cell.offset(0, 1, w, h).is_none_or(|b| grid.occupied(b)));
        if landed {
            self.can_move = false;
        }
    }

    /// Move every Falling member up to `step` cells in `dir`. Each member stops on its
    /// own at the wall or a claimed cell, so the block can deform against obstacles.
    pub fn shift(&mut self, grid: &mut Grid, dir: i32, step: usize) -> bool {
        if !self.can_move || dir == 0 {
            return false;
        }
        let (w, h) = grid.dims();
        let mut falling: Vec<(usize, Cell)> = self
            .locate(grid)
            .into_iter()
            .filter(|&(_, _, s)| s == GrainState::Falling)
            .map(|(i, c, _)| (i, c))
            .collect();
        // Leading edge first so followers can step into vacated cells.
        if dir < 0 {
            falling.sort_by_key(|&(_, c)| c.cx);
        } else {
            falling.sort_by_key(|&(_, c)| std::cmp::Reverse(c.cx));
        }

        let mut moved = false;
        for (i, cell) in falling {
            let mut to = cell;
            for _ in 0..step {
                match to.offset(dir.signum(), 0, w, h) {
                    Some(next) if !grid.claimed(next) => to = next,
                    _ => break,
                }
            }
            if to != cell {
                grid.shift(i, to);
                moved = true;
            }
        }
        moved
    }

    /// Every member Settled. A piece whose members were all removed counts as landed.
    pub fn is_landed(&self, grid: &Grid) -> bool {
        self.locate(grid)
            .iter()
            .all(|&(_, _, s)| s == GrainState::Settled)
    }

    /// Drop members that no longer exist in the grid.
    pub fn prune(&mut self, grid: &Grid) {
        let alive: HashSet<ParticleId> = grid.particles().iter().map(|p| p.id).collect();
        self.members.retain(|id| alive.contains(id));
    }
}
