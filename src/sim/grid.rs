//! Grid state: the particle collection plus the occupancy grid and cell→particle index
//! that must always agree with it.

use super::particle::{Cell, GrainState, Particle, ParticleId};
use std::collections::HashSet;

/// Owns every grain. `occupied` marks cells holding a Settled grain; `index` maps each
/// cell to the one grain (of either state) that currently claims it.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    cell_size: f32,
    particles: Vec<Particle>,
    occupied: Vec<bool>,
    index: Vec<Option<usize>>,
    next_id: u64,
}

/// Cell of a `w x h` grid with square cells of side `cs` containing pixel `(x, y)`.
fn cell_for(x: f32, y: f32, w: usize, h: usize, cs: f32) -> Option<Cell> {
    let cx = (x / cs).floor();
    let cy = (y / cs).floor();
    if !(cx >= 0.0 && cy >= 0.0) || cx >= w as f32 || cy >= h as f32 {
        return None;
    }
    Some(Cell::new(cx as usize, cy as usize))
}

impl Grid {
    pub fn new(width: usize, height: usize, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            particles: Vec::new(),
            occupied: vec![false; width * height],
            index: vec![None; width * height],
            next_id: 0,
        }
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    fn slot(&self, cell: Cell) -> Option<usize> {
        (cell.cx < self.width && cell.cy < self.height).then(|| cell.cy * self.width + cell.cx)
    }

    /// True iff a Settled grain sits in `cell`. Off-grid cells read as unoccupied.
    #[inline]
    pub fn occupied(&self, cell: Cell) -> bool {
        self.slot(cell).is_some_and(|s| self.occupied[s])
    }

    /// True iff any grain, Falling or Settled, maps to `cell`.
    #[inline]
    pub fn claimed(&self, cell: Cell) -> bool {
        self.slot(cell).is_some_and(|s| self.index[s].is_some())
    }

    pub fn particle_at(&self, cell: Cell) -> Option<&Particle> {
        let i = self.index[self.slot(cell)?]?;
        self.particles.get(i)
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn cell_of(&self, p: &Particle) -> Option<Cell> {
        self.cell_at(p.x, p.y)
    }

    /// Cell containing pixel position `(x, y)`, if it lies on the grid.
    pub fn cell_at(&self, x: f32, y: f32) -> Option<Cell> {
        cell_for(x, y, self.width, self.height, self.cell_size)
    }

    /// Add a Falling grain at pixel position `(x, y)`. Refused when that cell is off-grid
    /// or already claimed.
    pub fn insert(&mut self, x: f32, y: f32, color: u8) -> Option<ParticleId> {
        let cell = self.cell_at(x, y)?;
        let slot = self.slot(cell)?;
        if self.index[slot].is_some() {
            return None;
        }
        let id = ParticleId(self.next_id);
        self.next_id += 1;
        self.index[slot] = Some(self.particles.len());
        self.particles.push(Particle {
            id,
            x,
            y,
            color,
            state: GrainState::Falling,
        });
        Some(id)
    }

    /// Clear occupancy for every cell in `cells` and drop the grains mapping to them.
    /// Returns the number of grains dropped.
    pub fn remove_all(&mut self, cells: &HashSet<Cell>) -> usize {
        for &cell in cells {
            if let Some(s) = self.slot(cell) {
                self.occupied[s] = false;
            }
        }
        let before = self.particles.len();
        let (w, h, cs) = (self.width, self.height, self.cell_size);
        self.particles
            .retain(|p| cell_for(p.x, p.y, w, h, cs).is_none_or(|c| !cells.contains(&c)));
        self.reindex();
        before - self.particles.len()
    }

    /// Rebuild the cell→particle index from current positions in one pass.
    pub fn reindex(&mut self) {
        self.index.fill(None);
        for i in 0..self.particles.len() {
            let Some(cell) = self.cell_of(&self.particles[i]) else {
                continue;
            };
            let Some(s) = self.slot(cell) else { continue };
            match self.index[s] {
                None => self.index[s] = Some(i),
                Some(other) => {
                    log::warn!("cell ({}, {}) claimed by two grains", cell.cx, cell.cy);
                    if self.particles[i].is_settled() && !self.particles[other].is_settled() {
                        self.index[s] = Some(i);
                    }
                }
            }
        }
    }

    /// Move grain `i` to `to`, snapping the moved axis onto the cell origin. The caller
    /// guarantees `to` is on-grid and unclaimed.
    pub(crate) fn shift(&mut self, i: usize, to: Cell) {
        let cs = self.cell_size;
        let from = self.cell_of(&self.particles[i]);
        if let Some(s) = from.and_then(|c| self.slot(c)) {
            if self.index[s] == Some(i) {
                self.index[s] = None;
            }
        }
        if let Some(s) = self.slot(to) {
            self.index[s] = Some(i);
        }
        let p = &mut self.particles[i];
        if from.is_none_or(|c| c.cx != to.cx) {
            p.x = to.cx as f32 * cs;
        }
        if from.is_none_or(|c| c.cy != to.cy) {
            p.y = to.cy as f32 * cs;
        }
    }

    /// Falling → Settled: snap to the cell origin and register occupancy.
    pub(crate) fn settle(&mut self, i: usize, at: Cell) {
        let cs = self.cell_size;
        let p = &mut self.particles[i];
        p.state = GrainState::Settled;
        p.x = at.cx as f32 * cs;
        p.y = at.cy as f32 * cs;
        if let Some(s) = self.slot(at) {
            self.occupied[s] = true;
        }
    }

    /// Settled → Falling: occupancy is cleared in the same step.
    pub(crate) fn release(&mut self, i: usize, at: Cell) {
        self.particles[i].state = GrainState::Falling;
        if let Some(s) = self.slot(at) {
            self.occupied[s] = false;
        }
    }

    /// Every Settled grain owns an occupied cell, no cell has two owners, and the
    /// occupancy count matches the settled count.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> Result<(), String> {
        let mut seen = HashSet::new();
        let mut settled = 0usize;
        for p in &self.particles {
            let cell = self
                .cell_of(p)
                .ok_or_else(|| format!("grain {:?} is off-grid", p.id))?;
            if !seen.insert(cell) {
                return Err(format!("cell {cell:?} claimed twice"));
            }
            if p.is_settled() {
                settled += 1;
                if !self.occupied(cell) {
                    return Err(format!("settled grain at {cell:?} not marked occupied"));
                }
            }
        }
        let marked = self.occupied.iter().filter(|&&o| o).count();
        if marked != settled {
            return Err(format!("{marked} occupied cells for {settled} settled grains"));
        }
        Ok(())
    }

    /// Test helper: drop a Settled grain straight into `cell`.
    #[cfg(test)]
    pub(crate) fn place_settled(&mut self, cell: Cell, color: u8) -> ParticleId {
        let cs = self.cell_size;
        let id = self
            .insert(cell.cx as f32 * cs, cell.cy as f32 * cs, color)
            .expect("cell free");
        let i = self.particles.len() - 1;
        self.settle(i, cell);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_for_edges() {
        assert_eq!(cell_for(0.0, 0.0, 4, 3, 8.0), Some(Cell::new(0, 0)));
        assert_eq!(cell_for(7.99, 23.9, 4, 3, 8.0), Some(Cell::new(0, 2)));
        assert_eq!(cell_for(31.9, 0.0, 4, 3, 8.0), Some(Cell::new(3, 0)));
        assert_eq!(cell_for(32.0, 0.0, 4, 3, 8.0), None);
        assert_eq!(cell_for(0.0, 24.0, 4, 3, 8.0), None);
        assert_eq!(cell_for(-0.1, 0.0, 4, 3, 8.0), None);
        assert_eq!(cell_for(f32::NAN, 0.0, 4, 3, 8.0), None);
    }

    #[test]
    fn test_insert_refuses_claimed_and_off_grid() {
        let mut g = Grid::new(4, 4, 8.0);
        assert!(g.insert(9.0, 0.0, 0).is_some());
        assert!(g.insert(15.0, 7.0, 1).is_none());
        assert!(g.insert(-1.0, 0.0, 0).is_none());
        assert!(g.insert(32.0, 0.0, 0).is_none());
        assert_eq!(g.len(), 1);
        assert_eq!(g.particle_at(Cell::new(1, 0)).map(|p| p.color), Some(0));
        assert!(!g.occupied(Cell::new(1, 0)));
        assert!(g.claimed(Cell::new(1, 0)));
    }

    #[test]
    fn test_settle_and_release_flip_occupancy() {
        let mut g = Grid::new(4, 4, 8.0);
        g.insert(3.0, 24.0, 2);
        let c = Cell::new(0, 3);
        g.settle(0, c);
        assert!(g.occupied(c));
        assert_eq!((g.particles()[0].x, g.particles()[0].y), (0.0, 24.0));
        g.release(0, c);
        assert!(!g.occupied(c));
        assert!(g.claimed(c));
        assert_eq!(g.check_invariants(), Ok(()));
    }

    #[test]
    fn test_shift_moves_claim() {
        let mut g = Grid::new(4, 4, 8.0);
        g.insert(3.0, 0.0, 0);
        g.shift(0, Cell::new(0, 1));
        assert!(!g.claimed(Cell::new(0, 0)));
        assert!(g.claimed(Cell::new(0, 1)));
        // Vertical move keeps the unaligned x.
        assert_eq!(g.particles()[0].x, 3.0);
        g.shift(0, Cell::new(1, 1));
        assert_eq!((g.particles()[0].x, g.particles()[0].y), (8.0, 8.0));
    }

    #[test]
    fn test_remove_all_drops_grains_and_reindexes() {
        let mut g = Grid::new(4, 2, 8.0);
        for cx in 0..4 {
            g.place_settled(Cell::new(cx, 1), cx as u8);
        }
        let cells: HashSet<Cell> = [Cell::new(1, 1), Cell::new(2, 1)].into_iter().collect();
        assert_eq!(g.remove_all(&cells), 2);
        assert_eq!(g.len(), 2);
        assert!(!g.occupied(Cell::new(1, 1)));
        assert_eq!(g.particle_at(Cell::new(3, 1)).map(|p| p.color), Some(3));
        assert_eq!(g.check_invariants(), Ok(()));
    }

    #[test]
    fn test_reindex_matches_positions() {
        let mut g = Grid::new(3, 3, 8.0);
        g.insert(0.0, 0.0, 0);
        g.insert(16.0, 16.0, 1);
        g.reindex();
        assert_eq!(g.particle_at(Cell::new(2, 2)).map(|p| p.color), Some(1));
        assert!(g.particle_at(Cell::new(1, 1)).is_none());
    }
}
