//! Simulation engine: grains, pile physics, steerable blocks, wall-to-wall bridge clears.
//!
//! The terminal shell drives it once per tick: input (`spawn_*`, `move_*`), then
//! [`Simulation::advance`], then [`Simulation::grains`] for drawing.

pub mod bridge;
pub mod config;
pub mod dice;
pub mod grid;
pub mod particle;
pub mod piece;
pub mod removal;
pub mod slope;
pub mod step;

pub use config::{ConfigError, SimConfig};
pub use dice::{Dice, RandDice};

use grid::Grid;
use piece::ActivePiece;
use removal::RemovalScheduler;
use std::time::Instant;

/// What one tick did, for the shell's status line and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub moved: bool,
    pub settled: usize,
    pub cleared: usize,
}

/// Running totals since construction or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub ticks: u64,
    pub spawned: u64,
    pub cleared: u64,
    pub bridges: u64,
}

/// Read-only view of one grain for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainView {
    pub x: f32,
    pub y: f32,
    pub color: u8,
    /// Part of a bridge waiting out its flash delay.
    pub flagged: bool,
}

#[derive(Debug)]
pub struct Simulation<D: Dice = RandDice> {
    config: SimConfig,
    grid: Grid,
    dice: D,
    piece: Option<ActivePiece>,
    removal: RemovalScheduler,
    last_piece_spawn: Option<Instant>,
    stats: Stats,
}

impl<D: Dice> Simulation<D> {
    pub fn new(config: SimConfig, dice: D) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = Grid::new(config.width, config.height, config.cell_size);
        let removal = RemovalScheduler::new(config.flash_delay);
        Ok(Self {
            config,
            grid,
            dice,
            piece: None,
            removal,
            last_piece_spawn: None,
            stats: Stats::default(),
        })
    }

    /// Empty the grid and forget the active piece and all timers.
    pub fn reset(&mut self) {
        self.grid = Grid::new(self.config.width, self.config.height, self.config.cell_size);
        self.removal = RemovalScheduler::new(self.config.flash_delay);
        self.piece = None;
        self.last_piece_spawn = None;
        self.stats = Stats::default();
    }

    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    #[inline]
    pub fn active_piece(&self) -> Option<&ActivePiece> {
        self.piece.as_ref()
    }

    /// True when there is no active piece or all of its grains have settled.
    pub fn is_landed(&self) -> bool {
        self.piece.as_ref().is_none_or(|p| p.is_landed(&self.grid))
    }

    /// The active piece still answers lateral input.
    pub fn has_control(&self) -> bool {
        self.piece.as_ref().is_some_and(ActivePiece::can_move)
    }

    #[inline]
    pub fn removal_pending(&self) -> bool {
        self.removal.is_pending()
    }

    /// Drop a square block centred at pixel `center_x`. Refused (false) while the spawn
    /// cadence has not elapsed or when every target cell is taken.
    pub fn spawn_piece(&mut self, center_x: f32, now: Instant) -> bool {
        if let Some(last) = self.last_piece_spawn {
            if now.saturating_duration_since(last) < self.config.spawn_delay {
                return false;
            }
        }
        let color = self.dice.pick(usize::from(self.config.colors)) as u8;
        let ids = piece::spawn_block(&mut self.grid, center_x, self.config.piece_size, color);
        if ids.is_empty() {
            return false;
        }
        log::debug!("spawned {} grains of colour {color} at x={center_x:.1}", ids.len());
        self.last_piece_spawn = Some(now);
        self.stats.spawned += ids.len() as u64;
        if self.config.piece_control {
            let mut p = ActivePiece::new(ids);
            p.check_landing(&self.grid);
            self.piece = Some(p);
        }
        true
    }

    /// Drop a single grain of random colour into the top row at pixel `x`.
    pub fn spawn_grain(&mut self, x: f32) -> bool {
        let color = self.dice.pick(usize::from(self.config.colors)) as u8;
        let spawned = self.grid.insert(x, 0.0, color).is_some();
        if spawned {
            self.stats.spawned += 1;
        }
        spawned
    }

    /// Uniform grid column drawn from the simulation's own dice, so seeded runs repeat.
    pub fn random_column(&mut self) -> usize {
        self.dice.pick(self.config.width)
    }

    pub fn move_left(&mut self) {
        self.move_lateral(-1);
    }

    pub fn move_right(&mut self) {
        self.move_lateral(1);
    }

    fn move_lateral(&mut self, dir: i32) {
        let step = self.config.piece_step;
        if let Some(p) = self.piece.as_mut() {
            if p.shift(&mut self.grid, dir, step) {
                p.check_landing(&self.grid);
            }
        }
    }

    /// One tick: movement pass, then bridge detection and due removals.
    pub fn advance(&mut self, now: Instant) -> StepReport {
        self.stats.ticks += 1;
        self.grid.reindex();

        let outcome = step::step(&mut self.grid, &self.config, &mut self.dice);
        if let Some(p) = self.piece.as_mut() {
            p.check_landing(&self.grid);
        }

        let mut report = StepReport {
            moved: outcome.moved,
            settled: outcome.settled,
            cleared: 0,
        };
        if self.config.bridge_clear {
            report.cleared = self.resolve_bridges(outcome, now);
        }
        log::trace!("tick {}: {report:?}", self.stats.ticks);
        report
    }

    /// Scan only when the pile went quiet or something new landed; clear a flagged set
    /// once its flash delay is over.
    fn resolve_bridges(&mut self, outcome: step::StepOutcome, now: Instant) -> usize {
        let scan = !outcome.moved || outcome.settled > 0;
        if scan && !self.removal.is_pending() && !self.grid.is_empty() {
            let found = bridge::find_bridging_region(&self.grid);
            if !found.is_empty() {
                log::debug!(
                    "bridge: {} region(s), {} cells flagged",
                    found.regions,
                    found.cells.len()
                );
                self.stats.bridges += found.regions as u64;
                self.removal.schedule(found.cells, now);
            }
        }

        let Some(cells) = self.removal.poll(now) else {
            return 0;
        };
        let cleared = self.grid.remove_all(&cells);
        if let Some(p) = self.piece.as_mut() {
            p.prune(&self.grid);
        }
        self.stats.cleared += cleared as u64;
        log::info!("cleared {cleared} grains");
        cleared
    }

    /// Every grain with its draw position, colour and flash flag.
    pub fn grains(&self) -> impl Iterator<Item = GrainView> + '_ {
        self.grid.particles().iter().map(|p| GrainView {
            x: p.x,
            y: p.y,
            color: p.color,
            flagged: self
                .grid
                .cell_of(p)
                .is_some_and(|c| self.removal.is_flagged(c)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::config::test_config;
    use super::dice::testing::FixedDice;
    use super::particle::{Cell, GrainState};
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::time::Duration;

    fn positions<D: Dice>(sim: &Simulation<D>) -> Vec<(f32, f32, GrainState)> {
        sim.grid.particles().iter().map(|p| (p.x, p.y, p.state)).collect()
    }

    #[test]
    fn test_construction_rejects_small_grid() {
        let cfg = test_config(3, 10);
        assert!(matches!(
            Simulation::new(cfg, FixedDice::still()),
            Err(ConfigError::GridTooSmall { .. })
        ));
    }

    #[test]
    fn test_block_lands_as_compact_pile() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(10, 10), FixedDice::still()).unwrap();
        assert!(sim.spawn_piece(40.0, t0));
        for i in 0..20 {
            sim.advance(t0 + Duration::from_millis(16 * (i + 1)));
            assert_eq!(sim.grid.check_invariants(), Ok(()));
        }
        assert_eq!(sim.grains().count(), 9);
        assert!(sim.grid.particles().iter().all(|p| p.is_settled()));
        assert!(sim.is_landed());
        // Every grain above the floor rests on another grain.
        for p in sim.grid.particles() {
            let c = sim.grid.cell_of(p).unwrap();
            assert!(c.cy == 9 || sim.grid.occupied(Cell::new(c.cx, c.cy + 1)), "gap under {c:?}");
        }
        let bottom = sim.grid.particles().iter().filter(|p| p.y == 72.0).count();
        assert!(bottom >= 3);
    }

    #[test]
    fn test_settled_pile_is_fixed_point() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(6, 5), FixedDice::new(true, &[-1, 1], 0)).unwrap();
        for cx in 0..6 {
            for cy in 3..5 {
                // Alternate colours by column so nothing bridges.
                sim.grid.place_settled(Cell::new(cx, cy), (cx % 2) as u8);
            }
        }
        let before = positions(&sim);
        for i in 0..10 {
            let r = sim.advance(t0 + Duration::from_millis(i));
            assert!(!r.moved);
        }
        assert_eq!(positions(&sim), before);
        assert!(!sim.removal_pending());
    }

    #[test]
    fn test_bridge_cleared_after_flash_delay() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(6, 5), FixedDice::still()).unwrap();
        for cx in 0..6 {
            sim.grid.place_settled(Cell::new(cx, 4), 1);
        }
        sim.grid.place_settled(Cell::new(2, 3), 0);

        sim.advance(t0);
        assert!(sim.removal_pending());
        assert_eq!(sim.grains().filter(|g| g.flagged).count(), 6);

        let r = sim.advance(t0 + Duration::from_millis(16));
        assert_eq!(r.cleared, 0);
        assert_eq!(sim.grains().count(), 7);

        let r = sim.advance(t0 + Duration::from_millis(32));
        assert_eq!(r.cleared, 6);
        assert!(!sim.removal_pending());
        assert_eq!(sim.stats().cleared, 6);
        assert_eq!(sim.stats().bridges, 1);
        // The lone grain lost its support and falls on the next tick.
        sim.advance(t0 + Duration::from_millis(48));
        sim.advance(t0 + Duration::from_millis(64));
        let last = &sim.grid.particles()[0];
        assert_eq!(sim.grid.cell_of(last), Some(Cell::new(2, 4)));
        assert_eq!(sim.grid.check_invariants(), Ok(()));
    }

    #[test]
    fn test_bridge_clear_prunes_active_piece() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(6, 6), FixedDice::still()).unwrap();
        // Floor row with a three-wide gap at columns 1..=3.
        for cx in [0, 4, 5] {
            sim.grid.place_settled(Cell::new(cx, 5), 0);
        }
        assert!(sim.spawn_piece(32.0, t0));
        sim.move_left();
        let piece_ids: Vec<_> = sim.active_piece().unwrap().members().to_vec();
        assert_eq!(piece_ids.len(), 9);

        let mut ticks = 0;
        while !sim.removal_pending() {
            sim.advance(t0);
            ticks += 1;
            assert!(ticks < 20, "bridge never formed");
        }
        // The block fills the gap and lands in one pass, so all of it joins the bridge.
        assert_eq!(ticks, 4);
        assert!(!sim.has_control());
        assert_eq!(sim.grains().filter(|g| g.flagged).count(), 12);
        assert_eq!(sim.active_piece().unwrap().members().len(), 9);

        // Still flashing: nothing removed yet.
        assert_eq!(sim.advance(t0 + Duration::from_millis(10)).cleared, 0);
        assert_eq!(sim.active_piece().unwrap().members().len(), 9);

        let r = sim.advance(t0 + Duration::from_secs(1));
        assert_eq!(r.cleared, 12);
        let piece = sim.active_piece().unwrap();
        assert!(piece.members().is_empty());
        assert!(sim.is_landed());
        assert!(!piece_ids.iter().any(|id| sim.grid.particles().iter().any(|p| p.id == *id)));
        assert_eq!(sim.grid.check_invariants(), Ok(()));
    }

    #[test]
    fn test_random_column_repeats_with_seed() {
        let cfg = test_config(12, 10);
        let mut a = Simulation::new(cfg.clone(), RandDice(StdRng::seed_from_u64(7))).unwrap();
        let mut b = Simulation::new(cfg, RandDice(StdRng::seed_from_u64(7))).unwrap();
        let xs: Vec<usize> = (0..16).map(|_| a.random_column()).collect();
        let ys: Vec<usize> = (0..16).map(|_| b.random_column()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|&c| c < 12));
    }

    #[test]
    fn test_bridge_clear_toggle() {
        let t0 = Instant::now();
        let mut cfg = test_config(6, 5);
        cfg.bridge_clear = false;
        let mut sim = Simulation::new(cfg, FixedDice::still()).unwrap();
        for cx in 0..6 {
            sim.grid.place_settled(Cell::new(cx, 4), 1);
        }
        sim.advance(t0);
        assert!(!sim.removal_pending());
        sim.advance(t0 + Duration::from_secs(1));
        assert_eq!(sim.grains().count(), 6);
    }

    #[test]
    fn test_spawn_cadence() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(20, 10), FixedDice::still()).unwrap();
        assert!(sim.spawn_piece(24.0, t0));
        assert!(!sim.spawn_piece(120.0, t0 + Duration::from_millis(499)));
        assert!(sim.spawn_piece(120.0, t0 + Duration::from_millis(500)));
        assert_eq!(sim.stats().spawned, 18);
    }

    #[test]
    fn test_piece_control_freezes_before_settling() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(10, 10), FixedDice::still()).unwrap();
        sim.spawn_piece(40.0, t0);
        // Bottom row starts on row 2 and reaches the floor row after 7 ticks.
        for i in 0..7 {
            assert!(sim.has_control(), "lost control early at tick {i}");
            sim.advance(t0);
        }
        assert!(!sim.has_control());
        assert!(sim.grid.particles().iter().all(|p| !p.is_settled()));
        let before = positions(&sim);
        sim.move_left();
        assert_eq!(positions(&sim), before);
        sim.advance(t0);
        assert!(sim.grid.particles().iter().any(|p| p.is_settled()));
    }

    #[test]
    fn test_move_steers_block() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(10, 10), FixedDice::still()).unwrap();
        sim.spawn_piece(40.0, t0);
        sim.move_right();
        sim.move_right();
        let xs: Vec<usize> = sim
            .grid
            .particles()
            .iter()
            .filter_map(|p| sim.grid.cell_of(p))
            .map(|c| c.cx)
            .collect();
        assert_eq!(xs.iter().min(), Some(&5));
        assert_eq!(xs.iter().max(), Some(&7));
    }

    #[test]
    fn test_piece_control_toggle() {
        let mut cfg = test_config(10, 10);
        cfg.piece_control = false;
        let mut sim = Simulation::new(cfg, FixedDice::still()).unwrap();
        assert!(sim.spawn_piece(40.0, Instant::now()));
        assert!(sim.active_piece().is_none());
        assert!(!sim.has_control());
        assert!(sim.is_landed());
    }

    #[test]
    fn test_spawn_grain() {
        let mut sim = Simulation::new(test_config(10, 10), FixedDice::new(false, &[1], 3)).unwrap();
        assert!(sim.spawn_grain(12.0));
        assert!(!sim.spawn_grain(15.0));
        assert!(!sim.spawn_grain(-3.0));
        let g: Vec<GrainView> = sim.grains().collect();
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].color, 3);
    }

    #[test]
    fn test_random_run_keeps_invariants() {
        let t0 = Instant::now();
        let mut cfg = test_config(12, 16);
        cfg.jitter_chance = 0.1;
        cfg.colors = 2;
        cfg.flash_delay = Duration::from_millis(30);
        let mut sim = Simulation::new(cfg, RandDice(StdRng::seed_from_u64(42))).unwrap();
        let mut now = t0;
        for tick in 0..400u32 {
            now += Duration::from_millis(16);
            if tick % 25 == 0 {
                sim.spawn_piece(((tick * 13) % 96) as f32, now);
            }
            if tick % 3 == 0 {
                sim.spawn_grain(((tick * 7) % 96) as f32);
            }
            if tick % 2 == 0 {
                sim.move_left();
            } else {
                sim.move_right();
            }
            sim.advance(now);
            assert_eq!(sim.grid.check_invariants(), Ok(()), "tick {tick}");
            for p in sim.grid.particles() {
                assert!(p.x >= 0.0 && p.x < 96.0 && p.y >= 0.0 && p.y < 128.0);
            }
        }
        let s = sim.stats();
        assert_eq!(s.spawned, sim.grains().count() as u64 + s.cleared);
    }

    #[test]
    fn test_reset_empties_everything() {
        let t0 = Instant::now();
        let mut sim = Simulation::new(test_config(10, 10), FixedDice::still()).unwrap();
        sim.spawn_piece(40.0, t0);
        sim.advance(t0);
        sim.reset();
        assert_eq!(sim.grains().count(), 0);
        assert!(sim.active_piece().is_none());
        assert_eq!(sim.stats(), Stats::default());
        assert!(sim.spawn_piece(40.0, t0));
    }
}
