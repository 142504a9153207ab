//! Engine configuration. Every field is supplied by the caller; there are no defaults here.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Side length of one cell in pixels.
    pub cell_size: f32,
    /// Grid width in cells.
    pub width: usize,
    /// Grid height in cells.
    pub height: usize,
    /// Number of grain colours (palette length).
    pub colors: u8,
    /// Probability that a settled grain acts on a nonzero slope direction.
    pub slide_chance: f64,
    /// Empty-column run a neighbour needs before a grain slides toward it.
    pub height_threshold: usize,
    /// Side of the square block created by a piece spawn, in cells.
    pub piece_size: usize,
    /// Cells a piece moves per lateral input.
    pub piece_step: usize,
    /// Grace period between bridge detection and removal.
    pub flash_delay: Duration,
    /// Minimum time between two accepted piece spawns.
    pub spawn_delay: Duration,
    /// Probability of a cosmetic diagonal drift during free fall (0 disables).
    pub jitter_chance: f64,
    /// Track the last spawned block as a steerable piece.
    pub piece_control: bool,
    /// Detect and clear wall-to-wall colour bridges.
    pub bridge_clear: bool,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("cell size must be a positive finite number, got {0}")]
    CellSize(f32),
    #[error("grid {width}x{height} must be strictly larger than the {piece_size}-cell piece in both dimensions")]
    GridTooSmall {
        width: usize,
        height: usize,
        piece_size: usize,
    },
    #[error("palette must contain at least one colour")]
    EmptyPalette,
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("{name} must be within [0, 1], got {value}")]
    Probability { name: &'static str, value: f64 },
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(ConfigError::CellSize(self.cell_size));
        }
        if self.piece_size == 0 {
            return Err(ConfigError::Zero("piece size"));
        }
        if self.piece_step == 0 {
            return Err(ConfigError::Zero("piece step"));
        }
        if self.height_threshold == 0 {
            return Err(ConfigError::Zero("height threshold"));
        }
        if self.width <= self.piece_size || self.height <= self.piece_size {
            return Err(ConfigError::GridTooSmall {
                width: self.width,
                height: self.height,
                piece_size: self.piece_size,
            });
        }
        if self.colors == 0 {
            return Err(ConfigError::EmptyPalette);
        }
        for (name, value) in [
            ("slide chance", self.slide_chance),
            ("jitter chance", self.jitter_chance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }
        Ok(())
    }

    /// Canvas size in pixels.
    pub fn canvas_size(&self) -> (f32, f32) {
        (
            self.width as f32 * self.cell_size,
            self.height as f32 * self.cell_size,
        )
    }
}

#[cfg(test)]
pub(crate) fn test_config(width: usize, height: usize) -> SimConfig {
    SimConfig {
        cell_size: 8.0,
        width,
        height,
        colors: 4,
        slide_chance: 0.95,
        height_threshold: 2,
        piece_size: 3,
        piece_step: 1,
        flash_delay: Duration::from_millis(20),
        spawn_delay: Duration::from_millis(500),
        jitter_chance: 0.0,
        piece_control: true,
        bridge_clear: true,
    }
}
