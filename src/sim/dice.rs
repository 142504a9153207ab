//! Single source of randomness for the engine: slide tie-breaks, jitter, spawn colour.

use rand::Rng;
use rand::rngs::StdRng;

pub trait Dice {
    /// True with probability `p`.
    fn roll(&mut self, p: f64) -> bool;
    /// -1 or +1 with equal probability.
    fn side(&mut self) -> i32;
    /// Uniform index in `0..n`; `n` is never zero.
    fn pick(&mut self, n: usize) -> usize;
}

/// [`Dice`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandDice<R = StdRng>(pub R);

impl<R: Rng> Dice for RandDice<R> {
    fn roll(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }

    fn side(&mut self) -> i32 {
        if self.0.gen_bool(0.5) { -1 } else { 1 }
    }

    fn pick(&mut self, n: usize) -> usize {
        self.0.gen_range(0..n.max(1))
    }
}
