//! Deferred removal: a detected bridge flashes for `delay` before its cells are cleared.

use super::particle::Cell;
use std::collections::HashSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
enum RemovalState {
    #[default]
    Idle,
    Pending {
        cells: HashSet<Cell>,
        since: Instant,
    },
}

#[derive(Debug, Clone)]
pub struct RemovalScheduler {
    delay: Duration,
    state: RemovalState,
}

impl RemovalScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: RemovalState::Idle,
        }
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, RemovalState::Pending { .. })
    }

    /// Flag `cells` for removal. Ignored while another set is pending or when empty.
    pub fn schedule(&mut self, cells: HashSet<Cell>, now: Instant) -> bool {
        if self.is_pending() || cells.is_empty() {
            return false;
        }
        self.state = RemovalState::Pending { cells, since: now };
        true
    }

    /// Hand back the flagged cells once the delay has elapsed, returning to Idle.
    pub fn poll(&mut self, now: Instant) -> Option<HashSet<Cell>> {
        let due = match &self.state {
            RemovalState::Pending { since, .. } => {
                now.saturating_duration_since(*since) >= self.delay
            }
            RemovalState::Idle => false,
        };
        if !due {
            return None;
        }
        match std::mem::take(&mut self.state) {
            RemovalState::Pending { cells, .. } => Some(cells),
            RemovalState::Idle => None,
        }
    }

    pub fn is_flagged(&self, cell: Cell) -> bool {
        match &self.state {
            RemovalState::Pending { cells, .. } => cells.contains(&cell),
            RemovalState::Idle => false,
        }
    }
}
