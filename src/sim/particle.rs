//! Grain state: cell coordinates, particle identity and the Falling/Settled tag.

/// Grid coordinates `(cx, cy)`; `cy = 0` is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub cx: usize,
    pub cy: usize,
}

impl Cell {
    #[inline]
    pub const fn new(cx: usize, cy: usize) -> Self {
        Self { cx, cy }
    }

    /// Neighbour at signed offset, or None when it would leave the `w x h` grid.
    #[inline]
    pub fn offset(self, dx: i32, dy: i32, w: usize, h: usize) -> Option<Self> {
        let nx = self.cx as i64 + i64::from(dx);
        let ny = self.cy as i64 + i64::from(dy);
        if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
            return None;
        }
        Some(Self::new(nx as usize, ny as usize))
    }
}

/// Stable handle for a grain; survives removal of other grains from the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticleId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrainState {
    Falling,
    Settled,
}

/// One grain. Position is continuous (pixels); its cell is `floor(position / cell_size)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: ParticleId,
    pub x: f32,
    pub y: f32,
    /// Palette index, `0..colors`.
    pub color: u8,
    pub state: GrainState,
}

impl Particle {
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.state == GrainState::Settled
    }
}
