//! Wall-to-wall clear: one colour connects the left column to the right column; the path
//! may be slanted (8-neighbour).

use super::grid::Grid;
use super::particle::Cell;
use std::collections::HashSet;

const NEIGHBOURS_8: [(i32, i32); 8] = [
    (-1, -1), (-1, 0), (-1, 1),
    (0, -1),           (0, 1),
    (1, -1),  (1, 0),  (1, 1),
];

/// Union of every bridging region found in one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bridge {
    /// Number of independent regions that touched both walls.
    pub regions: usize,
    pub cells: HashSet<Cell>,
}

impl Bridge {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Flood-fill from each occupied cell of column 0, top to bottom, over same-coloured
/// occupied cells. One `visited` set is shared by all seeds, so a scan costs
/// O(occupied cells).
pub fn find_bridging_region(grid: &Grid) -> Bridge {
    let (w, h) = grid.dims();
    let mut bridge = Bridge::default();
    if w == 0 {
        return bridge;
    }
    let color_at = |c: Cell| {
        if grid.occupied(c) {
            grid.particle_at(c).map(|p| p.color)
        } else {
            None
        }
    };

    let mut visited = HashSet::new();
    for start_y in 0..h {
        let start = Cell::new(0, start_y);
        let Some(color) = color_at(start) else {
            continue;
        };
        if !visited.insert(start) {
            continue;
        }

        let mut component = Vec::new();
        let mut stack = vec![start];
        let mut touches_right = false;

        while let Some(cell) = stack.pop() {
            component.push(cell);
            if cell.cx == w - 1 {
                touches_right = true;
            }
            for (dx, dy) in NEIGHBOURS_8 {
                let Some(next) = cell.offset(dx, dy, w, h) else {
                    continue;
                };
                if color_at(next) == Some(color) && visited.insert(next) {
                    stack.push(next);
                }
            }
        }

        if touches_right {
            bridge.regions += 1;
            bridge.cells.extend(component);
        }
    }
    bridge
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(colors: &[u8]) -> Grid {
        let mut g = Grid::new(colors.len(), 1, 8.0);
        for (cx, &c) in colors.iter().enumerate() {
            g.place_settled(Cell::new(cx, 0), c);
        }
        g
    }

    #[test]
    fn test_full_row_bridges() {
        let g = row(&[2; 10]);
        let b = find_bridging_region(&g);
        assert_eq!(b.regions, 1);
        assert_eq!(b.cells.len(), 10);
        assert!((0..10).all(|cx| b.cells.contains(&Cell::new(cx, 0))));
    }

    #[test]
    fn test_broken_row_does_not_bridge() {
        let mut colors = [2u8; 10];
        colors[5] = 3;
        let b = find_bridging_region(&row(&colors));
        assert!(b.is_empty());
        assert_eq!(b.regions, 0);
    }

    #[test]
    fn test_diagonal_path_bridges() {
        // Staircase of colour 1 from bottom-left to top-right, with other colours around it.
        let mut g = Grid::new(4, 4, 8.0);
        for i in 0..4 {
            g.place_settled(Cell::new(i, 3 - i), 1);
        }
        g.place_settled(Cell::new(1, 3), 0);
        g.place_settled(Cell::new(2, 3), 0);
        let b = find_bridging_region(&g);
        assert_eq!(b.cells.len(), 4);
        assert!(!b.cells.contains(&Cell::new(1, 3)));
    }

    #[test]
    fn test_falling_grains_are_ignored() {
        let mut g = Grid::new(3, 1, 8.0);
        g.place_settled(Cell::new(0, 0), 0);
        g.insert(8.0, 0.0, 0);
        g.place_settled(Cell::new(2, 0), 0);
        assert!(find_bridging_region(&g).is_empty());
    }

    #[test]
    fn test_independent_regions_are_unioned() {
        let mut g = Grid::new(3, 3, 8.0);
        for cx in 0..3 {
            g.place_settled(Cell::new(cx, 2), 0);
            g.place_settled(Cell::new(cx, 0), 1);
        }
        g.place_settled(Cell::new(0, 1), 2);
        let b = find_bridging_region(&g);
        assert_eq!(b.regions, 2);
        assert_eq!(b.cells.len(), 6);
    }
}
