//! Slope advisor: which way, if any, a grain should slide given the pile around it.

use super::dice::Dice;
use super::grid::Grid;
use super::particle::Cell;

/// Lateral slide direction for the grain at `cell`: -1 (left), 0 (stay) or +1 (right).
///
/// Only occupancy (Settled grains) is consulted. Columns beyond the grid edge count as
/// blocked laterals and as absent support; a returned direction is a suggestion and the
/// caller still checks the destination before moving.
pub fn direction<D: Dice>(grid: &Grid, cell: Cell, height_threshold: usize, dice: &mut D) -> i32 {
    let (w, h) = grid.dims();
    let Cell { cx, cy } = cell;
    let has_left = cx > 0;
    let has_right = cx + 1 < w;

    let left_run = if has_left { empty_run(grid, cx - 1, cy, height_threshold) } else { 0 };
    let right_run = if has_right { empty_run(grid, cx + 1, cy, height_threshold) } else { 0 };

    let left_empty = has_left && !grid.occupied(Cell::new(cx - 1, cy));
    let right_empty = has_right && !grid.occupied(Cell::new(cx + 1, cy));

    // 1. Steep drop on at least one side.
    if left_run > height_threshold || right_run > height_threshold {
        return if left_run > right_run {
            if left_empty { -1 } else { 0 }
        } else if right_run > left_run {
            if right_empty { 1 } else { 0 }
        } else {
            match (left_empty, right_empty) {
                (true, true) => dice.side(),
                (true, false) => -1,
                (false, true) => 1,
                (false, false) => 0,
            }
        };
    }

    // 2. Local support from the three cells below.
    if cy + 1 >= h {
        return 0;
    }
    let below = cy + 1;
    if grid.occupied(Cell::new(cx, below)) {
        return 0;
    }
    let left_support = has_left && grid.occupied(Cell::new(cx - 1, below));
    let right_support = has_right && grid.occupied(Cell::new(cx + 1, below));

    match (left_support, right_support) {
        (true, true) => {
            if dice.roll(0.5) {
                dice.side()
            } else {
                0
            }
        }
        (true, false) if left_empty => 1,
        (false, true) if right_empty => -1,
        (false, false) if left_empty && right_empty => dice.side(),
        _ => 0,
    }
}

/// Consecutive empty cells straight down column `x` from row `y`, stopping one past `cap`.
fn empty_run(grid: &Grid, x: usize, y: usize, cap: usize) -> usize {
    let (_, h) = grid.dims();
    let mut run = 0;
    let mut row = y;
    while row < h && !grid.occupied(Cell::new(x, row)) {
        run += 1;
        row += 1;
        if run > cap {
            break;
        }
    }
    run
}
