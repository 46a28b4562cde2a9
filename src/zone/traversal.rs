//! Edge-to-edge walkability over a sampled grid

use std::collections::VecDeque;

use crate::zone::sampling::HeightSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    /// First column to last column
    WestEast,
    /// First row to last row
    NorthSouth,
}

/// True if a walker can cross the sample from one edge to the opposite edge
/// in either direction without stepping more than `max_step` between
/// neighbouring cells. Fluid cells are impassable.
pub fn is_traversable(sample: &HeightSample, max_step: i32) -> bool {
    sweep(sample, max_step, Sweep::WestEast) || sweep(sample, max_step, Sweep::NorthSouth)
}

fn sweep(sample: &HeightSample, max_step: i32, direction: Sweep) -> bool {
    let (cols, rows) = (sample.cols(), sample.rows());
    if cols == 0 || rows == 0 {
        return false;
    }

    let on_start = |col: usize, row: usize| match direction {
        Sweep::WestEast => col == 0,
        Sweep::NorthSouth => row == 0,
    };
    let on_goal = |col: usize, row: usize| match direction {
        Sweep::WestEast => col == cols - 1,
        Sweep::NorthSouth => row == rows - 1,
    };

    let mut visited = vec![false; cols * rows];
    let mut frontier = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if on_start(col, row) && !sample.is_fluid(col, row) {
                visited[sample.index(col, row)] = true;
                frontier.push_back((col, row));
            }
        }
    }

    while let Some((col, row)) = frontier.pop_front() {
        if on_goal(col, row) {
            return true;
        }

        let here = sample.height(col, row);
        for (nc, nr) in neighbours(col, row, cols, rows) {
            let idx = sample.index(nc, nr);
            if visited[idx] || sample.is_fluid(nc, nr) {
                continue;
            }
            if (sample.height(nc, nr) - here).abs() <= max_step {
                visited[idx] = true;
                frontier.push_back((nc, nr));
            }
        }
    }

    false
}

fn neighbours(col: usize, row: usize, cols: usize, rows: usize) -> impl Iterator<Item = (usize, usize)> {
    let mut out = Vec::with_capacity(4);
    if col > 0 {
        out.push((col - 1, row));
    }
    if col + 1 < cols {
        out.push((col + 1, row));
    }
    if row > 0 {
        out.push((col, row - 1));
    }
    if row + 1 < rows {
        out.push((col, row + 1));
    }
    out.into_iter()
}
