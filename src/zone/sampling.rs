//! Height and fluid sampling over a candidate rectangle

use serde::{Deserialize, Serialize};

use crate::core::config::ZoneSearchConfig;
use crate::core::types::Rect;
use crate::world::TerrainOracle;

/// Regular lattice laid over a rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub step: i32,
    pub cols: usize,
    pub rows: usize,
}

impl GridShape {
    /// Grid starting at the rectangle's min corner, step widened until at most
    /// `max_samples` points remain
    pub fn fit(rect: &Rect, base_step: i32, max_samples: usize) -> Self {
        let mut step = base_step.max(1);
        loop {
            let cols = (rect.width() / step + 1) as usize;
            let rows = (rect.depth() / step + 1) as usize;
            if cols * rows <= max_samples.max(1) {
                return Self { step, cols, rows };
            }
            step += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// World block of grid cell (col, row)
    pub fn point(&self, rect: &Rect, col: usize, row: usize) -> (i32, i32) {
        (
            rect.min_x + col as i32 * self.step,
            rect.min_z + row as i32 * self.step,
        )
    }
}

/// Sampled heights and fluid flags, row-major
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightSample {
    pub area: Rect,
    pub shape: GridShape,
    pub heights: Vec<i32>,
    pub fluid: Vec<bool>,
}

impl HeightSample {
    /// Sample the terrain over `rect`
    ///
    /// Returns `None` if any sample point lies in a region that is not loaded.
    /// Nothing is ever loaded on the caller's behalf.
    pub fn collect<T: TerrainOracle + ?Sized>(terrain: &T, rect: &Rect, config: &ZoneSearchConfig) -> Option<Self> {
        let shape = GridShape::fit(rect, config.sample_step, config.max_samples);
        let mut heights = Vec::with_capacity(shape.len());
        let mut fluid = Vec::with_capacity(shape.len());

        for row in 0..shape.rows {
            for col in 0..shape.cols {
                let (x, z) = shape.point(rect, col, row);
                if !terrain.region_loaded(x, z) {
                    return None;
                }
                heights.push(terrain.ground_height(x, z));
                fluid.push(terrain.has_surface_fluid(x, z));
            }
        }

        Some(Self {
            area: *rect,
            shape,
            heights,
            fluid,
        })
    }

    pub fn cols(&self) -> usize {
        self.shape.cols
    }

    pub fn rows(&self) -> usize {
        self.shape.rows
    }

    pub fn index(&self, col: usize, row: usize) -> usize {
        row * self.shape.cols + col
    }

    pub fn height(&self, col: usize, row: usize) -> i32 {
        self.heights[self.index(col, row)]
    }

    pub fn is_fluid(&self, col: usize, row: usize) -> bool {
        self.fluid[self.index(col, row)]
    }
}
