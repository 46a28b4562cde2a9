//! Procedural heightmap terrain
//!
//! Relief is a coarse lattice of random heights with bilinear interpolation;
//! features (water, trenches, plateaus) are stamped over it. Nothing is stored
//! per block, so arbitrarily large worlds cost nothing until queried.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::Rect;
use crate::world::TerrainOracle;

/// Terrain stamped over the base relief
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TerrainFeature {
    /// Surface water over the area
    Water(Rect),
    /// Ground lowered by `depth` over the area
    Trench { area: Rect, depth: i32 },
    /// Ground forced to an absolute height over the area
    Plateau { area: Rect, height: i32 },
}

/// Coarse random lattice, origin at its first node
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Relief {
    origin_x: i32,
    origin_z: i32,
    cell: i32,
    cols: usize,
    rows: usize,
    heights: Vec<f32>,
}

impl Relief {
    fn node(&self, col: usize, row: usize) -> f32 {
        let col = col.min(self.cols - 1);
        let row = row.min(self.rows - 1);
        self.heights[row * self.cols + col]
    }

    fn sample(&self, x: i32, z: i32) -> f32 {
        let fx = ((x - self.origin_x) as f32 / self.cell as f32).max(0.0);
        let fz = ((z - self.origin_z) as f32 / self.cell as f32).max(0.0);
        let (c0, r0) = (fx.floor() as usize, fz.floor() as usize);
        let (tx, tz) = (fx.fract(), fz.fract());

        let top = self.node(c0, r0) * (1.0 - tx) + self.node(c0 + 1, r0) * tx;
        let bottom = self.node(c0, r0 + 1) * (1.0 - tx) + self.node(c0 + 1, r0 + 1) * tx;
        top * (1.0 - tz) + bottom * tz
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heightmap {
    pub base_height: i32,
    relief: Option<Relief>,
    pub features: Vec<TerrainFeature>,
    /// Everything outside is reported as not loaded; `None` loads everything
    pub loaded: Option<Rect>,
    pub flooded: bool,
}

impl Heightmap {
    /// Flat, dry, fully loaded ground
    pub fn flat(height: i32) -> Self {
        Self {
            base_height: height,
            relief: None,
            features: Vec::new(),
            loaded: None,
            flooded: false,
        }
    }

    /// Water everywhere
    pub fn flooded(height: i32) -> Self {
        Self {
            flooded: true,
            ..Self::flat(height)
        }
    }

    /// Rolling hills over `bounds` with peaks up to `amplitude` above base
    pub fn hills(height: i32, bounds: Rect, amplitude: f32, cell: i32, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cell = cell.max(1);
        let cols = (bounds.width() / cell + 2) as usize;
        let rows = (bounds.depth() / cell + 2) as usize;
        let heights = (0..cols * rows).map(|_| rng.gen_range(0.0..=amplitude)).collect();

        Self {
            relief: Some(Relief {
                origin_x: bounds.min_x,
                origin_z: bounds.min_z,
                cell,
                cols,
                rows,
                heights,
            }),
            ..Self::flat(height)
        }
    }

    pub fn with_feature(mut self, feature: TerrainFeature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_water(self, area: Rect) -> Self {
        self.with_feature(TerrainFeature::Water(area))
    }

    pub fn with_trench(self, area: Rect, depth: i32) -> Self {
        self.with_feature(TerrainFeature::Trench { area, depth })
    }

    pub fn with_loaded(mut self, area: Rect) -> Self {
        self.loaded = Some(area);
        self
    }
}

impl TerrainOracle for Heightmap {
    fn ground_height(&self, x: i32, z: i32) -> i32 {
        let mut height = self.base_height
            + self
                .relief
                .as_ref()
                .map(|r| r.sample(x, z).round() as i32)
                .unwrap_or(0);

        for feature in &self.features {
            match feature {
                TerrainFeature::Trench { area, depth } if area.contains_block(x, z) => {
                    height -= depth;
                }
                TerrainFeature::Plateau { area, height: h } if area.contains_block(x, z) => {
                    height = *h;
                }
                _ => {}
            }
        }
        height
    }

    fn has_surface_fluid(&self, x: i32, z: i32) -> bool {
        self.flooded
            || self
                .features
                .iter()
                .any(|f| matches!(f, TerrainFeature::Water(area) if area.contains_block(x, z)))
    }

    fn region_loaded(&self, x: i32, z: i32) -> bool {
        self.loaded.map_or(true, |area| area.contains_block(x, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_is_flat_and_dry() {
        let map = Heightmap::flat(64);
        assert_eq!(map.ground_height(-5000, 12345), 64);
        assert!(!map.has_surface_fluid(0, 0));
        assert!(map.region_loaded(1_000_000, -1_000_000));
    }

    #[test]
    fn test_trench_lowers_ground() {
        let map = Heightmap::flat(64).with_trench(Rect::new(0, -100, 3, 100), 10);
        assert_eq!(map.ground_height(1, 0), 54);
        assert_eq!(map.ground_height(4, 0), 64);
    }

    #[test]
    fn test_water_and_loaded_bounds() {
        let map = Heightmap::flat(64)
            .with_water(Rect::new(0, 0, 9, 9))
            .with_loaded(Rect::new(-50, -50, 50, 50));
        assert!(map.has_surface_fluid(5, 5));
        assert!(!map.has_surface_fluid(10, 5));
        assert!(map.region_loaded(50, 50));
        assert!(!map.region_loaded(51, 0));
    }

    #[test]
    fn test_hills_stay_within_amplitude() {
        let bounds = Rect::new(0, 0, 256, 256);
        let map = Heightmap::hills(64, bounds, 20.0, 32, 7);
        for x in (0..=256).step_by(16) {
            for z in (0..=256).step_by(16) {
                let h = map.ground_height(x, z);
                assert!((64..=84).contains(&h), "height {} out of range", h);
            }
        }
    }

    #[test]
    fn test_hills_are_seeded() {
        let bounds = Rect::new(0, 0, 128, 128);
        let a = Heightmap::hills(64, bounds, 20.0, 32, 99);
        let b = Heightmap::hills(64, bounds, 20.0, 32, 99);
        assert_eq!(a.ground_height(40, 70), b.ground_height(40, 70));
    }
}
