//! Zone search constants
//!
//! Pass thresholds are sized for block-scale terrain; tune per target scale.

// Sampling
pub const SAMPLE_STEP: i32 = 4;
pub const MAX_SAMPLES: usize = 1024;

// Pass gates
pub const MAX_FLUID_FRACTION: f32 = 0.05;
pub const MAX_HEIGHT_RANGE: i32 = 14;
pub const MAX_HEIGHT_STDDEV: f32 = 4.0;
pub const MAX_ADJACENT_STEP: i32 = 1;

// Score weights (lower score is better)
pub const FLUID_WEIGHT: f32 = 200.0;
pub const RANGE_WEIGHT: f32 = 1.0;
pub const STDDEV_WEIGHT: f32 = 3.0;
pub const STEP_WEIGHT: f32 = 4.0;

// Between-ness penalty
pub const PERPENDICULAR_WEIGHT: f32 = 0.1;
pub const MIDPOINT_WEIGHT: f32 = 0.05;
pub const OUTSIDE_SEGMENT_PENALTY: f32 = 60.0;
pub const SEGMENT_EDGE_PENALTY: f32 = 15.0;
pub const SEGMENT_EDGE_FRACTION: f32 = 0.2;

// Search shape
pub const MIN_HALF_SIZE: i32 = 24;
pub const MAX_HALF_SIZE: i32 = 96;
pub const HALF_SIZE_SHRINK: f32 = 0.75;
pub const SEARCH_RADII: [i32; 5] = [0, 32, 64, 128, 192];
pub const CANDIDATE_STEP: i32 = 16;
/// Outer bound of the territory-only fallback sweep
pub const FALLBACK_RADIUS_LIMIT: i32 = 4096;
/// Ring width of the fallback sweep past the configured radii
pub const FALLBACK_RING_WIDTH: i32 = 48;

// Per-tick budget
pub const TIME_BUDGET_MICROS: u64 = 2000;
pub const MAX_CANDIDATES_PER_TICK: u32 = 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radii_ascending() {
        assert!(SEARCH_RADII.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(SEARCH_RADII[0], 0);
    }

    #[test]
    fn test_half_size_bounds() {
        assert!(MIN_HALF_SIZE > 0 && MIN_HALF_SIZE <= MAX_HALF_SIZE);
        assert!(HALF_SIZE_SHRINK > 0.0 && HALF_SIZE_SHRINK < 1.0);
    }
}
