//! Candidate zone quality and frontline placement penalty

use serde::{Deserialize, Serialize};

use crate::core::config::ZoneSearchConfig;
use crate::core::types::Vec2;
use crate::zone::sampling::HeightSample;
use crate::zone::traversal::is_traversable;

/// Terrain metrics for one sampled candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneQuality {
    pub fluid_fraction: f32,
    pub height_range: i32,
    pub height_stddev: f32,
    pub max_adjacent_step: i32,
    pub traversable: bool,
    /// Weighted terrain score, lower is better; defined even for failures
    pub score: f32,
    pub passes: bool,
}

/// Score a sample against the pass gates
pub fn assess(sample: &HeightSample, config: &ZoneSearchConfig) -> ZoneQuality {
    let count = sample.heights.len().max(1) as f32;

    let wet = sample.fluid.iter().filter(|&&f| f).count() as f32;
    let fluid_fraction = wet / count;

    let min = sample.heights.iter().copied().min().unwrap_or(0);
    let max = sample.heights.iter().copied().max().unwrap_or(0);
    let height_range = max - min;

    let mean = sample.heights.iter().map(|&h| h as f32).sum::<f32>() / count;
    let variance = sample
        .heights
        .iter()
        .map(|&h| {
            let d = h as f32 - mean;
            d * d
        })
        .sum::<f32>()
        / count;
    let height_stddev = variance.sqrt();

    let max_adjacent_step = max_adjacent_step(sample);
    let traversable = is_traversable(sample, config.max_adjacent_step);

    let score = fluid_fraction * config.fluid_weight
        + height_range as f32 * config.range_weight
        + height_stddev * config.stddev_weight
        + max_adjacent_step as f32 * config.step_weight;

    let passes = fluid_fraction <= config.max_fluid_fraction
        && height_range <= config.max_height_range
        && height_stddev <= config.max_height_stddev
        && max_adjacent_step <= config.max_adjacent_step
        && traversable;

    ZoneQuality {
        fluid_fraction,
        height_range,
        height_stddev,
        max_adjacent_step,
        traversable,
        score,
        passes,
    }
}

/// Largest height difference between 4-connected samples
fn max_adjacent_step(sample: &HeightSample) -> i32 {
    let mut worst = 0;
    for row in 0..sample.rows() {
        for col in 0..sample.cols() {
            let h = sample.height(col, row);
            if col + 1 < sample.cols() {
                worst = worst.max((sample.height(col + 1, row) - h).abs());
            }
            if row + 1 < sample.rows() {
                worst = worst.max((sample.height(col, row + 1) - h).abs());
            }
        }
    }
    worst
}

/// Segment joining the closest points of the two factions' anchors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frontline {
    pub a: Vec2,
    pub b: Vec2,
}

impl Frontline {
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    pub fn center(&self) -> Vec2 {
        self.a.lerp(&self.b, 0.5)
    }

    pub fn length(&self) -> f32 {
        self.a.distance(&self.b)
    }

    /// Penalty for placing a zone center at `point`; zero at the segment midpoint
    pub fn penalty(&self, point: Vec2, config: &ZoneSearchConfig) -> f32 {
        let segment = self.b - self.a;
        let len_sq = segment.dot(&segment);
        if len_sq < 1e-6 {
            return point.distance(&self.a) * config.perpendicular_weight;
        }

        let len = len_sq.sqrt();
        let rel = point - self.a;
        let t = rel.dot(&segment) / len_sq;
        let perpendicular = rel.cross(&segment).abs() / len;

        let mut penalty = perpendicular * config.perpendicular_weight
            + (t - 0.5).abs() * len * config.midpoint_weight;

        if !(0.0..=1.0).contains(&t) {
            penalty += config.outside_segment_penalty;
        } else if t < config.segment_edge_fraction || t > 1.0 - config.segment_edge_fraction {
            penalty += config.segment_edge_penalty;
        }
        penalty
    }
}
