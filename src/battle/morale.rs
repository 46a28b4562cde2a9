//! Side morale
//!
//! Morale only ever falls. Each casualty costs a base amount scaled by how many
//! casualties the side took inside the rolling window; leaders cost extra.
//! Zero morale is defeat.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::config::BattleConfig;
use crate::core::types::Tick;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "MoraleRecord")]
pub struct MoraleTrack {
    value: f32,
    start: f32,
    /// Ticks of casualties inside the rate window, oldest first
    recent: VecDeque<Tick>,
}

/// Unchecked wire form; clamped into a valid track on load
#[derive(Deserialize)]
struct MoraleRecord {
    value: f32,
    start: f32,
    #[serde(default)]
    recent: VecDeque<Tick>,
}

impl From<MoraleRecord> for MoraleTrack {
    fn from(record: MoraleRecord) -> Self {
        let start = if record.start.is_finite() { record.start.max(0.0) } else { 0.0 };
        let value = if record.value.is_finite() {
            record.value.clamp(0.0, start)
        } else {
            0.0
        };
        Self {
            value,
            start,
            recent: record.recent,
        }
    }
}

impl MoraleTrack {
    pub fn new(start: f32) -> Self {
        let start = start.max(0.0);
        Self {
            value: start,
            start,
            recent: VecDeque::new(),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn is_broken(&self) -> bool {
        self.value <= 0.0
    }

    /// Record a casualty at `now` and return the morale lost
    pub fn apply_casualty(&mut self, now: Tick, is_leader: bool, config: &BattleConfig) -> f32 {
        let window_start = now.saturating_sub(config.morale_rate_window);
        while self.recent.front().is_some_and(|&t| t < window_start) {
            self.recent.pop_front();
        }
        self.recent.push_back(now);

        let earlier = (self.recent.len() - 1) as f32;
        let scale = (1.0 + earlier * config.morale_rate_scale).min(config.morale_rate_cap);
        let mut loss = config.morale_base_loss * scale;
        if is_leader {
            loss += config.leader_death_penalty;
        }

        let before = self.value;
        self.value = (self.value - loss).max(0.0);
        before - self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_casualty_costs_base() {
        let config = BattleConfig::default();
        let mut morale = MoraleTrack::new(100.0);
        let lost = morale.apply_casualty(10, false, &config);
        assert!((lost - config.morale_base_loss).abs() < 1e-5);
    }

    #[test]
    fn test_burst_costs_more_than_trickle() {
        let config = BattleConfig::default();

        let mut burst = MoraleTrack::new(100.0);
        for _ in 0..10 {
            burst.apply_casualty(100, false, &config);
        }

        let mut trickle = MoraleTrack::new(100.0);
        for i in 0..10 {
            trickle.apply_casualty(i * (config.morale_rate_window + 1), false, &config);
        }

        assert!(burst.value() < trickle.value());
    }

    #[test]
    fn test_rate_scale_is_capped() {
        let config = BattleConfig::default();
        let mut morale = MoraleTrack::new(10_000.0);
        let mut last = 0.0;
        for _ in 0..200 {
            last = morale.apply_casualty(5, false, &config);
        }
        assert!((last - config.morale_base_loss * config.morale_rate_cap).abs() < 1e-3);
    }

    #[test]
    fn test_leader_penalty() {
        let config = BattleConfig::default();
        let mut morale = MoraleTrack::new(100.0);
        let lost = morale.apply_casualty(0, true, &config);
        assert!((lost - (config.morale_base_loss + config.leader_death_penalty)).abs() < 1e-5);
    }

    #[test]
    fn test_floor_at_zero() {
        let config = BattleConfig::default();
        let mut morale = MoraleTrack::new(5.0);
        for t in 0..20 {
            morale.apply_casualty(t, true, &config);
            assert!(morale.value() >= 0.0);
        }
        assert!(morale.is_broken());
    }

    #[test]
    fn test_load_clamps_out_of_range() {
        let high: MoraleTrack = serde_json::from_str(r#"{"value": 250.0, "start": 100.0}"#).unwrap();
        assert_eq!(high.value(), 100.0);

        let low: MoraleTrack = serde_json::from_str(r#"{"value": -3.0, "start": 100.0, "recent": [4, 5]}"#).unwrap();
        assert_eq!(low.value(), 0.0);
        assert!(low.is_broken());
    }
}
