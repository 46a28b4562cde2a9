//! Anti-stall recovery
//!
//! Backstop for units the navigation layer fails to move: a unit that makes
//! no progress toward a distant goal for long enough is placed near the goal
//! directly.

use ahash::AHashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::BattleConfig;
use crate::core::types::{EntityId, Rect, Tick, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StallRecord {
    pub last_position: Vec2,
    pub stalled_ticks: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StallCheck {
    Fine,
    Stalled(Tick),
    Relocate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StallTracker {
    records: AHashMap<EntityId, StallRecord>,
}

impl StallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update one unit; `interval` is the ticks elapsed since the previous check
    pub fn check(
        &mut self,
        id: EntityId,
        position: Vec2,
        goal: Option<Vec2>,
        interval: Tick,
        config: &BattleConfig,
    ) -> StallCheck {
        if !self.records.contains_key(&id) {
            self.records.insert(
                id,
                StallRecord {
                    last_position: position,
                    stalled_ticks: 0,
                },
            );
            return StallCheck::Fine;
        }
        let Some(record) = self.records.get_mut(&id) else {
            return StallCheck::Fine;
        };

        let moved = position.distance(&record.last_position);
        record.last_position = position;

        let Some(goal) = goal else {
            record.stalled_ticks = 0;
            return StallCheck::Fine;
        };
        if position.distance_squared(&goal) < config.stall_teleport_distance * config.stall_teleport_distance {
            record.stalled_ticks = 0;
            return StallCheck::Fine;
        }

        if moved < config.stall_move_epsilon {
            record.stalled_ticks += interval;
        } else {
            record.stalled_ticks = 0;
        }

        if record.stalled_ticks > config.stall_ticks_limit {
            record.stalled_ticks = 0;
            StallCheck::Relocate
        } else if record.stalled_ticks > 0 {
            StallCheck::Stalled(record.stalled_ticks)
        } else {
            StallCheck::Fine
        }
    }

    pub fn forget(&mut self, id: EntityId) {
        self.records.remove(&id);
    }

    pub fn stalled_ticks(&self, id: EntityId) -> Tick {
        self.records.get(&id).map_or(0, |r| r.stalled_ticks)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Jittered point near `goal`, kept inside the zone
pub fn relocation_point<R: Rng>(goal: Vec2, zone: &Rect, rng: &mut R, config: &BattleConfig) -> Vec2 {
    let jitter = config.stall_jitter.max(0.0);
    let offset = if jitter > 0.0 {
        Vec2::new(rng.gen_range(-jitter..=jitter), rng.gen_range(-jitter..=jitter))
    } else {
        Vec2::ZERO
    };
    zone.clamp_inside(goal + offset, config.zone_edge_margin)
}
