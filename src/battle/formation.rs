//! Formation geometry and slot bookkeeping
//!
//! Columns run across the forward vector, rows stack behind the leader along
//! `-forward`. The ranged block sits behind the deepest melee row.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::battle::combatant::{Role, Side};
use crate::core::config::BattleConfig;
use crate::core::types::{EntityId, Vec2};
use crate::world::SpeedTier;

/// World position of slot `index` in a block anchored at `anchor`
pub fn slot_position(anchor: Vec2, forward: Vec2, index: u32, columns: u32, spacing: f32, behind: f32) -> Vec2 {
    let forward = facing_or_default(forward);
    let right = forward.perpendicular();
    let columns = columns.max(1);

    let col = (index % columns) as f32;
    let row = (index / columns) as f32;
    let lateral = (col - (columns - 1) as f32 / 2.0) * spacing;

    anchor + right * lateral - forward * (behind + row * spacing)
}

/// Unit forward vector, or +z when `forward` is degenerate
pub fn facing_or_default(forward: Vec2) -> Vec2 {
    let n = forward.normalize();
    if n == Vec2::ZERO {
        Vec2::new(0.0, 1.0)
    } else {
        n
    }
}

/// Slot indices in use per (side, role)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotBook {
    taken: [[BTreeSet<u32>; 2]; 2],
}

impl SlotBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the lowest unused index
    pub fn assign(&mut self, side: Side, role: Role) -> u32 {
        let taken = &mut self.taken[side.index()][role.index()];
        let slot = (0..).find(|i| !taken.contains(i)).unwrap_or(0);
        taken.insert(slot);
        slot
    }

    pub fn release(&mut self, side: Side, role: Role, slot: u32) {
        self.taken[side.index()][role.index()].remove(&slot);
    }

    pub fn is_taken(&self, side: Side, role: Role, slot: u32) -> bool {
        self.taken[side.index()][role.index()].contains(&slot)
    }

    pub fn count(&self, side: Side, role: Role) -> usize {
        self.taken[side.index()][role.index()].len()
    }

    /// Rows covered by the block, counting gaps left by the dead
    pub fn rows(&self, side: Side, role: Role, columns: u32) -> u32 {
        self.taken[side.index()][role.index()]
            .iter()
            .next_back()
            .map_or(0, |max| max / columns.max(1) + 1)
    }
}

/// Distance behind the anchor at which a role's block starts
pub fn block_offset(slots: &SlotBook, side: Side, role: Role, config: &BattleConfig) -> f32 {
    match role {
        Role::Melee => config.formation_behind_leader,
        Role::Ranged => {
            let melee_rows = slots.rows(side, Role::Melee, config.formation_columns);
            config.formation_behind_leader
                + melee_rows as f32 * config.formation_spacing
                + if melee_rows > 0 { config.ranged_block_gap } else { 0.0 }
        }
    }
}

/// Movement command for a unit that drifted from its slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotMove {
    pub id: EntityId,
    pub point: Vec2,
    pub tier: SpeedTier,
}

/// `None` while the unit is within tolerance of its slot
pub fn slot_move(id: EntityId, current: Vec2, slot: Vec2, config: &BattleConfig) -> Option<SlotMove> {
    let d_sq = current.distance_squared(&slot);
    if d_sq <= config.slot_tolerance * config.slot_tolerance {
        return None;
    }

    let tier = if d_sq > config.fast_tier_distance * config.fast_tier_distance {
        SpeedTier::Fast
    } else {
        SpeedTier::Slow
    };
    Some(SlotMove { id, point: slot, tier })
}
