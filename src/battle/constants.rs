//! Battle system constants - all tunable defaults in one place
//!
//! Distances are in blocks, durations in simulation ticks. These seed the
//! defaults of [`crate::core::config::BattleConfig`] and
//! [`crate::core::config::SettlementConfig`].

use crate::core::types::Tick;

// Refresh cadence
pub const FORMATION_REFRESH_TICKS: Tick = 10;
pub const TARGETING_REFRESH_TICKS: Tick = 5;
pub const STALL_CHECK_TICKS: Tick = 20;
pub const SUMMARY_PUSH_TICKS: Tick = 20;
pub const OBSERVER_ABSENCE_LIMIT_TICKS: Tick = 1200;

// Formation geometry
pub const FORMATION_COLUMNS: u32 = 6;
pub const FORMATION_SPACING: f32 = 2.0;
pub const FORMATION_BEHIND_LEADER: f32 = 4.0;
pub const RANGED_BLOCK_GAP: f32 = 4.0; // Extra gap between melee rows and ranged rows
pub const SLOT_TOLERANCE: f32 = 1.5;
pub const FAST_TIER_DISTANCE: f32 = 8.0;

// Engagement thresholds (engage < drop, hysteresis)
pub const MELEE_ENGAGE_RANGE: f32 = 12.0;
pub const MELEE_DROP_RANGE: f32 = 18.0;
pub const RANGED_ENGAGE_RANGE: f32 = 24.0;
pub const RANGED_DROP_RANGE: f32 = 32.0;
pub const REFORM_THRESHOLD: f32 = 3.0;

// Leaders
pub const LEADER_HOLD_DISTANCE: f32 = 4.0; // AI captains stop this far from the enemy anchor
pub const FORWARD_UPDATE_EPSILON: f32 = 0.25; // Commander movement that re-aims the formation
pub const RALLY_DRIFT_PER_REFRESH: f32 = 4.0;
pub const RALLY_FRACTION: f32 = 0.35; // Rally point offset from zone center, fraction of half-width

// Anti-stall
pub const STALL_TELEPORT_DISTANCE: f32 = 4.0;
pub const STALL_MOVE_EPSILON: f32 = 0.5;
pub const STALL_TICKS_LIMIT: Tick = 100;
pub const STALL_JITTER: f32 = 2.0;
pub const ZONE_EDGE_MARGIN: f32 = 4.0;

// Morale
pub const MORALE_START: f32 = 100.0;
pub const MORALE_BASE_LOSS: f32 = 1.5;
pub const MORALE_RATE_WINDOW_TICKS: Tick = 200;
pub const MORALE_RATE_SCALE: f32 = 0.1; // Per casualty already inside the window
pub const MORALE_RATE_CAP: f32 = 3.0;
pub const LEADER_DEATH_MORALE_PENALTY: f32 = 15.0;

// Tickets and respawn
pub const RESPAWN_DELAY_TICKS: Tick = 60;
pub const RESPAWN_SCATTER: f32 = 3.0;

// Commands
pub const MAX_ORDER_RANGE: f32 = 96.0;

// Settlement (basis points, 10_000 = 100%)
pub const ROUT_TRANSFER_MIN_BP: u32 = 1000;
pub const ROUT_TRANSFER_MAX_BP: u32 = 2500;
pub const PEACE_TRANSFER_MIN_BP: u32 = 300;
pub const PEACE_TRANSFER_MAX_BP: u32 = 800;
pub const SUBORDINATION_CHANCE: f64 = 0.35;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engage_drop_hysteresis() {
        assert!(MELEE_ENGAGE_RANGE < MELEE_DROP_RANGE);
        assert!(RANGED_ENGAGE_RANGE < RANGED_DROP_RANGE);
        assert!(MELEE_ENGAGE_RANGE < RANGED_ENGAGE_RANGE);
    }

    #[test]
    fn test_slot_tolerance_below_reform_threshold() {
        assert!(SLOT_TOLERANCE <= REFORM_THRESHOLD);
        assert!(REFORM_THRESHOLD < MELEE_ENGAGE_RANGE);
    }

    #[test]
    fn test_transfer_ranges_ordered() {
        assert!(PEACE_TRANSFER_MAX_BP <= ROUT_TRANSFER_MIN_BP);
        assert!(ROUT_TRANSFER_MAX_BP <= 10_000);
    }
}
