//! Engine configuration with documented defaults
//!
//! Every field defaults to the matching constant in `battle::constants` or
//! `zone::constants`, so a TOML file only needs to list what it overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::battle::constants as bc;
use crate::core::error::{Result, WarfrontError};
use crate::core::types::Tick;
use crate::zone::constants as zc;

/// Top-level configuration, one section per subsystem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarfrontConfig {
    pub battle: BattleConfig,
    pub zone: ZoneSearchConfig,
    pub settlement: SettlementConfig,
}

impl WarfrontConfig {
    /// Load from a TOML file and validate
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: WarfrontConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        self.battle.validate()?;
        self.zone.validate()?;
        self.settlement.validate()
    }
}

/// Per-battle tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    // === CADENCE ===
    pub formation_refresh_ticks: Tick,
    pub targeting_refresh_ticks: Tick,
    pub stall_check_ticks: Tick,
    pub summary_push_ticks: Tick,
    /// Ticks without an interested observer in the zone before cleanup
    pub observer_absence_limit: Tick,

    // === FORMATION ===
    pub formation_columns: u32,
    pub formation_spacing: f32,
    /// Distance from the leader to the first row, along -forward
    pub formation_behind_leader: f32,
    pub ranged_block_gap: f32,
    /// A unit closer than this to its slot receives no move command
    pub slot_tolerance: f32,
    /// Beyond this distance from the slot the fast speed tier is used
    pub fast_tier_distance: f32,

    // === ENGAGEMENT ===
    pub melee_engage_range: f32,
    pub melee_drop_range: f32,
    pub ranged_engage_range: f32,
    pub ranged_drop_range: f32,
    pub reform_threshold: f32,
    pub leader_hold_distance: f32,
    pub rally_drift_per_refresh: f32,
    pub rally_fraction: f32,

    // === ANTI-STALL ===
    pub stall_teleport_distance: f32,
    pub stall_move_epsilon: f32,
    pub stall_ticks_limit: Tick,
    pub stall_jitter: f32,
    pub zone_edge_margin: f32,

    // === MORALE ===
    pub morale_start: f32,
    pub morale_base_loss: f32,
    pub morale_rate_window: Tick,
    pub morale_rate_scale: f32,
    pub morale_rate_cap: f32,
    pub leader_death_penalty: f32,

    // === TICKETS ===
    pub respawn_delay: Tick,
    pub respawn_scatter: f32,

    // === COMMANDS ===
    pub max_order_range: f32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            formation_refresh_ticks: bc::FORMATION_REFRESH_TICKS,
            targeting_refresh_ticks: bc::TARGETING_REFRESH_TICKS,
            stall_check_ticks: bc::STALL_CHECK_TICKS,
            summary_push_ticks: bc::SUMMARY_PUSH_TICKS,
            observer_absence_limit: bc::OBSERVER_ABSENCE_LIMIT_TICKS,

            formation_columns: bc::FORMATION_COLUMNS,
            formation_spacing: bc::FORMATION_SPACING,
            formation_behind_leader: bc::FORMATION_BEHIND_LEADER,
            ranged_block_gap: bc::RANGED_BLOCK_GAP,
            slot_tolerance: bc::SLOT_TOLERANCE,
            fast_tier_distance: bc::FAST_TIER_DISTANCE,

            melee_engage_range: bc::MELEE_ENGAGE_RANGE,
            melee_drop_range: bc::MELEE_DROP_RANGE,
            ranged_engage_range: bc::RANGED_ENGAGE_RANGE,
            ranged_drop_range: bc::RANGED_DROP_RANGE,
            reform_threshold: bc::REFORM_THRESHOLD,
            leader_hold_distance: bc::LEADER_HOLD_DISTANCE,
            rally_drift_per_refresh: bc::RALLY_DRIFT_PER_REFRESH,
            rally_fraction: bc::RALLY_FRACTION,

            stall_teleport_distance: bc::STALL_TELEPORT_DISTANCE,
            stall_move_epsilon: bc::STALL_MOVE_EPSILON,
            stall_ticks_limit: bc::STALL_TICKS_LIMIT,
            stall_jitter: bc::STALL_JITTER,
            zone_edge_margin: bc::ZONE_EDGE_MARGIN,

            morale_start: bc::MORALE_START,
            morale_base_loss: bc::MORALE_BASE_LOSS,
            morale_rate_window: bc::MORALE_RATE_WINDOW_TICKS,
            morale_rate_scale: bc::MORALE_RATE_SCALE,
            morale_rate_cap: bc::MORALE_RATE_CAP,
            leader_death_penalty: bc::LEADER_DEATH_MORALE_PENALTY,

            respawn_delay: bc::RESPAWN_DELAY_TICKS,
            respawn_scatter: bc::RESPAWN_SCATTER,

            max_order_range: bc::MAX_ORDER_RANGE,
        }
    }
}

impl BattleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.melee_engage_range >= self.melee_drop_range
            || self.ranged_engage_range >= self.ranged_drop_range
        {
            return Err(WarfrontError::InvalidConfig(
                "engage ranges must be strictly below their drop ranges".into(),
            ));
        }
        if self.slot_tolerance > self.reform_threshold {
            return Err(WarfrontError::InvalidConfig(format!(
                "slot_tolerance ({}) should be <= reform_threshold ({})",
                self.slot_tolerance, self.reform_threshold
            )));
        }
        if self.formation_columns == 0 {
            return Err(WarfrontError::InvalidConfig("formation_columns must be positive".into()));
        }
        if self.formation_refresh_ticks == 0
            || self.targeting_refresh_ticks == 0
            || self.stall_check_ticks == 0
            || self.summary_push_ticks == 0
        {
            return Err(WarfrontError::InvalidConfig("refresh intervals must be positive".into()));
        }
        if self.morale_start <= 0.0 {
            return Err(WarfrontError::InvalidConfig("morale_start must be positive".into()));
        }
        Ok(())
    }
}

/// Terrain zone search tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSearchConfig {
    // === SAMPLING ===
    pub sample_step: i32,
    pub max_samples: usize,

    // === PASS GATES ===
    pub max_fluid_fraction: f32,
    pub max_height_range: i32,
    pub max_height_stddev: f32,
    pub max_adjacent_step: i32,

    // === SCORE WEIGHTS ===
    pub fluid_weight: f32,
    pub range_weight: f32,
    pub stddev_weight: f32,
    pub step_weight: f32,
    pub perpendicular_weight: f32,
    pub midpoint_weight: f32,
    pub outside_segment_penalty: f32,
    pub segment_edge_penalty: f32,
    pub segment_edge_fraction: f32,

    // === SEARCH SHAPE ===
    pub min_half_size: i32,
    pub max_half_size: i32,
    pub half_size_shrink: f32,
    /// Ascending; the first entry is normally 0 (the frontline center alone)
    pub search_radii: Vec<i32>,
    pub candidate_step: i32,
    /// How far past the frontline center the territory-only fallback may look
    pub fallback_radius_limit: i32,

    // === BUDGET ===
    pub time_budget_micros: u64,
    pub max_candidates_per_tick: u32,
}

impl Default for ZoneSearchConfig {
    fn default() -> Self {
        Self {
            sample_step: zc::SAMPLE_STEP,
            max_samples: zc::MAX_SAMPLES,

            max_fluid_fraction: zc::MAX_FLUID_FRACTION,
            max_height_range: zc::MAX_HEIGHT_RANGE,
            max_height_stddev: zc::MAX_HEIGHT_STDDEV,
            max_adjacent_step: zc::MAX_ADJACENT_STEP,

            fluid_weight: zc::FLUID_WEIGHT,
            range_weight: zc::RANGE_WEIGHT,
            stddev_weight: zc::STDDEV_WEIGHT,
            step_weight: zc::STEP_WEIGHT,
            perpendicular_weight: zc::PERPENDICULAR_WEIGHT,
            midpoint_weight: zc::MIDPOINT_WEIGHT,
            outside_segment_penalty: zc::OUTSIDE_SEGMENT_PENALTY,
            segment_edge_penalty: zc::SEGMENT_EDGE_PENALTY,
            segment_edge_fraction: zc::SEGMENT_EDGE_FRACTION,

            min_half_size: zc::MIN_HALF_SIZE,
            max_half_size: zc::MAX_HALF_SIZE,
            half_size_shrink: zc::HALF_SIZE_SHRINK,
            search_radii: zc::SEARCH_RADII.to_vec(),
            candidate_step: zc::CANDIDATE_STEP,
            fallback_radius_limit: zc::FALLBACK_RADIUS_LIMIT,

            time_budget_micros: zc::TIME_BUDGET_MICROS,
            max_candidates_per_tick: zc::MAX_CANDIDATES_PER_TICK,
        }
    }
}

impl ZoneSearchConfig {
    pub fn time_budget(&self) -> Duration {
        Duration::from_micros(self.time_budget_micros)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_step <= 0 || self.candidate_step <= 0 {
            return Err(WarfrontError::InvalidConfig("sample and candidate steps must be positive".into()));
        }
        if self.max_samples < 4 {
            return Err(WarfrontError::InvalidConfig("max_samples must allow at least a 2x2 grid".into()));
        }
        if self.min_half_size <= 0 || self.min_half_size > self.max_half_size {
            return Err(WarfrontError::InvalidConfig(format!(
                "half-size range invalid: min {} max {}",
                self.min_half_size, self.max_half_size
            )));
        }
        if !(self.half_size_shrink > 0.0 && self.half_size_shrink < 1.0) {
            return Err(WarfrontError::InvalidConfig("half_size_shrink must be in (0, 1)".into()));
        }
        if self.search_radii.is_empty() || !self.search_radii.windows(2).all(|w| w[0] < w[1]) {
            return Err(WarfrontError::InvalidConfig("search_radii must be non-empty and ascending".into()));
        }
        if self.search_radii[0] < 0 {
            return Err(WarfrontError::InvalidConfig("search radii must be non-negative".into()));
        }
        if self.search_radii.last().is_some_and(|&r| r > self.fallback_radius_limit) {
            return Err(WarfrontError::InvalidConfig(format!(
                "fallback_radius_limit ({}) is inside the search radii",
                self.fallback_radius_limit
            )));
        }
        Ok(())
    }
}

/// Settlement tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Transfer range on a rout or surrender, basis points
    pub rout_transfer_bp: (u32, u32),
    /// Transfer range on a negotiated or forced peace, basis points
    pub peace_transfer_bp: (u32, u32),
    /// Chance of subordinating the loser after a decisive outcome
    pub subordination_chance: f64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            rout_transfer_bp: (bc::ROUT_TRANSFER_MIN_BP, bc::ROUT_TRANSFER_MAX_BP),
            peace_transfer_bp: (bc::PEACE_TRANSFER_MIN_BP, bc::PEACE_TRANSFER_MAX_BP),
            subordination_chance: bc::SUBORDINATION_CHANCE,
        }
    }
}

impl SettlementConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, (lo, hi)) in [("rout", self.rout_transfer_bp), ("peace", self.peace_transfer_bp)] {
            if lo > hi || hi > 10_000 {
                return Err(WarfrontError::InvalidConfig(format!(
                    "{} transfer range ({}, {}) must be ordered and within 10000 bp",
                    name, lo, hi
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.subordination_chance) {
            return Err(WarfrontError::InvalidConfig("subordination_chance must be in [0, 1]".into()));
        }
        Ok(())
    }
}
