//! Per-unit target acquisition with distance hysteresis
//!
//! A target is acquired inside the engage range but only dropped beyond the
//! larger drop range. Without a target a unit walks back to its slot only
//! when farther than the reform threshold.

use serde::{Deserialize, Serialize};

use crate::battle::combatant::Role;
use crate::core::config::BattleConfig;
use crate::core::types::{EntityId, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementState {
    /// No target, walking back to the formation slot
    Reform,
    /// Has a live hostile target
    Engaged,
    /// At the slot with nothing in range
    Holding,
}

/// What the unit should be told to do
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Directive {
    /// Close on the target
    Chase { target: EntityId, point: Vec2 },
    /// Target in reach; stand and shoot
    Stand { target: EntityId },
    ReturnToSlot(Vec2),
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub state: EngagementState,
    pub target: Option<EntityId>,
    pub directive: Directive,
}

/// (engage, drop) for a role
pub fn ranges(role: Role, config: &BattleConfig) -> (f32, f32) {
    match role {
        Role::Melee => (config.melee_engage_range, config.melee_drop_range),
        Role::Ranged => (config.ranged_engage_range, config.ranged_drop_range),
    }
}

/// Decide one unit's state for this refresh
///
/// `current` is the unit's existing target with its position, or `None` if it
/// has no target or the target is gone. `hostiles` are living opposing units.
pub fn evaluate(
    role: Role,
    position: Vec2,
    current: Option<(EntityId, Vec2)>,
    hostiles: &[(EntityId, Vec2)],
    slot: Option<Vec2>,
    config: &BattleConfig,
) -> Decision {
    let (engage, drop) = ranges(role, config);

    if let Some((target, point)) = current {
        let distance = position.distance(&point);
        if distance <= drop {
            return engaged(role, target, point, distance, engage);
        }
    }

    let nearest = hostiles
        .iter()
        .map(|(id, p)| (*id, *p, position.distance(p)))
        .filter(|(_, _, d)| *d <= engage)
        .min_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));

    if let Some((target, point, distance)) = nearest {
        return engaged(role, target, point, distance, engage);
    }

    match slot {
        Some(slot) if position.distance(&slot) > config.reform_threshold => Decision {
            state: EngagementState::Reform,
            target: None,
            directive: Directive::ReturnToSlot(slot),
        },
        _ => Decision {
            state: EngagementState::Holding,
            target: None,
            directive: Directive::Idle,
        },
    }
}

fn engaged(role: Role, target: EntityId, point: Vec2, distance: f32, engage: f32) -> Decision {
    let directive = match role {
        Role::Ranged if distance <= engage => Directive::Stand { target },
        _ => Directive::Chase { target, point },
    };
    Decision {
        state: EngagementState::Engaged,
        target: Some(target),
        directive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquires_nearest_in_range() {
        let config = BattleConfig::default();
        let near = EntityId::new();
        let far = EntityId::new();
        let hostiles = [(far, Vec2::new(10.0, 0.0)), (near, Vec2::new(5.0, 0.0))];

        let decision = evaluate(Role::Melee, Vec2::ZERO, None, &hostiles, None, &config);
        assert_eq!(decision.state, EngagementState::Engaged);
        assert_eq!(decision.target, Some(near));
        assert!(matches!(decision.directive, Directive::Chase { .. }));
    }

    #[test]
    fn test_ranged_reaches_further_and_stands() {
        let config = BattleConfig::default();
        let enemy = EntityId::new();
        let p = Vec2::new(config.melee_engage_range + 5.0, 0.0);

        let melee = evaluate(Role::Melee, Vec2::ZERO, None, &[(enemy, p)], None, &config);
        assert_eq!(melee.state, EngagementState::Holding);

        let ranged = evaluate(Role::Ranged, Vec2::ZERO, None, &[(enemy, p)], None, &config);
        assert_eq!(ranged.directive, Directive::Stand { target: enemy });
    }

    #[test]
    fn test_target_kept_until_drop_range() {
        let config = BattleConfig::default();
        let enemy = EntityId::new();
        let between = Vec2::new((config.melee_engage_range + config.melee_drop_range) / 2.0, 0.0);

        let kept = evaluate(Role::Melee, Vec2::ZERO, Some((enemy, between)), &[(enemy, between)], None, &config);
        assert_eq!(kept.target, Some(enemy));

        let beyond = Vec2::new(config.melee_drop_range + 1.0, 0.0);
        let dropped = evaluate(Role::Melee, Vec2::ZERO, Some((enemy, beyond)), &[(enemy, beyond)], None, &config);
        assert_eq!(dropped.target, None);
    }

    #[test]
    fn test_hysteresis_no_flapping_at_engage_edge() {
        let config = BattleConfig::default();
        let enemy = EntityId::new();
        let eps = 0.5;

        let mut target = None;
        let mut flips = 0;
        let mut last_state = None;
        for i in 0..40 {
            let d = if i % 2 == 0 {
                config.melee_engage_range - eps
            } else {
                config.melee_engage_range + eps
            };
            let p = Vec2::new(d, 0.0);
            let current = target.map(|t| (t, p));
            let decision = evaluate(Role::Melee, Vec2::ZERO, current, &[(enemy, p)], None, &config);
            if last_state.is_some_and(|s| s != decision.state) {
                flips += 1;
            }
            last_state = Some(decision.state);
            target = decision.target;
        }

        assert_eq!(flips, 0);
        assert_eq!(last_state, Some(EngagementState::Engaged));
    }

    #[test]
    fn test_reform_only_beyond_threshold() {
        let config = BattleConfig::default();
        let slot = Vec2::new(0.0, config.reform_threshold - 0.5);
        let holding = evaluate(Role::Melee, Vec2::ZERO, None, &[], Some(slot), &config);
        assert_eq!(holding.directive, Directive::Idle);

        let slot = Vec2::new(0.0, config.reform_threshold + 0.5);
        let reform = evaluate(Role::Melee, Vec2::ZERO, None, &[], Some(slot), &config);
        assert_eq!(reform.state, EngagementState::Reform);
        assert_eq!(reform.directive, Directive::ReturnToSlot(slot));
    }
}
