//! Commander orders
//!
//! One `Order` per commanding entity. The selected group receives move and
//! follow orders; each group either follows the commander or holds a point.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::battle::combatant::Role;
use crate::battle::formation::facing_or_default;
use crate::core::types::Vec2;

/// Why a command was refused; the message is shown to the issuer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandRejection {
    #[error("You are not in an active battle")]
    NoActiveBattle,

    #[error("You do not command troops in this battle")]
    NotACommander,

    #[error("Your faction is not fighting in this battle")]
    NotAParticipant,

    #[error("Your position is unknown")]
    PositionUnknown,

    #[error("Target is {distance:.0} blocks away; orders reach {max:.0}")]
    OutOfRange { distance: f32, max: f32 },

    #[error("Target is outside the battle zone")]
    OutsideZone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectedGroup {
    Melee,
    Ranged,
    Both,
}

impl SelectedGroup {
    pub fn next(self) -> Self {
        match self {
            SelectedGroup::Melee => SelectedGroup::Ranged,
            SelectedGroup::Ranged => SelectedGroup::Both,
            SelectedGroup::Both => SelectedGroup::Melee,
        }
    }

    pub fn includes(self, role: Role) -> bool {
        matches!(
            (self, role),
            (SelectedGroup::Both, _) | (SelectedGroup::Melee, Role::Melee) | (SelectedGroup::Ranged, Role::Ranged)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupMode {
    Follow,
    MoveTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupOrder {
    pub mode: GroupMode,
    pub target_point: Option<Vec2>,
}

impl Default for GroupOrder {
    fn default() -> Self {
        Self {
            mode: GroupMode::Follow,
            target_point: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub selected_group: SelectedGroup,
    pub melee: GroupOrder,
    pub ranged: GroupOrder,
    pub stable_forward: Vec2,
    last_commander_position: Option<Vec2>,
}

impl Order {
    pub fn new(forward: Vec2) -> Self {
        Self {
            selected_group: SelectedGroup::Melee,
            melee: GroupOrder::default(),
            ranged: GroupOrder::default(),
            stable_forward: facing_or_default(forward),
            last_commander_position: None,
        }
    }

    pub fn group(&self, role: Role) -> &GroupOrder {
        match role {
            Role::Melee => &self.melee,
            Role::Ranged => &self.ranged,
        }
    }

    fn group_mut(&mut self, role: Role) -> &mut GroupOrder {
        match role {
            Role::Melee => &mut self.melee,
            Role::Ranged => &mut self.ranged,
        }
    }

    pub fn cycle_group(&mut self) -> SelectedGroup {
        self.selected_group = self.selected_group.next();
        self.selected_group
    }

    /// Send the selected group to hold `point`
    pub fn issue_move(&mut self, point: Vec2) {
        for role in Role::ALL {
            if self.selected_group.includes(role) {
                *self.group_mut(role) = GroupOrder {
                    mode: GroupMode::MoveTo,
                    target_point: Some(point),
                };
            }
        }
    }

    /// Regroup the selected group on the commander
    pub fn issue_follow(&mut self) {
        for role in Role::ALL {
            if self.selected_group.includes(role) {
                *self.group_mut(role) = GroupOrder::default();
            }
        }
    }

    /// Re-aim the formation along the commander's movement
    ///
    /// Only while some group follows and only when the commander moved more
    /// than `epsilon` since the previous update. Returns true if changed.
    pub fn update_forward(&mut self, commander: Vec2, epsilon: f32) -> bool {
        let previous = self.last_commander_position.replace(commander);
        let following = self.melee.mode == GroupMode::Follow || self.ranged.mode == GroupMode::Follow;

        match previous {
            Some(previous) if following => {
                let moved = commander - previous;
                if moved.length() > epsilon {
                    self.stable_forward = moved.normalize();
                    return true;
                }
                false
            }
            _ => false,
        }
    }

    /// Point a role's block forms on
    pub fn anchor(&self, role: Role, commander: Vec2) -> Vec2 {
        let group = self.group(role);
        match (group.mode, group.target_point) {
            (GroupMode::MoveTo, Some(point)) => point,
            _ => commander,
        }
    }
}
