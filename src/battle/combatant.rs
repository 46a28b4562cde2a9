//! Tracked combatants and battle sides

use serde::{Deserialize, Serialize};

use crate::battle::engagement::EngagementState;
use crate::core::types::{EntityId, FactionId, Vec2};

/// One of the two coalitions in a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::A, Side::B];

    pub fn opposite(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Melee,
    Ranged,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Melee, Role::Ranged];

    pub fn index(self) -> usize {
        match self {
            Role::Melee => 0,
            Role::Ranged => 1,
        }
    }
}

/// A host entity fighting in one battle
///
/// Holds only the id; position and liveness are always asked of the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: EntityId,
    pub source_faction: FactionId,
    pub side: Side,
    pub is_leader: bool,
    pub role: Role,
    /// `None` for leaders and unslotted units
    pub formation_slot: Option<u32>,
    pub state: EngagementState,
    pub target: Option<EntityId>,
    /// Last point this unit was sent toward, cleared on stop
    pub goal: Option<Vec2>,
}

impl Combatant {
    pub fn soldier(id: EntityId, faction: FactionId, side: Side, role: Role, slot: u32) -> Self {
        Self {
            id,
            source_faction: faction,
            side,
            is_leader: false,
            role,
            formation_slot: Some(slot),
            state: EngagementState::Reform,
            target: None,
            goal: None,
        }
    }

    pub fn leader(id: EntityId, faction: FactionId, side: Side) -> Self {
        Self {
            id,
            source_faction: faction,
            side,
            is_leader: true,
            role: Role::Melee,
            formation_slot: None,
            state: EngagementState::Holding,
            target: None,
            goal: None,
        }
    }
}
