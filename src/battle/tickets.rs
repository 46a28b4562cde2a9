//! Reinforcement tickets and the deferred respawn queue

use serde::{Deserialize, Serialize};

use crate::battle::combatant::{Role, Side};
use crate::core::types::{FactionId, Tick};

/// Reserve combatants one faction can still send in
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TicketRecord")]
pub struct TicketPool {
    pub faction: FactionId,
    remaining: u32,
    /// Reserves plus deployed bodies at battle start
    starting_strength: u32,
}

/// Unchecked wire form; clamped into a valid pool on load
#[derive(Deserialize)]
struct TicketRecord {
    faction: FactionId,
    remaining: i64,
    starting_strength: i64,
}

impl From<TicketRecord> for TicketPool {
    fn from(record: TicketRecord) -> Self {
        let starting_strength = record.starting_strength.clamp(0, u32::MAX as i64) as u32;
        let remaining = record.remaining.clamp(0, starting_strength as i64) as u32;
        Self {
            faction: record.faction,
            remaining,
            starting_strength,
        }
    }
}

impl TicketPool {
    pub fn new(faction: FactionId, reserves: u32, deployed: u32) -> Self {
        Self {
            faction,
            remaining: reserves,
            starting_strength: reserves.saturating_add(deployed),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn starting_strength(&self) -> u32 {
        self.starting_strength
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Spend one ticket; false when the pool is already empty
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnEntry {
    pub due_tick: Tick,
    pub faction: FactionId,
    pub side: Side,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RespawnQueue {
    entries: Vec<RespawnEntry>,
}

impl RespawnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, entry: RespawnEntry) {
        self.entries.push(entry);
    }

    /// Remove and return every entry due at or before `now`, earliest first
    pub fn drain_due(&mut self, now: Tick) -> Vec<RespawnEntry> {
        let (mut due, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(|e| e.due_tick <= now);
        self.entries = waiting;
        due.sort_by_key(|e| e.due_tick);
        due
    }

    pub fn pending_for(&self, side: Side) -> usize {
        self.entries.iter().filter(|e| e.side == side).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
