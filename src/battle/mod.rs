//! Battle system - formation-based real-time battles inside a committed zone
//!
//! A `Directory` owns every live `BattleInstance`. Each instance tracks two
//! sides of combatants by id, keeps them in formation around their leaders,
//! engages enemies with range hysteresis, relocates stuck units and settles
//! the outcome through the host's economy and diplomacy.
//!
//! Key differences from a plain skirmish loop:
//! - Units are owned by the host world; the battle only holds ids
//! - Casualties cost tickets and morale; tickets buy deferred respawns
//! - Nothing here fails a tick: missing entities are dropped from tracking

pub mod combatant;
pub mod constants;
pub mod directory;
pub mod engagement;
pub mod formation;
pub mod instance;
pub mod morale;
pub mod orders;
pub mod settlement;
pub mod stall;
pub mod tickets;

// Re-exports for convenient access
pub use combatant::{Combatant, Role, Side};
pub use constants::*;
pub use directory::{
    Belligerent, Directory, DirectoryReport, IneligibleConflict, PushedSummary, SettlementReport,
};
pub use engagement::{evaluate, Decision, Directive, EngagementState};
pub use formation::{block_offset, slot_move, slot_position, SlotBook, SlotMove};
pub use instance::{
    BattleEvent, BattleEventLog, BattleEventType, BattleInstance, BattlePhase, BattleSummary,
    Muster, SideState,
};
pub use morale::MoraleTrack;
pub use orders::{CommandRejection, GroupMode, GroupOrder, Order, SelectedGroup};
pub use settlement::{BattleOutcome, EndReason, SettlementDecision};
pub use stall::{relocation_point, StallCheck, StallTracker};
pub use tickets::{RespawnEntry, RespawnQueue, TicketPool};
