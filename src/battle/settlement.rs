//! Settlement decision and hand-off
//!
//! Deciding who won, how much changes hands and whether the loser becomes a
//! subordinate lives here; applying it is left to the host's economy and
//! diplomacy books. Amounts are whole units, rounded down.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::combatant::Side;
use crate::core::config::SettlementConfig;
use crate::core::types::{ConflictKey, FactionId};
use crate::world::{Diplomacy, Economy, ResourceKind, ResourceShare};

/// Deepest overlord chain walked when checking for cycles
const MAX_OVERLORD_DEPTH: usize = 64;

/// Why a battle ended; the side named is the one that lost or gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    MoraleCollapse(Side),
    Exhaustion(Side),
    Surrender(Side),
    /// No interested observer stayed in the zone; settled as a forced peace
    Abandoned,
}

impl EndReason {
    /// Rout or surrender, as opposed to a negotiated or forced peace
    pub fn is_decisive(&self) -> bool {
        !matches!(self, EndReason::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub winner: Side,
    pub reason: EndReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementDecision {
    pub conflict: ConflictKey,
    pub winner: FactionId,
    pub loser: FactionId,
    pub reason: EndReason,
    /// Share of each of the loser's stored resources moved to the winner
    pub transfer_bp: u32,
    pub subordinate: bool,
}

/// `amount * bp / 10_000`, rounded down
pub fn share_of(amount: u64, basis_points: u32) -> u64 {
    let bp = basis_points.min(10_000) as u128;
    (amount as u128 * bp / 10_000) as u64
}

/// True if making `subordinate` answer to `master` would close a loop
pub fn would_form_cycle<D: Diplomacy + ?Sized>(subordinate: FactionId, master: FactionId, diplomacy: &D) -> bool {
    let mut current = Some(master);
    for _ in 0..MAX_OVERLORD_DEPTH {
        match current {
            Some(f) if f == subordinate => return true,
            Some(f) => current = diplomacy.overlord_of(f),
            None => return false,
        }
    }
    // A chain this deep is treated as suspect
    true
}

pub fn decide<D, R>(
    conflict: ConflictKey,
    winner: FactionId,
    loser: FactionId,
    reason: EndReason,
    config: &SettlementConfig,
    diplomacy: &D,
    rng: &mut R,
) -> SettlementDecision
where
    D: Diplomacy + ?Sized,
    R: Rng,
{
    let (lo, hi) = if reason.is_decisive() {
        config.rout_transfer_bp
    } else {
        config.peace_transfer_bp
    };
    let transfer_bp = if lo >= hi { lo } else { rng.gen_range(lo..=hi) };

    let subordinate = reason.is_decisive()
        && rng.gen_bool(config.subordination_chance.clamp(0.0, 1.0))
        && !would_form_cycle(loser, winner, diplomacy);

    SettlementDecision {
        conflict,
        winner,
        loser,
        reason,
        transfer_bp,
        subordinate,
    }
}

/// Hand the decision to the host; returns whether subordination took effect
pub fn apply<H>(decision: &SettlementDecision, host: &mut H) -> bool
where
    H: Economy + Diplomacy + ?Sized,
{
    let shares: Vec<ResourceShare> = ResourceKind::ALL
        .iter()
        .map(|&resource| ResourceShare {
            resource,
            basis_points: decision.transfer_bp,
        })
        .collect();

    host.transfer(decision.winner, decision.loser, &shares);
    host.make_peace(decision.winner, decision.loser);

    let subordinated = decision.subordinate && host.set_subordinate(decision.loser, decision.winner);

    tracing::info!(
        "Settlement {:?}: {:?} beat {:?} ({:?}), {} bp transferred, subordinated: {}",
        decision.conflict,
        decision.winner,
        decision.loser,
        decision.reason,
        decision.transfer_bp,
        subordinated
    );
    subordinated
}
