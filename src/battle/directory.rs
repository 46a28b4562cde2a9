//! Battle directory
//!
//! Registry of live battles. Declared conflicts queue a zone search; once the
//! zone is committed and someone is watching, the battle is deployed. Finished
//! battles are settled and torn down in the same tick.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::battle::combatant::Side;
use crate::battle::instance::{BattleEvent, BattleInstance, BattleSummary, Muster};
use crate::battle::orders::{CommandRejection, SelectedGroup};
use crate::battle::settlement::{self, SettlementDecision};
use crate::core::config::WarfrontConfig;
use crate::core::types::{ConflictKey, EntityId, FactionId, Rect, Tick, Vec2};
use crate::world::{BattleHost, EntityHost, ObserverQuery, TerritoryMap, WorldHost};
use crate::zone::{ZoneAllocator, ZoneSearchJob};

/// One party to a declared conflict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belligerent {
    pub faction: FactionId,
    /// Used as the search anchor when the faction holds no territory
    pub seat: Vec2,
    pub musters: Vec<Muster>,
}

impl Belligerent {
    pub fn new(faction: FactionId, seat: Vec2) -> Self {
        Self {
            faction,
            seat,
            musters: Vec::new(),
        }
    }

    pub fn with_muster(mut self, muster: Muster) -> Self {
        self.musters.push(muster);
        self
    }
}

#[derive(Debug, Clone)]
struct ConflictDeclaration {
    attacker: Belligerent,
    defender: Belligerent,
    anchors: [Rect; 2],
    declared_at: Tick,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IneligibleConflict {
    #[error("A faction cannot fight itself")]
    SameFaction,

    #[error("Conflict {0:?} already has a search or battle")]
    AlreadyActive(ConflictKey),

    #[error("Neither faction has an interested observer")]
    NoObserver,
}

/// Summary delivered to one commanding party
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushedSummary {
    pub conflict: ConflictKey,
    pub side: Side,
    pub faction: FactionId,
    /// `None` when the side has no commander and the push goes to its principal faction
    pub commander: Option<EntityId>,
    pub summary: BattleSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub decision: SettlementDecision,
    pub subordinated: bool,
    pub ended_at: Tick,
}

/// What happened during one directory tick
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryReport {
    pub zones_committed: Vec<(ConflictKey, Rect)>,
    pub started: Vec<ConflictKey>,
    pub settlements: Vec<SettlementReport>,
    pub summaries: Vec<PushedSummary>,
    pub events: Vec<BattleEvent>,
}

impl DirectoryReport {
    pub fn is_quiet(&self) -> bool {
        self.zones_committed.is_empty()
            && self.started.is_empty()
            && self.settlements.is_empty()
            && self.summaries.is_empty()
            && self.events.is_empty()
    }
}

pub struct Directory {
    config: WarfrontConfig,
    allocator: ZoneAllocator,
    declarations: AHashMap<ConflictKey, ConflictDeclaration>,
    /// Committed zones waiting for an observer
    ready: Vec<(ConflictKey, Rect)>,
    battles: Vec<Option<BattleInstance>>,
    free: Vec<usize>,
    by_conflict: AHashMap<ConflictKey, usize>,
    by_commander: AHashMap<EntityId, ConflictKey>,
    rng: ChaCha8Rng,
    tick: Tick,
}

impl Directory {
    /// Build an empty directory; the config is validated first
    pub fn new(config: WarfrontConfig, seed: u64) -> crate::core::Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            allocator: ZoneAllocator::new(),
            declarations: AHashMap::new(),
            ready: Vec::new(),
            battles: Vec::new(),
            free: Vec::new(),
            by_conflict: AHashMap::new(),
            by_commander: AHashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
        })
    }

    pub fn config(&self) -> &WarfrontConfig {
        &self.config
    }

    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn battle(&self, key: ConflictKey) -> Option<&BattleInstance> {
        let index = *self.by_conflict.get(&key)?;
        self.battles.get(index)?.as_ref()
    }

    /// Conflicts with a running battle, in key order
    pub fn active_battles(&self) -> Vec<ConflictKey> {
        let mut keys: Vec<ConflictKey> = self.by_conflict.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn pending_zones(&self) -> usize {
        self.allocator.len()
    }

    pub fn zone_job(&self, key: ConflictKey) -> Option<&ZoneSearchJob> {
        self.allocator.job(key)
    }

    /// Committed zones whose battle has not started yet
    pub fn awaiting_start(&self) -> &[(ConflictKey, Rect)] {
        &self.ready
    }

    pub fn is_tracked(&self, key: ConflictKey) -> bool {
        self.declarations.contains_key(&key) || self.by_conflict.contains_key(&key)
    }

    /// Declare war and queue the zone search
    pub fn declare_conflict<H>(
        &mut self,
        attacker: Belligerent,
        defender: Belligerent,
        host: &H,
    ) -> Result<ConflictKey, IneligibleConflict>
    where
        H: TerritoryMap + ObserverQuery + ?Sized,
    {
        if attacker.faction == defender.faction {
            return Err(IneligibleConflict::SameFaction);
        }
        let key = ConflictKey::new(attacker.faction, defender.faction);
        if self.is_tracked(key) {
            return Err(IneligibleConflict::AlreadyActive(key));
        }
        if !host.has_interested_observer(attacker.faction) && !host.has_interested_observer(defender.faction) {
            return Err(IneligibleConflict::NoObserver);
        }

        let anchor = |b: &Belligerent| {
            host.claimed_bounds(b.faction)
                .unwrap_or_else(|| Rect::point(b.seat.x.round() as i32, b.seat.z.round() as i32))
        };
        let anchors = [anchor(&attacker), anchor(&defender)];

        self.allocator
            .enqueue(ZoneSearchJob::new(key, anchors[0], anchors[1], &self.config.zone));
        tracing::info!(
            "Conflict {:?} declared by {:?}; zone search queued ({} pending)",
            key,
            attacker.faction,
            self.allocator.len()
        );

        self.declarations.insert(
            key,
            ConflictDeclaration {
                attacker,
                defender,
                anchors,
                declared_at: self.tick,
            },
        );
        Ok(key)
    }

    /// Advance zone searches and every live battle by one tick
    pub fn tick<H: WorldHost + ?Sized>(&mut self, host: &mut H) -> DirectoryReport {
        self.tick += 1;
        let mut report = DirectoryReport::default();

        // ===== ZONE SEARCH =====
        if let Some((key, zone)) = self.allocator.advance(&*host, &self.config.zone) {
            tracing::info!("Zone committed for {:?}: {:?}", key, zone);
            report.zones_committed.push((key, zone));
            self.ready.push((key, zone));
        }

        // ===== STARTS =====
        self.start_ready(host, &mut report);

        // ===== BATTLES =====
        let push_summaries = self.tick % self.config.battle.summary_push_ticks.max(1) == 0;
        for key in self.active_battles() {
            let Some(&index) = self.by_conflict.get(&key) else {
                continue;
            };
            let Some(battle) = self.battles.get_mut(index).and_then(|b| b.as_mut()) else {
                continue;
            };

            let events = battle.run_tick(host);
            report.events.extend(events.events);

            let finished = battle.is_finished();
            if push_summaries || finished {
                push_summaries_for(battle, &mut report);
            }
            if finished {
                self.conclude(key, host, &mut report);
            }
        }

        report
    }

    fn start_ready<H: WorldHost + ?Sized>(&mut self, host: &mut H, report: &mut DirectoryReport) {
        let mut ready = std::mem::take(&mut self.ready);
        ready.sort_by_key(|(key, _)| *key);

        for (key, zone) in ready {
            let Some(declaration) = self.declarations.get(&key) else {
                continue;
            };
            let watched = host.has_interested_observer(declaration.attacker.faction)
                || host.has_interested_observer(declaration.defender.faction);
            if !watched {
                self.ready.push((key, zone));
                continue;
            }
            if let Some(declaration) = self.declarations.remove(&key) {
                self.start(key, zone, declaration, host);
                report.started.push(key);
            }
        }
    }

    fn start<H: BattleHost + ?Sized>(
        &mut self,
        key: ConflictKey,
        zone: Rect,
        declaration: ConflictDeclaration,
        host: &mut H,
    ) {
        let axis = declaration.anchors[1].center() - declaration.anchors[0].center();
        let seed: u64 = self.rng.gen();
        let battle = BattleInstance::deploy(
            key,
            zone,
            axis,
            [declaration.attacker.musters, declaration.defender.musters],
            self.config.battle.clone(),
            seed,
            host,
        );
        tracing::debug!(
            "{:?} deployed {} ticks after declaration",
            key,
            self.tick.saturating_sub(declaration.declared_at)
        );

        let index = match self.free.pop() {
            Some(index) => {
                self.battles[index] = Some(battle);
                index
            }
            None => {
                self.battles.push(Some(battle));
                self.battles.len() - 1
            }
        };
        self.by_conflict.insert(key, index);
    }

    /// Settle a finished battle and release its slot
    fn conclude<H: WorldHost + ?Sized>(&mut self, key: ConflictKey, host: &mut H, report: &mut DirectoryReport) {
        let Some(mut battle) = self.remove_battle(key) else {
            return;
        };

        if let Some(outcome) = battle.outcome {
            let winner = battle.side(outcome.winner).principal();
            let loser = battle.side(outcome.winner.opposite()).principal();
            match (winner, loser) {
                (Some(winner), Some(loser)) => {
                    let decision = settlement::decide(
                        key,
                        winner,
                        loser,
                        outcome.reason,
                        &self.config.settlement,
                        &*host,
                        &mut self.rng,
                    );
                    let subordinated = settlement::apply(&decision, host);
                    report.settlements.push(SettlementReport {
                        decision,
                        subordinated,
                        ended_at: battle.tick,
                    });
                }
                _ => tracing::warn!("{:?} ended without two principal factions; nothing to settle", key),
            }
        }

        battle.teardown(host);
    }

    fn remove_battle(&mut self, key: ConflictKey) -> Option<BattleInstance> {
        let index = self.by_conflict.remove(&key)?;
        self.by_commander.retain(|_, k| *k != key);
        let battle = self.battles.get_mut(index)?.take();
        self.free.push(index);
        battle
    }

    /// Peace made outside of battle; drops the search, zone and battle for the pair
    pub fn call_off<H: BattleHost + ?Sized>(&mut self, a: FactionId, b: FactionId, host: &mut H) -> bool {
        let key = ConflictKey::new(a, b);
        let searching = self.allocator.cancel(key);
        let declared = self.declarations.remove(&key).is_some();
        let before = self.ready.len();
        self.ready.retain(|(k, _)| *k != key);
        let zoned = self.ready.len() != before;

        let fought = match self.remove_battle(key) {
            Some(mut battle) => {
                battle.teardown(host);
                true
            }
            None => false,
        };

        let removed = searching || declared || zoned || fought;
        if removed {
            tracing::info!("Conflict {:?} called off", key);
        }
        removed
    }

    // ===== COMMANDS =====

    /// Attach a commander to the battle its faction is fighting
    pub fn enlist_commander(&mut self, commander: EntityId, faction: FactionId) -> Result<(ConflictKey, Side), CommandRejection> {
        let key = self
            .active_battles()
            .into_iter()
            .find(|key| self.battle(*key).is_some_and(|b| b.side_of_faction(faction).is_some()))
            .ok_or(CommandRejection::NoActiveBattle)?;

        let side = self.routed_by_key(key)?.enlist_commander(commander, faction)?;
        self.by_commander.insert(commander, key);
        Ok((key, side))
    }

    fn routed_by_key(&mut self, key: ConflictKey) -> Result<&mut BattleInstance, CommandRejection> {
        let index = *self.by_conflict.get(&key).ok_or(CommandRejection::NoActiveBattle)?;
        self.battles
            .get_mut(index)
            .and_then(|b| b.as_mut())
            .ok_or(CommandRejection::NoActiveBattle)
    }

    fn routed(&mut self, commander: EntityId) -> Result<&mut BattleInstance, CommandRejection> {
        let key = *self.by_commander.get(&commander).ok_or(CommandRejection::NoActiveBattle)?;
        self.routed_by_key(key)
    }

    pub fn select_group(&mut self, commander: EntityId) -> Result<SelectedGroup, CommandRejection> {
        self.routed(commander)?.select_group(commander)
    }

    pub fn order_move<H: EntityHost + ?Sized>(
        &mut self,
        commander: EntityId,
        point: Vec2,
        host: &H,
    ) -> Result<(), CommandRejection> {
        self.routed(commander)?.order_move(commander, point, host)
    }

    pub fn order_follow(&mut self, commander: EntityId) -> Result<(), CommandRejection> {
        self.routed(commander)?.order_follow(commander)
    }

    pub fn surrender(&mut self, commander: EntityId) -> Result<Side, CommandRejection> {
        self.routed(commander)?.surrender(commander)
    }
}

fn push_summaries_for(battle: &BattleInstance, report: &mut DirectoryReport) {
    let commanders = battle.commanders();
    for side in Side::BOTH {
        let summary = battle.summary_for(side);
        let mut pushed = false;
        for (commander, _) in commanders.iter().filter(|(_, s)| *s == side) {
            let Some(faction) = battle.combatant(*commander).map(|c| c.source_faction) else {
                continue;
            };
            report.summaries.push(PushedSummary {
                conflict: battle.conflict,
                side,
                faction,
                commander: Some(*commander),
                summary,
            });
            pushed = true;
        }
        if !pushed {
            if let Some(faction) = battle.side(side).principal() {
                report.summaries.push(PushedSummary {
                    conflict: battle.conflict,
                    side,
                    faction,
                    commander: None,
                    summary,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WarfrontError;
    use crate::world::{Heightmap, Sandbox};

    fn host() -> Sandbox {
        let mut sb = Sandbox::new(Heightmap::flat(64), 3);
        sb.add_observer(FactionId(1), Vec2::ZERO);
        sb
    }

    fn belligerents() -> (Belligerent, Belligerent) {
        (
            Belligerent::new(FactionId(1), Vec2::new(-120.0, 0.0)).with_muster(Muster::new(FactionId(1), 4, 2, 4)),
            Belligerent::new(FactionId(2), Vec2::new(120.0, 0.0)).with_muster(Muster::new(FactionId(2), 4, 2, 4)),
        )
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = WarfrontConfig::default();
        config.zone.half_size_shrink = 1.0;
        assert!(matches!(
            Directory::new(config, 1),
            Err(WarfrontError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_declaration_eligibility() {
        let mut sb = host();
        let mut directory = Directory::new(WarfrontConfig::default(), 1).unwrap();
        let (a, b) = belligerents();

        assert_eq!(
            directory.declare_conflict(a.clone(), a.clone(), &sb),
            Err(IneligibleConflict::SameFaction)
        );

        sb.clear_observers();
        assert_eq!(
            directory.declare_conflict(a.clone(), b.clone(), &sb),
            Err(IneligibleConflict::NoObserver)
        );

        sb.add_observer(FactionId(2), Vec2::ZERO);
        let key = directory.declare_conflict(a.clone(), b.clone(), &sb).unwrap();
        assert_eq!(directory.pending_zones(), 1);
        assert_eq!(
            directory.declare_conflict(b, a, &sb),
            Err(IneligibleConflict::AlreadyActive(key))
        );
    }

    #[test]
    fn test_zone_then_battle_starts() {
        let mut sb = host();
        let mut directory = Directory::new(WarfrontConfig::default(), 1).unwrap();
        let (a, b) = belligerents();
        let key = directory.declare_conflict(a, b, &sb).unwrap();

        let mut started = false;
        for _ in 0..50 {
            let report = directory.tick(&mut sb);
            if report.started.contains(&key) {
                started = true;
                break;
            }
        }

        assert!(started);
        assert_eq!(directory.pending_zones(), 0);
        let battle = directory.battle(key).unwrap();
        assert_eq!(battle.living(Side::A), 6);
        assert!(battle.zone.contains(Vec2::ZERO));
    }

    #[test]
    fn test_call_off_mid_search() {
        let mut sb = host();
        let mut directory = Directory::new(WarfrontConfig::default(), 1).unwrap();
        let (a, b) = belligerents();
        let key = directory.declare_conflict(a, b, &sb).unwrap();

        assert!(directory.call_off(FactionId(2), FactionId(1), &mut sb));
        assert!(!directory.is_tracked(key));
        assert_eq!(directory.pending_zones(), 0);
        assert!(!directory.call_off(FactionId(1), FactionId(2), &mut sb));
    }

    #[test]
    fn test_commands_without_battle_are_rejected() {
        let sb = host();
        let mut directory = Directory::new(WarfrontConfig::default(), 1).unwrap();
        let nobody = EntityId::new();

        assert_eq!(directory.order_follow(nobody), Err(CommandRejection::NoActiveBattle));
        assert_eq!(
            directory.order_move(nobody, Vec2::ZERO, &sb),
            Err(CommandRejection::NoActiveBattle)
        );
        assert_eq!(
            directory.enlist_commander(nobody, FactionId(1)),
            Err(CommandRejection::NoActiveBattle)
        );
    }
}
