//! Battle instance tick loop
//!
//! Each tick: observers -> casualties -> respawns -> formation -> targeting
//! -> anti-stall -> end check
//!
//! The instance never holds host objects. Every phase re-resolves entity ids
//! through the host, and units the host no longer knows are dropped.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::combatant::{Combatant, Role, Side};
use crate::battle::constants::FORWARD_UPDATE_EPSILON;
use crate::battle::engagement::{self, Directive, EngagementState};
use crate::battle::formation::{block_offset, facing_or_default, slot_move, slot_position, SlotBook};
use crate::battle::morale::MoraleTrack;
use crate::battle::orders::{CommandRejection, Order, SelectedGroup};
use crate::battle::settlement::{BattleOutcome, EndReason};
use crate::battle::stall::{relocation_point, StallCheck, StallTracker};
use crate::battle::tickets::{RespawnEntry, RespawnQueue, TicketPool};
use crate::core::config::BattleConfig;
use crate::core::types::{ConflictKey, EntityId, FactionId, Rect, Tick, Vec2};
use crate::world::{BattleHost, EntityHost, SpeedTier, UnitKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BattlePhase {
    #[default]
    Active,
    Finished,
}

/// Log entry for battle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleEvent {
    pub tick: Tick,
    pub event_type: BattleEventType,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BattleEventType {
    BattleStarted,
    UnitLost { entity: EntityId, side: Side },
    LeaderKilled { entity: EntityId, side: Side },
    Reinforced { entity: EntityId, side: Side, role: Role },
    UnitRelocated { entity: EntityId },
    SurrenderDeclared { side: Side },
    BattleEnded { outcome: BattleOutcome },
}

/// Log of events from a single tick
#[derive(Debug, Clone, Default)]
pub struct BattleEventLog {
    pub events: Vec<BattleEvent>,
}

impl BattleEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event_type: BattleEventType, description: String, tick: Tick) {
        self.events.push(BattleEvent {
            tick,
            event_type,
            description,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// One faction's contribution to a side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Muster {
    pub faction: FactionId,
    pub melee: u32,
    pub ranged: u32,
    /// Tickets held back for respawns
    pub reserves: u32,
    /// Spawn an AI captain to lead the block
    pub captain: bool,
}

impl Muster {
    pub fn new(faction: FactionId, melee: u32, ranged: u32, reserves: u32) -> Self {
        Self {
            faction,
            melee,
            ranged,
            reserves,
            captain: false,
        }
    }

    pub fn with_captain(mut self) -> Self {
        self.captain = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideState {
    pub factions: Vec<FactionId>,
    pub pools: Vec<TicketPool>,
    pub morale: MoraleTrack,
    /// Gathering point when the side has no leader
    pub rally: Vec2,
    pub facing: Vec2,
    /// Block anchors per role from the last formation refresh
    pub anchors: [Vec2; 2],
}

impl SideState {
    fn new(rally: Vec2, facing: Vec2, morale_start: f32) -> Self {
        Self {
            factions: Vec::new(),
            pools: Vec::new(),
            morale: MoraleTrack::new(morale_start),
            rally,
            facing,
            anchors: [rally; 2],
        }
    }

    pub fn tickets(&self) -> u32 {
        self.pools.iter().map(|p| p.remaining()).sum()
    }

    pub fn pool(&self, faction: FactionId) -> Option<&TicketPool> {
        self.pools.iter().find(|p| p.faction == faction)
    }

    fn pool_mut(&mut self, faction: FactionId) -> Option<&mut TicketPool> {
        self.pools.iter_mut().find(|p| p.faction == faction)
    }

    /// The faction that signs the settlement for this side
    pub fn principal(&self) -> Option<FactionId> {
        self.factions.first().copied()
    }
}

/// Periodic state pushed to each commanding party
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub active: bool,
    pub own_tickets: u32,
    pub enemy_tickets: u32,
    pub own_morale: f32,
    pub enemy_morale: f32,
}

fn detached_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleInstance {
    pub conflict: ConflictKey,
    pub zone: Rect,
    pub tick: Tick,
    pub phase: BattlePhase,
    pub outcome: Option<BattleOutcome>,

    sides: [SideState; 2],
    roster: AHashMap<EntityId, Combatant>,
    slots: SlotBook,
    respawns: RespawnQueue,
    orders: AHashMap<EntityId, Order>,
    stall: StallTracker,

    ticks_unobserved: Tick,
    abandoned: bool,
    surrendered: Option<Side>,

    pub battle_log: Vec<BattleEvent>,
    /// Logged by commands between ticks, handed out by the next tick
    #[serde(default)]
    unreported: Vec<BattleEvent>,
    config: BattleConfig,

    #[serde(skip, default = "detached_rng")]
    rng: ChaCha8Rng,
}

impl BattleInstance {
    /// Spawn both sides inside the zone and start the battle
    ///
    /// `axis` points from side A toward side B. Each side gathers on a rally
    /// point offset from the zone center along the axis.
    pub fn deploy<H: BattleHost + ?Sized>(
        conflict: ConflictKey,
        zone: Rect,
        axis: Vec2,
        musters: [Vec<Muster>; 2],
        config: BattleConfig,
        seed: u64,
        host: &mut H,
    ) -> Self {
        let axis = facing_or_default(axis);
        let center = zone.center();
        let reach = zone.half_extent() * config.rally_fraction;
        let margin = config.zone_edge_margin;

        let rally_a = zone.clamp_inside(center - axis * reach, margin);
        let rally_b = zone.clamp_inside(center + axis * reach, margin);

        let mut instance = Self {
            conflict,
            zone,
            tick: 0,
            phase: BattlePhase::Active,
            outcome: None,
            sides: [
                SideState::new(rally_a, axis, config.morale_start),
                SideState::new(rally_b, -axis, config.morale_start),
            ],
            roster: AHashMap::new(),
            slots: SlotBook::new(),
            respawns: RespawnQueue::new(),
            orders: AHashMap::new(),
            stall: StallTracker::new(),
            ticks_unobserved: 0,
            abandoned: false,
            surrendered: None,
            battle_log: Vec::new(),
            unreported: Vec::new(),
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };

        for side in Side::BOTH {
            for muster in &musters[side.index()] {
                instance.muster(side, muster, host);
            }
        }

        let description = format!(
            "Battle joined in {:?}: {} vs {} combatants",
            zone,
            instance.living(Side::A),
            instance.living(Side::B)
        );
        tracing::info!("{:?}: {}", conflict, description);
        instance.battle_log.push(BattleEvent {
            tick: 0,
            event_type: BattleEventType::BattleStarted,
            description,
        });
        instance
    }

    fn muster<H: BattleHost + ?Sized>(&mut self, side: Side, muster: &Muster, host: &mut H) {
        let (rally, facing) = {
            let state = &self.sides[side.index()];
            (state.rally, state.facing)
        };
        let faction = muster.faction;

        if !self.sides[side.index()].factions.contains(&faction) {
            self.sides[side.index()].factions.push(faction);
        }

        if muster.captain {
            if let Some(id) = host.spawn(UnitKind::Captain, faction, rally, facing) {
                self.roster.insert(id, Combatant::leader(id, faction, side));
            }
        }

        let mut deployed = 0;
        for role in Role::ALL {
            let count = match role {
                Role::Melee => muster.melee,
                Role::Ranged => muster.ranged,
            };
            for _ in 0..count {
                let slot = self.slots.assign(side, role);
                let offset = block_offset(&self.slots, side, role, &self.config);
                let point = self.zone.clamp_inside(
                    slot_position(
                        rally,
                        facing,
                        slot,
                        self.config.formation_columns,
                        self.config.formation_spacing,
                        offset,
                    ),
                    self.config.zone_edge_margin,
                );

                match host.spawn(UnitKind::Soldier(role), faction, point, facing) {
                    Some(id) => {
                        self.roster.insert(id, Combatant::soldier(id, faction, side, role, slot));
                        deployed += 1;
                    }
                    None => self.slots.release(side, role, slot),
                }
            }
        }

        self.sides[side.index()]
            .pools
            .push(TicketPool::new(faction, muster.reserves, deployed));
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, BattlePhase::Finished)
    }

    pub fn side(&self, side: Side) -> &SideState {
        &self.sides[side.index()]
    }

    pub fn side_of_faction(&self, faction: FactionId) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|s| self.sides[s.index()].factions.contains(&faction))
    }

    pub fn factions(&self) -> Vec<FactionId> {
        self.sides.iter().flat_map(|s| s.factions.iter().copied()).collect()
    }

    pub fn combatant(&self, id: EntityId) -> Option<&Combatant> {
        self.roster.get(&id)
    }

    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.roster.values()
    }

    /// Tracked units on a side, leaders included
    pub fn living(&self, side: Side) -> usize {
        self.roster.values().filter(|c| c.side == side).count()
    }

    /// Tracked units on a side that fight for it; commanders are not counted
    pub fn living_units(&self, side: Side) -> usize {
        self.roster
            .values()
            .filter(|c| c.side == side && !self.orders.contains_key(&c.id))
            .count()
    }

    pub fn living_of_faction(&self, faction: FactionId) -> usize {
        self.roster
            .values()
            .filter(|c| c.source_faction == faction && !c.is_leader)
            .count()
    }

    pub fn slots(&self) -> &SlotBook {
        &self.slots
    }

    pub fn pending_respawns(&self, side: Side) -> usize {
        self.respawns.pending_for(side)
    }

    pub fn stalled_ticks(&self, id: EntityId) -> Tick {
        self.stall.stalled_ticks(id)
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// Commanding entities with their sides, in id order
    pub fn commanders(&self) -> Vec<(EntityId, Side)> {
        let mut out: Vec<(EntityId, Side)> = self
            .orders
            .keys()
            .filter_map(|id| self.roster.get(id).map(|c| (*id, c.side)))
            .collect();
        out.sort();
        out
    }

    pub fn order(&self, commander: EntityId) -> Option<&Order> {
        self.orders.get(&commander)
    }

    pub fn summary_for(&self, side: Side) -> BattleSummary {
        let own = self.side(side);
        let enemy = self.side(side.opposite());
        BattleSummary {
            active: !self.is_finished(),
            own_tickets: own.tickets(),
            enemy_tickets: enemy.tickets(),
            own_morale: own.morale.value(),
            enemy_morale: enemy.morale.value(),
        }
    }

    fn log(&mut self, events: &mut BattleEventLog, event_type: BattleEventType, description: String) {
        events.push(event_type.clone(), description.clone(), self.tick);
        self.battle_log.push(BattleEvent {
            tick: self.tick,
            event_type,
            description,
        });
    }

    /// Run a complete battle tick
    pub fn run_tick<H: BattleHost + ?Sized>(&mut self, host: &mut H) -> BattleEventLog {
        let mut events = BattleEventLog {
            events: std::mem::take(&mut self.unreported),
        };

        if self.is_finished() {
            return events;
        }

        self.tick += 1;

        // ===== PHASE 1: OBSERVERS =====
        self.phase_observers(host);

        // ===== PHASE 2: CASUALTIES =====
        self.phase_casualties(host, &mut events);

        // ===== PHASE 3: RESPAWNS =====
        self.phase_respawns(host, &mut events);

        // ===== PHASE 4: FORMATION =====
        if self.tick % self.config.formation_refresh_ticks.max(1) == 0 {
            self.phase_formation(host);
        }

        // ===== PHASE 5: TARGETING =====
        if self.tick % self.config.targeting_refresh_ticks.max(1) == 0 {
            self.phase_targeting(host);
        }

        // ===== PHASE 6: ANTI-STALL =====
        if self.tick % self.config.stall_check_ticks.max(1) == 0 {
            self.phase_stall(host, &mut events);
        }

        // ===== PHASE 7: END CHECK =====
        self.phase_end_check(&mut events);

        events
    }

    fn phase_observers<H: BattleHost + ?Sized>(&mut self, host: &H) {
        let factions = self.factions();
        if host.observer_in_zone(&self.zone, &factions) {
            self.ticks_unobserved = 0;
            return;
        }

        self.ticks_unobserved += 1;
        if !self.abandoned && self.ticks_unobserved > self.config.observer_absence_limit {
            self.abandoned = true;
            tracing::info!(
                "{:?}: no observer in zone for {} ticks, marking for cleanup",
                self.conflict,
                self.ticks_unobserved
            );
        }
    }

    fn phase_casualties<H: BattleHost + ?Sized>(&mut self, host: &H, events: &mut BattleEventLog) {
        let mut dead: Vec<EntityId> = self
            .roster
            .keys()
            .copied()
            .filter(|id| !host.is_alive(*id))
            .collect();
        dead.sort();

        for id in dead {
            self.remove_casualty(id, events);
        }
    }

    /// Drop a dead unit and charge its side; false if it was not tracked
    pub fn remove_casualty(&mut self, id: EntityId, events: &mut BattleEventLog) -> bool {
        let Some(unit) = self.roster.remove(&id) else {
            return false;
        };

        if let Some(slot) = unit.formation_slot {
            self.slots.release(unit.side, unit.role, slot);
        }
        self.stall.forget(id);
        self.orders.remove(&id);

        let tick = self.tick;
        let state = &mut self.sides[unit.side.index()];
        state.morale.apply_casualty(tick, unit.is_leader, &self.config);

        if unit.is_leader {
            self.log(
                events,
                BattleEventType::LeaderKilled { entity: id, side: unit.side },
                format!("Side {:?} lost a leader", unit.side),
            );
            return true;
        }

        let funded = state
            .pool_mut(unit.source_faction)
            .is_some_and(|pool| pool.consume());
        if funded {
            self.respawns.schedule(RespawnEntry {
                due_tick: tick + self.config.respawn_delay,
                faction: unit.source_faction,
                side: unit.side,
                role: unit.role,
            });
        }

        self.log(
            events,
            BattleEventType::UnitLost { entity: id, side: unit.side },
            format!(
                "Side {:?} lost a {:?} unit{}",
                unit.side,
                unit.role,
                if funded { ", reinforcement scheduled" } else { "" }
            ),
        );
        true
    }

    fn phase_respawns<H: BattleHost + ?Sized>(&mut self, host: &mut H, events: &mut BattleEventLog) {
        for entry in self.respawns.drain_due(self.tick) {
            let anchor = self
                .leader_of(entry.side, host)
                .map(|(_, p)| p)
                .unwrap_or(self.sides[entry.side.index()].rally);
            let facing = self.sides[entry.side.index()].facing;

            let scatter = self.config.respawn_scatter.max(0.0);
            let jitter = if scatter > 0.0 {
                Vec2::new(
                    self.rng.gen_range(-scatter..=scatter),
                    self.rng.gen_range(-scatter..=scatter),
                )
            } else {
                Vec2::ZERO
            };
            let point = self.zone.clamp_inside(
                anchor - facing * self.config.formation_behind_leader + jitter,
                self.config.zone_edge_margin,
            );

            let slot = self.slots.assign(entry.side, entry.role);
            match host.spawn(UnitKind::Soldier(entry.role), entry.faction, point, facing) {
                Some(id) => {
                    self.roster
                        .insert(id, Combatant::soldier(id, entry.faction, entry.side, entry.role, slot));
                    self.log(
                        events,
                        BattleEventType::Reinforced {
                            entity: id,
                            side: entry.side,
                            role: entry.role,
                        },
                        format!("Side {:?} reinforced with a {:?} unit", entry.side, entry.role),
                    );
                }
                None => {
                    self.slots.release(entry.side, entry.role, slot);
                    tracing::debug!("{:?}: host refused respawn for {:?}", self.conflict, entry.faction);
                }
            }
        }
    }

    /// Living leader a side forms on; commanders take precedence over captains
    fn leader_of<H: EntityHost + ?Sized>(&self, side: Side, host: &H) -> Option<(EntityId, Vec2)> {
        self.roster
            .values()
            .filter(|c| c.side == side && c.is_leader)
            .filter_map(|c| host.position(c.id).map(|p| (c.id, p, self.orders.contains_key(&c.id))))
            .min_by_key(|(id, _, commands)| (!commands, *id))
            .map(|(id, p, _)| (id, p))
    }

    /// Current slot position of a unit, inside the zone
    fn slot_point(&self, unit: &Combatant) -> Option<Vec2> {
        let slot = unit.formation_slot?;
        let state = &self.sides[unit.side.index()];
        let offset = block_offset(&self.slots, unit.side, unit.role, &self.config);
        let point = slot_position(
            state.anchors[unit.role.index()],
            state.facing,
            slot,
            self.config.formation_columns,
            self.config.formation_spacing,
            offset,
        );
        Some(self.zone.clamp_inside(point, self.config.zone_edge_margin))
    }

    fn phase_formation<H: BattleHost + ?Sized>(&mut self, host: &mut H) {
        for side in Side::BOTH {
            let enemy_anchor = self.sides[side.opposite().index()].anchors[Role::Melee.index()];

            match self.leader_of(side, host) {
                Some((id, position)) => {
                    let commanded = self.orders.get_mut(&id).map(|order| {
                        order.update_forward(position, FORWARD_UPDATE_EPSILON);
                        (
                            [order.anchor(Role::Melee, position), order.anchor(Role::Ranged, position)],
                            order.stable_forward,
                        )
                    });
                    if let Some((anchors, forward)) = commanded {
                        let state = &mut self.sides[side.index()];
                        state.anchors = anchors;
                        state.facing = forward;
                    } else {
                        self.advance_captain(id, position, enemy_anchor, host);
                        let state = &mut self.sides[side.index()];
                        state.anchors = [position; 2];
                        face_toward(state, position, enemy_anchor);
                    }
                }
                None => {
                    let center = self.zone.center();
                    let drift = self.config.rally_drift_per_refresh;
                    let state = &mut self.sides[side.index()];
                    let to_center = center - state.rally;
                    state.rally = state.rally + to_center.normalize() * to_center.length().min(drift);
                    state.anchors = [state.rally; 2];
                    let rally = state.rally;
                    face_toward(state, rally, enemy_anchor);
                }
            }

            let mut ids: Vec<EntityId> = self
                .roster
                .values()
                .filter(|c| c.side == side && !c.is_leader && c.state != EngagementState::Engaged)
                .map(|c| c.id)
                .collect();
            ids.sort();

            for id in ids {
                let Some(slot) = self.roster.get(&id).and_then(|c| self.slot_point(c)) else {
                    continue;
                };
                let Some(position) = host.position(id) else {
                    continue;
                };
                if let Some(step) = slot_move(id, position, slot, &self.config) {
                    host.move_to(id, step.point, step.tier);
                    if let Some(unit) = self.roster.get_mut(&id) {
                        unit.goal = Some(step.point);
                    }
                }
            }
        }
    }

    /// Walk an AI captain toward the enemy, stopping at hold distance
    fn advance_captain<H: BattleHost + ?Sized>(&mut self, id: EntityId, position: Vec2, enemy: Vec2, host: &mut H) {
        let distance = position.distance(&enemy);
        let Some(captain) = self.roster.get_mut(&id) else {
            return;
        };

        if distance > self.config.leader_hold_distance {
            let step = (enemy - position).normalize() * (distance - self.config.leader_hold_distance);
            let point = self.zone.clamp_inside(position + step, self.config.zone_edge_margin);
            host.move_to(id, point, SpeedTier::Slow);
            captain.goal = Some(point);
        } else if captain.goal.take().is_some() {
            host.stop(id);
        }
    }

    fn phase_targeting<H: BattleHost + ?Sized>(&mut self, host: &mut H) {
        // hostiles[i] holds the units side i may target
        let mut hostiles: [Vec<(EntityId, Vec2)>; 2] = [Vec::new(), Vec::new()];
        for unit in self.roster.values() {
            if let Some(p) = host.position(unit.id) {
                hostiles[unit.side.opposite().index()].push((unit.id, p));
            }
        }
        for list in hostiles.iter_mut() {
            list.sort_by_key(|(id, _)| *id);
        }

        let mut ids: Vec<EntityId> = self
            .roster
            .values()
            .filter(|c| !c.is_leader)
            .map(|c| c.id)
            .collect();
        ids.sort();

        for id in ids {
            let Some(unit) = self.roster.get(&id) else {
                continue;
            };
            let Some(position) = host.position(id) else {
                continue;
            };

            let current = unit
                .target
                .filter(|t| self.roster.contains_key(t) && host.is_alive(*t))
                .and_then(|t| host.position(t).map(|p| (t, p)));
            let slot = self.slot_point(unit);
            let decision = engagement::evaluate(
                unit.role,
                position,
                current,
                &hostiles[unit.side.index()],
                slot,
                &self.config,
            );

            let fast_sq = self.config.fast_tier_distance * self.config.fast_tier_distance;
            let Some(unit) = self.roster.get_mut(&id) else {
                continue;
            };
            match decision.directive {
                Directive::Chase { point, .. } => {
                    host.move_to(id, point, SpeedTier::Fast);
                    unit.goal = Some(point);
                }
                Directive::ReturnToSlot(point) => {
                    let tier = if position.distance_squared(&point) > fast_sq {
                        SpeedTier::Fast
                    } else {
                        SpeedTier::Slow
                    };
                    host.move_to(id, point, tier);
                    unit.goal = Some(point);
                }
                Directive::Stand { .. } | Directive::Idle => {
                    if unit.goal.take().is_some() {
                        host.stop(id);
                    }
                }
            }
            unit.state = decision.state;
            unit.target = decision.target;
        }
    }

    fn phase_stall<H: BattleHost + ?Sized>(&mut self, host: &mut H, events: &mut BattleEventLog) {
        let interval = self.config.stall_check_ticks;
        let mut ids: Vec<EntityId> = self.roster.keys().copied().collect();
        ids.sort();

        for id in ids {
            let Some(position) = host.position(id) else {
                continue;
            };
            let goal = self.roster.get(&id).and_then(|c| c.goal);

            if self.stall.check(id, position, goal, interval, &self.config) != StallCheck::Relocate {
                continue;
            }
            let Some(goal) = goal else {
                continue;
            };

            let point = relocation_point(goal, &self.zone, &mut self.rng, &self.config);
            host.teleport(id, point);
            host.stop(id);
            if let Some(unit) = self.roster.get_mut(&id) {
                unit.goal = None;
            }
            tracing::debug!("{:?}: relocated stalled unit {:?} to {:?}", self.conflict, id, point);
            self.log(
                events,
                BattleEventType::UnitRelocated { entity: id },
                "Stalled unit relocated".into(),
            );
        }
    }

    fn phase_end_check(&mut self, events: &mut BattleEventLog) {
        if let Some(outcome) = self.end_condition() {
            self.finish(outcome, events);
        }
    }

    /// A side is exhausted when it has no tickets, no fighting units and
    /// nothing queued
    pub fn is_exhausted(&self, side: Side) -> bool {
        self.sides[side.index()].pools.iter().all(|p| p.is_empty())
            && self.living_units(side) == 0
            && self.respawns.pending_for(side) == 0
    }

    /// End conditions in priority order
    pub fn end_condition(&self) -> Option<BattleOutcome> {
        for side in Side::BOTH {
            if self.sides[side.index()].morale.is_broken() {
                return Some(BattleOutcome {
                    winner: side.opposite(),
                    reason: EndReason::MoraleCollapse(side),
                });
            }
        }
        for side in Side::BOTH {
            if self.is_exhausted(side) {
                return Some(BattleOutcome {
                    winner: side.opposite(),
                    reason: EndReason::Exhaustion(side),
                });
            }
        }
        if let Some(side) = self.surrendered {
            return Some(BattleOutcome {
                winner: side.opposite(),
                reason: EndReason::Surrender(side),
            });
        }
        if self.abandoned {
            return Some(BattleOutcome {
                winner: self.stronger_side(),
                reason: EndReason::Abandoned,
            });
        }
        None
    }

    /// Remaining strength (tickets plus living), then morale; ties go to A
    pub fn stronger_side(&self) -> Side {
        let strength = |side: Side| self.side(side).tickets() as usize + self.living_units(side);
        let (a, b) = (strength(Side::A), strength(Side::B));
        if a != b {
            return if a > b { Side::A } else { Side::B };
        }
        if self.side(Side::B).morale.value() > self.side(Side::A).morale.value() {
            Side::B
        } else {
            Side::A
        }
    }

    fn finish(&mut self, outcome: BattleOutcome, events: &mut BattleEventLog) {
        self.phase = BattlePhase::Finished;
        self.outcome = Some(outcome);
        tracing::info!(
            "{:?} ended at tick {}: side {:?} wins ({:?})",
            self.conflict,
            self.tick,
            outcome.winner,
            outcome.reason
        );
        self.log(
            events,
            BattleEventType::BattleEnded { outcome },
            format!("Battle ended: {:?}", outcome.reason),
        );
    }

    /// Stop and forget every tracked unit; commanders are left alone
    pub fn teardown<H: BattleHost + ?Sized>(&mut self, host: &mut H) {
        let mut ids: Vec<EntityId> = self
            .roster
            .keys()
            .copied()
            .filter(|id| !self.orders.contains_key(id))
            .collect();
        ids.sort();
        for id in ids {
            if host.is_alive(id) {
                host.stop(id);
            }
        }

        self.roster.clear();
        self.orders.clear();
        self.respawns.clear();
        self.stall.clear();
        self.slots = SlotBook::new();
        self.phase = BattlePhase::Finished;
    }

    // ===== COMMANDS =====

    /// Register a host entity as a commander for its faction's side
    pub fn enlist_commander(&mut self, id: EntityId, faction: FactionId) -> Result<Side, CommandRejection> {
        if self.is_finished() {
            return Err(CommandRejection::NoActiveBattle);
        }
        let side = self.side_of_faction(faction).ok_or(CommandRejection::NotAParticipant)?;
        let facing = self.sides[side.index()].facing;

        self.roster.entry(id).or_insert_with(|| Combatant::leader(id, faction, side));
        self.orders.entry(id).or_insert_with(|| Order::new(facing));
        Ok(side)
    }

    fn order_mut(&mut self, commander: EntityId) -> Result<&mut Order, CommandRejection> {
        if self.is_finished() {
            return Err(CommandRejection::NoActiveBattle);
        }
        self.orders.get_mut(&commander).ok_or(CommandRejection::NotACommander)
    }

    pub fn select_group(&mut self, commander: EntityId) -> Result<SelectedGroup, CommandRejection> {
        Ok(self.order_mut(commander)?.cycle_group())
    }

    pub fn order_move<H: EntityHost + ?Sized>(
        &mut self,
        commander: EntityId,
        point: Vec2,
        host: &H,
    ) -> Result<(), CommandRejection> {
        self.order_mut(commander)?;

        let position = host.position(commander).ok_or(CommandRejection::PositionUnknown)?;
        let distance = position.distance(&point);
        if distance > self.config.max_order_range {
            return Err(CommandRejection::OutOfRange {
                distance,
                max: self.config.max_order_range,
            });
        }
        if !self.zone.contains(point) {
            return Err(CommandRejection::OutsideZone);
        }

        self.order_mut(commander)?.issue_move(point);
        Ok(())
    }

    pub fn order_follow(&mut self, commander: EntityId) -> Result<(), CommandRejection> {
        self.order_mut(commander)?.issue_follow();
        Ok(())
    }

    /// Concede the battle for the commander's side
    pub fn surrender(&mut self, commander: EntityId) -> Result<Side, CommandRejection> {
        self.order_mut(commander)?;
        let side = self
            .roster
            .get(&commander)
            .map(|c| c.side)
            .ok_or(CommandRejection::NotACommander)?;

        if self.surrendered.is_none() {
            self.surrendered = Some(side);
            let event = BattleEvent {
                tick: self.tick,
                event_type: BattleEventType::SurrenderDeclared { side },
                description: format!("Side {:?} surrenders", side),
            };
            self.battle_log.push(event.clone());
            self.unreported.push(event);
        }
        Ok(side)
    }
}

fn face_toward(state: &mut SideState, from: Vec2, to: Vec2) {
    let facing = (to - from).normalize();
    if facing != Vec2::ZERO {
        state.facing = facing;
    }
}
