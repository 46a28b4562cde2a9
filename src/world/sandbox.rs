//! In-memory host world
//!
//! Implements every collaborator trait over plain tables: a heightmap, rectangular
//! claims, an entity table with straight-line movement and dice-roll proximity
//! combat, a resource ledger, overlord links and observer positions. Every
//! navigation call is also recorded in `nav_log` so tests can assert on commands.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::combatant::Role;
use crate::battle::settlement::share_of;
use crate::core::types::{EntityId, FactionId, Rect, Vec2};
use crate::world::heightmap::Heightmap;
use crate::world::{
    Diplomacy, Economy, EntityHost, Navigation, ObserverQuery, ResourceKind, ResourceShare,
    SpeedTier, TerrainOracle, TerritoryMap, UnitKind,
};

/// A navigation call as received by the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NavCommand {
    MoveTo { entity: EntityId, point: Vec2, tier: SpeedTier },
    Stop { entity: EntityId },
    Teleport { entity: EntityId, point: Vec2 },
}

impl NavCommand {
    pub fn entity(&self) -> EntityId {
        match self {
            NavCommand::MoveTo { entity, .. }
            | NavCommand::Stop { entity }
            | NavCommand::Teleport { entity, .. } => *entity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxEntity {
    pub kind: UnitKind,
    pub faction: FactionId,
    pub position: Vec2,
    pub facing: Vec2,
    pub goal: Option<(Vec2, SpeedTier)>,
    pub alive: bool,
    /// Ignores move commands, as if its pathfinder were wedged
    pub stuck: bool,
}

/// Player or other watcher standing somewhere in the world
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Observer {
    pub position: Vec2,
    pub faction: FactionId,
}

/// Movement speeds and combat odds for the sandbox entity layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatRules {
    pub slow_speed: f32,
    pub fast_speed: f32,
    pub melee_reach: f32,
    pub ranged_reach: f32,
    pub melee_kill_chance: f64,
    pub ranged_kill_chance: f64,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            slow_speed: 0.5,
            fast_speed: 1.0,
            melee_reach: 2.5,
            ranged_reach: 22.0,
            melee_kill_chance: 0.06,
            ranged_kill_chance: 0.02,
        }
    }
}

pub struct Sandbox {
    pub terrain: Heightmap,
    claims: Vec<(FactionId, Rect)>,
    entities: AHashMap<EntityId, SandboxEntity>,
    observers: Vec<Observer>,
    ledger: AHashMap<FactionId, AHashMap<ResourceKind, u64>>,
    overlords: AHashMap<FactionId, FactionId>,
    pub peace_treaties: Vec<(FactionId, FactionId)>,
    pub nav_log: Vec<NavCommand>,
    pub rules: CombatRules,
    pub combat_enabled: bool,
    rng: ChaCha8Rng,
}

impl Sandbox {
    pub fn new(terrain: Heightmap, seed: u64) -> Self {
        Self {
            terrain,
            claims: Vec::new(),
            entities: AHashMap::new(),
            observers: Vec::new(),
            ledger: AHashMap::new(),
            overlords: AHashMap::new(),
            peace_treaties: Vec::new(),
            nav_log: Vec::new(),
            rules: CombatRules::default(),
            combat_enabled: true,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn claim(&mut self, faction: FactionId, area: Rect) {
        self.claims.push((faction, area));
    }

    pub fn add_observer(&mut self, faction: FactionId, position: Vec2) {
        self.observers.push(Observer { position, faction });
    }

    pub fn clear_observers(&mut self) {
        self.observers.clear();
    }

    pub fn deposit(&mut self, faction: FactionId, resource: ResourceKind, amount: u64) {
        *self.ledger.entry(faction).or_default().entry(resource).or_insert(0) += amount;
    }

    pub fn balance(&self, faction: FactionId, resource: ResourceKind) -> u64 {
        self.ledger
            .get(&faction)
            .and_then(|stock| stock.get(&resource))
            .copied()
            .unwrap_or(0)
    }

    pub fn entity(&self, id: EntityId) -> Option<&SandboxEntity> {
        self.entities.get(&id)
    }

    pub fn kill(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.alive = false;
        }
    }

    pub fn set_stuck(&mut self, id: EntityId, stuck: bool) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.stuck = stuck;
        }
    }

    /// Move an entity without logging a command (scripted test setup)
    pub fn place(&mut self, id: EntityId, position: Vec2) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.position = position;
        }
    }

    pub fn living(&self, faction: FactionId) -> usize {
        self.entities
            .values()
            .filter(|e| e.alive && e.faction == faction)
            .count()
    }

    /// Advance the entity layer by one tick: movement, then combat
    pub fn step(&mut self) {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort();

        for id in &ids {
            if let Some(entity) = self.entities.get_mut(id) {
                advance_entity(entity, &self.rules);
            }
        }

        if self.combat_enabled {
            self.resolve_combat(&ids);
        }
    }

    fn resolve_combat(&mut self, ids: &[EntityId]) {
        let fighters: Vec<(EntityId, FactionId, Vec2, UnitKind)> = ids
            .iter()
            .filter_map(|id| {
                self.entities
                    .get(id)
                    .filter(|e| e.alive)
                    .map(|e| (*id, e.faction, e.position, e.kind))
            })
            .collect();

        let mut killed = Vec::new();
        for (_, faction, position, kind) in &fighters {
            let (reach, chance) = match kind {
                UnitKind::Soldier(Role::Ranged) => (self.rules.ranged_reach, self.rules.ranged_kill_chance),
                _ => (self.rules.melee_reach, self.rules.melee_kill_chance),
            };

            let victim = fighters
                .iter()
                .filter(|(_, f, p, _)| f != faction && p.distance(position) <= reach)
                .min_by(|a, b| {
                    a.2.distance_squared(position)
                        .total_cmp(&b.2.distance_squared(position))
                });

            if let Some((victim_id, ..)) = victim {
                if self.rng.gen_bool(chance) {
                    killed.push(*victim_id);
                }
            }
        }

        for id in killed {
            self.kill(id);
        }
    }
}

fn advance_entity(entity: &mut SandboxEntity, rules: &CombatRules) {
    if !entity.alive || entity.stuck {
        return;
    }
    let Some((goal, tier)) = entity.goal else {
        return;
    };

    let speed = match tier {
        SpeedTier::Slow => rules.slow_speed,
        SpeedTier::Fast => rules.fast_speed,
    };
    let to_goal = goal - entity.position;
    let distance = to_goal.length();

    if distance <= speed {
        entity.position = goal;
        entity.goal = None;
    } else {
        entity.facing = to_goal.normalize();
        entity.position = entity.position + entity.facing * speed;
    }
}

impl TerrainOracle for Sandbox {
    fn ground_height(&self, x: i32, z: i32) -> i32 {
        self.terrain.ground_height(x, z)
    }

    fn has_surface_fluid(&self, x: i32, z: i32) -> bool {
        self.terrain.has_surface_fluid(x, z)
    }

    fn region_loaded(&self, x: i32, z: i32) -> bool {
        self.terrain.region_loaded(x, z)
    }
}

impl TerritoryMap for Sandbox {
    fn owner_at(&self, x: i32, z: i32) -> Option<FactionId> {
        self.claims
            .iter()
            .find(|(_, area)| area.contains_block(x, z))
            .map(|(faction, _)| *faction)
    }

    fn claimed_bounds(&self, faction: FactionId) -> Option<Rect> {
        self.claims
            .iter()
            .filter(|(f, _)| *f == faction)
            .map(|(_, area)| *area)
            .reduce(|acc, area| {
                Rect::new(
                    acc.min_x.min(area.min_x),
                    acc.min_z.min(area.min_z),
                    acc.max_x.max(area.max_x),
                    acc.max_z.max(area.max_z),
                )
            })
    }
}

impl Navigation for Sandbox {
    fn move_to(&mut self, entity: EntityId, point: Vec2, tier: SpeedTier) {
        self.nav_log.push(NavCommand::MoveTo { entity, point, tier });
        if let Some(e) = self.entities.get_mut(&entity) {
            e.goal = Some((point, tier));
        }
    }

    fn stop(&mut self, entity: EntityId) {
        self.nav_log.push(NavCommand::Stop { entity });
        if let Some(e) = self.entities.get_mut(&entity) {
            e.goal = None;
        }
    }
}

impl EntityHost for Sandbox {
    fn spawn(&mut self, kind: UnitKind, faction: FactionId, position: Vec2, facing: Vec2) -> Option<EntityId> {
        let id = EntityId::new();
        self.entities.insert(
            id,
            SandboxEntity {
                kind,
                faction,
                position,
                facing,
                goal: None,
                alive: true,
                stuck: false,
            },
        );
        Some(id)
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.alive)
    }

    fn position(&self, id: EntityId) -> Option<Vec2> {
        self.entities.get(&id).map(|e| e.position)
    }

    fn teleport(&mut self, id: EntityId, point: Vec2) {
        self.nav_log.push(NavCommand::Teleport { entity: id, point });
        if let Some(e) = self.entities.get_mut(&id) {
            e.position = point;
        }
    }
}

impl ObserverQuery for Sandbox {
    fn has_interested_observer(&self, faction: FactionId) -> bool {
        self.observers.iter().any(|o| o.faction == faction)
    }

    fn observer_in_zone(&self, zone: &Rect, factions: &[FactionId]) -> bool {
        self.observers
            .iter()
            .any(|o| factions.contains(&o.faction) && zone.contains(o.position))
    }
}

impl Economy for Sandbox {
    fn transfer(&mut self, winner: FactionId, loser: FactionId, shares: &[ResourceShare]) {
        for share in shares {
            let amount = share_of(self.balance(loser, share.resource), share.basis_points);
            if amount == 0 {
                continue;
            }
            if let Some(stock) = self.ledger.get_mut(&loser).and_then(|s| s.get_mut(&share.resource)) {
                *stock -= amount;
            }
            self.deposit(winner, share.resource, amount);
        }
    }
}

impl Diplomacy for Sandbox {
    fn make_peace(&mut self, a: FactionId, b: FactionId) {
        self.peace_treaties.push((a, b));
    }

    fn set_subordinate(&mut self, subordinate: FactionId, master: FactionId) -> bool {
        if subordinate == master {
            return false;
        }
        self.overlords.insert(subordinate, master);
        true
    }

    fn overlord_of(&self, faction: FactionId) -> Option<FactionId> {
        self.overlords.get(&faction).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        let mut sandbox = Sandbox::new(Heightmap::flat(64), 1);
        sandbox.combat_enabled = false;
        sandbox
    }

    #[test]
    fn test_entity_walks_to_goal() {
        let mut sb = sandbox();
        let id = sb
            .spawn(UnitKind::Soldier(Role::Melee), FactionId(1), Vec2::ZERO, Vec2::new(1.0, 0.0))
            .unwrap();
        sb.move_to(id, Vec2::new(3.0, 0.0), SpeedTier::Fast);

        for _ in 0..3 {
            sb.step();
        }

        assert_eq!(sb.position(id), Some(Vec2::new(3.0, 0.0)));
        assert!(sb.entity(id).unwrap().goal.is_none());
    }

    #[test]
    fn test_stuck_entity_does_not_move() {
        let mut sb = sandbox();
        let id = sb
            .spawn(UnitKind::Soldier(Role::Melee), FactionId(1), Vec2::ZERO, Vec2::new(1.0, 0.0))
            .unwrap();
        sb.set_stuck(id, true);
        sb.move_to(id, Vec2::new(30.0, 0.0), SpeedTier::Fast);
        sb.step();
        assert_eq!(sb.position(id), Some(Vec2::ZERO));
    }

    #[test]
    fn test_transfer_is_integer_exact() {
        let mut sb = sandbox();
        sb.deposit(FactionId(2), ResourceKind::Gold, 1000);
        sb.transfer(
            FactionId(1),
            FactionId(2),
            &[ResourceShare { resource: ResourceKind::Gold, basis_points: 1000 }],
        );
        assert_eq!(sb.balance(FactionId(1), ResourceKind::Gold), 100);
        assert_eq!(sb.balance(FactionId(2), ResourceKind::Gold), 900);
    }

    #[test]
    fn test_claimed_bounds_merges_claims() {
        let mut sb = sandbox();
        sb.claim(FactionId(1), Rect::new(0, 0, 10, 10));
        sb.claim(FactionId(1), Rect::new(20, -5, 30, 5));
        assert_eq!(sb.claimed_bounds(FactionId(1)), Some(Rect::new(0, -5, 30, 10)));
        assert_eq!(sb.claimed_bounds(FactionId(2)), None);
        assert_eq!(sb.owner_at(25, 0), Some(FactionId(1)));
        assert_eq!(sb.owner_at(15, 0), None);
    }

    #[test]
    fn test_combat_kills_adjacent_enemies_eventually() {
        let mut sb = Sandbox::new(Heightmap::flat(64), 3);
        let a = sb
            .spawn(UnitKind::Soldier(Role::Melee), FactionId(1), Vec2::ZERO, Vec2::new(1.0, 0.0))
            .unwrap();
        let b = sb
            .spawn(UnitKind::Soldier(Role::Melee), FactionId(2), Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0))
            .unwrap();

        for _ in 0..2000 {
            sb.step();
        }

        assert!(!sb.is_alive(a) || !sb.is_alive(b));
    }
}
