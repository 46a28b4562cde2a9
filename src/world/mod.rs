//! Host world collaborators
//!
//! The engine never owns terrain, entities, treasuries or diplomatic state.
//! It reaches them through these traits, re-resolving ids on every use.
//! `Sandbox` is an in-memory implementation for tests and the headless runner.

pub mod heightmap;
pub mod sandbox;

use serde::{Deserialize, Serialize};

use crate::battle::combatant::Role;
use crate::core::types::{EntityId, FactionId, Rect, Vec2};

pub use heightmap::{Heightmap, TerrainFeature};
pub use sandbox::{NavCommand, Sandbox, SandboxEntity};

/// Movement speed requested from the navigation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeedTier {
    Slow,
    Fast,
}

/// What kind of body to spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Captain,
    Soldier(Role),
}

/// Stored resources a settlement can move between factions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Gold,
    Food,
    Timber,
    Stone,
    Iron,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Gold,
        ResourceKind::Food,
        ResourceKind::Timber,
        ResourceKind::Stone,
        ResourceKind::Iron,
    ];
}

/// Portion of one resource to move, in basis points (10_000 = 100%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShare {
    pub resource: ResourceKind,
    pub basis_points: u32,
}

/// Read-only block/height/fluid queries; must tolerate any coordinate
pub trait TerrainOracle {
    fn ground_height(&self, x: i32, z: i32) -> i32;
    fn has_surface_fluid(&self, x: i32, z: i32) -> bool;
    fn region_loaded(&self, x: i32, z: i32) -> bool;
}

/// Claimed faction land
pub trait TerritoryMap {
    fn owner_at(&self, x: i32, z: i32) -> Option<FactionId>;
    /// Bounding footprint of a faction's claims, if it has any
    fn claimed_bounds(&self, faction: FactionId) -> Option<Rect>;
}

/// Fire-and-forget movement commands
pub trait Navigation {
    fn move_to(&mut self, entity: EntityId, point: Vec2, tier: SpeedTier);
    fn stop(&mut self, entity: EntityId);
}

/// Unit lifecycle
pub trait EntityHost {
    fn spawn(&mut self, kind: UnitKind, faction: FactionId, position: Vec2, facing: Vec2) -> Option<EntityId>;
    fn is_alive(&self, id: EntityId) -> bool;
    fn position(&self, id: EntityId) -> Option<Vec2>;
    /// Place the entity directly, bypassing navigation
    fn teleport(&mut self, id: EntityId, point: Vec2);
}

/// Players (or other watchers) whose presence keeps battles alive
pub trait ObserverQuery {
    fn has_interested_observer(&self, faction: FactionId) -> bool;
    fn observer_in_zone(&self, zone: &Rect, factions: &[FactionId]) -> bool;
}

pub trait Economy {
    fn transfer(&mut self, winner: FactionId, loser: FactionId, shares: &[ResourceShare]);
}

pub trait Diplomacy {
    fn make_peace(&mut self, a: FactionId, b: FactionId);
    /// Returns false when the host refuses the relationship
    fn set_subordinate(&mut self, subordinate: FactionId, master: FactionId) -> bool;
    fn overlord_of(&self, faction: FactionId) -> Option<FactionId>;
}

/// Everything a running battle instance touches
pub trait BattleHost: Navigation + EntityHost + ObserverQuery {}

impl<T: Navigation + EntityHost + ObserverQuery + ?Sized> BattleHost for T {}

/// Everything the battle directory touches
pub trait WorldHost: TerrainOracle + TerritoryMap + BattleHost + Economy + Diplomacy {}

impl<T: TerrainOracle + TerritoryMap + BattleHost + Economy + Diplomacy + ?Sized> WorldHost for T {}
