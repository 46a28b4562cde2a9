//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to an entity living in the host world
///
/// Never cached as a live reference: every use re-resolves it through the
/// host collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for factions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub u32);

impl FactionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Identity of a conflict between two factions, order-independent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConflictKey {
    pub low: FactionId,
    pub high: FactionId,
}

impl ConflictKey {
    pub fn new(a: FactionId, b: FactionId) -> Self {
        Self { low: a.min(b), high: a.max(b) }
    }

    pub fn involves(&self, faction: FactionId) -> bool {
        self.low == faction || self.high == faction
    }
}

/// Game tick counter (simulation time unit)
pub type Tick = u64;

/// Point or direction on the horizontal plane (world x / z)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, z: 0.0 };

    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.z * self.z).sqrt()
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.z * other.z
    }

    /// 2D cross product (signed area of the parallelogram)
    pub fn cross(&self, other: &Self) -> f32 {
        self.x * other.z - self.z * other.x
    }

    /// Rotated a quarter turn; with `self` as forward this points to the right
    pub fn perpendicular(&self) -> Self {
        Self { x: -self.z, z: self.x }
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            Self { x: self.x / len, z: self.z / len }
        } else {
            Self::default()
        }
    }

    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, z: self.z + rhs.z }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, z: self.z - rhs.z }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self { x: self.x * rhs, z: self.z * rhs }
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, z: -self.z }
    }
}

/// Axis-aligned rectangle in block coordinates, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl Rect {
    pub fn new(x0: i32, z0: i32, x1: i32, z1: i32) -> Self {
        Self {
            min_x: x0.min(x1),
            min_z: z0.min(z1),
            max_x: x0.max(x1),
            max_z: z0.max(z1),
        }
    }

    /// Square of side `2 * half` around a block position
    pub fn centered(cx: i32, cz: i32, half: i32) -> Self {
        let half = half.max(0);
        Self::new(cx - half, cz - half, cx + half, cz + half)
    }

    /// Degenerate rectangle covering a single block
    pub fn point(x: i32, z: i32) -> Self {
        Self::new(x, z, x, z)
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn depth(&self) -> i32 {
        self.max_z - self.min_z
    }

    /// Mean half extent over both axes
    pub fn half_extent(&self) -> f32 {
        (self.width() + self.depth()) as f32 / 4.0
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) as f32 / 2.0,
            (self.min_z + self.max_z) as f32 / 2.0,
        )
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min_x as f32
            && p.x <= self.max_x as f32
            && p.z >= self.min_z as f32
            && p.z <= self.max_z as f32
    }

    pub fn contains_block(&self, x: i32, z: i32) -> bool {
        x >= self.min_x && x <= self.max_x && z >= self.min_z && z <= self.max_z
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_z >= self.min_z
            && other.max_z <= self.max_z
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_z <= other.max_z
            && other.min_z <= self.max_z
    }

    /// Closest point of the rectangle to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.min_x as f32, self.max_x as f32),
            p.z.clamp(self.min_z as f32, self.max_z as f32),
        )
    }

    /// Clamp `p` into the rectangle shrunk by `margin` on every side
    ///
    /// A margin larger than half the rectangle collapses onto the center.
    pub fn clamp_inside(&self, p: Vec2, margin: f32) -> Vec2 {
        let c = self.center();
        let (lo_x, hi_x) = (self.min_x as f32 + margin, self.max_x as f32 - margin);
        let (lo_z, hi_z) = (self.min_z as f32 + margin, self.max_z as f32 - margin);
        Vec2::new(
            if lo_x <= hi_x { p.x.clamp(lo_x, hi_x) } else { c.x },
            if lo_z <= hi_z { p.z.clamp(lo_z, hi_z) } else { c.z },
        )
    }

    /// Pair of closest points between two rectangles (one on each)
    ///
    /// Where the projections overlap on an axis, both points sit at the middle
    /// of the overlap.
    pub fn closest_points(&self, other: &Rect) -> (Vec2, Vec2) {
        let (ax, bx) = closest_on_axis(self.min_x, self.max_x, other.min_x, other.max_x);
        let (az, bz) = closest_on_axis(self.min_z, self.max_z, other.min_z, other.max_z);
        (Vec2::new(ax, az), Vec2::new(bx, bz))
    }
}

fn closest_on_axis(a_min: i32, a_max: i32, b_min: i32, b_max: i32) -> (f32, f32) {
    if a_max < b_min {
        (a_max as f32, b_min as f32)
    } else if b_max < a_min {
        (a_min as f32, b_max as f32)
    } else {
        let lo = a_min.max(b_min) as f32;
        let hi = a_max.min(b_max) as f32;
        let mid = (lo + hi) / 2.0;
        (mid, mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_id_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<FactionId, &str> = HashMap::new();
        map.insert(FactionId(1), "north");
        assert_eq!(map.get(&FactionId(1)), Some(&"north"));
        assert_ne!(FactionId(1), FactionId(2));
    }

    #[test]
    fn test_conflict_key_order_independent() {
        let ab = ConflictKey::new(FactionId(3), FactionId(1));
        let ba = ConflictKey::new(FactionId(1), FactionId(3));
        assert_eq!(ab, ba);
        assert!(ab.involves(FactionId(3)));
        assert!(!ab.involves(FactionId(2)));
    }

    #[test]
    fn test_vec2_perpendicular_is_orthogonal() {
        let forward = Vec2::new(3.0, 4.0).normalize();
        let right = forward.perpendicular();
        assert!(forward.dot(&right).abs() < 1e-6);
        assert!((right.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_is_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_rect_new_normalizes_bounds() {
        let r = Rect::new(10, 5, -10, -5);
        assert_eq!(r.min_x, -10);
        assert_eq!(r.max_z, 5);
        assert_eq!(r.width(), 20);
        assert_eq!(r.center(), Vec2::ZERO);
    }

    #[test]
    fn test_rect_intersects() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.intersects(&Rect::new(10, 10, 20, 20)));
        assert!(!a.intersects(&Rect::new(11, 0, 20, 10)));
        assert!(a.contains_rect(&Rect::new(2, 2, 8, 8)));
    }

    #[test]
    fn test_closest_points_disjoint() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(100, 0, 110, 10);
        let (pa, pb) = a.closest_points(&b);
        assert_eq!(pa, Vec2::new(10.0, 5.0));
        assert_eq!(pb, Vec2::new(100.0, 5.0));
    }

    #[test]
    fn test_closest_points_of_single_points() {
        let a = Rect::point(0, 0);
        let b = Rect::point(400, 0);
        let (pa, pb) = a.closest_points(&b);
        assert_eq!(pa, Vec2::new(0.0, 0.0));
        assert_eq!(pb, Vec2::new(400.0, 0.0));
    }

    #[test]
    fn test_clamp_inside_respects_margin() {
        let r = Rect::new(0, 0, 100, 100);
        let p = r.clamp_inside(Vec2::new(-50.0, 150.0), 4.0);
        assert_eq!(p, Vec2::new(4.0, 96.0));

        let tiny = Rect::new(0, 0, 2, 2);
        assert_eq!(tiny.clamp_inside(Vec2::new(9.0, 9.0), 4.0), tiny.center());
    }
}
