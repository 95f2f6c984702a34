// Core types shared across the world engine.
//
// Defines the 2-D tile coordinate (`Vec2`), axis-aligned rectangles, and the
// strongly-typed identifiers used to refer to levels, worlds, creatures,
// items, triggers, stairs and tribes. Identifiers are plain integers: the
// engine never hands out references into its storage, only ids that are
// resolved through the owning `Realm`/`Level`.
//
// See also: `position.rs` for the (level, coordinate) locator built on these,
// `grid.rs` for the dense storage indexed by `Vec2`.

use delve_prng::GameRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A tile coordinate. X grows east, Y grows south.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

const DIRS4: [Vec2; 4] = [
    Vec2::new(0, -1),
    Vec2::new(1, 0),
    Vec2::new(0, 1),
    Vec2::new(-1, 0),
];

const DIRS8: [Vec2; 8] = [
    Vec2::new(0, -1),
    Vec2::new(1, -1),
    Vec2::new(1, 0),
    Vec2::new(1, 1),
    Vec2::new(0, 1),
    Vec2::new(-1, 1),
    Vec2::new(-1, 0),
    Vec2::new(-1, -1),
];

impl Vec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The four orthogonal unit directions, clockwise from north.
    pub fn directions4() -> [Vec2; 4] {
        DIRS4
    }

    /// The eight unit directions, clockwise from north.
    pub fn directions8() -> [Vec2; 8] {
        DIRS8
    }

    pub fn neighbors4(self) -> [Vec2; 4] {
        DIRS4.map(|d| self + d)
    }

    pub fn neighbors8(self) -> [Vec2; 8] {
        DIRS8.map(|d| self + d)
    }

    /// `neighbors4` in an order drawn from `rng`.
    pub fn neighbors4_shuffled(self, rng: &mut GameRng) -> [Vec2; 4] {
        let mut n = self.neighbors4();
        rng.shuffle(&mut n);
        n
    }

    /// `neighbors8` in an order drawn from `rng`.
    pub fn neighbors8_shuffled(self, rng: &mut GameRng) -> [Vec2; 8] {
        let mut n = self.neighbors8();
        rng.shuffle(&mut n);
        n
    }

    /// Chebyshev distance: king moves between the two tiles.
    pub fn dist8(self, other: Vec2) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// True for the four orthogonal unit vectors.
    pub fn is_cardinal4(self) -> bool {
        self.x.abs() + self.y.abs() == 1
    }

    /// True for the eight unit vectors (orthogonal and diagonal).
    pub fn is_cardinal8(self) -> bool {
        self != Vec2::default() && self.x.abs() <= 1 && self.y.abs() <= 1
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Half-open axis-aligned rectangle `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Square of side `2 * radius + 1` centered on `center`.
    pub fn centered(center: Vec2, radius: i32) -> Self {
        Self {
            min: Vec2::new(center.x - radius, center.y - radius),
            max: Vec2::new(center.x + radius + 1, center.y + radius + 1),
        }
    }

    pub fn width(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, v: Vec2) -> bool {
        v.x >= self.min.x && v.y >= self.min.y && v.x < self.max.x && v.y < self.max.y
    }

    pub fn translate(&self, by: Vec2) -> Rect {
        Rect::new(self.min + by, self.max + by)
    }

    /// Intersection with `other`; empty rectangles come back with zero area.
    pub fn intersection(&self, other: &Rect) -> Rect {
        let min = Vec2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Vec2::new(
            self.max.x.min(other.max.x).max(min.x),
            self.max.y.min(other.max.y).max(min.y),
        );
        Rect::new(min, max)
    }

    /// All coordinates, row-major.
    pub fn iter(&self) -> impl Iterator<Item = Vec2> + '_ {
        (self.min.y..self.max.y)
            .flat_map(move |y| (self.min.x..self.max.x).map(move |x| Vec2::new(x, y)))
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! plain_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

plain_id!(/// A self-contained world (the original game's "model"): a set of levels
/// that creatures move between by stairs. Moving between worlds is an
/// extraction followed by a landing.
WorldId(u32));
plain_id!(/// A creature registered in the `Realm`.
CreatureId(u64));
plain_id!(/// An item lying on some tile.
ItemId(u64));
plain_id!(/// A trigger (trap, alarm, portal) attached to a tile.
TriggerId(u64));
plain_id!(/// Links landing tiles across levels. Two levels sharing a key are
/// connected by stairs (or a hole) with that key.
StairKey(u32));
plain_id!(/// A faction. Used for furniture ownership and forbidden zones.
TribeId(u16));

impl TribeId {
    /// Owner of wild terrain and unowned furniture.
    pub const NEUTRAL: TribeId = TribeId(0);
}

/// Identity of a level: the world it belongs to plus its index there.
///
/// Ordering is world-major, which gives `Position` its level-major order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LevelId {
    pub world: WorldId,
    pub index: u32,
}

impl LevelId {
    pub const fn new(world: WorldId, index: u32) -> Self {
        Self { world, index }
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Level({}:{})", self.world.0, self.index)
    }
}

/// Vision capability used by `can_see_thru` checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VisionId {
    Normal,
    Night,
    Elf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dist8_is_chebyshev() {
        assert_eq!(Vec2::new(0, 0).dist8(Vec2::new(3, -5)), 5);
        assert_eq!(Vec2::new(2, 2).dist8(Vec2::new(2, 2)), 0);
    }

    #[test]
    fn cardinal_checks() {
        assert!(Vec2::new(1, 0).is_cardinal4());
        assert!(!Vec2::new(1, 1).is_cardinal4());
        assert!(Vec2::new(1, 1).is_cardinal8());
        assert!(!Vec2::new(0, 0).is_cardinal8());
        assert!(!Vec2::new(2, 0).is_cardinal8());
    }

    #[test]
    fn neighbors8_are_distinct_and_adjacent() {
        let c = Vec2::new(5, 5);
        let n = c.neighbors8();
        for v in n {
            assert_eq!(c.dist8(v), 1);
        }
        let mut sorted = n.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 8);
    }

    #[test]
    fn shuffled_neighbors_keep_the_same_set() {
        let mut rng = GameRng::new(1);
        let c = Vec2::new(0, 0);
        let mut a = c.neighbors4_shuffled(&mut rng).to_vec();
        let mut b = c.neighbors4().to_vec();
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn rect_iteration_and_contains() {
        let r = Rect::centered(Vec2::new(1, 1), 1);
        assert_eq!(r.width(), 3);
        assert_eq!(r.iter().count(), 9);
        assert!(r.contains(Vec2::new(0, 0)));
        assert!(!r.contains(Vec2::new(3, 1)));
    }

    #[test]
    fn rect_intersection_clamps_to_empty() {
        let a = Rect::new(Vec2::new(0, 0), Vec2::new(4, 4));
        let b = Rect::new(Vec2::new(10, 10), Vec2::new(12, 12));
        assert_eq!(a.intersection(&b).iter().count(), 0);
        let c = Rect::new(Vec2::new(2, 2), Vec2::new(6, 6));
        assert_eq!(a.intersection(&c).iter().count(), 4);
    }

    #[test]
    fn level_ids_order_world_major() {
        let a = LevelId::new(WorldId(0), 5);
        let b = LevelId::new(WorldId(1), 0);
        assert!(a < b);
    }
}
