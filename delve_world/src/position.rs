// Position: the public façade over the world state.
//
// A `Position` is a plain value, a coordinate plus the id of the level it is
// on. It owns nothing. Every spatial query and mutation in the engine is a
// method on it that takes the `Realm` explicitly (`&Realm` for reads,
// `&mut Realm` for writes), resolves the level, and delegates to `Level`,
// `Square` and `Furniture`.
//
// Operations are total. A position whose level is missing, unknown to the
// realm, or whose coordinate is out of bounds is *invalid*, and every
// operation on it returns a neutral value (`false`, `None`, empty) instead
// of failing. Contract violations on valid positions (constructing where
// nothing can be built, moving into an occupied tile, removing the wrong
// furniture) are bugs and panic.
//
// Mutations that change traversability always end in
// `Level::invalidate`, so when a call returns, the sectors of every movement
// class and the dirty flags are already up to date. Side effects worth
// reporting (deaths, fires, collapses) are pushed to the realm's event log.
//
// See also: `level.rs` for the traversal rules and invalidation, `realm.rs`
// for level changes and landings, `event.rs` for the events emitted here.

use crate::creature::Creature;
use crate::event::{DestroyCause, WorldEvent};
use crate::furniture::{ConstructionRecord, Furniture, FurnitureType, UsageType};
use crate::item::{Item, ItemIndex, stack_items};
use crate::level::{Invalidation, Level, site_accepts};
use crate::movement::{DestroyAction, MovementTrait, MovementType};
use crate::realm::Realm;
use crate::square::{DropEffect, EnterEffect, Square};
use crate::terrain::{SquareType, water_of_depth};
use crate::trigger::Trigger;
use crate::types::{
    CreatureId, ItemId, LevelId, Rect, StairKey, TribeId, TriggerId, Vec2, VisionId,
};
use crate::view::{ViewIndex, ViewObject};
use delve_prng::GameRng;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `dist8` between positions on different levels, or involving an invalid
/// position.
pub const OTHER_LEVEL: i32 = 1_000_000;

/// A tile locator. Ordered level-major, coordinate-minor; a position without
/// a level orders first.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Position {
    level: Option<LevelId>,
    coord: Vec2,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Some(level) => write!(f, "{}@{level}", self.coord),
            None => write!(f, "{}@nowhere", self.coord),
        }
    }
}

impl Position {
    // -----------------------------------------------------------------------
    // Identity and geometry
    // -----------------------------------------------------------------------

    pub fn new(coord: Vec2, level: LevelId) -> Self {
        Self {
            level: Some(level),
            coord,
        }
    }

    /// A position on no level.
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn coord(&self) -> Vec2 {
        self.coord
    }

    pub fn level(&self) -> Option<LevelId> {
        self.level
    }

    pub fn is_valid(&self, realm: &Realm) -> bool {
        self.level_in(realm).is_some()
    }

    pub fn is_same_level(&self, other: Position) -> bool {
        self.level.is_some() && self.level == other.level
    }

    pub fn is_same_world(&self, other: Position) -> bool {
        match (self.level, other.level) {
            (Some(a), Some(b)) => a.world == b.world,
            _ => false,
        }
    }

    pub fn dist8(&self, other: Position) -> i32 {
        if self.is_same_level(other) {
            self.coord.dist8(other.coord)
        } else {
            OTHER_LEVEL
        }
    }

    /// Offset from here to `other`. Both must be on the same level.
    pub fn dir_to(&self, other: Position) -> Vec2 {
        assert!(
            self.is_same_level(other),
            "dir_to between different levels: {self} -> {other}"
        );
        other.coord - self.coord
    }

    pub fn plus(&self, dir: Vec2) -> Position {
        self.with_coord(self.coord + dir)
    }

    pub fn minus(&self, dir: Vec2) -> Position {
        self.with_coord(self.coord - dir)
    }

    /// Same level, another coordinate.
    pub fn with_coord(&self, coord: Vec2) -> Position {
        Position {
            level: self.level,
            coord,
        }
    }

    pub fn neighbors4(&self) -> [Position; 4] {
        self.coord.neighbors4().map(|v| self.with_coord(v))
    }

    pub fn neighbors8(&self) -> [Position; 8] {
        self.coord.neighbors8().map(|v| self.with_coord(v))
    }

    pub fn neighbors4_shuffled(&self, rng: &mut GameRng) -> [Position; 4] {
        self.coord.neighbors4_shuffled(rng).map(|v| self.with_coord(v))
    }

    pub fn neighbors8_shuffled(&self, rng: &mut GameRng) -> [Position; 8] {
        self.coord.neighbors8_shuffled(rng).map(|v| self.with_coord(v))
    }

    /// Every position of `rect` on this level, row-major.
    pub fn rectangle(&self, rect: Rect) -> Vec<Position> {
        rect.iter().map(|v| self.with_coord(v)).collect()
    }

    fn level_in<'a>(&self, realm: &'a Realm) -> Option<&'a Level> {
        let level = realm.level(self.level?)?;
        level.in_bounds(self.coord).then_some(level)
    }

    fn level_in_mut<'a>(&self, realm: &'a mut Realm) -> Option<&'a mut Level> {
        let level = realm.level_mut(self.level?)?;
        if level.in_bounds(self.coord) {
            Some(level)
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn square<'a>(&self, realm: &'a Realm) -> Option<&'a Square> {
        self.level_in(realm)?.square(self.coord)
    }

    pub fn furniture<'a>(&self, realm: &'a Realm) -> Option<&'a Furniture> {
        self.level_in(realm)?.furniture(self.coord)
    }

    pub fn creature(&self, realm: &Realm) -> Option<CreatureId> {
        self.level_in(realm)?.creature_at(self.coord)
    }

    pub fn creature_ref<'a>(&self, realm: &'a Realm) -> Option<&'a Creature> {
        realm.creature(self.creature(realm)?)
    }

    /// Furniture name over terrain name.
    pub fn name(&self, realm: &Realm) -> String {
        if let Some(f) = self.furniture(realm) {
            f.name().to_string()
        } else if let Some(sq) = self.square(realm) {
            sq.name().to_string()
        } else {
            String::new()
        }
    }

    /// Furniture view over terrain view.
    pub fn view_object(&self, realm: &Realm) -> ViewObject {
        if let Some(f) = self.furniture(realm) {
            f.view_object()
        } else if let Some(sq) = self.square(realm) {
            sq.view_object().clone()
        } else {
            ViewObject::empty()
        }
    }

    pub fn view_index(&self, realm: &Realm) -> ViewIndex {
        self.level_in(realm)
            .map(|level| level.view_index(self.coord))
            .unwrap_or_default()
    }

    pub fn items<'a>(&self, realm: &'a Realm) -> &'a [Item] {
        self.square(realm).map_or(&[], Square::items)
    }

    pub fn items_by_index<'a>(&self, realm: &'a Realm, index: ItemIndex) -> Vec<&'a Item> {
        self.square(realm)
            .map(|sq| sq.items_by_index(index))
            .unwrap_or_default()
    }

    pub fn items_matching<'a>(
        &self,
        realm: &'a Realm,
        predicate: impl FnMut(&Item) -> bool,
    ) -> Vec<&'a Item> {
        self.square(realm)
            .map(|sq| sq.items_matching(predicate))
            .unwrap_or_default()
    }

    pub fn triggers<'a>(&self, realm: &'a Realm) -> &'a [Trigger] {
        self.square(realm).map_or(&[], Square::triggers)
    }

    pub fn usage_type(&self, realm: &Realm) -> Option<UsageType> {
        self.furniture(realm)?.usage()
    }

    /// Ticks it takes to apply the tile.
    pub fn apply_time(&self, realm: &Realm) -> u32 {
        self.furniture(realm).map_or(1, Furniture::usage_time)
    }

    pub fn can_hide(&self, realm: &Realm) -> bool {
        self.square(realm).is_some_and(Square::can_hide)
    }

    pub fn is_covered(&self, realm: &Realm) -> bool {
        self.level_in(realm)
            .is_some_and(|level| level.is_covered(self.coord))
    }

    /// Exposed to a sunlit sky.
    pub fn sunlight_burns(&self, realm: &Realm) -> bool {
        self.level_in(realm)
            .is_some_and(|level| level.sunlight() && !level.is_covered(self.coord))
    }

    pub fn poison_gas(&self, realm: &Realm) -> f64 {
        self.square(realm).map_or(0.0, Square::poison_gas)
    }

    pub fn landing_link(&self, realm: &Realm) -> Option<StairKey> {
        self.square(realm)?.landing_link()
    }

    pub fn forbidden_tribes<'a>(&self, realm: &'a Realm) -> &'a [TribeId] {
        self.square(realm)
            .map_or(&[], |sq| sq.movement().forbidden_tribes())
    }

    pub fn is_tribe_forbidden(&self, realm: &Realm, tribe: TribeId) -> bool {
        self.square(realm)
            .is_some_and(|sq| sq.is_tribe_forbidden(tribe))
    }

    pub fn is_burning(&self, realm: &Realm) -> bool {
        self.furniture(realm).is_some_and(Furniture::is_burning)
    }

    /// Invalid positions count as unavailable.
    pub fn is_unavailable(&self, realm: &Realm) -> bool {
        self.level_in(realm)
            .is_none_or(|level| level.is_unavailable(self.coord))
    }

    pub fn is_active_construction(&self, realm: &Realm) -> bool {
        let Some(level) = self.level_in(realm) else {
            return false;
        };
        !level.is_unavailable(self.coord)
            && (level.construction(self.coord).is_some()
                || level
                    .square(self.coord)
                    .is_some_and(Square::is_active_construction))
    }

    pub fn construction<'a>(&self, realm: &'a Realm) -> Option<&'a ConstructionRecord> {
        self.level_in(realm)?.construction(self.coord)
    }

    pub fn can_see_thru(&self, realm: &Realm, vision: VisionId) -> bool {
        self.square(realm).is_some_and(|sq| sq.can_see_thru(vision))
            && !self.furniture(realm).is_some_and(Furniture::blocks_vision)
    }

    /// Creatures within Chebyshev distance `range`, row-major.
    pub fn creatures_in_range(&self, realm: &Realm, range: i32) -> Vec<CreatureId> {
        self.level_in(realm)
            .map(|level| {
                level
                    .creatures_in(Rect::centered(self.coord, range))
                    .into_iter()
                    .map(|(_, id)| id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The landing on this level closest to here whose stairs lead to the
    /// level of `other`.
    pub fn stairs_to(&self, realm: &Realm, other: Position) -> Option<Position> {
        if self.is_same_level(other) {
            return None;
        }
        let here = self.level_in(realm)?;
        let there = other.level_in(realm)?;
        here.stair_keys()
            .filter(|key| !there.landings(*key).is_empty())
            .flat_map(|key| here.landings(key).iter().copied())
            .min_by_key(|v| (v.dist8(self.coord), *v))
            .map(|v| self.with_coord(v))
    }

    pub fn needs_render_update(&self, realm: &Realm) -> bool {
        self.level_in(realm)
            .is_some_and(|level| level.needs_render_update(self.coord))
    }

    pub fn set_needs_render_update(&self, realm: &mut Realm, value: bool) {
        if let Some(level) = self.level_in_mut(realm) {
            level.set_needs_render_update(self.coord, value);
        }
    }

    pub fn needs_memory_update(&self, realm: &Realm) -> bool {
        self.level_in(realm)
            .is_some_and(|level| level.needs_memory_update(self.coord))
    }

    pub fn set_needs_memory_update(&self, realm: &mut Realm, value: bool) {
        if let Some(level) = self.level_in_mut(realm) {
            level.set_needs_memory_update(self.coord, value);
        }
    }

    // -----------------------------------------------------------------------
    // Traversal
    // -----------------------------------------------------------------------

    /// Available, unoccupied, and enterable.
    pub fn can_enter(&self, realm: &Realm, movement: &MovementType) -> bool {
        self.creature(realm).is_none() && self.can_enter_empty(realm, movement)
    }

    pub fn can_enter_creature(&self, realm: &Realm, creature: CreatureId) -> bool {
        realm
            .creature(creature)
            .is_some_and(|c| self.can_enter(realm, c.movement()))
    }

    pub fn can_enter_empty(&self, realm: &Realm, movement: &MovementType) -> bool {
        self.level_in(realm)
            .is_some_and(|level| level.can_enter_empty(self.coord, movement))
    }

    pub fn can_navigate(&self, realm: &Realm, movement: &MovementType) -> bool {
        self.level_in(realm)
            .is_some_and(|level| level.can_navigate(self.coord, movement))
    }

    pub fn can_destroy(&self, realm: &Realm, movement: &MovementType) -> bool {
        self.level_in(realm)
            .is_some_and(|level| level.can_destroy(self.coord, movement))
    }

    /// Whether the occupant of this tile can step by `dir`.
    pub fn can_move_creature(&self, realm: &Realm, dir: Vec2) -> bool {
        if self.is_unavailable(realm) {
            return false;
        }
        let Some(creature) = self.creature_ref(realm) else {
            return false;
        };
        let no_diagonal_passing = self
            .level_in(realm)
            .is_some_and(Level::no_diagonal_passing);
        if no_diagonal_passing
            && dir.is_cardinal8()
            && !dir.is_cardinal4()
            && !self.plus(Vec2::new(dir.x, 0)).can_pass(realm, creature)
            && !self.plus(Vec2::new(0, dir.y)).can_pass(realm, creature)
        {
            return false;
        }
        self.plus(dir).can_enter(realm, creature.movement())
    }

    /// Whether the tile could be squeezed past: enterable if empty and not
    /// held by a boulder.
    fn can_pass(&self, realm: &Realm, creature: &Creature) -> bool {
        self.can_enter_empty(realm, creature.movement())
            && !self.creature_ref(realm).is_some_and(Creature::is_boulder)
    }

    /// Moves to another level are not checked here.
    /// Whether `move_creature_to(to)` would succeed for the occupant. Across
    /// worlds that means some tile near `to` is free to land on.
    pub fn can_move_creature_to(&self, realm: &Realm, to: Position) -> bool {
        if self.is_same_level(to) {
            return self.can_move_creature(realm, self.dir_to(to));
        }
        let Some(id) = self.creature(realm) else {
            return false;
        };
        if self.is_same_world(to) {
            to.can_enter_creature(realm, id)
        } else {
            realm.find_landing(id, to).is_some()
        }
    }

    pub fn is_connected_to(&self, realm: &mut Realm, other: Position, movement: &MovementType) -> bool {
        if !self.is_same_level(other) || !other.is_valid(realm) {
            return false;
        }
        let coord = other.coord;
        self.level_in_mut(realm)
            .is_some_and(|level| level.are_connected(self.coord, coord, movement))
    }

    pub fn is_chokepoint(&self, realm: &mut Realm, movement: &MovementType) -> bool {
        self.level_in_mut(realm)
            .is_some_and(|level| level.is_chokepoint(self.coord, movement))
    }

    /// Whether `kind` can be built here: the site fits, and the tile holds no
    /// furniture or only replaceable furniture of another kind.
    pub fn can_construct(&self, realm: &Realm, kind: FurnitureType) -> bool {
        let Some(level) = self.level_in(realm) else {
            return false;
        };
        let (Some(def), Some(square)) = (realm.catalog().def(kind), level.square(self.coord))
        else {
            return false;
        };
        !level.is_unavailable(self.coord)
            && site_accepts(def.build_site, square)
            && level
                .furniture(self.coord)
                .is_none_or(|f| f.is_replaceable() && f.kind() != kind)
    }

    pub fn can_construct_square(&self, realm: &Realm, target: SquareType) -> bool {
        !self.is_unavailable(realm)
            && self.square(realm).is_some_and(|sq| sq.can_construct(target))
    }

    /// Solid rock a door or torch could be set into.
    pub fn can_support_door_or_torch(&self, realm: &Realm) -> bool {
        self.can_construct_square(realm, SquareType::Floor)
            && !self.can_enter_empty(
                realm,
                &MovementType::single(TribeId::NEUTRAL, MovementTrait::Walk),
            )
    }

    // -----------------------------------------------------------------------
    // Creatures
    // -----------------------------------------------------------------------

    /// Place a creature that is not on the map yet.
    pub fn add_creature(&self, realm: &mut Realm, id: CreatureId) {
        let placed = realm.creature(id).map(Creature::position);
        assert!(
            placed.is_some_and(|p| p.level.is_none()),
            "add_creature: {id} is unknown or already placed at {placed:?}"
        );
        self.put_creature(realm, id);
    }

    /// Put a creature here, taking it off its current tile. Runs the
    /// terrain's on-enter effect.
    pub fn put_creature(&self, realm: &mut Realm, id: CreatureId) {
        assert!(self.is_valid(realm), "put_creature on invalid {self}");
        realm.unplace_creature(id);
        realm.place_creature(id, *self);
        self.run_enter_effects(realm, id);
    }

    /// Take the occupant off the map. It stays registered in the realm.
    pub fn remove_creature(&self, realm: &mut Realm) -> Option<CreatureId> {
        let id = self.creature(realm)?;
        realm.unplace_creature(id);
        Some(id)
    }

    /// Step the occupant by `dir` within the level.
    pub fn move_creature(&self, realm: &mut Realm, dir: Vec2) {
        assert!(self.is_valid(realm), "move_creature on invalid {self}");
        assert!(
            self.can_move_creature(realm, dir),
            "move_creature: cannot move from {self} by {dir}"
        );
        let Some(id) = self.creature(realm) else {
            return;
        };
        let to = self.plus(dir);
        realm.unplace_creature(id);
        realm.place_creature(id, to);
        to.run_enter_effects(realm, id);
    }

    /// Move the occupant to `to`: a step on the same level, a level change
    /// within the world, or extraction and landing in another world.
    pub fn move_creature_to(&self, realm: &mut Realm, to: Position) {
        assert!(self.is_valid(realm), "move_creature_to from invalid {self}");
        let id = match self.creature(realm) {
            Some(id) => id,
            None => panic!("move_creature_to: nobody at {self}"),
        };
        if self.is_same_level(to) {
            self.move_creature(realm, self.dir_to(to));
        } else if self.is_same_world(to) {
            realm.change_level(id, to);
        } else {
            assert!(
                realm.land_creature(id, to).is_some(),
                "move_creature_to: nowhere for {id} to land near {to}"
            );
        }
    }

    /// Swap the occupant with `other`, which stands on an adjacent tile.
    pub fn swap_creatures(&self, realm: &mut Realm, other: CreatureId) {
        assert!(self.is_valid(realm), "swap_creatures on invalid {self}");
        let (Some(mine), Some(theirs)) = (
            self.creature(realm),
            realm.creature(other).map(Creature::position),
        ) else {
            panic!("swap_creatures: missing creature at {self} or {other}");
        };
        assert!(
            self.is_same_level(theirs) && self.coord.dist8(theirs.coord) == 1,
            "swap_creatures: {other} at {theirs} is not next to {self}"
        );
        realm.unplace_creature(mine);
        realm.unplace_creature(other);
        realm.place_creature(mine, theirs);
        realm.place_creature(other, *self);
        theirs.run_enter_effects(realm, mine);
        self.run_enter_effects(realm, other);
    }

    /// Apply the terrain's on-enter effect to `id`, which just arrived here.
    pub(crate) fn run_enter_effects(&self, realm: &mut Realm, id: CreatureId) {
        let Some(level) = self.level_in(realm) else {
            return;
        };
        let (Some(square), Some(creature)) = (level.square(self.coord), realm.creature(id))
        else {
            return;
        };
        let effect = square.kind().enter_effect();
        let bridged = level.furniture(self.coord).is_some();
        let survives = square.can_enter_empty(&creature.movement().unforced());
        let boulder = creature.is_boulder();
        match effect {
            EnterEffect::Burn if !bridged && !survives => {
                realm.kill_creature(id);
                realm.push_event(WorldEvent::CreatureBurned {
                    creature: id,
                    position: *self,
                });
            }
            EnterEffect::Drown if !bridged && !survives => {
                realm.kill_creature(id);
                realm.push_event(WorldEvent::CreatureDrowned {
                    creature: id,
                    position: *self,
                });
            }
            EnterEffect::Hole(_) if boulder && !bridged && !survives => {
                realm.kill_creature(id);
                let floor = {
                    let (rng, config) = realm.rng_and_config();
                    SquareType::Floor.make(rng, config)
                };
                self.replace_square(realm, floor, false);
                realm.push_event(WorldEvent::HoleFilled {
                    boulder: id,
                    position: *self,
                });
            }
            EnterEffect::Hole(key) if !bridged && !survives => {
                realm.fall_through(id, key);
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Items and triggers
    // -----------------------------------------------------------------------

    pub fn drop_item(&self, realm: &mut Realm, item: Item) {
        self.drop_items(realm, vec![item]);
    }

    /// Drop items here. Magma burns them and water swallows them unless a
    /// furniture (a bridge) catches them.
    pub fn drop_items(&self, realm: &mut Realm, items: Vec<Item>) {
        if items.is_empty() {
            return;
        }
        let Some(level) = self.level_in_mut(realm) else {
            warn!("dropping {} items on invalid {self}", items.len());
            return;
        };
        let effect = match (level.furniture(self.coord), level.square(self.coord)) {
            (None, Some(sq)) => sq.kind().drop_effect(),
            _ => DropEffect::Keep,
        };
        let event = match effect {
            DropEffect::Keep => {
                if let Some(sq) = level.square_mut(self.coord) {
                    sq.add_items(items);
                }
                level.invalidate(self.coord, Invalidation::VIEW);
                None
            }
            DropEffect::Burn => Some(WorldEvent::ItemsBurned {
                position: *self,
                stacks: stack_items(&items),
            }),
            DropEffect::Sink => Some(WorldEvent::ItemsSank {
                position: *self,
                stacks: stack_items(&items),
            }),
        };
        if let Some(event) = event {
            realm.push_event(event);
        }
    }

    pub fn remove_item(&self, realm: &mut Realm, id: ItemId) -> Option<Item> {
        let level = self.level_in_mut(realm)?;
        let item = level.square_mut(self.coord)?.remove_item(id)?;
        level.invalidate(self.coord, Invalidation::VIEW);
        Some(item)
    }

    pub fn remove_items(&self, realm: &mut Realm, ids: &[ItemId]) -> Vec<Item> {
        let Some(level) = self.level_in_mut(realm) else {
            return Vec::new();
        };
        let removed = level
            .square_mut(self.coord)
            .map(|sq| sq.remove_items(ids))
            .unwrap_or_default();
        if !removed.is_empty() {
            level.invalidate(self.coord, Invalidation::VIEW);
        }
        removed
    }

    pub fn add_trigger(&self, realm: &mut Realm, trigger: Trigger) {
        let Some(level) = self.level_in_mut(realm) else {
            return;
        };
        if let Some(sq) = level.square_mut(self.coord) {
            sq.add_trigger(trigger);
        }
        level.invalidate(self.coord, Invalidation::VIEW);
    }

    /// Remove a trigger. Panics if a valid tile does not hold it.
    pub fn remove_trigger(&self, realm: &mut Realm, id: TriggerId) -> Option<Trigger> {
        let level = self.level_in_mut(realm)?;
        let trigger = level.square_mut(self.coord)?.remove_trigger(id);
        level.invalidate(self.coord, Invalidation::VIEW);
        Some(trigger)
    }

    pub fn remove_triggers(&self, realm: &mut Realm) -> Vec<Trigger> {
        let Some(level) = self.level_in_mut(realm) else {
            return Vec::new();
        };
        let removed = level
            .square_mut(self.coord)
            .map(Square::remove_all_triggers)
            .unwrap_or_default();
        level.invalidate(self.coord, Invalidation::VIEW);
        removed
    }

    // -----------------------------------------------------------------------
    // Construction and destruction
    // -----------------------------------------------------------------------

    /// Advance the construction of `kind` by one call. Returns `true` when
    /// this call completed it and the furniture is installed. Switching to a
    /// different kind restarts with that kind's full duration.
    pub fn construct(&self, realm: &mut Realm, kind: FurnitureType, tribe: TribeId) -> bool {
        assert!(
            !self.is_unavailable(realm),
            "construct {kind:?} on unavailable {self}"
        );
        assert!(
            self.can_construct(realm, kind),
            "construct: {kind:?} cannot be built at {self}"
        );
        let ticks = realm
            .catalog()
            .build_ticks(kind, realm.config().construction_ticks);
        let built = realm.catalog().make(kind, tribe);
        let Some(level) = self.level_in_mut(realm) else {
            return false;
        };
        let mut record = match level.construction(self.coord) {
            Some(record) if record.target == kind => *record,
            _ => ConstructionRecord {
                target: kind,
                tribe,
                remaining: ticks,
            },
        };
        record.remaining -= 1;
        if record.remaining > 0 {
            level.set_construction(self.coord, Some(record));
            return false;
        }
        level.set_construction(self.coord, None);
        let Some(furniture) = built else {
            return false;
        };
        debug!("{kind:?} completed at {self}");
        let replaced = level.set_furniture(self.coord, Some(furniture));
        if let Some(old) = replaced {
            realm.push_event(WorldEvent::FurnitureDestroyed {
                position: *self,
                kind: old.kind(),
                cause: DestroyCause::Destroyed,
            });
        }
        realm.push_event(WorldEvent::FurnitureBuilt {
            position: *self,
            kind,
        });
        true
    }

    /// `construct` on behalf of a creature, for its tribe.
    pub fn construct_by(&self, realm: &mut Realm, kind: FurnitureType, creature: CreatureId) -> bool {
        let tribe = match realm.creature(creature) {
            Some(c) => c.tribe(),
            None => panic!("construct_by: unknown creature {creature}"),
        };
        self.construct(realm, kind, tribe)
    }

    /// Advance turning this square into `target` (mining). On completion the
    /// old terrain's yield is dropped and the square replaced. Returns
    /// whether this call completed it.
    pub fn construct_square(&self, realm: &mut Realm, target: SquareType) -> bool {
        if self.is_unavailable(realm) {
            return false;
        }
        assert!(
            self.can_construct_square(realm, target),
            "construct_square: {self} cannot become {target:?}"
        );
        let ticks = realm.config().square_construction_ticks;
        let Some(level) = self.level_in_mut(realm) else {
            return false;
        };
        let done = level
            .square_mut(self.coord)
            .is_some_and(|sq| sq.construct(target, ticks));
        level.invalidate(self.coord, Invalidation::VIEW);
        if !done {
            return false;
        }
        let new = {
            let (rng, config) = realm.rng_and_config();
            target.make(rng, config)
        };
        let Some(old) = self.replace_square(realm, new, true) else {
            return false;
        };
        realm.push_event(WorldEvent::SquareConstructed {
            position: *self,
            from: old.square_type(),
            to: target,
        });
        if let Some((ore, count)) = old.kind().mined_drops() {
            let items: Vec<Item> = (0..count)
                .map(|_| ore.make_item(realm.alloc_item_id()))
                .collect();
            self.drop_items(realm, items);
            realm.push_event(WorldEvent::OreMined {
                position: *self,
                ore,
                count,
            });
        }
        true
    }

    /// Remove the furniture as destroyed.
    pub fn destroy(&self, realm: &mut Realm) -> Option<Furniture> {
        self.remove_furniture_with_cause(realm, DestroyCause::Destroyed)
    }

    fn remove_furniture_with_cause(&self, realm: &mut Realm, cause: DestroyCause) -> Option<Furniture> {
        let removed = self.level_in_mut(realm)?.set_furniture(self.coord, None)?;
        realm.push_event(WorldEvent::FurnitureDestroyed {
            position: *self,
            kind: removed.kind(),
            cause,
        });
        Some(removed)
    }

    /// Hit the furniture with `action`, dealing the creature's damage.
    /// Returns `true` if the furniture was destroyed.
    pub fn try_to_destroy_by(&self, realm: &mut Realm, creature: CreatureId, action: DestroyAction) -> bool {
        let Some(damage) = realm.creature(creature).map(Creature::damage) else {
            return false;
        };
        let Some(f) = self
            .level_in_mut(realm)
            .and_then(|level| level.furniture_mut(self.coord))
        else {
            return false;
        };
        if !f.can_be_destroyed_by(action) || !f.take_damage(damage) {
            return false;
        }
        self.destroy(realm).is_some()
    }

    /// Remove the furniture, which must be of `kind`.
    pub fn remove_furniture(&self, realm: &mut Realm, kind: FurnitureType) -> Option<Furniture> {
        let level = self.level_in_mut(realm)?;
        let current = level.furniture(self.coord).map(Furniture::kind);
        assert_eq!(
            current,
            Some(kind),
            "remove_furniture: expected {kind:?} at {self}"
        );
        level.set_furniture(self.coord, None)
    }

    /// Install furniture on a tile that has none.
    pub fn add_furniture(&self, realm: &mut Realm, furniture: Furniture) {
        let Some(level) = self.level_in_mut(realm) else {
            return;
        };
        assert!(
            level.furniture(self.coord).is_none(),
            "add_furniture: {self} already has furniture"
        );
        level.set_furniture(self.coord, Some(furniture));
    }

    /// Swap the furniture, which must be of `expected`, for `furniture`.
    pub fn replace_furniture(
        &self,
        realm: &mut Realm,
        expected: FurnitureType,
        furniture: Furniture,
    ) -> Option<Furniture> {
        let level = self.level_in_mut(realm)?;
        let current = level.furniture(self.coord).map(Furniture::kind);
        assert_eq!(
            current,
            Some(expected),
            "replace_furniture: expected {expected:?} at {self}"
        );
        level.set_furniture(self.coord, Some(furniture))
    }

    /// Replace the terrain. The new square inherits the tile contents;
    /// furniture that cannot stand on it is destroyed, and the occupant gets
    /// the new terrain's on-enter effect. Returns the old square.
    pub fn replace_square(&self, realm: &mut Realm, square: Square, store_previous: bool) -> Option<Square> {
        let (old, consumed) =
            self.level_in_mut(realm)?
                .replace_square(self.coord, square, store_previous)?;
        if let Some(f) = consumed {
            realm.push_event(WorldEvent::FurnitureDestroyed {
                position: *self,
                kind: f.kind(),
                cause: DestroyCause::Terrain,
            });
        }
        if let Some(id) = self.creature(realm) {
            self.run_enter_effects(realm, id);
        }
        Some(old)
    }

    /// Turn the tile into water of `depth`.
    pub fn flood(&self, realm: &mut Realm, depth: f64) {
        if !self.is_valid(realm) {
            return;
        }
        let water = water_of_depth(depth, realm.config());
        self.replace_square(realm, water, true);
    }

    // -----------------------------------------------------------------------
    // Fire and gas
    // -----------------------------------------------------------------------

    /// Burn what is here: furniture, occupant, items, triggers, in that
    /// order. Ignition changes traversal immediately.
    pub fn fire_damage(&self, realm: &mut Realm, amount: f64) {
        let ignition = realm.config().fire_ignition_heat;
        let Some(level) = self.level_in_mut(realm) else {
            return;
        };
        let ignited = level
            .furniture_mut(self.coord)
            .and_then(|f| f.fire_mut().damage(amount, ignition).then_some(f.kind()));
        let occupant = level.creature_at(self.coord);
        let (burnt_items, burnt_triggers) = match level.square_mut(self.coord) {
            Some(sq) => (
                sq.inventory_mut().fire_damage(amount),
                sq.fire_damage_triggers(amount),
            ),
            None => (Vec::new(), Vec::new()),
        };
        level.invalidate(self.coord, Invalidation::VIEW);

        if let Some(kind) = ignited {
            realm.push_event(WorldEvent::Ignited {
                position: *self,
                kind,
            });
        }
        if let Some(id) = occupant {
            let dead = realm
                .creature_mut(id)
                .is_some_and(|c| c.take_damage(amount));
            if dead {
                realm.kill_creature(id);
                realm.push_event(WorldEvent::CreatureBurned {
                    creature: id,
                    position: *self,
                });
            }
        }
        if !burnt_items.is_empty() {
            realm.push_event(WorldEvent::ItemsBurned {
                position: *self,
                stacks: stack_items(&burnt_items),
            });
        }
        for t in burnt_triggers {
            realm.push_event(WorldEvent::TriggerBurned {
                position: *self,
                trigger: t.id,
            });
        }
        self.update_movement(realm);
    }

    /// Burn one unit of the furniture's fuel. When it runs out the furniture
    /// is destroyed, leaving its burnt remains if it has any. Returns
    /// whether the furniture burnt out.
    pub fn tick_fire(&self, realm: &mut Realm) -> bool {
        let burnt_out = self
            .level_in_mut(realm)
            .and_then(|level| level.furniture_mut(self.coord))
            .is_some_and(|f| f.fire_mut().burn());
        if !burnt_out {
            return false;
        }
        let remains = self.furniture(realm).and_then(|f| {
            f.burnt_remains()
                .and_then(|kind| realm.catalog().make(kind, f.tribe()))
        });
        let Some(old) = self
            .level_in_mut(realm)
            .and_then(|level| level.set_furniture(self.coord, remains))
        else {
            return false;
        };
        realm.push_event(WorldEvent::FurnitureDestroyed {
            position: *self,
            kind: old.kind(),
            cause: DestroyCause::Burnt,
        });
        true
    }

    /// Sync the square's on-fire flag with its furniture, updating
    /// connectivity when it changes.
    pub fn update_movement(&self, realm: &mut Realm) {
        if let Some(level) = self.level_in_mut(realm) {
            if level.sync_fire_flag(self.coord) {
                level.invalidate(self.coord, Invalidation::ALL);
            }
        }
    }

    /// Returns whether there was a fire to put out.
    pub fn extinguish_fire(&self, realm: &mut Realm) -> bool {
        let Some(f) = self
            .level_in_mut(realm)
            .and_then(|level| level.furniture_mut(self.coord))
        else {
            return false;
        };
        let kind = f.kind();
        if !f.fire_mut().extinguish() {
            return false;
        }
        realm.push_event(WorldEvent::Extinguished {
            position: *self,
            kind,
        });
        self.update_movement(realm);
        true
    }

    /// Clamped to `[0, config.max_poison_gas]`.
    pub fn add_poison_gas(&self, realm: &mut Realm, amount: f64) {
        let max = realm.config().max_poison_gas;
        let Some(level) = self.level_in_mut(realm) else {
            return;
        };
        if let Some(sq) = level.square_mut(self.coord) {
            sq.add_poison_gas(amount, max);
        }
        level.invalidate(self.coord, Invalidation::VIEW);
    }

    // -----------------------------------------------------------------------
    // Use, zones, view
    // -----------------------------------------------------------------------

    /// `creature` uses the furniture here. Stairs take it to the linked
    /// level.
    pub fn apply(&self, realm: &mut Realm, creature: CreatureId) -> Option<UsageType> {
        let usage = self.usage_type(realm)?;
        realm.push_event(WorldEvent::FurnitureUsed {
            creature,
            position: *self,
            usage,
        });
        if usage == UsageType::Stairs {
            if let Some(key) = self.landing_link(realm) {
                realm.use_stairs(creature, key);
            }
        }
        Some(usage)
    }

    /// Mark the tile as a forbidden zone for `tribe`.
    pub fn forbid_movement_for_tribe(&self, realm: &mut Realm, tribe: TribeId) {
        self.modify_square_zone(realm, |sq| sq.movement_mut().forbid_tribe(tribe));
    }

    pub fn allow_movement_for_tribe(&self, realm: &mut Realm, tribe: TribeId) {
        self.modify_square_zone(realm, |sq| sq.movement_mut().allow_tribe(tribe));
    }

    fn modify_square_zone(&self, realm: &mut Realm, f: impl FnOnce(&mut Square) -> bool) {
        let Some(level) = self.level_in_mut(realm) else {
            return;
        };
        if level.square_mut(self.coord).is_some_and(f) {
            level.invalidate(self.coord, Invalidation::ALL);
        }
    }

    /// Lock the furniture (a door) against `tribe`.
    pub fn forbid_furniture_for_tribe(&self, realm: &mut Realm, tribe: TribeId) {
        self.modify_furniture_zone(realm, |f| f.movement_mut().forbid_tribe(tribe));
    }

    pub fn allow_furniture_for_tribe(&self, realm: &mut Realm, tribe: TribeId) {
        self.modify_furniture_zone(realm, |f| f.movement_mut().allow_tribe(tribe));
    }

    fn modify_furniture_zone(&self, realm: &mut Realm, f: impl FnOnce(&mut Furniture) -> bool) {
        let Some(level) = self.level_in_mut(realm) else {
            return;
        };
        if level.furniture_mut(self.coord).is_some_and(f) {
            level.invalidate(self.coord, Invalidation::ALL);
        }
    }

    /// Edit the top view object (furniture over terrain).
    pub fn mod_view_object(&self, realm: &mut Realm, f: impl FnOnce(&mut ViewObject)) {
        let Some(level) = self.level_in_mut(realm) else {
            return;
        };
        if let Some(furniture) = level.furniture_mut(self.coord) {
            f(furniture.view_object_mut());
        } else if let Some(sq) = level.square_mut(self.coord) {
            f(sq.view_object_mut());
        }
        level.invalidate(self.coord, Invalidation::VIEW);
    }

    pub fn set_unavailable(&self, realm: &mut Realm, unavailable: bool) {
        if let Some(level) = self.level_in_mut(realm) {
            level.set_unavailable(self.coord, unavailable);
        }
    }

    /// Re-derive this tile's membership in every class's sectors.
    pub fn update_connectivity(&self, realm: &mut Realm) {
        if let Some(level) = self.level_in_mut(realm) {
            level.update_connectivity(self.coord);
        }
    }
}
