// One level of the world: a rectangular map of squares with furniture on
// top.
//
// `Level` owns every per-tile table (squares, furniture slots, stored
// background views, unavailable marks), the stair landings, and the
// transient state derived from them: one `Sectors` connectivity index per
// registered movement class and the render/memory/visibility dirty flags.
//
// Two rules keep the derived state honest:
// - Traversal of a tile is evaluated only here (`can_enter_empty`,
//   `can_navigate`), layering the furniture policy over the square policy.
// - Every change that can affect traversal or appearance ends in
//   `invalidate(coord, what)`, the single place that updates the sectors of
//   every class and sets the dirty flags. Furniture goes in and out only
//   through `set_furniture`, squares only through `replace_square`.
//
// Sectors and dirty flags are not saved. `rebuild_transient_state` recreates
// them after loading; the full sector build evaluates every registered class
// in parallel (the predicate is read-only) and installs the results serially.
//
// See also: `sectors.rs` for the connectivity index, `position.rs` for the
// public façade that routes through here, `realm.rs` which owns levels.
//
// **Critical constraint: determinism.** Classes are kept in a `BTreeMap`
// keyed by `MovementType`, landings in a `BTreeMap` keyed by `StairKey`.

use crate::furniture::{BuildSite, ConstructionRecord, Furniture, FurnitureSlot};
use crate::grid::Grid;
use crate::movement::{MovementTraits, MovementType};
use crate::sectors::Sectors;
use crate::square::{ConstructionsId, Square};
use crate::types::{CreatureId, LevelId, Rect, StairKey, TribeId, Vec2};
use crate::view::{HighlightType, ViewIndex, ViewLayer, ViewObject};
use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a tile change invalidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Invalidation {
    pub connectivity: bool,
    pub render: bool,
    pub memory: bool,
    pub visibility: bool,
}

impl Invalidation {
    /// Traversal and appearance both changed.
    pub const ALL: Invalidation = Invalidation {
        connectivity: true,
        render: true,
        memory: true,
        visibility: true,
    };
    /// Appearance changed, traversal did not (items, gas, triggers).
    pub const VIEW: Invalidation = Invalidation {
        connectivity: false,
        render: true,
        memory: true,
        visibility: false,
    };
}

/// Whether a square is a valid site for furniture with `site`.
pub fn site_accepts(site: BuildSite, square: &Square) -> bool {
    match site {
        BuildSite::Floor => square.constructions() == Some(ConstructionsId::DungeonRooms),
        BuildSite::Liquid => square.kind().is_liquid(),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Level {
    id: LevelId,
    name: String,
    squares: Grid<Square>,
    furniture: Grid<FurnitureSlot>,
    /// View of the terrain a square replaced, drawn under the current one.
    background: Grid<Option<ViewObject>>,
    unavailable: Grid<bool>,
    stairs: BTreeMap<StairKey, Vec<Vec2>>,
    no_diagonal_passing: bool,
    sunlight: bool,
    /// Movement classes with a connectivity index, in registration order.
    classes: Vec<MovementType>,
    #[serde(skip)]
    sectors: BTreeMap<MovementType, Sectors>,
    #[serde(skip)]
    render_dirty: Grid<bool>,
    #[serde(skip)]
    memory_dirty: Grid<bool>,
    #[serde(skip)]
    visibility_dirty: Grid<bool>,
}

impl Level {
    /// A level over `squares`. No movement class is registered yet; the
    /// `Realm` registers the configured ones when the level is added.
    pub fn new(id: LevelId, name: &str, squares: Grid<Square>) -> Self {
        let (w, h) = (squares.width(), squares.height());
        Self {
            id,
            name: name.to_string(),
            squares,
            furniture: Grid::from_fn(w, h, |_| FurnitureSlot::default()),
            background: Grid::new(w, h, None),
            unavailable: Grid::new(w, h, false),
            stairs: BTreeMap::new(),
            no_diagonal_passing: false,
            sunlight: false,
            classes: Vec::new(),
            sectors: BTreeMap::new(),
            render_dirty: Grid::new(w, h, true),
            memory_dirty: Grid::new(w, h, true),
            visibility_dirty: Grid::new(w, h, true),
        }
    }

    pub fn id(&self) -> LevelId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: LevelId) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.squares.width()
    }

    pub fn height(&self) -> u32 {
        self.squares.height()
    }

    pub fn bounds(&self) -> Rect {
        self.squares.bounds()
    }

    pub fn in_bounds(&self, v: Vec2) -> bool {
        self.squares.in_bounds(v)
    }

    // -- squares -----------------------------------------------------------

    pub fn square(&self, v: Vec2) -> Option<&Square> {
        self.squares.get(v)
    }

    /// Direct square access. Callers must `invalidate` what they change.
    pub(crate) fn square_mut(&mut self, v: Vec2) -> Option<&mut Square> {
        self.squares.get_mut(v)
    }

    /// Put `new` in place of the current square. The new square inherits the
    /// tile contents (occupant, items, triggers, gas, forbidden tribes).
    /// With `store_previous` the old square's view is kept as background.
    /// Furniture whose build site the new square does not accept is
    /// consumed and returned alongside the old square.
    pub fn replace_square(
        &mut self,
        v: Vec2,
        new: Square,
        store_previous: bool,
    ) -> Option<(Square, Option<Furniture>)> {
        let slot = self.squares.get_mut(v)?;
        let mut old = std::mem::replace(slot, new);
        slot.inherit_contents(&mut old);
        if store_previous {
            self.background.set(v, Some(old.view_object().clone()));
        }
        let misplaced = self.furniture(v).is_some_and(|f| {
            !self
                .squares
                .get(v)
                .is_some_and(|s| site_accepts(f.build_site(), s))
        });
        let consumed = if misplaced {
            self.set_furniture(v, None)
        } else {
            None
        };
        debug!(
            "{}: {} at {v} replaced by {}",
            self.id,
            old.name(),
            self.squares.get(v).map_or("?", Square::name)
        );
        self.sync_fire_flag(v);
        self.invalidate(v, Invalidation::ALL);
        Some((old, consumed))
    }

    pub fn background(&self, v: Vec2) -> Option<&ViewObject> {
        self.background.get(v).and_then(Option::as_ref)
    }

    // -- furniture ---------------------------------------------------------

    pub fn furniture(&self, v: Vec2) -> Option<&Furniture> {
        self.furniture.get(v).and_then(|slot| slot.furniture.as_ref())
    }

    /// Direct furniture access. Callers must `invalidate` what they change.
    pub(crate) fn furniture_mut(&mut self, v: Vec2) -> Option<&mut Furniture> {
        self.furniture.get_mut(v).and_then(|slot| slot.furniture.as_mut())
    }

    /// Install, replace or remove (`None`) the furniture of a tile. Returns
    /// the furniture that was there. The only way furniture changes.
    pub fn set_furniture(&mut self, v: Vec2, furniture: Option<Furniture>) -> Option<Furniture> {
        let slot = self.furniture.get_mut(v)?;
        let old = std::mem::replace(&mut slot.furniture, furniture);
        match (&old, self.furniture(v)) {
            (_, Some(new)) => debug!("{}: {} installed at {v}", self.id, new.name()),
            (Some(old), None) => debug!("{}: {} removed from {v}", self.id, old.name()),
            (None, None) => {}
        }
        self.sync_fire_flag(v);
        self.invalidate(v, Invalidation::ALL);
        old
    }

    pub fn construction(&self, v: Vec2) -> Option<&ConstructionRecord> {
        self.furniture.get(v).and_then(|slot| slot.construction.as_ref())
    }

    pub(crate) fn set_construction(&mut self, v: Vec2, record: Option<ConstructionRecord>) {
        if let Some(slot) = self.furniture.get_mut(v) {
            slot.construction = record;
            self.render_dirty.set(v, true);
        }
    }

    /// Make the square's fire flag match whether its furniture burns.
    /// Returns whether the flag changed.
    pub(crate) fn sync_fire_flag(&mut self, v: Vec2) -> bool {
        let burning = self.furniture(v).is_some_and(Furniture::is_burning);
        match self.squares.get_mut(v) {
            Some(sq) if sq.movement().is_on_fire() != burning => {
                sq.movement_mut().set_on_fire(burning);
                true
            }
            _ => false,
        }
    }

    // -- traversal ---------------------------------------------------------

    pub fn is_unavailable(&self, v: Vec2) -> bool {
        !self.in_bounds(v) || self.unavailable.value(v)
    }

    pub fn set_unavailable(&mut self, v: Vec2, unavailable: bool) {
        if self.in_bounds(v) && self.unavailable.value(v) != unavailable {
            self.unavailable.set(v, unavailable);
            self.invalidate(v, Invalidation::ALL);
        }
    }

    /// Whether `tribe` is barred from the tile by a forbidden zone.
    pub fn is_tribe_forbidden(&self, v: Vec2, tribe: TribeId) -> bool {
        self.square(v).is_some_and(|s| s.is_tribe_forbidden(tribe))
    }

    /// Traversal of the tile ignoring its occupant.
    pub fn can_enter_empty(&self, v: Vec2, movement: &MovementType) -> bool {
        if self.is_unavailable(v) {
            return false;
        }
        let Some(square) = self.square(v) else {
            return false;
        };
        if !movement.is_forced() && square.is_tribe_forbidden(movement.tribe()) {
            return false;
        }
        match self.furniture(v) {
            Some(f) if !f.can_enter(movement) => false,
            // Burning furniture takes walking and wading with it, bridge or not.
            Some(f) if f.overrides_movement() => {
                !square.movement().is_on_fire()
                    || !movement.traits().minus(MovementTraits::GROUNDED).is_empty()
            }
            _ => square.can_enter_empty(movement),
        }
    }

    /// Whether the mover can take the tile's furniture apart.
    pub fn can_destroy(&self, v: Vec2, movement: &MovementType) -> bool {
        self.furniture(v).is_some_and(|f| f.can_destroy(movement))
    }

    /// Whether routing may pass the tile: enterable now, or blocked only by
    /// furniture the mover can destroy. Forbidden zones stay closed.
    pub fn can_navigate(&self, v: Vec2, movement: &MovementType) -> bool {
        self.can_enter_empty(v, movement)
            || (self.can_destroy(v, movement)
                && !self.is_tribe_forbidden(v, movement.tribe())
                && self.can_enter_empty(v, &movement.forced()))
    }

    pub fn no_diagonal_passing(&self) -> bool {
        self.no_diagonal_passing
    }

    pub fn set_no_diagonal_passing(&mut self, value: bool) {
        self.no_diagonal_passing = value;
    }

    // -- connectivity ------------------------------------------------------

    pub fn classes(&self) -> &[MovementType] {
        &self.classes
    }

    pub fn sectors(&self, movement: &MovementType) -> Option<&Sectors> {
        self.sectors.get(movement)
    }

    /// Add a movement class and build its index. Returns `false` if it was
    /// already registered.
    pub fn register_class(&mut self, movement: MovementType) -> bool {
        if self.sectors.contains_key(&movement) {
            return false;
        }
        let (w, h) = (self.width(), self.height());
        let built = Sectors::build(w, h, |v| self.can_navigate(v, &movement));
        if !self.classes.contains(&movement) {
            self.classes.push(movement);
        }
        self.sectors.insert(movement, built);
        true
    }

    /// The index for `movement`, registering the class on first use.
    ///
    /// Classes are keyed by the whole `MovementType`: tribe, traits, destroy
    /// actions and the forced flag. Forced movers enter forcible terrain and
    /// ignore forbidden zones, so the flag cannot be folded away. Each new
    /// key costs one full build, and every registered class is updated on
    /// each later tile change. Callers that ask with many ad-hoc types
    /// should register the common ones up front via
    /// `WorldConfig::movement_classes`.
    pub fn sectors_for(&mut self, movement: &MovementType) -> &Sectors {
        if !self.sectors.contains_key(movement) {
            warn!("{}: registering movement class {movement:?} on first query", self.id);
            self.register_class(*movement);
        }
        &self.sectors[movement]
    }

    pub fn are_connected(&mut self, a: Vec2, b: Vec2, movement: &MovementType) -> bool {
        self.sectors_for(movement).same(a, b)
    }

    pub fn is_chokepoint(&mut self, v: Vec2, movement: &MovementType) -> bool {
        self.sectors_for(movement).is_chokepoint(v)
    }

    /// Bring every class's membership of `v` in line with `can_navigate`.
    pub fn update_connectivity(&mut self, v: Vec2) {
        if !self.in_bounds(v) {
            return;
        }
        let updates: Vec<(MovementType, bool)> = self
            .sectors
            .keys()
            .map(|mt| (*mt, self.can_navigate(v, mt)))
            .collect();
        for (mt, navigable) in updates {
            if let Some(sectors) = self.sectors.get_mut(&mt) {
                if navigable {
                    sectors.add(v);
                } else {
                    sectors.remove(v);
                }
            }
            trace!("{}: {v} navigable={navigable} for {mt:?}", self.id);
        }
    }

    /// Rebuild the index of every registered class from scratch.
    pub fn rebuild_sectors(&mut self) {
        let (w, h) = (self.width(), self.height());
        let built: Vec<(MovementType, Sectors)> = {
            let this = &*self;
            this.classes
                .par_iter()
                .map(|mt| (*mt, Sectors::build(w, h, |v| this.can_navigate(v, mt))))
                .collect()
        };
        self.sectors = built.into_iter().collect();
    }

    /// Recreate everything that is not saved: sectors for all registered
    /// classes, and dirty flags set on every tile.
    pub fn rebuild_transient_state(&mut self) {
        let (w, h) = (self.width(), self.height());
        self.render_dirty = Grid::new(w, h, true);
        self.memory_dirty = Grid::new(w, h, true);
        self.visibility_dirty = Grid::new(w, h, true);
        self.rebuild_sectors();
    }

    // -- invalidation ------------------------------------------------------

    /// Propagate a tile change. The single funnel for connectivity updates
    /// and dirty flags.
    pub fn invalidate(&mut self, v: Vec2, what: Invalidation) {
        if !self.in_bounds(v) {
            return;
        }
        if what.connectivity {
            self.update_connectivity(v);
        }
        if what.render {
            self.render_dirty.set(v, true);
        }
        if what.memory {
            self.memory_dirty.set(v, true);
        }
        if what.visibility {
            self.visibility_dirty.set(v, true);
        }
        if let Some(sq) = self.squares.get_mut(v) {
            sq.set_dirty(true);
        }
    }

    pub fn needs_render_update(&self, v: Vec2) -> bool {
        self.render_dirty.value(v)
    }

    pub fn set_needs_render_update(&mut self, v: Vec2, value: bool) {
        self.render_dirty.set(v, value);
    }

    pub fn needs_memory_update(&self, v: Vec2) -> bool {
        self.memory_dirty.value(v)
    }

    pub fn set_needs_memory_update(&mut self, v: Vec2, value: bool) {
        self.memory_dirty.set(v, value);
    }

    pub fn needs_visibility_update(&self, v: Vec2) -> bool {
        self.visibility_dirty.value(v)
    }

    pub fn set_needs_visibility_update(&mut self, v: Vec2, value: bool) {
        self.visibility_dirty.set(v, value);
    }

    /// Coordinates of squares changed since the last call, clearing their
    /// dirty bits.
    pub fn take_dirty_squares(&mut self) -> Vec<Vec2> {
        let dirty: Vec<Vec2> = self
            .squares
            .iter()
            .filter(|(_, sq)| sq.is_dirty())
            .map(|(v, _)| v)
            .collect();
        for v in &dirty {
            if let Some(sq) = self.squares.get_mut(*v) {
                sq.set_dirty(false);
            }
        }
        dirty
    }

    // -- stairs ------------------------------------------------------------

    /// Register a landing for `key` and link the square to it.
    pub fn add_landing(&mut self, key: StairKey, v: Vec2) {
        if !self.in_bounds(v) {
            return;
        }
        let landings = self.stairs.entry(key).or_default();
        if !landings.contains(&v) {
            landings.push(v);
            landings.sort();
        }
        if let Some(sq) = self.squares.get_mut(v) {
            sq.set_landing_link(Some(key));
        }
        self.invalidate(v, Invalidation::VIEW);
    }

    pub fn landings(&self, key: StairKey) -> &[Vec2] {
        self.stairs.get(&key).map_or(&[], Vec::as_slice)
    }

    pub fn stair_keys(&self) -> impl Iterator<Item = StairKey> + '_ {
        self.stairs.keys().copied()
    }

    // -- light -------------------------------------------------------------

    pub fn sunlight(&self) -> bool {
        self.sunlight
    }

    pub fn set_sunlight(&mut self, sunlight: bool) {
        self.sunlight = sunlight;
    }

    /// Roofed by the square or its furniture.
    pub fn is_covered(&self, v: Vec2) -> bool {
        self.square(v).is_some_and(|s| s.movement().is_covered())
            || self.furniture(v).is_some_and(|f| f.movement().is_covered())
    }

    // -- creatures ---------------------------------------------------------

    pub fn creature_at(&self, v: Vec2) -> Option<CreatureId> {
        self.square(v).and_then(Square::creature)
    }

    pub(crate) fn put_creature(&mut self, v: Vec2, id: CreatureId) {
        match self.squares.get_mut(v) {
            Some(sq) => sq.set_creature(id),
            None => panic!("{}: cannot put {id} out of bounds at {v}", self.id),
        }
        self.invalidate(v, Invalidation::VIEW);
    }

    pub(crate) fn take_creature(&mut self, v: Vec2) -> CreatureId {
        let id = match self.squares.get_mut(v) {
            Some(sq) => sq.remove_creature(),
            None => panic!("{}: no square at {v} to take a creature from", self.id),
        };
        self.invalidate(v, Invalidation::VIEW);
        id
    }

    /// Creatures inside `rect`, row-major.
    pub fn creatures_in(&self, rect: Rect) -> Vec<(Vec2, CreatureId)> {
        rect.intersection(&self.bounds())
            .iter()
            .filter_map(|v| self.creature_at(v).map(|id| (v, id)))
            .collect()
    }

    // -- view --------------------------------------------------------------

    /// Composited render snapshot of a tile.
    pub fn view_index(&self, v: Vec2) -> ViewIndex {
        let mut index = ViewIndex::new();
        let Some(square) = self.square(v) else {
            return index;
        };
        if let Some(bg) = self.background(v) {
            let mut bg = bg.clone();
            bg.layer = ViewLayer::FloorBackground;
            index.insert(bg);
        }
        index.insert(square.view_object().clone());
        if let Some(f) = self.furniture(v) {
            index.insert(f.view_object());
            if f.is_burning() {
                index.set_highlight(HighlightType::Burning);
            }
        }
        if let Some(trigger) = square.triggers().last() {
            index.insert(trigger.view_object());
        }
        if self.unavailable.value(v) {
            index.set_highlight(HighlightType::Unavailable);
        }
        if self.construction(v).is_some() || square.is_active_construction() {
            index.set_highlight(HighlightType::Construction);
        }
        if square.poison_gas() > 0.0 {
            index.set_highlight(HighlightType::PoisonGas);
        }
        index
    }
}
