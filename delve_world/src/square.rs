// Base terrain tile.
//
// A `Square` is what a tile *is* before any furniture goes on it: floor,
// rock, water, magma, an ore vein, a hole. It owns the traversal policy of
// the tile (`MovementSet`), the single creature standing on it, the items and
// triggers lying on it, its poison gas, and the link to stairs or holes.
//
// Per-terrain behavior is a tagged variant (`TerrainKind`) with a small
// capability table: what happens when a creature steps on the tile, what
// happens to items dropped on it, and what mining it yields. Callers look the
// capability up and carry the effect out; the square never reaches outside
// itself.
//
// Square construction (mining rock into floor) is tracked here with a
// `SquareConstruction` record; the replacement itself is done by
// `Level::replace_square` so that invalidation stays in one place.
//
// See also: `terrain.rs` for the factory that builds squares from a
// `SquareType`, `level.rs` for layering furniture over squares,
// `position.rs` for the public operations.

use crate::item::{Inventory, Item, ItemClass, ItemIndex};
use crate::movement::{MovementSet, MovementType};
use crate::terrain::SquareType;
use crate::trigger::Trigger;
use crate::types::{CreatureId, ItemId, StairKey, TribeId, TriggerId, VisionId};
use crate::view::ViewObject;
use serde::{Deserialize, Serialize};

/// Which square constructions a square allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstructionsId {
    /// Dry floor; furniture with a `Floor` build site can go here.
    DungeonRooms,
    /// Rock that can be dug out into floor.
    Mining,
    /// An ore vein; digging it out drops the ore.
    MiningOre,
    /// Mountain rock: dug into floor, or turned into ore veins by world
    /// generation.
    MountainGenOres,
}

impl ConstructionsId {
    pub fn allows(self, target: SquareType) -> bool {
        match self {
            ConstructionsId::DungeonRooms => false,
            ConstructionsId::Mining | ConstructionsId::MiningOre => target == SquareType::Floor,
            ConstructionsId::MountainGenOres => matches!(
                target,
                SquareType::Floor | SquareType::GoldOre | SquareType::IronOre | SquareType::StoneOre
            ),
        }
    }
}

/// Ore a vein is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OreKind {
    Gold,
    Iron,
    Stone,
}

impl OreKind {
    pub fn item_name(self) -> &'static str {
        match self {
            OreKind::Gold => "gold piece",
            OreKind::Iron => "iron ore",
            OreKind::Stone => "rock",
        }
    }

    pub fn item_class(self) -> ItemClass {
        match self {
            OreKind::Gold => ItemClass::Gold,
            OreKind::Iron => ItemClass::Ore,
            OreKind::Stone => ItemClass::Rock,
        }
    }

    pub fn make_item(self, id: ItemId) -> Item {
        Item::new(id, self.item_name(), self.item_class())
    }
}

/// Per-terrain behavior variant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TerrainKind {
    Plain,
    Magma,
    Water { depth: f64 },
    Ore { ore: OreKind, count: u32 },
    /// Boulders fill it; anything else falls to the level linked by `key`.
    Hole { key: StairKey },
}

/// What stepping on a tile does to a creature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnterEffect {
    None,
    /// Movers that could not enter unforced burn to death.
    Burn,
    /// Movers that could not enter unforced drown.
    Drown,
    /// Boulders fill the hole, others fall through.
    Hole(StairKey),
}

/// What happens to items dropped on a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropEffect {
    Keep,
    Burn,
    Sink,
}

impl TerrainKind {
    pub fn enter_effect(&self) -> EnterEffect {
        match self {
            TerrainKind::Magma => EnterEffect::Burn,
            TerrainKind::Water { .. } => EnterEffect::Drown,
            TerrainKind::Hole { key } => EnterEffect::Hole(*key),
            TerrainKind::Plain | TerrainKind::Ore { .. } => EnterEffect::None,
        }
    }

    pub fn drop_effect(&self) -> DropEffect {
        match self {
            TerrainKind::Magma => DropEffect::Burn,
            TerrainKind::Water { .. } => DropEffect::Sink,
            TerrainKind::Plain | TerrainKind::Ore { .. } | TerrainKind::Hole { .. } => {
                DropEffect::Keep
            }
        }
    }

    /// Ore left behind when the square is constructed into something else.
    pub fn mined_drops(&self) -> Option<(OreKind, u32)> {
        match self {
            TerrainKind::Ore { ore, count } => Some((*ore, *count)),
            _ => None,
        }
    }

    pub fn is_liquid(&self) -> bool {
        matches!(self, TerrainKind::Magma | TerrainKind::Water { .. })
    }
}

/// An in-progress square construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareConstruction {
    pub target: SquareType,
    pub remaining: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Square {
    square_type: SquareType,
    name: String,
    view: ViewObject,
    /// Vision that sees through this square; `None` = opaque.
    vision: Option<VisionId>,
    movement: MovementSet,
    creature: Option<CreatureId>,
    inventory: Inventory,
    triggers: Vec<Trigger>,
    constructions: Option<ConstructionsId>,
    construction: Option<SquareConstruction>,
    poison_gas: f64,
    landing_link: Option<StairKey>,
    can_hide: bool,
    kind: TerrainKind,
    dirty: bool,
}

impl Square {
    pub fn new(square_type: SquareType, name: &str, view: ViewObject, movement: MovementSet) -> Self {
        Self {
            square_type,
            name: name.to_string(),
            view,
            vision: None,
            movement,
            creature: None,
            inventory: Inventory::new(),
            triggers: Vec::new(),
            constructions: None,
            construction: None,
            poison_gas: 0.0,
            landing_link: None,
            can_hide: false,
            kind: TerrainKind::Plain,
            dirty: false,
        }
    }

    pub fn with_vision(mut self, vision: VisionId) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_constructions(mut self, constructions: ConstructionsId) -> Self {
        self.constructions = Some(constructions);
        self
    }

    pub fn with_kind(mut self, kind: TerrainKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_can_hide(mut self, can_hide: bool) -> Self {
        self.can_hide = can_hide;
        self
    }

    pub fn square_type(&self) -> SquareType {
        self.square_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view_object(&self) -> &ViewObject {
        &self.view
    }

    pub fn view_object_mut(&mut self) -> &mut ViewObject {
        &mut self.view
    }

    pub fn kind(&self) -> &TerrainKind {
        &self.kind
    }

    pub fn can_hide(&self) -> bool {
        self.can_hide
    }

    pub fn can_see_thru(&self, vision: VisionId) -> bool {
        match self.vision {
            None => false,
            Some(VisionId::Normal) => true,
            Some(required) => required == vision,
        }
    }

    // -- traversal ---------------------------------------------------------

    pub fn movement(&self) -> &MovementSet {
        &self.movement
    }

    pub fn movement_mut(&mut self) -> &mut MovementSet {
        &mut self.movement
    }

    /// Base-tile traversal rule, ignoring furniture and occupancy.
    pub fn can_enter_empty(&self, movement: &MovementType) -> bool {
        self.movement.can_enter(movement)
    }

    pub fn is_tribe_forbidden(&self, tribe: TribeId) -> bool {
        self.movement.is_tribe_forbidden(tribe)
    }

    // -- occupancy ---------------------------------------------------------

    pub fn creature(&self) -> Option<CreatureId> {
        self.creature
    }

    pub fn set_creature(&mut self, id: CreatureId) {
        assert!(
            self.creature.is_none(),
            "square already occupied by {:?}, cannot put {id}",
            self.creature
        );
        self.creature = Some(id);
    }

    pub fn remove_creature(&mut self) -> CreatureId {
        match self.creature.take() {
            Some(id) => id,
            None => panic!("no creature to remove from {}", self.name),
        }
    }

    // -- items and triggers ------------------------------------------------

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn items(&self) -> &[Item] {
        self.inventory.items()
    }

    pub fn items_by_index(&self, index: ItemIndex) -> Vec<&Item> {
        self.inventory.by_index(index)
    }

    pub fn items_matching(&self, predicate: impl FnMut(&Item) -> bool) -> Vec<&Item> {
        self.inventory.matching(predicate)
    }

    /// Put items on the tile regardless of terrain. Terrain effects are the
    /// caller's business (see `TerrainKind::drop_effect`).
    pub fn add_items(&mut self, items: Vec<Item>) {
        for item in items {
            self.inventory.add(item);
        }
    }

    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        self.inventory.remove(id)
    }

    pub fn remove_items(&mut self, ids: &[ItemId]) -> Vec<Item> {
        self.inventory.remove_many(ids)
    }

    pub fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> Trigger {
        let idx = self.triggers.iter().position(|t| t.id == id);
        match idx {
            Some(idx) => self.triggers.remove(idx),
            None => panic!("trigger {id} is not on {}", self.name),
        }
    }

    pub fn remove_all_triggers(&mut self) -> Vec<Trigger> {
        std::mem::take(&mut self.triggers)
    }

    /// Burn triggers; destroyed ones are removed and returned.
    pub fn fire_damage_triggers(&mut self, amount: f64) -> Vec<Trigger> {
        for t in &mut self.triggers {
            t.fire_damage(amount);
        }
        let (burnt, kept): (Vec<Trigger>, Vec<Trigger>) =
            std::mem::take(&mut self.triggers).into_iter().partition(Trigger::is_destroyed);
        self.triggers = kept;
        burnt
    }

    // -- construction ------------------------------------------------------

    pub fn constructions(&self) -> Option<ConstructionsId> {
        self.constructions
    }

    pub fn can_construct(&self, target: SquareType) -> bool {
        self.constructions.is_some_and(|c| c.allows(target))
    }

    pub fn construction(&self) -> Option<&SquareConstruction> {
        self.construction.as_ref()
    }

    pub fn is_active_construction(&self) -> bool {
        self.construction.is_some()
    }

    /// Advance construction toward `target`. A different target restarts
    /// with `ticks`. Returns `true` when the construction is done; the caller
    /// then replaces the square.
    pub fn construct(&mut self, target: SquareType, ticks: u32) -> bool {
        assert!(
            self.can_construct(target),
            "{} cannot be constructed into {target:?}",
            self.name
        );
        let mut record = match self.construction {
            Some(record) if record.target == target => record,
            _ => SquareConstruction {
                target,
                remaining: ticks.max(1),
            },
        };
        record.remaining -= 1;
        if record.remaining == 0 {
            self.construction = None;
            return true;
        }
        self.construction = Some(record);
        false
    }

    // -- gas, links, dirty -------------------------------------------------

    pub fn poison_gas(&self) -> f64 {
        self.poison_gas
    }

    /// Add (or with a negative amount, remove) gas, clamped to `[0, max]`.
    pub fn add_poison_gas(&mut self, amount: f64, max: f64) {
        self.poison_gas = (self.poison_gas + amount).clamp(0.0, max);
    }

    pub fn landing_link(&self) -> Option<StairKey> {
        self.landing_link
    }

    pub fn set_landing_link(&mut self, key: Option<StairKey>) {
        self.landing_link = key;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Move the tile contents of `old` onto this square when it replaces
    /// `old`: occupant, items, triggers, gas, landing link, forbidden tribes
    /// and the fire flag. Terrain properties stay those of `self`.
    pub fn inherit_contents(&mut self, old: &mut Square) {
        self.creature = old.creature.take();
        self.add_items(old.inventory.take_all());
        self.triggers.append(&mut old.triggers);
        self.poison_gas = old.poison_gas;
        if self.landing_link.is_none() {
            self.landing_link = old.landing_link;
        }
        for tribe in old.movement.forbidden_tribes() {
            self.movement.forbid_tribe(*tribe);
        }
        self.movement.set_on_fire(old.movement.is_on_fire());
    }
}
