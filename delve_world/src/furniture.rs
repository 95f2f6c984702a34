// Furniture: the overlay object on top of a square.
//
// Doors, built walls, bridges, beds, trees and so on. At most one furniture
// sits on a tile, held in a `FurnitureSlot` together with an optional
// in-progress `ConstructionRecord`. The lifecycle is
//
//   Absent -> Constructing(type, ticks) -> Present(type)
//   Present -> Destroyed -> Absent | Replaced -> Present(other)
//
// Every transition into or out of `Present` goes through
// `Level::set_furniture`, which owns the invalidation of connectivity and
// render state. Nothing in this file touches a `Level`.
//
// Furniture kinds are data-driven: `FurnitureDef` entries keyed by
// `FurnitureType` live in `WorldConfig::furniture`, and the `Realm` turns
// them into a `FurnitureCatalog` that stamps out `Furniture` values.
//
// See also: `level.rs` for `set_furniture` and traversal layering,
// `position.rs` for the construction and fire entry points, `config.rs` for
// the furniture table.

use crate::movement::{DestroyAction, DestroyActions, MovementSet, MovementType};
use crate::types::TribeId;
use crate::view::{ViewId, ViewLayer, ViewObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FurnitureType {
    Door,
    BuiltWall,
    Bridge,
    Bed,
    Altar,
    Workshop,
    Torch,
    Tree,
    Barricade,
    Stairs,
    Rubble,
    Ashes,
}

/// What kind of square a furniture can be built on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildSite {
    /// Dry floor the dungeon can be furnished on.
    Floor,
    /// Water or magma (bridges).
    Liquid,
}

/// What applying a furniture does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UsageType {
    Sleep,
    Pray,
    Craft,
    /// Take the stairs linked to the tile.
    Stairs,
}

/// Static description of a furniture kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FurnitureDef {
    pub name: String,
    pub view: ViewId,
    pub movement: MovementSet,
    /// When set, only the furniture's policy decides traversal (bridges).
    pub overrides_movement: bool,
    pub blocks_vision: bool,
    pub build_site: BuildSite,
    /// Construct calls needed; `None` = `WorldConfig::construction_ticks`.
    pub build_ticks: Option<u32>,
    /// Can be built over by a different furniture kind.
    pub replaceable: bool,
    pub usage: Option<UsageType>,
    pub usage_time: u32,
    /// Destroy actions that take this furniture apart. Empty = indestructible.
    pub destroyed_by: DestroyActions,
    pub durability: u32,
    /// Heat gained per unit of fire damage. 0 = fireproof.
    pub flammability: f64,
    /// Burn ticks before the furniture is consumed.
    pub fuel: u32,
    /// Left behind when the furniture burns out.
    pub burnt_remains: Option<FurnitureType>,
}

impl Default for FurnitureDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            view: ViewId::Empty,
            movement: MovementSet::open(),
            overrides_movement: false,
            blocks_vision: false,
            build_site: BuildSite::Floor,
            build_ticks: None,
            replaceable: false,
            usage: None,
            usage_time: 1,
            destroyed_by: DestroyActions::NONE,
            durability: 10,
            flammability: 0.0,
            fuel: 0,
            burnt_remains: None,
        }
    }
}

/// The furniture table used when the config does not provide one.
pub fn default_furniture() -> BTreeMap<FurnitureType, FurnitureDef> {
    let bash = DestroyActions::of(&[DestroyAction::Bash]);
    let mut defs = BTreeMap::new();
    defs.insert(
        FurnitureType::Door,
        FurnitureDef {
            name: "door".into(),
            view: ViewId::Door,
            blocks_vision: true,
            destroyed_by: bash,
            durability: 30,
            flammability: 0.3,
            fuel: 20,
            burnt_remains: Some(FurnitureType::Ashes),
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::BuiltWall,
        FurnitureDef {
            name: "wall".into(),
            view: ViewId::BuiltWall,
            movement: MovementSet::new().with_covered(true),
            blocks_vision: true,
            build_ticks: Some(15),
            destroyed_by: DestroyActions::of(&[DestroyAction::Dig]),
            durability: 100,
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Bridge,
        FurnitureDef {
            name: "bridge".into(),
            view: ViewId::Bridge,
            overrides_movement: true,
            build_site: BuildSite::Liquid,
            destroyed_by: bash,
            durability: 40,
            flammability: 0.2,
            fuel: 30,
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Bed,
        FurnitureDef {
            name: "bed".into(),
            view: ViewId::Bed,
            replaceable: true,
            usage: Some(UsageType::Sleep),
            usage_time: 5,
            destroyed_by: bash,
            flammability: 0.5,
            fuel: 10,
            burnt_remains: Some(FurnitureType::Ashes),
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Altar,
        FurnitureDef {
            name: "altar".into(),
            view: ViewId::Altar,
            usage: Some(UsageType::Pray),
            usage_time: 3,
            destroyed_by: bash,
            durability: 50,
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Workshop,
        FurnitureDef {
            name: "workshop".into(),
            view: ViewId::Workshop,
            replaceable: true,
            usage: Some(UsageType::Craft),
            usage_time: 2,
            destroyed_by: bash,
            flammability: 0.4,
            fuel: 15,
            burnt_remains: Some(FurnitureType::Ashes),
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Torch,
        FurnitureDef {
            name: "torch".into(),
            view: ViewId::Torch,
            build_ticks: Some(3),
            destroyed_by: bash,
            durability: 5,
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Tree,
        FurnitureDef {
            name: "tree".into(),
            view: ViewId::Tree,
            movement: MovementSet::open().with_covered(true),
            blocks_vision: true,
            destroyed_by: bash,
            durability: 60,
            flammability: 0.6,
            fuel: 30,
            burnt_remains: Some(FurnitureType::Ashes),
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Barricade,
        FurnitureDef {
            name: "barricade".into(),
            view: ViewId::Barricade,
            movement: MovementSet::new(),
            build_ticks: Some(5),
            destroyed_by: bash,
            durability: 20,
            flammability: 0.5,
            fuel: 10,
            burnt_remains: Some(FurnitureType::Ashes),
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Stairs,
        FurnitureDef {
            name: "stairs".into(),
            view: ViewId::Stairs,
            usage: Some(UsageType::Stairs),
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Rubble,
        FurnitureDef {
            name: "rubble".into(),
            view: ViewId::Rubble,
            replaceable: true,
            ..FurnitureDef::default()
        },
    );
    defs.insert(
        FurnitureType::Ashes,
        FurnitureDef {
            name: "ashes".into(),
            view: ViewId::Ashes,
            replaceable: true,
            ..FurnitureDef::default()
        },
    );
    defs
}

// ---------------------------------------------------------------------------
// Fire
// ---------------------------------------------------------------------------

/// Fire state of a furniture.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fire {
    flammability: f64,
    heat: f64,
    burning: bool,
    fuel: u32,
}

impl Fire {
    pub fn new(flammability: f64, fuel: u32) -> Self {
        Self {
            flammability,
            heat: 0.0,
            burning: false,
            fuel,
        }
    }

    pub fn can_burn(&self) -> bool {
        self.flammability > 0.0 && self.fuel > 0
    }

    pub fn is_burning(&self) -> bool {
        self.burning
    }

    pub fn is_burnt_out(&self) -> bool {
        self.flammability > 0.0 && self.fuel == 0
    }

    pub fn heat(&self) -> f64 {
        self.heat
    }

    pub fn fuel(&self) -> u32 {
        self.fuel
    }

    /// Accumulate `amount * flammability` heat. Returns `true` when this call
    /// set the furniture on fire.
    pub fn damage(&mut self, amount: f64, ignition_heat: f64) -> bool {
        if !self.can_burn() {
            return false;
        }
        self.heat += amount * self.flammability;
        if !self.burning && self.heat >= ignition_heat {
            self.burning = true;
            return true;
        }
        false
    }

    /// Burn one unit of fuel. Returns `true` when the fuel ran out.
    pub fn burn(&mut self) -> bool {
        if !self.burning {
            return false;
        }
        self.fuel = self.fuel.saturating_sub(1);
        if self.fuel == 0 {
            self.burning = false;
            return true;
        }
        false
    }

    /// Put the fire out and cool down. Returns whether it was burning.
    pub fn extinguish(&mut self) -> bool {
        let was_burning = self.burning;
        self.burning = false;
        self.heat = 0.0;
        was_burning
    }
}

// ---------------------------------------------------------------------------
// Furniture
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Furniture {
    kind: FurnitureType,
    tribe: TribeId,
    name: String,
    view: ViewObject,
    movement: MovementSet,
    overrides_movement: bool,
    blocks_vision: bool,
    build_site: BuildSite,
    replaceable: bool,
    usage: Option<UsageType>,
    usage_time: u32,
    destroyed_by: DestroyActions,
    health: u32,
    fire: Fire,
    burnt_remains: Option<FurnitureType>,
}

impl Furniture {
    pub fn from_def(kind: FurnitureType, def: &FurnitureDef, tribe: TribeId) -> Self {
        Self {
            kind,
            tribe,
            name: def.name.clone(),
            view: ViewObject::new(def.view, ViewLayer::Furniture),
            movement: def.movement.clone(),
            overrides_movement: def.overrides_movement,
            blocks_vision: def.blocks_vision,
            build_site: def.build_site,
            replaceable: def.replaceable,
            usage: def.usage,
            usage_time: def.usage_time,
            destroyed_by: def.destroyed_by,
            health: def.durability,
            fire: Fire::new(def.flammability, def.fuel),
            burnt_remains: def.burnt_remains,
        }
    }

    pub fn kind(&self) -> FurnitureType {
        self.kind
    }

    pub fn tribe(&self) -> TribeId {
        self.tribe
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// View with the burning overlay applied.
    pub fn view_object(&self) -> ViewObject {
        let mut view = self.view.clone();
        if self.fire.is_burning() {
            view.burning = 1.0;
        }
        view
    }

    pub fn view_object_mut(&mut self) -> &mut ViewObject {
        &mut self.view
    }

    pub fn movement(&self) -> &MovementSet {
        &self.movement
    }

    pub fn movement_mut(&mut self) -> &mut MovementSet {
        &mut self.movement
    }

    pub fn overrides_movement(&self) -> bool {
        self.overrides_movement
    }

    pub fn blocks_vision(&self) -> bool {
        self.blocks_vision
    }

    pub fn build_site(&self) -> BuildSite {
        self.build_site
    }

    pub fn is_replaceable(&self) -> bool {
        self.replaceable
    }

    pub fn usage(&self) -> Option<UsageType> {
        self.usage
    }

    pub fn usage_time(&self) -> u32 {
        self.usage_time
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn fire(&self) -> &Fire {
        &self.fire
    }

    pub fn fire_mut(&mut self) -> &mut Fire {
        &mut self.fire
    }

    pub fn is_burning(&self) -> bool {
        self.fire.is_burning()
    }

    pub fn burnt_remains(&self) -> Option<FurnitureType> {
        self.burnt_remains
    }

    /// Furniture traversal rule. The unforced request must be permitted by
    /// the furniture's policy; a forced request also gets through if the
    /// mover can take the furniture apart.
    pub fn can_enter(&self, movement: &MovementType) -> bool {
        self.movement.can_enter(&movement.unforced())
            || (movement.is_forced() && self.can_destroy(movement))
    }

    pub fn can_destroy(&self, movement: &MovementType) -> bool {
        self.destroyed_by.intersects(movement.destroy_actions())
    }

    pub fn can_be_destroyed_by(&self, action: DestroyAction) -> bool {
        self.destroyed_by.contains(action)
    }

    /// Take `damage` from a destroy action. Returns `true` when health is
    /// gone.
    pub fn take_damage(&mut self, damage: u32) -> bool {
        self.health = self.health.saturating_sub(damage);
        self.health == 0
    }
}

// ---------------------------------------------------------------------------
// Per-tile slot, construction record, catalog
// ---------------------------------------------------------------------------

/// An in-progress furniture construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionRecord {
    pub target: FurnitureType,
    pub tribe: TribeId,
    pub remaining: u32,
}

/// Furniture storage of one tile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FurnitureSlot {
    pub furniture: Option<Furniture>,
    pub construction: Option<ConstructionRecord>,
}

/// Stamps out furniture from the configured defs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FurnitureCatalog {
    defs: BTreeMap<FurnitureType, FurnitureDef>,
}

impl FurnitureCatalog {
    pub fn new(defs: BTreeMap<FurnitureType, FurnitureDef>) -> Self {
        Self { defs }
    }

    pub fn def(&self, kind: FurnitureType) -> Option<&FurnitureDef> {
        self.defs.get(&kind)
    }

    pub fn make(&self, kind: FurnitureType, tribe: TribeId) -> Option<Furniture> {
        self.def(kind).map(|def| Furniture::from_def(kind, def, tribe))
    }

    /// Construct calls needed for `kind`.
    pub fn build_ticks(&self, kind: FurnitureType, default_ticks: u32) -> u32 {
        self.def(kind)
            .and_then(|def| def.build_ticks)
            .unwrap_or(default_ticks)
            .max(1)
    }
}
