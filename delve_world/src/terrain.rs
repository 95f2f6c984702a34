// Square factory.
//
// `SquareType` names every kind of terrain the engine knows; `make` turns a
// type into a fresh `Square` with its traversal policy, vision, construction
// rule and terrain behavior filled in. There is no global factory: the
// randomness an ore vein needs comes from the caller's `GameRng` and the
// tunables from the caller's `WorldConfig`.
//
// `SquareMix` is the weighted chooser world generation uses to scatter
// terrain ("mostly floor, some mud, and at least one gold vein").
//
// See also: `square.rs` for the `Square` type and its capability table,
// `levelgen.rs` for `LevelBuilder`, which places squares made here.

use crate::config::WorldConfig;
use crate::movement::{MovementSet, MovementTrait};
use crate::square::{ConstructionsId, OreKind, Square, TerrainKind};
use crate::types::{StairKey, VisionId};
use crate::view::{ViewId, ViewLayer, ViewObject};
use delve_prng::GameRng;
use serde::{Deserialize, Serialize};

/// Depth of `SquareType::Water`.
pub const DEEP_WATER_DEPTH: f64 = 2.5;
/// Depth of `SquareType::ShallowWater`.
pub const SHALLOW_WATER_DEPTH: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SquareType {
    Floor,
    Grass,
    Mud,
    Sand,
    Hill,
    BlackWall,
    WoodWall,
    CastleWall,
    Mountain,
    GoldOre,
    IronOre,
    StoneOre,
    Water,
    ShallowWater,
    Magma,
    Hole(StairKey),
    /// Indestructible level edge.
    BorderGuard,
}

fn open_ground() -> MovementSet {
    MovementSet::new()
        .add_trait(MovementTrait::Walk)
        .add_trait(MovementTrait::Fly)
}

fn solid() -> MovementSet {
    MovementSet::new().with_covered(true)
}

impl SquareType {
    pub fn make(self, rng: &mut GameRng, config: &WorldConfig) -> Square {
        match self {
            SquareType::Floor => ground(self, "floor", ViewId::Floor)
                .with_constructions(ConstructionsId::DungeonRooms),
            SquareType::Grass => ground(self, "grass", ViewId::Grass)
                .with_constructions(ConstructionsId::DungeonRooms)
                .with_can_hide(true),
            SquareType::Mud => ground(self, "mud", ViewId::Mud),
            SquareType::Sand => ground(self, "sand", ViewId::Sand)
                .with_constructions(ConstructionsId::DungeonRooms),
            SquareType::Hill => ground(self, "hill", ViewId::Hill)
                .with_constructions(ConstructionsId::DungeonRooms),
            SquareType::BlackWall => rock(self, "wall", ViewId::Wall, ConstructionsId::Mining),
            SquareType::WoodWall => {
                rock(self, "wooden wall", ViewId::WoodWall, ConstructionsId::Mining)
            }
            SquareType::CastleWall => {
                rock(self, "castle wall", ViewId::CastleWall, ConstructionsId::Mining)
            }
            SquareType::Mountain => rock(
                self,
                "mountain",
                ViewId::Mountain,
                ConstructionsId::MountainGenOres,
            ),
            SquareType::GoldOre => ore(self, "gold ore", ViewId::GoldOre, OreKind::Gold, rng, config),
            SquareType::IronOre => ore(self, "iron ore", ViewId::IronOre, OreKind::Iron, rng, config),
            SquareType::StoneOre => ore(self, "granite", ViewId::Stone, OreKind::Stone, rng, config),
            SquareType::Water => water(self, DEEP_WATER_DEPTH, config),
            SquareType::ShallowWater => water(self, SHALLOW_WATER_DEPTH, config),
            SquareType::Magma => Square::new(
                self,
                "magma",
                ViewObject::new(ViewId::Magma, ViewLayer::FloorBackground),
                MovementSet::new()
                    .add_trait(MovementTrait::Fly)
                    .add_forcible_trait(MovementTrait::Walk),
            )
            .with_vision(VisionId::Normal)
            .with_kind(TerrainKind::Magma),
            SquareType::Hole(key) => Square::new(
                self,
                "hole",
                ViewObject::new(ViewId::Hole, ViewLayer::FloorBackground),
                MovementSet::new()
                    .add_trait(MovementTrait::Fly)
                    .add_forcible_trait(MovementTrait::Walk),
            )
            .with_vision(VisionId::Normal)
            .with_kind(TerrainKind::Hole { key }),
            SquareType::BorderGuard => Square::new(
                self,
                "wall",
                ViewObject::new(ViewId::BorderGuard, ViewLayer::Floor).with_shadow(),
                solid(),
            ),
        }
    }
}

fn ground(square_type: SquareType, name: &str, view: ViewId) -> Square {
    Square::new(
        square_type,
        name,
        ViewObject::new(view, ViewLayer::FloorBackground),
        open_ground(),
    )
    .with_vision(VisionId::Normal)
}

fn rock(square_type: SquareType, name: &str, view: ViewId, constructions: ConstructionsId) -> Square {
    Square::new(
        square_type,
        name,
        ViewObject::new(view, ViewLayer::Floor).with_shadow(),
        solid(),
    )
    .with_constructions(constructions)
}

fn ore(
    square_type: SquareType,
    name: &str,
    view: ViewId,
    ore: OreKind,
    rng: &mut GameRng,
    config: &WorldConfig,
) -> Square {
    let (lo, hi) = config.ore_drop_range;
    let count = rng.range_inclusive(lo.min(hi), lo.max(hi)).max(0) as u32;
    rock(square_type, name, view, ConstructionsId::MiningOre)
        .with_kind(TerrainKind::Ore { ore, count })
}

/// Water of an arbitrary depth. Wading is allowed below
/// `config.wade_depth_limit`.
pub fn water_of_depth(depth: f64, config: &WorldConfig) -> Square {
    let square_type = if depth < config.wade_depth_limit {
        SquareType::ShallowWater
    } else {
        SquareType::Water
    };
    water(square_type, depth, config)
}

fn water(square_type: SquareType, depth: f64, config: &WorldConfig) -> Square {
    let mut movement = MovementSet::new()
        .add_trait(MovementTrait::Swim)
        .add_trait(MovementTrait::Fly)
        .add_forcible_trait(MovementTrait::Walk);
    if depth < config.wade_depth_limit {
        movement = movement.add_trait(MovementTrait::Wade);
    }
    Square::new(
        square_type,
        "water",
        ViewObject::new(ViewId::Water, ViewLayer::FloorBackground).with_water_depth(depth),
        movement,
    )
    .with_vision(VisionId::Normal)
    .with_kind(TerrainKind::Water { depth })
}

// ---------------------------------------------------------------------------
// SquareMix
// ---------------------------------------------------------------------------

/// Weighted chooser over square types.
///
/// The `first` list is handed out in order before any weighted draw, which
/// guarantees that each of those types appears at least once.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SquareMix {
    first: Vec<SquareType>,
    weighted: Vec<(SquareType, f64)>,
}

impl SquareMix {
    pub fn new(weighted: Vec<(SquareType, f64)>) -> Self {
        Self {
            first: Vec::new(),
            weighted,
        }
    }

    /// Types to hand out, in order, before drawing by weight.
    pub fn with_first(mut self, first: Vec<SquareType>) -> Self {
        self.first = first;
        self.first.reverse();
        self
    }

    /// Next type, `None` if the mix is empty or all weights are zero.
    pub fn choose(&mut self, rng: &mut GameRng) -> Option<SquareType> {
        if let Some(t) = self.first.pop() {
            return Some(t);
        }
        let weights: Vec<f64> = self.weighted.iter().map(|(_, w)| *w).collect();
        rng.choose_weighted(&weights).map(|i| self.weighted[i].0)
    }
}
