// Data-driven world configuration.
//
// All tunable world-engine parameters live in `WorldConfig`, loaded from
// JSON. The engine reads construction durations, the furniture table, ore
// yields, gas limits and fire thresholds from here instead of hard-coding
// them. `#[serde(default)]` lets a config file name only the fields it
// changes.
//
// See also: `furniture.rs` for `FurnitureDef` and the default furniture
// table, `realm.rs` which owns the config, `level.rs` which registers the
// `movement_classes` sectors when a level is added.
//
// **Critical constraint: determinism.** Config values feed directly into
// world logic; two realms with the same config, seed and call sequence end
// up in identical states.

use crate::error::WorldError;
use crate::furniture::{FurnitureDef, FurnitureType, default_furniture};
use crate::movement::{MovementTrait, MovementType};
use crate::types::TribeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Construct calls needed for furniture whose def has no `build_ticks`.
    pub construction_ticks: u32,
    /// Construct calls needed to turn a square into another (mining).
    pub square_construction_ticks: u32,
    pub furniture: BTreeMap<FurnitureType, FurnitureDef>,
    /// Movement classes every level keeps a connectivity index for from the
    /// moment it is added. Other classes are registered on first query.
    pub movement_classes: Vec<MovementType>,
    /// Inclusive range of ore items a mined ore vein drops.
    pub ore_drop_range: (i32, i32),
    /// Per-tile poison gas cap.
    pub max_poison_gas: f64,
    /// Chebyshev radius searched for a free tile when landing a creature.
    pub landing_search_radius: i32,
    /// Heat at which furniture catches fire.
    pub fire_ignition_heat: f64,
    /// Water shallower than this can be waded.
    pub wade_depth_limit: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let neutral = TribeId::NEUTRAL;
        Self {
            construction_ticks: 10,
            square_construction_ticks: 10,
            furniture: default_furniture(),
            movement_classes: vec![
                MovementType::single(neutral, MovementTrait::Walk),
                MovementType::single(neutral, MovementTrait::Fly),
                MovementType::single(neutral, MovementTrait::Swim),
            ],
            ore_drop_range: (18, 40),
            max_poison_gas: 2.0,
            landing_search_radius: 5,
            fire_ignition_heat: 1.0,
            wade_depth_limit: 1.5,
        }
    }
}

impl WorldConfig {
    pub fn from_json(json: &str) -> Result<Self, WorldError> {
        serde_json::from_str(json).map_err(WorldError::Config)
    }

    pub fn to_json(&self) -> Result<String, WorldError> {
        serde_json::to_string_pretty(self).map_err(WorldError::Config)
    }
}
