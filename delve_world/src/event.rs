// World events: signals emitted by tile mutations.
//
// Things that happen as side effects of position operations (a creature
// burning in magma, furniture collapsing after a fire, a boulder filling a
// hole) are pushed into the `Realm` event log. The UI, sound and message
// systems drain them with `Realm::drain_events` and render them however
// they like; the engine itself attaches no text or effects.
//
// See also: `realm.rs` which owns the log, `position.rs` where most events
// originate.
//
// **Critical constraint: determinism.** Events are appended in the order the
// mutations happen, so the same call sequence yields the same log.

use crate::furniture::{FurnitureType, UsageType};
use crate::position::Position;
use crate::square::OreKind;
use crate::terrain::SquareType;
use crate::types::{CreatureId, TriggerId};
use serde::{Deserialize, Serialize};

/// Why a furniture went away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DestroyCause {
    /// Taken apart by a creature or by `destroy`.
    Destroyed,
    /// Burnt out.
    Burnt,
    /// The terrain under it changed into something it cannot stand on.
    Terrain,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// A construction completed.
    FurnitureBuilt {
        position: Position,
        kind: FurnitureType,
    },
    FurnitureDestroyed {
        position: Position,
        kind: FurnitureType,
        cause: DestroyCause,
    },
    /// A square construction (mining) completed.
    SquareConstructed {
        position: Position,
        from: SquareType,
        to: SquareType,
    },
    OreMined {
        position: Position,
        ore: OreKind,
        count: u32,
    },
    Ignited {
        position: Position,
        kind: FurnitureType,
    },
    Extinguished {
        position: Position,
        kind: FurnitureType,
    },
    CreatureBurned {
        creature: CreatureId,
        position: Position,
    },
    CreatureDrowned {
        creature: CreatureId,
        position: Position,
    },
    FellIntoHole {
        creature: CreatureId,
        from: Position,
        to: Position,
    },
    HoleFilled {
        boulder: CreatureId,
        position: Position,
    },
    /// Items dropped into magma, as `(name, count)` stacks.
    ItemsBurned {
        position: Position,
        stacks: Vec<(String, usize)>,
    },
    /// Items dropped into water.
    ItemsSank {
        position: Position,
        stacks: Vec<(String, usize)>,
    },
    TriggerBurned {
        position: Position,
        trigger: TriggerId,
    },
    LevelChanged {
        creature: CreatureId,
        from: Position,
        to: Position,
    },
    /// A creature arrived from another world.
    CreatureLanded {
        creature: CreatureId,
        from: Position,
        to: Position,
    },
    FurnitureUsed {
        creature: CreatureId,
        position: Position,
        usage: UsageType,
    },
}

impl WorldEvent {
    /// Where the event happened (the destination for moves).
    pub fn position(&self) -> Position {
        match self {
            WorldEvent::FurnitureBuilt { position, .. }
            | WorldEvent::FurnitureDestroyed { position, .. }
            | WorldEvent::SquareConstructed { position, .. }
            | WorldEvent::OreMined { position, .. }
            | WorldEvent::Ignited { position, .. }
            | WorldEvent::Extinguished { position, .. }
            | WorldEvent::CreatureBurned { position, .. }
            | WorldEvent::CreatureDrowned { position, .. }
            | WorldEvent::HoleFilled { position, .. }
            | WorldEvent::ItemsBurned { position, .. }
            | WorldEvent::ItemsSank { position, .. }
            | WorldEvent::TriggerBurned { position, .. }
            | WorldEvent::FurnitureUsed { position, .. } => *position,
            WorldEvent::FellIntoHole { to, .. }
            | WorldEvent::LevelChanged { to, .. }
            | WorldEvent::CreatureLanded { to, .. } => *to,
        }
    }
}
