// Triggers attached to tiles: traps, alarms, portals.
//
// What a trigger does when something steps on it belongs to the creature
// and effect systems. The tile only owns the trigger, shows it, and lets
// fire destroy the flammable ones.

use crate::types::TriggerId;
use crate::view::{ViewId, ViewLayer, ViewObject};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TriggerKind {
    Trap,
    Alarm,
    Portal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    pub kind: TriggerKind,
    /// Fire damage the trigger takes before it is destroyed. `None` = fireproof.
    pub fire_resistance: Option<f64>,
    damage_taken: f64,
}

impl Trigger {
    pub fn new(id: TriggerId, kind: TriggerKind) -> Self {
        let fire_resistance = match kind {
            TriggerKind::Trap => Some(2.0),
            TriggerKind::Alarm => Some(1.0),
            TriggerKind::Portal => None,
        };
        Self {
            id,
            kind,
            fire_resistance,
            damage_taken: 0.0,
        }
    }

    /// Apply fire. Returns `true` once the trigger is destroyed.
    pub fn fire_damage(&mut self, amount: f64) -> bool {
        if self.fire_resistance.is_some() {
            self.damage_taken += amount;
        }
        self.is_destroyed()
    }

    pub fn is_destroyed(&self) -> bool {
        self.fire_resistance
            .is_some_and(|resistance| self.damage_taken >= resistance)
    }

    /// Triggers are drawn on the item layer.
    pub fn view_object(&self) -> ViewObject {
        let id = match self.kind {
            TriggerKind::Portal => ViewId::Hole,
            TriggerKind::Trap | TriggerKind::Alarm => ViewId::Rubble,
        };
        ViewObject::new(id, ViewLayer::Item).with_description(match self.kind {
            TriggerKind::Trap => "trap",
            TriggerKind::Alarm => "alarm",
            TriggerKind::Portal => "portal",
        })
    }
}
