// Creature records.
//
// Creatures proper (AI, stats, inventory, combat) belong to another system.
// The world engine keeps only what it needs to move them around and apply
// terrain effects: identity, tribe, movement capabilities, where they
// stand, whether they are a boulder, and enough health to die in a fire.
//
// The `Realm` owns every creature; squares refer to their occupant by
// `CreatureId`, and a creature refers back to its tile by `Position`.

use crate::movement::{DestroyAction, MovementTraits, MovementType};
use crate::position::Position;
use crate::types::{CreatureId, TribeId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    id: CreatureId,
    name: String,
    movement: MovementType,
    position: Position,
    boulder: bool,
    health: f64,
    /// Damage dealt per destroy action.
    damage: u32,
}

impl Creature {
    pub fn new(id: CreatureId, name: &str, tribe: TribeId, traits: MovementTraits) -> Self {
        Self {
            id,
            name: name.to_string(),
            movement: MovementType::new(tribe, traits),
            position: Position::invalid(),
            boulder: false,
            health: 10.0,
            damage: 5,
        }
    }

    pub fn id(&self) -> CreatureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tribe(&self) -> TribeId {
        self.movement.tribe()
    }

    pub fn movement(&self) -> &MovementType {
        &self.movement
    }

    pub fn movement_mut(&mut self) -> &mut MovementType {
        &mut self.movement
    }

    pub fn add_destroy_action(&mut self, action: DestroyAction) {
        self.movement = self.movement.with_destroy(action);
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn is_boulder(&self) -> bool {
        self.boulder
    }

    /// Boulders are pushed, not walked: their moves are forced.
    pub fn set_boulder(&mut self, boulder: bool) {
        self.boulder = boulder;
        self.movement.set_forced(boulder);
    }

    pub fn health(&self) -> f64 {
        self.health
    }

    pub fn set_health(&mut self, health: f64) {
        self.health = health;
    }

    pub fn damage(&self) -> u32 {
        self.damage
    }

    pub fn set_damage(&mut self, damage: u32) {
        self.damage = damage;
    }

    /// Returns `true` when this damage kills the creature.
    pub fn take_damage(&mut self, amount: f64) -> bool {
        self.health -= amount;
        self.health <= 0.0
    }
}
