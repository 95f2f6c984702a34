// Items lying on tiles.
//
// The item system proper (stats, equipment, combat) is an external
// collaborator. The world engine only needs what a tile must know about its
// contents: identity, a display name for stacking, a category for indexed
// lookup, and how the item reacts to fire.
//
// A square owns its items in an `Inventory`. Insertion order is kept: it
// does not affect correctness, but it is the order stacks are displayed in.

use crate::types::ItemId;
use serde::{Deserialize, Serialize};

/// Broad item category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemClass {
    Weapon,
    Armor,
    Gold,
    Ore,
    Rock,
    Wood,
    Food,
    Corpse,
    Other,
}

/// Indexed lookups supported by `Inventory::by_index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemIndex {
    Weapon,
    Gold,
    /// Ore and rock, what miners haul.
    Mineral,
    Wood,
    Corpse,
    Flammable,
}

impl ItemIndex {
    pub fn matches(self, item: &Item) -> bool {
        match self {
            ItemIndex::Weapon => item.class == ItemClass::Weapon,
            ItemIndex::Gold => item.class == ItemClass::Gold,
            ItemIndex::Mineral => matches!(item.class, ItemClass::Ore | ItemClass::Rock),
            ItemIndex::Wood => item.class == ItemClass::Wood,
            ItemIndex::Corpse => item.class == ItemClass::Corpse,
            ItemIndex::Flammable => item.flammability > 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub class: ItemClass,
    /// Heat gained per unit of fire damage. 0 = fireproof.
    pub flammability: f64,
    heat: f64,
}

impl Item {
    pub fn new(id: ItemId, name: &str, class: ItemClass) -> Self {
        let flammability = match class {
            ItemClass::Wood | ItemClass::Food | ItemClass::Corpse => 0.5,
            _ => 0.0,
        };
        Self {
            id,
            name: name.to_string(),
            class,
            flammability,
            heat: 0.0,
        }
    }

    pub fn with_flammability(mut self, flammability: f64) -> Self {
        self.flammability = flammability;
        self
    }

    /// Apply fire. Returns `true` once the item has burnt up.
    pub fn fire_damage(&mut self, amount: f64) -> bool {
        self.heat += amount * self.flammability;
        self.is_burnt()
    }

    pub fn is_burnt(&self) -> bool {
        self.heat >= 1.0
    }
}

/// Items owned by a tile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    items: Vec<Item>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        let idx = self.items.iter().position(|it| it.id == id)?;
        Some(self.items.remove(idx))
    }

    /// Remove every listed item that is present; missing ids are skipped.
    pub fn remove_many(&mut self, ids: &[ItemId]) -> Vec<Item> {
        ids.iter().filter_map(|id| self.remove(*id)).collect()
    }

    /// Take every item out.
    pub fn take_all(&mut self) -> Vec<Item> {
        std::mem::take(&mut self.items)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|it| it.id == id)
    }

    pub fn by_index(&self, index: ItemIndex) -> Vec<&Item> {
        self.items.iter().filter(|it| index.matches(it)).collect()
    }

    pub fn matching(&self, mut predicate: impl FnMut(&Item) -> bool) -> Vec<&Item> {
        self.items.iter().filter(|it| predicate(it)).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply fire to every item; burnt items are removed and returned.
    pub fn fire_damage(&mut self, amount: f64) -> Vec<Item> {
        for it in &mut self.items {
            it.fire_damage(amount);
        }
        let (burnt, kept): (Vec<Item>, Vec<Item>) =
            self.take_all().into_iter().partition(Item::is_burnt);
        self.items = kept;
        burnt
    }
}

/// Group items by name, in first-seen order: `[("gold piece", 3), ...]`.
pub fn stack_items(items: &[Item]) -> Vec<(String, usize)> {
    let mut stacks: Vec<(String, usize)> = Vec::new();
    for it in items {
        match stacks.iter_mut().find(|(name, _)| *name == it.name) {
            Some((_, count)) => *count += 1,
            None => stacks.push((it.name.clone(), 1)),
        }
    }
    stacks
}
