// The realm: top-level owner of all world state.
//
// `Realm` is the single source of truth for everything the engine knows. It
// owns the configuration, the furniture catalog built from it, every level of
// every world (keyed by `LevelId`), every creature (keyed by `CreatureId`),
// the id counters, the event log, and the deterministic PRNG. `Position`
// methods borrow it explicitly; nothing else holds references into it.
//
// ## Moving between levels
//
// Levels of one world are linked by stair keys: a key with landings on two
// levels connects them. Creatures cross by using stairs (`use_stairs`), by
// falling through a hole (`fall_through`), or by being moved onto an
// explicit position of another level (`change_level`). Moving to a level of
// a *different* world is an extraction followed by a landing
// (`land_creature`): the creature is taken off its tile and placed on the
// first free tile near the target, searching ring by ring up to
// `WorldConfig::landing_search_radius`.
//
// ## Save/load
//
// `Realm` derives `Serialize`/`Deserialize`. The furniture catalog and each
// level's sectors and dirty flags are `#[serde(skip)]`; `from_json` calls
// `rebuild_transient_state()` to recreate them. Levels are saved as a list
// since their `LevelId` keys are not strings.
//
// See also: `position.rs` for the operations that route through here,
// `level.rs` for per-level state, `event.rs` for the event log.
//
// **Critical constraint: determinism.** Levels and creatures live in
// `BTreeMap`s, landing searches scan in a fixed order, and all randomness
// comes from the realm's `GameRng`.

use crate::config::WorldConfig;
use crate::creature::Creature;
use crate::error::{WorldError, WorldResult};
use crate::event::WorldEvent;
use crate::furniture::FurnitureCatalog;
use crate::item::{Item, ItemClass};
use crate::level::Level;
use crate::movement::MovementTraits;
use crate::position::Position;
use crate::trigger::{Trigger, TriggerKind};
use crate::types::{CreatureId, ItemId, LevelId, Rect, StairKey, TribeId, TriggerId};
use delve_prng::GameRng;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Realm {
    config: WorldConfig,

    /// Built from `config.furniture`.
    #[serde(skip)]
    catalog: FurnitureCatalog,

    #[serde(with = "levels_as_list")]
    levels: BTreeMap<LevelId, Level>,

    creatures: BTreeMap<CreatureId, Creature>,

    next_creature: u64,
    next_item: u64,
    next_trigger: u64,

    /// Undrained events, oldest first.
    events: Vec<WorldEvent>,

    rng: GameRng,
}

impl Realm {
    pub fn new(seed: u64, config: WorldConfig) -> Self {
        let catalog = FurnitureCatalog::new(config.furniture.clone());
        Self {
            config,
            catalog,
            levels: BTreeMap::new(),
            creatures: BTreeMap::new(),
            next_creature: 1,
            next_item: 1,
            next_trigger: 1,
            events: Vec::new(),
            rng: GameRng::new(seed),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FurnitureCatalog {
        &self.catalog
    }

    pub fn rng_mut(&mut self) -> &mut GameRng {
        &mut self.rng
    }

    /// The PRNG and the config at once, for generating squares.
    pub(crate) fn rng_and_config(&mut self) -> (&mut GameRng, &WorldConfig) {
        (&mut self.rng, &self.config)
    }

    // -----------------------------------------------------------------------
    // Levels
    // -----------------------------------------------------------------------

    /// Add a level and build connectivity for the configured movement
    /// classes. If its id is taken, the level gets the next free index of
    /// the same world. Returns the id it was stored under.
    pub fn add_level(&mut self, mut level: Level) -> LevelId {
        let mut id = level.id();
        if self.levels.contains_key(&id) {
            let next = self
                .levels
                .keys()
                .filter(|l| l.world == id.world)
                .map(|l| l.index + 1)
                .max()
                .unwrap_or(0);
            warn!("{id} already exists; storing level as index {next}");
            id = LevelId::new(id.world, next);
            level.set_id(id);
        }
        for mt in &self.config.movement_classes {
            level.register_class(*mt);
        }
        info!(
            "added {id} \"{}\" ({}x{})",
            level.name(),
            level.width(),
            level.height()
        );
        self.levels.insert(id, level);
        id
    }

    pub fn level(&self, id: LevelId) -> Option<&Level> {
        self.levels.get(&id)
    }

    pub fn level_mut(&mut self, id: LevelId) -> Option<&mut Level> {
        self.levels.get_mut(&id)
    }

    pub fn level_or_err(&self, id: LevelId) -> WorldResult<&Level> {
        self.level(id).ok_or(WorldError::UnknownLevel(id))
    }

    pub fn levels(&self) -> impl Iterator<Item = &Level> + '_ {
        self.levels.values()
    }

    // -----------------------------------------------------------------------
    // Creatures, items, triggers
    // -----------------------------------------------------------------------

    /// Register a creature. It starts off the map; place it with
    /// `Position::add_creature`.
    pub fn add_creature(&mut self, name: &str, tribe: TribeId, traits: MovementTraits) -> CreatureId {
        let id = CreatureId(self.next_creature);
        self.next_creature += 1;
        self.creatures
            .insert(id, Creature::new(id, name, tribe, traits));
        id
    }

    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn creature_or_err(&self, id: CreatureId) -> WorldResult<&Creature> {
        self.creature(id).ok_or(WorldError::UnknownCreature(id))
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> + '_ {
        self.creatures.values()
    }

    /// Take a creature off the map and out of the realm.
    pub fn kill_creature(&mut self, id: CreatureId) -> Option<Creature> {
        self.unplace_creature(id);
        let removed = self.creatures.remove(&id);
        if let Some(c) = &removed {
            debug!("{} ({id}) removed from the realm", c.name());
        }
        removed
    }

    pub fn new_item(&mut self, name: &str, class: ItemClass) -> Item {
        Item::new(self.alloc_item_id(), name, class)
    }

    pub(crate) fn alloc_item_id(&mut self) -> ItemId {
        let id = ItemId(self.next_item);
        self.next_item += 1;
        id
    }

    pub fn new_trigger(&mut self, kind: TriggerKind) -> Trigger {
        let id = TriggerId(self.next_trigger);
        self.next_trigger += 1;
        Trigger::new(id, kind)
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub(crate) fn push_event(&mut self, event: WorldEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.events
    }

    /// Take every event logged since the last drain.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Placement
    // -----------------------------------------------------------------------

    /// Put `id` on `pos` and record it on the creature. The tile must be
    /// free. Runs no terrain effects.
    pub(crate) fn place_creature(&mut self, id: CreatureId, pos: Position) {
        let (Some(level), Some(creature)) = (
            pos.level().and_then(|l| self.levels.get_mut(&l)),
            self.creatures.get_mut(&id),
        ) else {
            panic!("place_creature: cannot place {id} at {pos}");
        };
        level.put_creature(pos.coord(), id);
        creature.set_position(pos);
    }

    /// Take `id` off its tile, if it is on one.
    pub(crate) fn unplace_creature(&mut self, id: CreatureId) {
        let Some(creature) = self.creatures.get_mut(&id) else {
            return;
        };
        let pos = creature.position();
        creature.set_position(Position::invalid());
        if let Some(level) = pos.level().and_then(|l| self.levels.get_mut(&l)) {
            if level.creature_at(pos.coord()) == Some(id) {
                level.take_creature(pos.coord());
            }
        }
    }

    /// Move `id` to `to` and apply the terrain there.
    fn relocate(&mut self, id: CreatureId, to: Position) {
        self.unplace_creature(id);
        self.place_creature(id, to);
        to.run_enter_effects(self, id);
    }

    /// The tile closest to `near` that the creature can enter: rings of
    /// growing radius, each scanned row-major.
    pub fn find_landing(&self, id: CreatureId, near: Position) -> Option<Position> {
        let movement = *self.creature(id)?.movement();
        let level = self.level(near.level()?)?;
        let bounds = level.bounds();
        (0..=self.config.landing_search_radius).find_map(|r| {
            Rect::centered(near.coord(), r)
                .intersection(&bounds)
                .iter()
                .filter(|v| v.dist8(near.coord()) == r)
                .map(|v| near.with_coord(v))
                .find(|p| p.can_enter(self, &movement))
        })
    }

    /// Extract `id` and land it near `target`, typically on another world.
    /// Returns where it landed, or `None` (leaving it in place) if nothing
    /// near `target` is free.
    pub fn land_creature(&mut self, id: CreatureId, target: Position) -> Option<Position> {
        let from = self.creature(id)?.position();
        let Some(to) = self.find_landing(id, target) else {
            warn!("no landing for {id} near {target}");
            return None;
        };
        self.unplace_creature(id);
        self.place_creature(id, to);
        self.push_event(WorldEvent::CreatureLanded {
            creature: id,
            from,
            to,
        });
        to.run_enter_effects(self, id);
        Some(to)
    }

    /// Move `id` onto `to`, a free tile on another level of its world.
    pub fn change_level(&mut self, id: CreatureId, to: Position) {
        let from = match self.creature(id) {
            Some(c) => c.position(),
            None => panic!("change_level: unknown creature {id}"),
        };
        assert!(
            from.is_same_world(to),
            "change_level: {from} and {to} are in different worlds"
        );
        assert!(
            to.can_enter_creature(self, id),
            "change_level: {id} cannot enter {to}"
        );
        self.unplace_creature(id);
        self.place_creature(id, to);
        self.push_event(WorldEvent::LevelChanged {
            creature: id,
            from,
            to,
        });
        to.run_enter_effects(self, id);
    }

    /// Where `key` leads from the creature's level: a free tile near the
    /// first landing of the first other level of its world that has one.
    fn stairs_destination(&self, id: CreatureId, key: StairKey) -> Option<Position> {
        let from = self.creature(id)?.position();
        let here = from.level()?;
        let (dest, landing) = self
            .levels
            .iter()
            .filter(|(lid, _)| lid.world == here.world && **lid != here)
            .find_map(|(lid, level)| level.landings(key).first().map(|v| (*lid, *v)))?;
        self.find_landing(id, Position::new(landing, dest))
    }

    /// Take the stairs with `key`. Returns the arrival tile.
    pub fn use_stairs(&mut self, id: CreatureId, key: StairKey) -> Option<Position> {
        let from = self.creature(id)?.position();
        let Some(to) = self.stairs_destination(id, key) else {
            warn!("{id} at {from}: stairs {key} lead nowhere");
            return None;
        };
        self.unplace_creature(id);
        self.place_creature(id, to);
        self.push_event(WorldEvent::LevelChanged {
            creature: id,
            from,
            to,
        });
        to.run_enter_effects(self, id);
        Some(to)
    }

    /// Drop `id` through a hole with `key` to the level below.
    pub(crate) fn fall_through(&mut self, id: CreatureId, key: StairKey) -> Option<Position> {
        let from = self.creature(id)?.position();
        let Some(to) = self.stairs_destination(id, key) else {
            warn!("{id} at {from}: hole {key} leads nowhere");
            return None;
        };
        self.push_event(WorldEvent::FellIntoHole {
            creature: id,
            from,
            to,
        });
        self.relocate(id, to);
        Some(to)
    }

    // -----------------------------------------------------------------------
    // Save/load
    // -----------------------------------------------------------------------

    /// Recreate everything `#[serde(skip)]`: the furniture catalog, and the
    /// sectors and dirty flags of every level.
    pub fn rebuild_transient_state(&mut self) {
        self.catalog = FurnitureCatalog::new(self.config.furniture.clone());
        for level in self.levels.values_mut() {
            level.rebuild_transient_state();
        }
    }

    pub fn to_json(&self) -> WorldResult<String> {
        serde_json::to_string(self).map_err(WorldError::Save)
    }

    /// Load a realm saved with `to_json` and rebuild its transient state.
    pub fn from_json(json: &str) -> WorldResult<Self> {
        let mut realm: Realm = serde_json::from_str(json).map_err(WorldError::Save)?;
        realm.rebuild_transient_state();
        Ok(realm)
    }
}

mod levels_as_list {
    use crate::level::Level;
    use crate::types::LevelId;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        levels: &BTreeMap<LevelId, Level>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(levels.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<LevelId, Level>, D::Error> {
        let list = Vec::<Level>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|l| (l.id(), l)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levelgen::{GenContext, LevelBuilder};
    use crate::movement::{MovementTrait, MovementType};
    use crate::terrain::SquareType;
    use crate::types::{Vec2, WorldId};

    const ELVES: TribeId = TribeId(4);

    fn walkers() -> MovementTraits {
        MovementTraits::of(&[MovementTrait::Walk])
    }

    /// Two 8x8 floor levels of world 0 linked by stairs key 1 at (1, 1) and
    /// (6, 6), plus a single-level world 1.
    fn two_worlds() -> Realm {
        let mut realm = Realm::new(3, WorldConfig::default());
        let upper = LevelId::new(WorldId(0), 0);
        let lower = LevelId::new(WorldId(0), 1);
        let other = LevelId::new(WorldId(1), 0);
        let levels = {
            let mut ctx = GenContext::new(3, &realm);
            let mut a = LevelBuilder::new(upper, "upper", 8, 8, SquareType::Floor, &mut ctx);
            a.add_stairs(Vec2::new(1, 1), StairKey(1));
            let a = a.build();
            let mut b = LevelBuilder::new(lower, "lower", 8, 8, SquareType::Floor, &mut ctx);
            b.add_stairs(Vec2::new(6, 6), StairKey(1));
            let b = b.build();
            let c = LevelBuilder::new(other, "other", 8, 8, SquareType::Floor, &mut ctx).build();
            [a, b, c]
        };
        for level in levels {
            realm.add_level(level);
        }
        realm
    }

    #[test]
    fn ids_are_sequential() {
        let mut realm = Realm::new(0, WorldConfig::default());
        let a = realm.add_creature("a", ELVES, walkers());
        let b = realm.add_creature("b", ELVES, walkers());
        assert_eq!((a, b), (CreatureId(1), CreatureId(2)));
        assert_eq!(realm.new_item("rock", ItemClass::Rock).id, ItemId(1));
        assert_eq!(realm.new_trigger(TriggerKind::Trap).id, TriggerId(1));
    }

    #[test]
    fn duplicate_level_ids_get_the_next_index() {
        let mut realm = two_worlds();
        let dup = {
            let mut ctx = GenContext::new(0, &realm);
            LevelBuilder::new(LevelId::new(WorldId(0), 0), "dup", 2, 2, SquareType::Floor, &mut ctx)
                .build()
        };
        let id = realm.add_level(dup);
        assert_eq!(id, LevelId::new(WorldId(0), 2));
        assert_eq!(realm.level(id).map(Level::id), Some(id));
    }

    #[test]
    fn missing_things_are_errors() {
        let realm = two_worlds();
        assert!(matches!(
            realm.level_or_err(LevelId::new(WorldId(5), 0)),
            Err(WorldError::UnknownLevel(_))
        ));
        assert!(matches!(
            realm.creature_or_err(CreatureId(42)),
            Err(WorldError::UnknownCreature(_))
        ));
    }

    #[test]
    fn configured_classes_are_registered_on_add() {
        let realm = two_worlds();
        let level = realm.level(LevelId::new(WorldId(0), 0)).unwrap();
        for mt in &realm.config().movement_classes {
            assert!(level.sectors(mt).is_some());
        }
    }

    #[test]
    fn stairs_lead_to_the_linked_landing() {
        let mut realm = two_worlds();
        let upper = LevelId::new(WorldId(0), 0);
        let id = realm.add_creature("elf", ELVES, walkers());
        Position::new(Vec2::new(1, 1), upper).add_creature(&mut realm, id);
        let to = realm.use_stairs(id, StairKey(1)).unwrap();
        assert_eq!(to, Position::new(Vec2::new(6, 6), LevelId::new(WorldId(0), 1)));
        assert_eq!(realm.creature(id).unwrap().position(), to);
        assert_eq!(Position::new(Vec2::new(1, 1), upper).creature(&realm), None);
    }

    #[test]
    fn landing_skips_occupied_tiles() {
        let mut realm = two_worlds();
        let other = LevelId::new(WorldId(1), 0);
        let target = Position::new(Vec2::new(0, 0), other);
        let squatter = realm.add_creature("squatter", ELVES, walkers());
        target.add_creature(&mut realm, squatter);
        let id = realm.add_creature("elf", ELVES, walkers());
        Position::new(Vec2::new(3, 3), LevelId::new(WorldId(0), 0)).add_creature(&mut realm, id);

        let landed = realm.land_creature(id, target).unwrap();
        assert_eq!(landed, Position::new(Vec2::new(1, 0), other));
        assert!(matches!(
            realm.drain_events().as_slice(),
            [WorldEvent::CreatureLanded { .. }]
        ));
    }

    #[test]
    fn kill_removes_from_tile_and_registry() {
        let mut realm = two_worlds();
        let pos = Position::new(Vec2::new(2, 2), LevelId::new(WorldId(0), 0));
        let id = realm.add_creature("elf", ELVES, walkers());
        pos.add_creature(&mut realm, id);
        assert!(realm.kill_creature(id).is_some());
        assert_eq!(pos.creature(&realm), None);
        assert!(realm.creature(id).is_none());
        assert!(realm.kill_creature(id).is_none());
    }

    #[test]
    fn save_round_trip_rebuilds_connectivity() {
        let mut realm = two_worlds();
        let level = LevelId::new(WorldId(0), 0);
        let id = realm.add_creature("elf", ELVES, walkers());
        Position::new(Vec2::new(4, 4), level).add_creature(&mut realm, id);
        let json = realm.to_json().unwrap();
        let restored = Realm::from_json(&json).unwrap();

        let walk = MovementType::single(TribeId::NEUTRAL, MovementTrait::Walk);
        let l = restored.level(level).unwrap();
        assert!(l.sectors(&walk).unwrap().same(Vec2::new(0, 0), Vec2::new(7, 7)));
        assert_eq!(
            Position::new(Vec2::new(4, 4), level).creature(&restored),
            Some(id)
        );
        assert!(restored.catalog().def(crate::furniture::FurnitureType::Door).is_some());
    }

    #[test]
    fn corrupt_save_is_an_error() {
        assert!(matches!(
            Realm::from_json("{\"levels\": 3}"),
            Err(WorldError::Save(_))
        ));
    }
}
