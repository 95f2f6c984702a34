// End-to-end scenarios over the public API: build levels with
// `LevelBuilder`, add them to a `Realm`, and drive everything through
// `Position`. The connectivity invariant (a tile is in a class's sectors iff
// that class can navigate it) is re-checked after every mutation.

use delve_world::config::WorldConfig;
use delve_world::event::{DestroyCause, WorldEvent};
use delve_world::furniture::{FurnitureType, UsageType};
use delve_world::item::ItemClass;
use delve_world::level::Level;
use delve_world::levelgen::{GenContext, LevelBuilder};
use delve_world::movement::{DestroyAction, MovementTrait, MovementTraits, MovementType};
use delve_world::position::Position;
use delve_world::prng::GameRng;
use delve_world::realm::Realm;
use delve_world::square::OreKind;
use delve_world::terrain::SquareType;
use delve_world::types::{CreatureId, LevelId, Rect, StairKey, TribeId, Vec2, WorldId};

const GOBLINS: TribeId = TribeId(1);
const DWARVES: TribeId = TribeId(2);
const MAIN: LevelId = LevelId::new(WorldId(0), 0);
const BELOW: LevelId = LevelId::new(WorldId(0), 1);
const ELSEWHERE: LevelId = LevelId::new(WorldId(1), 0);

fn walk(tribe: TribeId) -> MovementType {
    MovementType::single(tribe, MovementTrait::Walk)
}

fn fly(tribe: TribeId) -> MovementType {
    MovementType::single(tribe, MovementTrait::Fly)
}

fn swim(tribe: TribeId) -> MovementType {
    MovementType::single(tribe, MovementTrait::Swim)
}

/// A realm holding the single level built by `shape`.
fn realm_with(
    w: u32,
    h: u32,
    fill: SquareType,
    shape: impl FnOnce(&mut LevelBuilder<'_, '_>),
) -> Realm {
    let mut realm = Realm::new(42, WorldConfig::default());
    let level = build_level(&realm, MAIN, w, h, fill, shape);
    realm.add_level(level);
    realm
}

fn build_level(
    realm: &Realm,
    id: LevelId,
    w: u32,
    h: u32,
    fill: SquareType,
    shape: impl FnOnce(&mut LevelBuilder<'_, '_>),
) -> Level {
    let mut ctx = GenContext::new(u64::from(id.index) + 100, realm);
    let mut builder = LevelBuilder::new(id, "scenario", w, h, fill, &mut ctx);
    shape(&mut builder);
    builder.build()
}

fn at(x: i32, y: i32) -> Position {
    Position::new(Vec2::new(x, y), MAIN)
}

fn spawn(realm: &mut Realm, pos: Position, tribe: TribeId, traits: &[MovementTrait]) -> CreatureId {
    let id = realm.add_creature("critter", tribe, MovementTraits::of(traits));
    pos.add_creature(realm, id);
    id
}

/// Every tile of every level, every registered class.
fn assert_connectivity_exact(realm: &Realm) {
    for level in realm.levels() {
        for mt in level.classes() {
            let sectors = level
                .sectors(mt)
                .unwrap_or_else(|| panic!("{}: class {mt:?} has no sectors", level.id()));
            for v in level.bounds().iter() {
                assert_eq!(
                    sectors.contains(v),
                    level.can_navigate(v, mt),
                    "{} {v} for {mt:?}",
                    level.id()
                );
            }
        }
    }
}

#[test]
fn random_edits_keep_connectivity_exact() {
    let mut realm = realm_with(14, 14, SquareType::Floor, |b| {
        b.fill_rect(Rect::new(Vec2::new(6, 0), Vec2::new(7, 14)), SquareType::BlackWall);
        b.fill_rect(Rect::new(Vec2::new(0, 10), Vec2::new(5, 12)), SquareType::Water);
    });
    // Lazily registered classes are maintained too.
    let digger = walk(GOBLINS).with_destroy(DestroyAction::Dig);
    let basher = walk(GOBLINS).with_destroy(DestroyAction::Bash);
    for mt in [digger, basher, fly(DWARVES)] {
        at(0, 0).is_connected_to(&mut realm, at(13, 13), &mt);
    }
    assert_connectivity_exact(&realm);

    let mut rng = GameRng::new(2024);
    for step in 0..400 {
        let pos = at(rng.range_inclusive(0, 13), rng.range_inclusive(0, 13));
        match rng.below(9) {
            0 if pos.can_construct(&realm, FurnitureType::BuiltWall) => {
                let wall = realm.catalog().make(FurnitureType::BuiltWall, GOBLINS).unwrap();
                if pos.furniture(&realm).is_some() {
                    pos.destroy(&mut realm);
                }
                pos.add_furniture(&mut realm, wall);
            }
            1 => {
                pos.destroy(&mut realm);
            }
            2 if pos.furniture(&realm).is_none() && pos.can_construct(&realm, FurnitureType::Door) => {
                let door = realm.catalog().make(FurnitureType::Door, DWARVES).unwrap();
                pos.add_furniture(&mut realm, door);
                pos.forbid_furniture_for_tribe(&mut realm, GOBLINS);
            }
            3 if pos.furniture(&realm).is_none() && pos.can_construct(&realm, FurnitureType::Bed) => {
                let bed = realm.catalog().make(FurnitureType::Bed, DWARVES).unwrap();
                pos.add_furniture(&mut realm, bed);
                pos.fire_damage(&mut realm, 4.0);
            }
            4 => {
                pos.extinguish_fire(&mut realm);
            }
            5 => {
                let unavailable = pos.is_unavailable(&realm);
                pos.set_unavailable(&mut realm, !unavailable);
            }
            6 => pos.forbid_movement_for_tribe(&mut realm, GOBLINS),
            7 if pos.can_construct_square(&realm, SquareType::Floor) => {
                while !pos.construct_square(&mut realm, SquareType::Floor) {}
            }
            8 => {
                pos.tick_fire(&mut realm);
            }
            _ => {}
        }
        for mt in [digger, basher] {
            // Exercise the query path between mutations as well.
            pos.is_chokepoint(&mut realm, &mt);
        }
        if step % 10 == 0 {
            assert_connectivity_exact(&realm);
        }
    }
    assert_connectivity_exact(&realm);
}

#[test]
fn build_then_destroy_restores_traversal() {
    let mut realm = realm_with(8, 8, SquareType::Floor, |_| {});
    let pos = at(4, 4);
    let before: Vec<bool> = [walk(TribeId::NEUTRAL), fly(TribeId::NEUTRAL)]
        .iter()
        .map(|mt| pos.can_navigate(&realm, mt))
        .collect();
    while !pos.construct(&mut realm, FurnitureType::Barricade, GOBLINS) {}
    assert!(!pos.can_enter(&realm, &walk(TribeId::NEUTRAL)));
    assert!(pos.destroy(&mut realm).is_some());
    let after: Vec<bool> = [walk(TribeId::NEUTRAL), fly(TribeId::NEUTRAL)]
        .iter()
        .map(|mt| pos.can_navigate(&realm, mt))
        .collect();
    assert_eq!(before, after);
    assert_connectivity_exact(&realm);
    let events = realm.drain_events();
    assert!(matches!(
        events.as_slice(),
        [
            WorldEvent::FurnitureBuilt { kind: FurnitureType::Barricade, .. },
            WorldEvent::FurnitureDestroyed {
                cause: DestroyCause::Destroyed,
                ..
            }
        ]
    ));
}

#[test]
fn construction_takes_exactly_its_duration() {
    let mut realm = realm_with(8, 8, SquareType::Floor, |_| {});
    let pos = at(2, 2);
    // Torch takes 3, Barricade takes 5.
    assert!(!pos.construct(&mut realm, FurnitureType::Torch, GOBLINS));
    assert!(!pos.construct(&mut realm, FurnitureType::Torch, GOBLINS));
    assert!(!pos.construct(&mut realm, FurnitureType::Barricade, GOBLINS));
    let remaining = pos.construction(&realm).map(|c| c.remaining);
    assert_eq!(remaining, Some(4));
    for _ in 0..3 {
        assert!(!pos.construct(&mut realm, FurnitureType::Barricade, GOBLINS));
    }
    assert!(pos.construct(&mut realm, FurnitureType::Barricade, GOBLINS));
    assert_eq!(
        pos.furniture(&realm).map(|f| f.tribe()),
        Some(GOBLINS)
    );
}

#[test]
fn occupied_tile_is_never_enterable() {
    let mut realm = realm_with(4, 4, SquareType::Floor, |_| {});
    let pos = at(1, 1);
    spawn(&mut realm, pos, GOBLINS, &[MovementTrait::Walk]);
    for mt in [
        walk(GOBLINS),
        walk(GOBLINS).forced(),
        fly(DWARVES),
        walk(GOBLINS).with_destroy(DestroyAction::Bash),
    ] {
        assert!(!pos.can_enter(&realm, &mt), "{mt:?}");
    }
}

#[test]
fn wall_then_mine_restores_connectivity() {
    let mut realm = realm_with(11, 11, SquareType::Floor, |b| {
        // A wall line through row 5 with a single gap at (5, 5).
        b.fill_rect(Rect::new(Vec2::new(0, 5), Vec2::new(11, 6)), SquareType::BlackWall);
        b.put_square(Vec2::new(5, 5), SquareType::Floor);
    });
    let walker = walk(TribeId::NEUTRAL);
    let (north, south, gap) = (at(5, 0), at(5, 10), at(5, 5));
    assert!(north.is_connected_to(&mut realm, south, &walker));

    while !gap.construct(&mut realm, FurnitureType::BuiltWall, DWARVES) {}
    assert!(!gap.can_enter(&realm, &walker));
    assert!(!north.is_connected_to(&mut realm, gap, &walker));
    assert!(!north.is_connected_to(&mut realm, south, &walker));
    assert_connectivity_exact(&realm);

    let miner = spawn(&mut realm, at(5, 4), GOBLINS, &[MovementTrait::Walk]);
    realm.creature_mut(miner).unwrap().set_damage(25);
    let mut hits = 0;
    while !gap.try_to_destroy_by(&mut realm, miner, DestroyAction::Dig) {
        hits += 1;
    }
    assert_eq!(hits, 3);
    assert!(gap.can_enter(&realm, &walker));
    assert!(north.is_connected_to(&mut realm, south, &walker));
    assert_connectivity_exact(&realm);
}

#[test]
fn mining_rock_opens_it_and_keeps_sectors_exact() {
    let mut realm = realm_with(5, 3, SquareType::Floor, |b| {
        b.fill_rect(Rect::new(Vec2::new(2, 0), Vec2::new(3, 3)), SquareType::BlackWall);
    });
    let walker = walk(TribeId::NEUTRAL);
    let rock = at(2, 1);
    assert!(!at(0, 1).is_connected_to(&mut realm, at(4, 1), &walker));
    let mut calls = 1;
    while !rock.construct_square(&mut realm, SquareType::Floor) {
        assert!(rock.is_active_construction(&realm));
        calls += 1;
    }
    assert_eq!(calls, realm.config().square_construction_ticks);
    assert!(at(0, 1).is_connected_to(&mut realm, at(4, 1), &walker));
    assert!(rock.view_index(&realm).has_object(delve_world::view::ViewLayer::FloorBackground));
    assert_connectivity_exact(&realm);
}

#[test]
fn mining_ore_drops_its_yield() {
    let mut realm = realm_with(3, 3, SquareType::Floor, |b| {
        b.put_square(Vec2::new(1, 1), SquareType::GoldOre);
    });
    let vein = at(1, 1);
    while !vein.construct_square(&mut realm, SquareType::Floor) {}
    let (lo, hi) = realm.config().ore_drop_range;
    let gold = vein.items(&realm).len() as i32;
    assert!((lo..=hi).contains(&gold), "{gold} gold");
    assert!(vein.items(&realm).iter().all(|i| i.class == ItemClass::Gold));
    let events = realm.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        WorldEvent::OreMined { ore: OreKind::Gold, count, .. } if *count as i32 == gold
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        WorldEvent::SquareConstructed {
            from: SquareType::GoldOre,
            to: SquareType::Floor,
            ..
        }
    )));
}

#[test]
fn locked_door_bars_a_tribe() {
    let mut realm = realm_with(5, 5, SquareType::Floor, |b| {
        b.put_furniture(Vec2::new(2, 2), FurnitureType::Door, DWARVES);
    });
    let door = at(2, 2);
    door.forbid_furniture_for_tribe(&mut realm, GOBLINS);

    assert!(!door.can_enter(&realm, &walk(GOBLINS)));
    assert!(door.can_enter(&realm, &walk(DWARVES)));
    // Forcing through takes a mover that can break doors.
    assert!(!door.can_enter(&realm, &walk(GOBLINS).forced()));
    let basher = walk(GOBLINS).with_destroy(DestroyAction::Bash);
    assert!(door.can_enter(&realm, &basher.forced()));
    assert!(door.can_navigate(&realm, &basher));
    let digger = walk(GOBLINS).with_destroy(DestroyAction::Dig);
    assert!(!door.can_enter(&realm, &digger.forced()));
    assert!(!door.can_navigate(&realm, &digger));
    assert_connectivity_exact(&realm);
}

#[test]
fn burning_drops_walkers_but_not_flyers() {
    let mut realm = realm_with(5, 5, SquareType::Floor, |b| {
        b.put_furniture(Vec2::new(2, 2), FurnitureType::Workshop, DWARVES);
    });
    let pos = at(2, 2);
    let walker = walk(TribeId::NEUTRAL);
    let flyer = fly(TribeId::NEUTRAL);
    pos.fire_damage(&mut realm, 10.0);
    assert!(!pos.can_navigate(&realm, &walker));
    assert!(pos.can_navigate(&realm, &flyer));
    assert!(pos.view_index(&realm).has_highlight(delve_world::view::HighlightType::Burning));
    assert_connectivity_exact(&realm);

    pos.extinguish_fire(&mut realm);
    assert!(pos.can_navigate(&realm, &walker));
    assert_connectivity_exact(&realm);
}

#[test]
fn burning_bridge_drops_walkers() {
    let mut realm = realm_with(5, 1, SquareType::Floor, |b| {
        b.put_square(Vec2::new(2, 0), SquareType::Water);
        b.put_furniture(Vec2::new(2, 0), FurnitureType::Bridge, DWARVES);
    });
    let walker = walk(TribeId::NEUTRAL);
    let flyer = fly(TribeId::NEUTRAL);
    let swimmer = swim(TribeId::NEUTRAL);
    let (west, east, ford) = (at(0, 0), at(4, 0), at(2, 0));
    assert!(west.is_connected_to(&mut realm, east, &walker));

    ford.fire_damage(&mut realm, 10.0);
    assert!(ford.is_burning(&realm));
    assert!(!ford.can_enter(&realm, &walker));
    assert!(!ford.can_navigate(&realm, &walker));
    assert!(ford.can_navigate(&realm, &flyer));
    assert!(ford.can_navigate(&realm, &swimmer));
    assert!(!west.is_connected_to(&mut realm, east, &walker));
    assert!(west.is_connected_to(&mut realm, east, &flyer));
    assert_connectivity_exact(&realm);

    assert!(ford.extinguish_fire(&mut realm));
    assert!(ford.can_enter(&realm, &walker));
    assert!(west.is_connected_to(&mut realm, east, &walker));
    assert_connectivity_exact(&realm);
}

#[test]
fn removing_a_bridge_splits_the_corridor() {
    let mut realm = realm_with(7, 3, SquareType::BlackWall, |b| {
        b.fill_rect(Rect::new(Vec2::new(0, 1), Vec2::new(7, 2)), SquareType::Floor);
        b.put_square(Vec2::new(3, 1), SquareType::Water);
    });
    let walker = walk(TribeId::NEUTRAL);
    let swimmer = swim(TribeId::NEUTRAL);
    let (west, east, ford) = (at(0, 1), at(6, 1), at(3, 1));
    assert!(!west.is_connected_to(&mut realm, east, &walker));

    assert!(ford.can_construct(&realm, FurnitureType::Bridge));
    while !ford.construct(&mut realm, FurnitureType::Bridge, DWARVES) {}
    assert!(west.is_connected_to(&mut realm, east, &walker));
    assert!(ford.is_chokepoint(&mut realm, &walker));
    assert!(!west.is_chokepoint(&mut realm, &walker));

    let bridge = ford.destroy(&mut realm);
    assert_eq!(bridge.map(|f| f.kind()), Some(FurnitureType::Bridge));
    assert!(!west.is_connected_to(&mut realm, east, &walker));
    assert!(!ford.is_connected_to(&mut realm, west, &swimmer));
    assert_connectivity_exact(&realm);
}

#[test]
fn items_fall_into_liquids_unless_bridged() {
    let mut realm = realm_with(4, 1, SquareType::Floor, |b| {
        b.put_square(Vec2::new(1, 0), SquareType::Magma);
        b.put_square(Vec2::new(2, 0), SquareType::Water);
        b.put_square(Vec2::new(3, 0), SquareType::Water);
        b.put_furniture(Vec2::new(3, 0), FurnitureType::Bridge, DWARVES);
    });
    for x in 1..4 {
        let rocks = vec![
            realm.new_item("rock", ItemClass::Rock),
            realm.new_item("rock", ItemClass::Rock),
        ];
        at(x, 0).drop_items(&mut realm, rocks);
    }
    assert!(at(1, 0).items(&realm).is_empty());
    assert!(at(2, 0).items(&realm).is_empty());
    assert_eq!(at(3, 0).items(&realm).len(), 2);
    let stacks = vec![("rock".to_string(), 2)];
    assert_eq!(
        realm.drain_events(),
        vec![
            WorldEvent::ItemsBurned {
                position: at(1, 0),
                stacks: stacks.clone()
            },
            WorldEvent::ItemsSank {
                position: at(2, 0),
                stacks
            },
        ]
    );
}

#[test]
fn magma_burns_walkers_and_spares_flyers() {
    let mut realm = realm_with(3, 1, SquareType::Floor, |b| {
        b.put_square(Vec2::new(1, 0), SquareType::Magma);
    });
    let bat = spawn(&mut realm, at(1, 0), GOBLINS, &[MovementTrait::Fly]);
    assert_eq!(at(1, 0).creature(&realm), Some(bat));
    at(1, 0).remove_creature(&mut realm);

    let goblin = spawn(&mut realm, at(0, 0), GOBLINS, &[MovementTrait::Walk]);
    assert!(!at(0, 0).can_move_creature(&realm, Vec2::new(1, 0)));
    at(1, 0).put_creature(&mut realm, goblin);
    assert!(realm.creature(goblin).is_none());
    assert_eq!(at(1, 0).creature(&realm), None);
    assert!(matches!(
        realm.drain_events().as_slice(),
        [WorldEvent::CreatureBurned { .. }]
    ));
}

#[test]
fn flooding_drowns_walkers() {
    let mut realm = realm_with(3, 3, SquareType::Floor, |_| {});
    let pos = at(1, 1);
    let goblin = spawn(&mut realm, pos, GOBLINS, &[MovementTrait::Walk]);
    let fish = spawn(&mut realm, at(0, 0), GOBLINS, &[MovementTrait::Swim]);
    pos.flood(&mut realm, 3.0);
    assert!(realm.creature(goblin).is_none());
    at(0, 0).flood(&mut realm, 3.0);
    assert!(realm.creature(fish).is_some());
    assert!(pos.view_index(&realm).has_object(delve_world::view::ViewLayer::FloorBackground));
    assert!(matches!(
        realm.drain_events().as_slice(),
        [WorldEvent::CreatureDrowned { .. }]
    ));
    assert_connectivity_exact(&realm);

    // Shallow water is waded.
    let wader = spawn(&mut realm, at(2, 2), DWARVES, &[MovementTrait::Wade]);
    at(2, 2).flood(&mut realm, 1.0);
    assert!(realm.creature(wader).is_some());
}

/// MAIN with a hole at (3, 1) over BELOW's landing at (2, 2).
fn realm_with_hole() -> Realm {
    let mut realm = realm_with(6, 3, SquareType::Floor, |b| {
        b.add_hole(Vec2::new(3, 1), StairKey(9));
    });
    let below = build_level(&realm, BELOW, 5, 5, SquareType::Floor, |b| {
        b.add_landing(Vec2::new(2, 2), StairKey(9));
    });
    realm.add_level(below);
    realm
}

#[test]
fn pushed_creatures_fall_through_holes() {
    let mut realm = realm_with_hole();
    let hole = at(3, 1);
    assert!(!hole.can_enter(&realm, &walk(GOBLINS)));
    assert!(hole.can_enter(&realm, &walk(GOBLINS).forced()));
    let goblin = spawn(&mut realm, at(2, 1), GOBLINS, &[MovementTrait::Walk]);
    hole.put_creature(&mut realm, goblin);

    let landed = Position::new(Vec2::new(2, 2), BELOW);
    assert_eq!(realm.creature(goblin).unwrap().position(), landed);
    assert_eq!(landed.creature(&realm), Some(goblin));
    assert_eq!(at(2, 1).creature(&realm), None);
    assert_eq!(hole.creature(&realm), None);
    assert!(matches!(
        realm.drain_events().as_slice(),
        [WorldEvent::FellIntoHole { from, to, .. }] if *from == hole && *to == landed
    ));
}

#[test]
fn boulders_fill_holes() {
    let mut realm = realm_with_hole();
    let boulder = spawn(&mut realm, at(2, 1), TribeId::NEUTRAL, &[MovementTrait::Walk]);
    realm.creature_mut(boulder).unwrap().set_boulder(true);
    assert!(at(2, 1).can_move_creature(&realm, Vec2::new(1, 0)));
    at(2, 1).move_creature(&mut realm, Vec2::new(1, 0));

    assert!(realm.creature(boulder).is_none());
    let hole = at(3, 1);
    assert_eq!(hole.square(&realm).map(|s| s.square_type()), Some(SquareType::Floor));
    assert!(hole.can_enter(&realm, &walk(GOBLINS)));
    assert!(matches!(
        realm.drain_events().as_slice(),
        [WorldEvent::HoleFilled { .. }]
    ));
    assert_connectivity_exact(&realm);
}

#[test]
fn stairs_change_level_and_other_worlds_land() {
    let mut realm = realm_with(6, 6, SquareType::Floor, |b| {
        b.add_stairs(Vec2::new(1, 1), StairKey(3));
    });
    let below = build_level(&realm, BELOW, 6, 6, SquareType::Floor, |b| {
        b.add_stairs(Vec2::new(4, 4), StairKey(3));
    });
    realm.add_level(below);
    let elsewhere = build_level(&realm, ELSEWHERE, 4, 4, SquareType::Floor, |_| {});
    realm.add_level(elsewhere);

    let stairs = at(1, 1);
    let dest = Position::new(Vec2::new(4, 4), BELOW);
    assert_eq!(stairs.usage_type(&realm), Some(UsageType::Stairs));
    assert_eq!(at(5, 5).stairs_to(&realm, dest), Some(stairs));

    let elf = spawn(&mut realm, stairs, DWARVES, &[MovementTrait::Walk]);
    assert_eq!(stairs.apply(&mut realm, elf), Some(UsageType::Stairs));
    assert_eq!(realm.creature(elf).unwrap().position(), dest);
    assert_eq!(stairs.creature(&realm), None);

    // Same world, explicit target.
    let back = at(3, 3);
    dest.move_creature_to(&mut realm, back);
    assert_eq!(back.creature(&realm), Some(elf));

    // Another world: landing next to an occupied target.
    let target = Position::new(Vec2::new(0, 0), ELSEWHERE);
    spawn(&mut realm, target, GOBLINS, &[MovementTrait::Walk]);
    back.move_creature_to(&mut realm, target);
    let landed = realm.creature(elf).unwrap().position();
    assert_eq!(landed, Position::new(Vec2::new(1, 0), ELSEWHERE));
    assert_eq!(back.creature(&realm), None);

    let kinds: Vec<&str> = realm
        .drain_events()
        .iter()
        .map(|e| match e {
            WorldEvent::FurnitureUsed { .. } => "used",
            WorldEvent::LevelChanged { .. } => "level",
            WorldEvent::CreatureLanded { .. } => "landed",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["used", "level", "level", "landed"]);
    assert_connectivity_exact(&realm);
}

/// A realm whose main level is open floor and whose other world is solid.
fn realm_with_walled_world() -> Realm {
    let mut realm = realm_with(3, 3, SquareType::Floor, |_| {});
    let walled = build_level(&realm, ELSEWHERE, 3, 3, SquareType::BlackWall, |_| {});
    realm.add_level(walled);
    realm
}

#[test]
fn blocked_world_cannot_be_moved_to() {
    let mut realm = realm_with_walled_world();
    let here = at(1, 1);
    spawn(&mut realm, here, DWARVES, &[MovementTrait::Walk]);
    let target = Position::new(Vec2::new(1, 1), ELSEWHERE);
    assert!(!here.can_move_creature_to(&realm, target));
    assert!(!here.can_move_creature_to(&realm, Position::new(Vec2::new(1, 1), BELOW)));
}

#[test]
#[should_panic(expected = "nowhere for")]
fn moving_into_a_blocked_world_panics() {
    let mut realm = realm_with_walled_world();
    let here = at(1, 1);
    spawn(&mut realm, here, DWARVES, &[MovementTrait::Walk]);
    here.move_creature_to(&mut realm, Position::new(Vec2::new(1, 1), ELSEWHERE));
}

#[test]
fn save_and_load_rebuild_transient_state() {
    let mut realm = realm_with(9, 9, SquareType::Floor, |b| {
        b.fill_rect(Rect::new(Vec2::new(4, 0), Vec2::new(5, 9)), SquareType::BlackWall);
        b.put_furniture(Vec2::new(2, 2), FurnitureType::Door, DWARVES);
    });
    at(2, 2).forbid_furniture_for_tribe(&mut realm, GOBLINS);
    at(7, 7).add_poison_gas(&mut realm, 1.0);
    let elf = spawn(&mut realm, at(1, 1), DWARVES, &[MovementTrait::Walk]);

    let json = realm.to_json().unwrap();
    let mut loaded = Realm::from_json(&json).unwrap();
    assert_connectivity_exact(&loaded);
    assert_eq!(at(1, 1).creature(&loaded), Some(elf));
    assert_eq!(at(7, 7).poison_gas(&loaded), 1.0);
    assert!(!at(2, 2).can_enter(&loaded, &walk(GOBLINS)));
    assert!(at(0, 0).needs_render_update(&loaded));
    assert!(!at(0, 0).is_connected_to(&mut loaded, at(8, 8), &walk(TribeId::NEUTRAL)));
    assert!(loaded.catalog().def(FurnitureType::Bridge).is_some());

    // Binary saves go through the same rebuild.
    let bytes = bincode::serialize(&realm).unwrap();
    let mut from_bytes: Realm = bincode::deserialize(&bytes).unwrap();
    from_bytes.rebuild_transient_state();
    assert_connectivity_exact(&from_bytes);
    assert_eq!(from_bytes.to_json().unwrap(), realm.to_json().unwrap());
}

#[test]
fn config_loads_partial_json() {
    let config = WorldConfig::from_json(r#"{"construction_ticks": 2}"#).unwrap();
    assert_eq!(config.construction_ticks, 2);
    let mut realm = Realm::new(1, config);
    let level = build_level(&realm, MAIN, 3, 3, SquareType::Floor, |_| {});
    realm.add_level(level);
    let pos = at(1, 1);
    assert!(!pos.construct(&mut realm, FurnitureType::Door, GOBLINS));
    assert!(pos.construct(&mut realm, FurnitureType::Door, GOBLINS));
}
