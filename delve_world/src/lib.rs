// delve_world — tile-grid world state for a dungeon-management game.
//
// This crate holds the spatial truth of the game: levels made of squares,
// the furniture standing on them, the creatures, items and triggers on each
// tile, and the rules that decide who may enter what. It answers "can this
// creature go there?" and "are these two tiles connected for this kind of
// mover?" in constant time, and keeps those answers exact as the world is
// edited. It has no rendering, AI or UI dependencies.
//
// Module overview:
// - `types.rs`:     Vec2, Rect, entity ids, LevelId, VisionId.
// - `grid.rs`:      Dense 2D grid indexed by `Vec2`.
// - `movement.rs`:  MovementType / MovementSet, the traversal rule engine.
// - `view.rs`:      ViewObject / ViewIndex render snapshots.
// - `item.rs`:      Items and per-tile inventories.
// - `trigger.rs`:   Traps, alarms and portals attached to tiles.
// - `square.rs`:    Square (terrain) and its per-tile contents.
// - `terrain.rs`:   SquareType, the terrain factory, SquareMix.
// - `furniture.rs`: Furniture, its defs, fire state and the catalog.
// - `sectors.rs`:   Incremental connected-component index per movement class.
// - `level.rs`:     Level tables, invalidation and traversal evaluation.
// - `creature.rs`:  The slice of creature state the world needs.
// - `event.rs`:     WorldEvent log entries.
// - `config.rs`:    WorldConfig, all tunables.
// - `error.rs`:     WorldError.
// - `position.rs`:  Position, the public façade for every tile operation.
// - `realm.rs`:     Realm, owner of levels, creatures, events and the PRNG.
// - `levelgen.rs`:  GenContext and LevelBuilder for map generators.
// - `prng`:         Re-exported from `delve_prng`.
//
// **Critical constraint: determinism.** The same seed and the same sequence
// of calls produce the same world. All randomness comes from the realm's
// `GameRng`; ordered state lives in `BTreeMap`s.

pub mod config;
pub mod creature;
pub mod error;
pub mod event;
pub mod furniture;
pub mod grid;
pub mod item;
pub mod level;
pub mod levelgen;
pub mod movement;
pub mod position;
pub use delve_prng as prng;
pub mod realm;
pub mod sectors;
pub mod square;
pub mod terrain;
pub mod trigger;
pub mod types;
pub mod view;
