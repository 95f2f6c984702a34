// Level generation helpers.
//
// Map generators build a `Level` through `LevelBuilder`, which places terrain
// and furniture in bulk before the level is handed to `Realm::add_level`.
// Every placement goes through the same `Level` entry points the running
// game uses (`replace_square`, `set_furniture`, `invalidate`), so a built
// level is indistinguishable from one edited tile by tile. No movement class
// is registered while building, which keeps the connectivity side of
// `invalidate` free; `Realm::add_level` builds the sectors once at the end.
//
// Randomness and furniture defs come from a `GenContext` created per
// generation run, never from globals.
//
// See also: `terrain.rs` for `SquareType::make` and `SquareMix`,
// `realm.rs` for `add_level`.
//
// **Critical constraint: determinism.** The same seed and the same builder
// calls produce the same level.

use crate::config::WorldConfig;
use crate::furniture::{FurnitureCatalog, FurnitureType};
use crate::grid::Grid;
use crate::level::{Invalidation, Level};
use crate::realm::Realm;
use crate::terrain::{SquareMix, SquareType};
use crate::types::{LevelId, Rect, StairKey, TribeId, Vec2};
use delve_prng::GameRng;
use log::{debug, warn};

/// Everything a generator draws on.
pub struct GenContext<'a> {
    pub rng: GameRng,
    pub config: &'a WorldConfig,
    pub catalog: &'a FurnitureCatalog,
}

impl<'a> GenContext<'a> {
    /// A context over the realm's config and catalog with its own PRNG.
    pub fn new(seed: u64, realm: &'a Realm) -> Self {
        Self::from_parts(seed, realm.config(), realm.catalog())
    }

    pub fn from_parts(seed: u64, config: &'a WorldConfig, catalog: &'a FurnitureCatalog) -> Self {
        Self {
            rng: GameRng::new(seed),
            config,
            catalog,
        }
    }
}

pub struct LevelBuilder<'c, 'a> {
    level: Level,
    ctx: &'c mut GenContext<'a>,
}

impl<'c, 'a> LevelBuilder<'c, 'a> {
    /// A `width` x `height` level filled with `fill`.
    pub fn new(
        id: LevelId,
        name: &str,
        width: u32,
        height: u32,
        fill: SquareType,
        ctx: &'c mut GenContext<'a>,
    ) -> Self {
        let squares = Grid::from_fn(width, height, |_| fill.make(&mut ctx.rng, ctx.config));
        Self {
            level: Level::new(id, name, squares),
            ctx,
        }
    }

    pub fn rng(&mut self) -> &mut GameRng {
        &mut self.ctx.rng
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn put_square(&mut self, v: Vec2, square_type: SquareType) {
        let square = square_type.make(&mut self.ctx.rng, self.ctx.config);
        if self.level.replace_square(v, square, false).is_none() {
            warn!("{}: {square_type:?} outside the map at {v}", self.level.id());
        }
    }

    pub fn fill_rect(&mut self, rect: Rect, square_type: SquareType) {
        for v in rect.intersection(&self.level.bounds()).iter() {
            self.put_square(v, square_type);
        }
    }

    /// Fill `rect` with draws from `mix`. Tiles are left alone once the mix
    /// runs dry.
    pub fn put_mix(&mut self, rect: Rect, mix: &mut SquareMix) {
        for v in rect.intersection(&self.level.bounds()).iter() {
            match mix.choose(&mut self.ctx.rng) {
                Some(t) => self.put_square(v, t),
                None => return,
            }
        }
    }

    /// Install furniture of `kind`. Returns `false` if the catalog has no
    /// def for it or `v` is off the map.
    pub fn put_furniture(&mut self, v: Vec2, kind: FurnitureType, tribe: TribeId) -> bool {
        if !self.level.in_bounds(v) {
            return false;
        }
        let Some(furniture) = self.ctx.catalog.make(kind, tribe) else {
            warn!("no furniture def for {kind:?}");
            return false;
        };
        self.level.set_furniture(v, Some(furniture));
        true
    }

    /// A staircase with `key`: stairs furniture plus a landing.
    pub fn add_stairs(&mut self, v: Vec2, key: StairKey) {
        self.put_furniture(v, FurnitureType::Stairs, TribeId::NEUTRAL);
        self.level.add_landing(key, v);
    }

    /// A bare landing for `key`, where creatures falling through a hole with
    /// that key arrive.
    pub fn add_landing(&mut self, v: Vec2, key: StairKey) {
        self.level.add_landing(key, v);
    }

    /// A hole leading down to the landings of `key`.
    pub fn add_hole(&mut self, v: Vec2, key: StairKey) {
        self.put_square(v, SquareType::Hole(key));
    }

    pub fn set_sunlight(&mut self, sunlight: bool) {
        self.level.set_sunlight(sunlight);
    }

    pub fn set_no_diagonal_passing(&mut self, value: bool) {
        self.level.set_no_diagonal_passing(value);
    }

    /// Roof a tile (or open it to the sky).
    pub fn set_covered(&mut self, v: Vec2, covered: bool) {
        if let Some(sq) = self.level.square_mut(v) {
            sq.movement_mut().set_covered(covered);
            self.level.invalidate(v, Invalidation::VIEW);
        }
    }

    pub fn forbid_tribe(&mut self, v: Vec2, tribe: TribeId) {
        let changed = self
            .level
            .square_mut(v)
            .is_some_and(|sq| sq.movement_mut().forbid_tribe(tribe));
        if changed {
            self.level.invalidate(v, Invalidation::ALL);
        }
    }

    pub fn set_unavailable(&mut self, v: Vec2) {
        self.level.set_unavailable(v, true);
    }

    pub fn build(self) -> Level {
        debug!(
            "generated {} \"{}\" ({}x{})",
            self.level.id(),
            self.level.name(),
            self.level.width(),
            self.level.height()
        );
        self.level
    }
}
