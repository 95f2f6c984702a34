// Movement requests and traversal policies.
//
// Two sides of every traversal decision live here:
// - `MovementType` is the *request*: which traits the mover has (walk, fly,
//   swim, wade), whether the move is forced, the mover's tribe, and which
//   destroy actions it can perform on obstacles.
// - `MovementSet` is the *policy* attached to a square or a furniture:
//   which traits are normally permitted, which only when forced, whether the
//   tile is burning, whether it is covered (roofed), and which tribes are
//   forbidden from entering.
//
// Rule, for one policy:
//   permitted = traits ∪ (forcible if forced) − {walk, wade if on fire}
//   enterable = request ∩ permitted ≠ ∅ and (forced or tribe not forbidden)
//
// The layering of square and furniture policies (overrides, destruction) is
// done by `Level` in `level.rs`, which is the only place traversal is
// evaluated for a tile.
//
// `MovementType` is also the key of the connectivity index: each distinct
// request a level is asked about gets its own `Sectors` (see `sectors.rs`),
// so it derives `Ord`.

use crate::types::TribeId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Generates a small copyable bit set over a fieldless enum.
macro_rules! flag_set {
    ($(#[$meta:meta])* $set:ident of $flag:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
            Deserialize,
        )]
        pub struct $set(u8);

        impl $set {
            pub const NONE: $set = $set(0);

            pub const fn of(flags: &[$flag]) -> Self {
                let mut bits = 0u8;
                let mut i = 0;
                while i < flags.len() {
                    bits |= 1 << flags[i] as u8;
                    i += 1;
                }
                Self(bits)
            }

            pub const fn contains(self, flag: $flag) -> bool {
                self.0 & (1 << flag as u8) != 0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            pub const fn minus(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            pub const fn with(self, flag: $flag) -> Self {
                Self(self.0 | 1 << flag as u8)
            }

            pub const fn without(self, flag: $flag) -> Self {
                Self(self.0 & !(1 << flag as u8))
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub fn iter(self) -> impl Iterator<Item = $flag> {
                [$($flag::$variant),+].into_iter().filter(move |f| self.contains(*f))
            }
        }
    };
}

/// A way of moving.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MovementTrait {
    Walk,
    Fly,
    Swim,
    /// Walking through shallow water.
    Wade,
}

flag_set!(
    /// Set of `MovementTrait`s.
    MovementTraits of MovementTrait { Walk, Fly, Swim, Wade }
);

impl MovementTraits {
    pub const ALL: MovementTraits = MovementTraits::of(&[
        MovementTrait::Walk,
        MovementTrait::Fly,
        MovementTrait::Swim,
        MovementTrait::Wade,
    ]);
    /// Traits that burning ground takes away.
    pub const GROUNDED: MovementTraits =
        MovementTraits::of(&[MovementTrait::Walk, MovementTrait::Wade]);
}

/// How a mover can take an obstacle apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DestroyAction {
    /// Smashing: doors, furniture, barricades.
    Bash,
    /// Digging: walls and rock.
    Dig,
}

flag_set!(
    /// Set of `DestroyAction`s.
    DestroyActions of DestroyAction { Bash, Dig }
);

// ---------------------------------------------------------------------------
// MovementType — the request
// ---------------------------------------------------------------------------

/// A traversal request.
///
/// `forced` bypasses permission checks (forbidden zones, normal trait
/// permissions of squares in favor of their forcible traits) and lets a mover
/// through furniture it is able to destroy. It is meant for destructive or
/// physics-driven moves, never for ordinary pathing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MovementType {
    traits: MovementTraits,
    forced: bool,
    tribe: TribeId,
    destroy: DestroyActions,
}

impl MovementType {
    pub fn new(tribe: TribeId, traits: MovementTraits) -> Self {
        Self {
            traits,
            forced: false,
            tribe,
            destroy: DestroyActions::NONE,
        }
    }

    /// A request with a single trait.
    pub fn single(tribe: TribeId, t: MovementTrait) -> Self {
        Self::new(tribe, MovementTraits::NONE.with(t))
    }

    pub fn with_trait(mut self, t: MovementTrait) -> Self {
        self.traits = self.traits.with(t);
        self
    }

    pub fn with_destroy(mut self, action: DestroyAction) -> Self {
        self.destroy = self.destroy.with(action);
        self
    }

    pub fn set_forced(&mut self, forced: bool) {
        self.forced = forced;
    }

    /// Copy of this request with `forced` set.
    pub fn forced(mut self) -> Self {
        self.forced = true;
        self
    }

    /// Copy of this request with `forced` cleared.
    pub fn unforced(mut self) -> Self {
        self.forced = false;
        self
    }

    pub fn traits(&self) -> MovementTraits {
        self.traits
    }

    pub fn has_trait(&self, t: MovementTrait) -> bool {
        self.traits.contains(t)
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn tribe(&self) -> TribeId {
        self.tribe
    }

    pub fn destroy_actions(&self) -> DestroyActions {
        self.destroy
    }
}

// ---------------------------------------------------------------------------
// MovementSet — the policy
// ---------------------------------------------------------------------------

/// Traversal policy of a square or furniture.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSet {
    traits: MovementTraits,
    forcible: MovementTraits,
    on_fire: bool,
    /// Roofed. Affects sunlight and vision, not traversal.
    covered: bool,
    forbidden: SmallVec<[TribeId; 2]>,
}

impl MovementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy that permits every trait.
    pub fn open() -> Self {
        Self {
            traits: MovementTraits::ALL,
            ..Self::default()
        }
    }

    pub fn add_trait(mut self, t: MovementTrait) -> Self {
        self.traits = self.traits.with(t);
        self
    }

    pub fn add_forcible_trait(mut self, t: MovementTrait) -> Self {
        self.forcible = self.forcible.with(t);
        self
    }

    pub fn remove_trait(mut self, t: MovementTrait) -> Self {
        self.traits = self.traits.without(t);
        self
    }

    pub fn with_covered(mut self, covered: bool) -> Self {
        self.covered = covered;
        self
    }

    pub fn traits(&self) -> MovementTraits {
        self.traits
    }

    pub fn forcible_traits(&self) -> MovementTraits {
        self.forcible
    }

    pub fn is_on_fire(&self) -> bool {
        self.on_fire
    }

    pub fn set_on_fire(&mut self, on_fire: bool) {
        self.on_fire = on_fire;
    }

    pub fn is_covered(&self) -> bool {
        self.covered
    }

    pub fn set_covered(&mut self, covered: bool) {
        self.covered = covered;
    }

    /// Mark `tribe` as not allowed in. Returns whether anything changed.
    pub fn forbid_tribe(&mut self, tribe: TribeId) -> bool {
        if self.forbidden.contains(&tribe) {
            return false;
        }
        self.forbidden.push(tribe);
        self.forbidden.sort();
        true
    }

    /// Lift a forbid mark. Returns whether anything changed.
    pub fn allow_tribe(&mut self, tribe: TribeId) -> bool {
        let before = self.forbidden.len();
        self.forbidden.retain(|t| *t != tribe);
        before != self.forbidden.len()
    }

    pub fn is_tribe_forbidden(&self, tribe: TribeId) -> bool {
        self.forbidden.contains(&tribe)
    }

    pub fn forbidden_tribes(&self) -> &[TribeId] {
        &self.forbidden
    }

    /// Traits this policy lets through for a forced or unforced request.
    pub fn permitted(&self, forced: bool) -> MovementTraits {
        let mut permitted = self.traits;
        if forced {
            permitted = permitted.union(self.forcible);
        }
        if self.on_fire {
            permitted = permitted.minus(MovementTraits::GROUNDED);
        }
        permitted
    }

    pub fn can_enter(&self, movement: &MovementType) -> bool {
        if !movement.is_forced() && self.is_tribe_forbidden(movement.tribe()) {
            return false;
        }
        movement
            .traits()
            .intersects(self.permitted(movement.is_forced()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIBE_A: TribeId = TribeId(1);
    const TRIBE_B: TribeId = TribeId(2);

    fn walker() -> MovementType {
        MovementType::single(TRIBE_A, MovementTrait::Walk)
    }

    fn flyer() -> MovementType {
        MovementType::single(TRIBE_A, MovementTrait::Fly)
    }

    #[test]
    fn flag_set_operations() {
        let s = MovementTraits::of(&[MovementTrait::Walk, MovementTrait::Swim]);
        assert!(s.contains(MovementTrait::Walk));
        assert!(!s.contains(MovementTrait::Fly));
        assert_eq!(s.iter().count(), 2);
        assert!(s.without(MovementTrait::Walk).without(MovementTrait::Swim).is_empty());
        assert_eq!(s.minus(MovementTraits::GROUNDED), MovementTraits::NONE.with(MovementTrait::Swim));
    }

    #[test]
    fn plain_trait_match() {
        let floor = MovementSet::new()
            .add_trait(MovementTrait::Walk)
            .add_trait(MovementTrait::Fly);
        assert!(floor.can_enter(&walker()));
        assert!(floor.can_enter(&flyer()));
        let wall = MovementSet::new();
        assert!(!wall.can_enter(&walker()));
        assert!(!wall.can_enter(&walker().forced()));
    }

    #[test]
    fn forcible_traits_need_forced_request() {
        let magma = MovementSet::new()
            .add_trait(MovementTrait::Fly)
            .add_forcible_trait(MovementTrait::Walk);
        assert!(!magma.can_enter(&walker()));
        assert!(magma.can_enter(&walker().forced()));
        assert!(magma.can_enter(&flyer()));
    }

    #[test]
    fn forbidden_tribe_blocks_only_unforced() {
        let mut floor = MovementSet::new().add_trait(MovementTrait::Walk);
        assert!(floor.forbid_tribe(TRIBE_A));
        assert!(!floor.forbid_tribe(TRIBE_A));
        assert!(!floor.can_enter(&walker()));
        assert!(floor.can_enter(&walker().forced()));
        assert!(floor.can_enter(&MovementType::single(TRIBE_B, MovementTrait::Walk)));
        assert!(floor.allow_tribe(TRIBE_A));
        assert!(floor.can_enter(&walker()));
    }

    #[test]
    fn fire_removes_grounded_traits_even_when_forced() {
        let mut floor = MovementSet::new()
            .add_trait(MovementTrait::Walk)
            .add_trait(MovementTrait::Fly)
            .add_forcible_trait(MovementTrait::Wade);
        floor.set_on_fire(true);
        assert!(!floor.can_enter(&walker()));
        assert!(!floor.can_enter(&walker().forced()));
        assert!(floor.can_enter(&flyer()));
        floor.set_on_fire(false);
        assert!(floor.can_enter(&walker()));
    }

    #[test]
    fn movement_types_differ_by_forced_flag() {
        let a = walker();
        let b = walker().forced();
        assert_ne!(a, b);
        assert_eq!(b.unforced(), a);
    }

    #[test]
    fn destroy_actions_accumulate() {
        let m = walker()
            .with_destroy(DestroyAction::Bash)
            .with_destroy(DestroyAction::Dig);
        assert!(m.destroy_actions().contains(DestroyAction::Dig));
        assert!(m.destroy_actions().intersects(DestroyActions::of(&[DestroyAction::Bash])));
    }
}
