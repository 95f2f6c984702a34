// Connectivity index for one movement class.
//
// Every tile that is a member gets a component label; two members are
// connected iff their labels are equal, so `same` is O(1). Adjacency is the
// 8-neighborhood, the same moves creatures make.
//
// Maintenance is incremental:
// - `add` joins the components around the new tile. The smaller components
//   are relabeled into the largest one, so the work is proportional to what
//   gets relabeled, never to the level size.
// - `remove` detects splits eagerly. If the removed tile's member neighbors
//   are still connected to each other inside its 3x3 ring, the component
//   cannot have split and nothing else happens (the common case: removing a
//   tile from an open room). Otherwise a flood fill from one neighbor finds
//   what is still attached, and every neighbor it did not reach starts a
//   detached part that is relabeled with a fresh label.
//
// `Level` owns one `Sectors` per registered `MovementType` and keeps the
// invariant `member(tile) == can_navigate(tile, class)` after every
// mutation (see `Level::update_connectivity`).
//
// Labels of emptied components are recycled through a free list. Label
// values are an internal detail; only equality is meaningful.
//
// See also: `level.rs` for the per-class registry and the parallel full
// rebuild, `position.rs` for `is_connected_to` and `is_chokepoint`.
//
// **Critical constraint: determinism.** Labels are handed out from a counter
// and a LIFO free list, and all traversals visit neighbors in fixed order.

use crate::grid::Grid;
use crate::types::Vec2;
use log::debug;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

const NO_SECTOR: u32 = u32::MAX;

#[derive(Clone, Debug, Default)]
pub struct Sectors {
    labels: Grid<u32>,
    /// Member count per label; 0 for free labels.
    sizes: Vec<u32>,
    free: Vec<u32>,
}

impl Sectors {
    /// An index with no members.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            labels: Grid::new(width, height, NO_SECTOR),
            sizes: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Full build from a membership predicate.
    pub fn build(width: u32, height: u32, is_member: impl Fn(Vec2) -> bool) -> Self {
        let members = Grid::from_fn(width, height, is_member);
        let mut sectors = Self::new(width, height);
        for (coord, member) in members.iter() {
            if !*member || sectors.label(coord) != NO_SECTOR {
                continue;
            }
            let label = sectors.fresh_label();
            let mut count = 1;
            sectors.labels.set(coord, label);
            let mut queue = VecDeque::from([coord]);
            while let Some(v) = queue.pop_front() {
                for n in v.neighbors8() {
                    if members.value(n) && sectors.label(n) == NO_SECTOR {
                        sectors.labels.set(n, label);
                        count += 1;
                        queue.push_back(n);
                    }
                }
            }
            sectors.sizes[label as usize] = count;
        }
        sectors
    }

    fn label(&self, v: Vec2) -> u32 {
        self.labels.get(v).copied().unwrap_or(NO_SECTOR)
    }

    pub fn contains(&self, v: Vec2) -> bool {
        self.label(v) != NO_SECTOR
    }

    /// Whether `a` and `b` are members of the same component.
    pub fn same(&self, a: Vec2, b: Vec2) -> bool {
        let la = self.label(a);
        la != NO_SECTOR && la == self.label(b)
    }

    /// Size of the component containing `v`; 0 for non-members.
    pub fn component_size(&self, v: Vec2) -> usize {
        match self.label(v) {
            NO_SECTOR => 0,
            l => self.sizes[l as usize] as usize,
        }
    }

    pub fn component_count(&self) -> usize {
        self.sizes.iter().filter(|s| **s > 0).count()
    }

    pub fn member_count(&self) -> usize {
        self.sizes.iter().map(|s| *s as usize).sum()
    }

    fn fresh_label(&mut self) -> u32 {
        match self.free.pop() {
            Some(l) => l,
            None => {
                self.sizes.push(0);
                (self.sizes.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, label: u32) {
        self.sizes[label as usize] = 0;
        self.free.push(label);
    }

    /// Relabel the `from` component reachable from `start` to `to`. Returns
    /// how many tiles changed.
    fn relabel(&mut self, start: Vec2, from: u32, to: u32) -> u32 {
        let mut count = 1;
        self.labels.set(start, to);
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for n in v.neighbors8() {
                if self.label(n) == from {
                    self.labels.set(n, to);
                    count += 1;
                    queue.push_back(n);
                }
            }
        }
        count
    }

    /// Tiles of component `label` reachable from `start`, never entering
    /// `skip`.
    fn flood(&self, start: Vec2, label: u32, skip: Vec2) -> FxHashSet<Vec2> {
        let mut seen = FxHashSet::default();
        seen.insert(start);
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for n in v.neighbors8() {
                if n != skip && self.label(n) == label && seen.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    /// Ring neighbors of `center` labeled `label`, and whether they are all
    /// connected to each other without passing through `center`.
    fn ring_members(&self, center: Vec2, label: u32) -> (Vec<Vec2>, bool) {
        let members: Vec<Vec2> = center
            .neighbors8()
            .into_iter()
            .filter(|n| self.label(*n) == label)
            .collect();
        if members.len() <= 1 {
            return (members, true);
        }
        let mut reached = vec![false; members.len()];
        reached[0] = true;
        let mut stack = vec![0usize];
        while let Some(i) = stack.pop() {
            for j in 0..members.len() {
                if !reached[j] && members[i].dist8(members[j]) == 1 {
                    reached[j] = true;
                    stack.push(j);
                }
            }
        }
        let connected = reached.iter().all(|r| *r);
        (members, connected)
    }

    /// Make `v` a member, merging the components around it.
    pub fn add(&mut self, v: Vec2) {
        if !self.labels.in_bounds(v) || self.contains(v) {
            return;
        }
        let mut around: Vec<(u32, Vec2)> = Vec::new();
        for n in v.neighbors8() {
            let l = self.label(n);
            if l != NO_SECTOR && !around.iter().any(|(seen, _)| *seen == l) {
                around.push((l, n));
            }
        }
        let largest = around
            .iter()
            .max_by(|a, b| {
                self.sizes[a.0 as usize]
                    .cmp(&self.sizes[b.0 as usize])
                    .then(b.0.cmp(&a.0))
            })
            .map(|(l, _)| *l);
        let target = match largest {
            Some(l) => l,
            None => self.fresh_label(),
        };
        for (l, start) in around {
            if l != target {
                let moved = self.relabel(start, l, target);
                self.sizes[target as usize] += moved;
                self.release(l);
            }
        }
        self.labels.set(v, target);
        self.sizes[target as usize] += 1;
    }

    /// Drop `v` from membership, splitting its component if needed.
    pub fn remove(&mut self, v: Vec2) {
        let label = self.label(v);
        if label == NO_SECTOR {
            return;
        }
        self.labels.set(v, NO_SECTOR);
        self.sizes[label as usize] -= 1;
        let (members, connected) = self.ring_members(v, label);
        if members.is_empty() {
            self.release(label);
            return;
        }
        if connected {
            return;
        }
        let kept = self.flood(members[0], label, v);
        for m in &members[1..] {
            if self.label(*m) != label || kept.contains(m) {
                continue;
            }
            let fresh = self.fresh_label();
            let moved = self.relabel(*m, label, fresh);
            self.sizes[fresh as usize] = moved;
            self.sizes[label as usize] -= moved;
            debug!("sector split at {v}: {moved} tiles detached");
        }
    }

    /// Whether removing member `v` would split its component.
    pub fn is_chokepoint(&self, v: Vec2) -> bool {
        let label = self.label(v);
        if label == NO_SECTOR {
            return false;
        }
        let (members, connected) = self.ring_members(v, label);
        if connected {
            return false;
        }
        let reached = self.flood(members[0], label, v);
        members.iter().any(|m| !reached.contains(m))
    }
}
