// Visual descriptors handed to the render layer.
//
// The core does not draw anything. It only keeps, per square and per
// furniture, a `ViewObject` (sprite id + layer + a few attributes) and
// composes them into a per-tile `ViewIndex` snapshot on request. The render
// layer decides what to re-fetch using the render-dirty flag (`level.rs`).
//
// Layers are ordered bottom to top; a `ViewIndex` holds at most one object per
// layer, and furniture is inserted after terrain so it wins on shared layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sprite identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViewId {
    Empty,
    Floor,
    Grass,
    Mud,
    Sand,
    Hill,
    Wall,
    WoodWall,
    CastleWall,
    Mountain,
    GoldOre,
    IronOre,
    Stone,
    Water,
    Magma,
    Hole,
    BorderGuard,
    Door,
    BuiltWall,
    Bridge,
    Bed,
    Altar,
    Workshop,
    Torch,
    Tree,
    Barricade,
    Stairs,
    Rubble,
    Ashes,
}

/// Drawing layer, bottom to top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViewLayer {
    FloorBackground,
    Floor,
    Furniture,
    Item,
    Creature,
}

/// Tile highlight overlays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HighlightType {
    Unavailable,
    Construction,
    Burning,
    PoisonGas,
}

/// One drawable thing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewObject {
    pub id: ViewId,
    pub layer: ViewLayer,
    /// Tooltip text; empty means "use the owner's name".
    pub description: String,
    /// Water depth, for shading.
    pub water_depth: Option<f64>,
    pub casts_shadow: bool,
    /// 0..1 burn overlay intensity.
    pub burning: f64,
}

impl ViewObject {
    pub fn new(id: ViewId, layer: ViewLayer) -> Self {
        Self {
            id,
            layer,
            description: String::new(),
            water_depth: None,
            casts_shadow: false,
            burning: 0.0,
        }
    }

    /// The object shown for tiles that do not exist.
    pub fn empty() -> Self {
        Self::new(ViewId::Empty, ViewLayer::Floor)
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_water_depth(mut self, depth: f64) -> Self {
        self.water_depth = Some(depth);
        self
    }

    pub fn with_shadow(mut self) -> Self {
        self.casts_shadow = true;
        self
    }
}

/// Composited view of one tile.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewIndex {
    objects: BTreeMap<ViewLayer, ViewObject>,
    highlights: Vec<HighlightType>,
}

impl ViewIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, replacing whatever was on its layer.
    pub fn insert(&mut self, object: ViewObject) {
        self.objects.insert(object.layer, object);
    }

    pub fn has_object(&self, layer: ViewLayer) -> bool {
        self.objects.contains_key(&layer)
    }

    pub fn object(&self, layer: ViewLayer) -> Option<&ViewObject> {
        self.objects.get(&layer)
    }

    /// Topmost object, if any.
    pub fn top(&self) -> Option<&ViewObject> {
        self.objects.values().next_back()
    }

    pub fn set_highlight(&mut self, highlight: HighlightType) {
        if !self.highlights.contains(&highlight) {
            self.highlights.push(highlight);
        }
    }

    pub fn has_highlight(&self, highlight: HighlightType) -> bool {
        self.highlights.contains(&highlight)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_same_layer() {
        let mut index = ViewIndex::new();
        index.insert(ViewObject::new(ViewId::Floor, ViewLayer::FloorBackground));
        index.insert(ViewObject::new(ViewId::Grass, ViewLayer::FloorBackground));
        assert_eq!(
            index.object(ViewLayer::FloorBackground).map(|o| o.id),
            Some(ViewId::Grass)
        );
    }

    #[test]
    fn top_is_highest_layer() {
        let mut index = ViewIndex::new();
        index.insert(ViewObject::new(ViewId::Door, ViewLayer::Furniture));
        index.insert(ViewObject::new(ViewId::Floor, ViewLayer::FloorBackground));
        assert_eq!(index.top().map(|o| o.id), Some(ViewId::Door));
    }

    #[test]
    fn highlights_are_deduplicated() {
        let mut index = ViewIndex::new();
        index.set_highlight(HighlightType::Burning);
        index.set_highlight(HighlightType::Burning);
        assert!(index.has_highlight(HighlightType::Burning));
        assert!(!index.has_highlight(HighlightType::Unavailable));
    }
}
