use std::collections::BTreeMap;

use serde::Serialize;

use crate::geometry::{Point, Size};
use crate::tree::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    /// The right edge of the left subtree reaches past the left edge of the right one.
    Overlap,
    /// The subtrees are ordered but closer than the minimum spacing.
    UnderSpacing,
}

/// A spacing conflict between two neighbouring contour entries on one layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub kind: ViolationKind,
    pub layer: i32,
    /// Rightmost node of the left entry.
    pub left: NodeId,
    /// Leftmost node of the right entry.
    pub right: NodeId,
    /// Horizontal shift that restores the minimum spacing.
    pub magnitude: f64,
}

/// Viewport that contains every laid-out node plus the margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Canvas {
    /// Top-left corner in layout units.
    pub origin: Point,
    pub size: Size,
    /// Size needed by the nodes alone, before the viewport is applied.
    pub content: Size,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub coordinates: BTreeMap<NodeId, Point>,
    pub layers: BTreeMap<NodeId, i32>,
    pub canvas: Canvas,
    pub deepest_layer: i32,
    /// The resolution loop hit its bound before every violation was fixed.
    pub degenerate: bool,
    pub iterations: usize,
    /// Worst violation left behind by a degenerate run.
    pub remaining: Option<Violation>,
}

impl LayoutResult {
    pub fn position(&self, id: NodeId) -> Option<Point> {
        self.coordinates.get(&id).copied()
    }
}
