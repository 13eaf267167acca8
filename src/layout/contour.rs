//! Per-layer subtree contours.
//!
//! Each layer holds one `(leftmost, rightmost)` entry per family of siblings, in
//! the order the families are drawn. Neighbouring entries are compared to find
//! overlaps and spacing deficits.

use std::collections::BTreeMap;

use super::types::{Violation, ViolationKind};
use crate::tree::{NodeId, ProgressTree};

/// Absorbs float noise left by repeated subtree shifts.
pub(crate) const SPACING_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContourEntry {
    pub left: NodeId,
    pub right: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContourTable {
    layers: BTreeMap<i32, Vec<ContourEntry>>,
}

impl ContourTable {
    /// Depth-first pre-order walk from the root over sorted successors.
    pub fn build(tree: &ProgressTree) -> Self {
        let mut layers: BTreeMap<i32, Vec<ContourEntry>> = BTreeMap::new();
        let root = tree.root_node();
        layers.entry(root.layer()).or_default().push(ContourEntry {
            left: root.id,
            right: root.id,
        });

        let mut stack = vec![root.id];
        while let Some(id) = stack.pop() {
            let children = tree.sorted_successors(id);
            if children.is_empty() {
                continue;
            }
            let x_of = |child: &NodeId| tree.node(*child).map_or(0.0, |n| n.coordinates().x);
            let mut left = children[0];
            let mut right = children[0];
            for child in &children[1..] {
                if x_of(child) < x_of(&left) {
                    left = *child;
                }
                if x_of(child) > x_of(&right) {
                    right = *child;
                }
            }
            let layer = tree.node(left).map_or(0, |n| n.layer());
            layers
                .entry(layer)
                .or_default()
                .push(ContourEntry { left, right });
            stack.extend(children.into_iter().rev());
        }
        Self { layers }
    }

    pub fn layer(&self, layer: i32) -> &[ContourEntry] {
        self.layers.get(&layer).map_or(&[], Vec::as_slice)
    }

    pub fn layers(&self) -> impl Iterator<Item = (i32, &[ContourEntry])> {
        self.layers
            .iter()
            .map(|(layer, entries)| (*layer, entries.as_slice()))
    }

    /// Every violation, layer ascending then left to right.
    pub fn violations(&self, tree: &ProgressTree, spacing: f64) -> Vec<Violation> {
        let mut found = Vec::new();
        for (layer, entries) in self.layers() {
            for pair in entries.windows(2) {
                let (Some(left), Some(right)) = (tree.node(pair[0].right), tree.node(pair[1].left))
                else {
                    continue;
                };
                let gap = right.coordinates().x - left.coordinates().x;
                if gap >= spacing - SPACING_EPSILON {
                    continue;
                }
                let kind = if gap <= 0.0 {
                    ViolationKind::Overlap
                } else {
                    ViolationKind::UnderSpacing
                };
                found.push(Violation {
                    kind,
                    layer,
                    left: left.id,
                    right: right.id,
                    magnitude: spacing - gap,
                });
            }
        }
        found
    }

    /// Largest violation; the first one found wins ties.
    pub fn worst_violation(&self, tree: &ProgressTree, spacing: f64) -> Option<Violation> {
        let mut worst: Option<Violation> = None;
        for violation in self.violations(tree, spacing) {
            match worst {
                Some(current) if violation.magnitude <= current.magnitude => {}
                _ => worst = Some(violation),
            }
        }
        worst
    }
}
