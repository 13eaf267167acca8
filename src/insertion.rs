//! Empty places around laid-out nodes where a new milestone can go.

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::error::StructuralViolation;
use crate::geometry::{Bounds, Point};
use crate::tree::{NodeId, ProgressTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotKind {
    /// Between the anchor and its parent; the anchor moves under the new node.
    Above,
    Left,
    Right,
    /// First child of a leaf.
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertionSlot {
    pub kind: SlotKind,
    pub anchor: NodeId,
    /// Node the new milestone is attached to.
    pub parent: NodeId,
    pub order_key: i64,
    /// Slot centre in layout units.
    pub position: Point,
}

/// Lists the slots around every node, using the coordinates from the last layout.
/// Slots that would cover a node box are left out, as are duplicates (the right
/// slot of one sibling is usually the left slot of the next).
pub fn insertion_points(tree: &ProgressTree, config: &LayoutConfig) -> Vec<InsertionSlot> {
    let node_size = config.node_size();
    let boxes: Vec<Bounds> = tree
        .nodes()
        .map(|node| Bounds::centered(node.coordinates(), node_size))
        .collect();

    let mut slots: Vec<InsertionSlot> = Vec::new();
    for id in tree.pre_order() {
        let Some(node) = tree.node(id) else {
            continue;
        };
        let at = node.coordinates();
        let below = InsertionSlot {
            kind: SlotKind::Below,
            anchor: id,
            parent: id,
            order_key: 0,
            position: at.offset(0.0, config.row_height),
        };
        let mut candidates = Vec::with_capacity(4);
        if let Some(parent) = node.parent() {
            let key = node.order_key();
            let beside = |kind, order_key, dx| InsertionSlot {
                kind,
                anchor: id,
                parent,
                order_key,
                position: at.offset(dx, 0.0),
            };
            candidates.push(InsertionSlot {
                kind: SlotKind::Above,
                anchor: id,
                parent,
                order_key: key,
                position: at.offset(0.0, -config.row_height / 2.0),
            });
            candidates.push(beside(SlotKind::Left, key, -config.node_spacing / 2.0));
            if let Some(next) = key.checked_add(1) {
                candidates.push(beside(SlotKind::Right, next, config.node_spacing / 2.0));
            }
        }
        if !node.has_successors() {
            candidates.push(below);
        }

        for slot in candidates {
            let area = Bounds::centered(slot.position, config.slot_box());
            if boxes.iter().any(|b| b.intersects(&area)) {
                continue;
            }
            let duplicate = slots.iter().any(|seen| {
                seen.parent == slot.parent
                    && seen.order_key == slot.order_key
                    && seen.position == slot.position
            });
            if !duplicate {
                slots.push(slot);
            }
        }
    }
    slots
}

impl ProgressTree {
    /// Creates a node in `slot`. The tree must not have changed structurally since
    /// the slot was computed.
    pub fn insert_at(
        &mut self,
        slot: &InsertionSlot,
        name: impl Into<String>,
    ) -> Result<NodeId, StructuralViolation> {
        let anchor = self.get(slot.anchor)?;
        let stale = match slot.kind {
            SlotKind::Below => slot.parent != slot.anchor || anchor.has_successors(),
            _ => anchor.parent() != Some(slot.parent),
        };
        if stale {
            return Err(StructuralViolation::StaleSlot {
                anchor: slot.anchor,
            });
        }
        let id = self.insert_child_at(slot.parent, slot.order_key, name)?;
        if slot.kind == SlotKind::Above {
            self.reparent(slot.anchor, id, None)?;
        }
        Ok(id)
    }
}
