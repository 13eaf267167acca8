//! Progress tree arena.
//!
//! Nodes live in a flat table keyed by [`NodeId`]; parent and successor links are
//! id references. `additional_parents` is a separate cross-link set that the
//! layout engine never reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;

use crate::color::NodeColor;
use crate::error::{InvalidCompletionAction, StructuralViolation};
use crate::geometry::Point;
use crate::milestone::{CompletionOutcome, Milestone, ProgressAction};

/// Layer value of a node that has not been laid out yet.
pub const UNPLACED_LAYER: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn unplaced_layer() -> i32 {
    UNPLACED_LAYER
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: NodeId,
    #[serde(default)]
    pub(crate) parent: Option<NodeId>,
    #[serde(default)]
    pub(crate) successors: Vec<NodeId>,
    #[serde(default)]
    pub(crate) additional_parents: BTreeSet<NodeId>,
    #[serde(default = "unplaced_layer")]
    pub(crate) layer: i32,
    #[serde(default)]
    pub(crate) coordinates: Point,
    #[serde(default)]
    pub(crate) order_key: i64,
    pub name: String,
    #[serde(default)]
    pub emoji_icon: String,
    #[serde(default)]
    pub color: NodeColor,
    #[serde(default)]
    pub milestone: Milestone,
}

impl TreeNode {
    fn new(id: NodeId, parent: Option<NodeId>, order_key: i64, name: String) -> Self {
        Self {
            id,
            parent,
            successors: Vec::new(),
            additional_parents: BTreeSet::new(),
            layer: UNPLACED_LAYER,
            coordinates: Point::ZERO,
            order_key,
            name,
            emoji_icon: String::new(),
            color: NodeColor::default(),
            milestone: Milestone::default(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Child ids in storage order. Use [`ProgressTree::sorted_successors`] for drawing order.
    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    pub fn has_successors(&self) -> bool {
        !self.successors.is_empty()
    }

    pub fn additional_parents(&self) -> &BTreeSet<NodeId> {
        &self.additional_parents
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn is_placed(&self) -> bool {
        self.layer != UNPLACED_LAYER
    }

    pub fn coordinates(&self) -> Point {
        self.coordinates
    }

    pub fn order_key(&self) -> i64 {
        self.order_key
    }

    pub fn complete(&self) -> bool {
        self.milestone.complete()
    }

    pub fn progress(&self) -> f64 {
        self.milestone.progress()
    }
}

/// Serialized shape of a tree: nodes as a flat list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeRecord {
    name: String,
    #[serde(default)]
    emoji_icon: String,
    #[serde(default)]
    color: NodeColor,
    /// Id allocator position, so ids of deleted nodes are not handed out again.
    #[serde(default)]
    next_id: u64,
    nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeRecord", into = "TreeRecord")]
pub struct ProgressTree {
    pub name: String,
    pub emoji_icon: String,
    pub color: NodeColor,
    root: NodeId,
    nodes: BTreeMap<NodeId, TreeNode>,
    next_id: u64,
    generation: u64,
}

impl ProgressTree {
    pub fn new(name: impl Into<String>, root_name: impl Into<String>) -> Self {
        let root = NodeId(1);
        let mut nodes = BTreeMap::new();
        nodes.insert(root, TreeNode::new(root, None, 0, root_name.into()));
        Self {
            name: name.into(),
            emoji_icon: String::new(),
            color: NodeColor::default(),
            root,
            nodes,
            next_id: 2,
            generation: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_node(&self) -> &TreeNode {
        &self.nodes[&self.root]
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(&id)
    }

    pub fn get(&self, id: NodeId) -> Result<&TreeNode, StructuralViolation> {
        self.nodes.get(&id).ok_or(StructuralViolation::UnknownNode(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut TreeNode, StructuralViolation> {
        self.nodes
            .get_mut(&id)
            .ok_or(StructuralViolation::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bumped by every edit that changes the primary-parent structure.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Successors in drawing order: ascending order key, id as the final tiebreak.
    pub fn sorted_successors(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut children = node.successors.clone();
        children.sort_by_key(|child| {
            let key = self.nodes.get(child).map_or(i64::MAX, |n| n.order_key);
            (key, *child)
        });
        children
    }

    /// Pre-order traversal of the subtree rooted at `id`, including `id`.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            for child in self.sorted_successors(current).into_iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// Pre-order traversal of the whole tree.
    pub fn pre_order(&self) -> Vec<NodeId> {
        self.subtree(self.root)
    }

    /// Root-to-node chain following primary parents, both ends included.
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            path.push(current);
            cursor = node.parent;
        }
        path.reverse();
        path
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    pub fn deepest_layer(&self) -> i32 {
        self.nodes.values().map(|n| n.layer).max().unwrap_or(0)
    }

    /// Appends a node under `parent`. `after_order_key` places it right after that
    /// sibling key; `None` appends it after the last sibling.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        after_order_key: Option<i64>,
        name: impl Into<String>,
    ) -> Result<NodeId, StructuralViolation> {
        let order_key = self.placement_key(parent, after_order_key, None)?;
        self.insert_child_at(parent, order_key, name)
    }

    /// Inserts a node under `parent` with exactly `order_key`, moving siblings at or
    /// after that key one step right when the key is taken.
    pub fn insert_child_at(
        &mut self,
        parent: NodeId,
        order_key: i64,
        name: impl Into<String>,
    ) -> Result<NodeId, StructuralViolation> {
        self.get(parent)?;
        self.make_room(parent, order_key, None)?;
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes
            .insert(id, TreeNode::new(id, Some(parent), order_key, name.into()));
        self.get_mut(parent)?.successors.push(id);
        self.generation += 1;
        tracing::debug!(node = %id, parent = %parent, order_key, "node added");
        Ok(id)
    }

    /// Removes `id` and every primary-parent descendant. Returns the removed ids in
    /// pre-order.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Vec<NodeId>, StructuralViolation> {
        let node = self.get(id)?;
        let Some(parent) = node.parent else {
            return Err(StructuralViolation::RootImmutable(id));
        };
        let removed = self.subtree(id);
        for victim in &removed {
            self.nodes.remove(victim);
        }
        self.get_mut(parent)?.successors.retain(|child| *child != id);
        let gone: HashSet<NodeId> = removed.iter().copied().collect();
        for node in self.nodes.values_mut() {
            node.additional_parents.retain(|other| !gone.contains(other));
        }
        self.generation += 1;
        tracing::debug!(node = %id, removed = removed.len(), "subtree deleted");
        Ok(removed)
    }

    /// Moves `id` (with its subtree) under `new_parent`.
    pub fn reparent(
        &mut self,
        id: NodeId,
        new_parent: NodeId,
        after_order_key: Option<i64>,
    ) -> Result<(), StructuralViolation> {
        let node = self.get(id)?;
        let Some(old_parent) = node.parent else {
            return Err(StructuralViolation::RootImmutable(id));
        };
        self.get(new_parent)?;
        if new_parent == id || self.is_ancestor(id, new_parent) {
            return Err(StructuralViolation::Cycle {
                node: id,
                parent: new_parent,
            });
        }
        let order_key = self.placement_key(new_parent, after_order_key, Some(id))?;
        self.make_room(new_parent, order_key, Some(id))?;
        self.get_mut(old_parent)?
            .successors
            .retain(|child| *child != id);
        let node = self.get_mut(id)?;
        node.parent = Some(new_parent);
        node.order_key = order_key;
        self.get_mut(new_parent)?.successors.push(id);
        self.generation += 1;
        tracing::debug!(node = %id, from = %old_parent, to = %new_parent, "node reparented");
        Ok(())
    }

    /// Adds a cross link. Returns false when the link already existed.
    pub fn link_additional_parent(
        &mut self,
        id: NodeId,
        other: NodeId,
    ) -> Result<bool, StructuralViolation> {
        if id == other {
            return Err(StructuralViolation::SelfLink(id));
        }
        self.get(other)?;
        Ok(self.get_mut(id)?.additional_parents.insert(other))
    }

    pub fn unlink_additional_parent(
        &mut self,
        id: NodeId,
        other: NodeId,
    ) -> Result<bool, StructuralViolation> {
        Ok(self.get_mut(id)?.additional_parents.remove(&other))
    }

    pub fn progress_milestone(
        &mut self,
        id: NodeId,
        action: ProgressAction,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, crate::error::ForestError> {
        let node = self.get_mut(id)?;
        let outcome = node.milestone.progress_milestone(id, action, now)?;
        Ok(outcome)
    }

    pub fn undo_last_completion(&mut self, id: NodeId) -> Result<bool, StructuralViolation> {
        Ok(self.get_mut(id)?.milestone.undo_last_completion())
    }

    pub fn completed_count(&self) -> usize {
        self.nodes.values().filter(|n| n.complete()).count()
    }

    /// Mean progress over every node.
    pub fn overall_progress(&self) -> f64 {
        let total: f64 = self.nodes.values().map(|n| n.progress()).sum();
        total / self.nodes.len() as f64
    }

    /// Applies `edit` to a node's milestone and returns its result.
    pub fn edit_milestone<T>(
        &mut self,
        id: NodeId,
        edit: impl FnOnce(&mut Milestone) -> Result<T, InvalidCompletionAction>,
    ) -> Result<T, crate::error::ForestError> {
        let node = self.get_mut(id)?;
        Ok(edit(&mut node.milestone)?)
    }

    pub fn validate(&self) -> Result<(), StructuralViolation> {
        let record = TreeRecord::from(self.clone());
        ProgressTree::try_from(record).map(|_| ())
    }

    fn placement_key(
        &self,
        parent: NodeId,
        after_order_key: Option<i64>,
        moving: Option<NodeId>,
    ) -> Result<i64, StructuralViolation> {
        let node = self.get(parent)?;
        let last = match after_order_key {
            Some(key) => Some(key),
            None => node
                .successors
                .iter()
                .filter(|child| Some(**child) != moving)
                .filter_map(|child| self.nodes.get(child))
                .map(|child| child.order_key)
                .max(),
        };
        match last {
            Some(key) => key
                .checked_add(1)
                .ok_or(StructuralViolation::OrderKeyOverflow { parent }),
            None => Ok(0),
        }
    }

    /// Frees `order_key` under `parent` by moving later siblings one step right.
    /// Nothing is touched when a moved key would overflow.
    fn make_room(
        &mut self,
        parent: NodeId,
        order_key: i64,
        moving: Option<NodeId>,
    ) -> Result<(), StructuralViolation> {
        let siblings: Vec<NodeId> = self
            .nodes
            .get(&parent)
            .map(|n| {
                n.successors
                    .iter()
                    .copied()
                    .filter(|child| Some(*child) != moving)
                    .collect()
            })
            .unwrap_or_default();
        let keys: Vec<i64> = siblings
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .map(|n| n.order_key)
            .collect();
        if !keys.contains(&order_key) {
            return Ok(());
        }
        if keys.iter().any(|key| *key >= order_key && key.checked_add(1).is_none()) {
            return Err(StructuralViolation::OrderKeyOverflow { parent });
        }
        for child in siblings {
            if let Some(node) = self.nodes.get_mut(&child)
                && node.order_key >= order_key
            {
                node.order_key += 1;
            }
        }
        Ok(())
    }
}

impl From<ProgressTree> for TreeRecord {
    fn from(tree: ProgressTree) -> Self {
        let mut nodes: Vec<TreeNode> = Vec::with_capacity(tree.nodes.len());
        let mut table = tree.nodes;
        let order = {
            let mut stack = vec![tree.root];
            let mut order = Vec::new();
            while let Some(id) = stack.pop() {
                order.push(id);
                if let Some(node) = table.get(&id) {
                    stack.extend(node.successors.iter().rev().copied());
                }
            }
            order
        };
        for id in order {
            if let Some(node) = table.remove(&id) {
                nodes.push(node);
            }
        }
        nodes.extend(table.into_values());
        TreeRecord {
            name: tree.name,
            emoji_icon: tree.emoji_icon,
            color: tree.color,
            next_id: tree.next_id,
            nodes,
        }
    }
}

impl TryFrom<TreeRecord> for ProgressTree {
    type Error = StructuralViolation;

    fn try_from(record: TreeRecord) -> Result<Self, Self::Error> {
        let mut nodes: BTreeMap<NodeId, TreeNode> = BTreeMap::new();
        let mut root: Option<NodeId> = None;
        for mut node in record.nodes {
            node.successors.clear();
            node.milestone
                .normalize()
                .map_err(|item| StructuralViolation::DuplicateItem { node: node.id, item })?;
            if node.parent.is_none() {
                if let Some(first) = root {
                    return Err(StructuralViolation::MultipleRoots {
                        first,
                        second: node.id,
                    });
                }
                root = Some(node.id);
            }
            let id = node.id;
            if nodes.insert(id, node).is_some() {
                return Err(StructuralViolation::DuplicateNode(id));
            }
        }
        let root = root.ok_or(StructuralViolation::MissingRoot)?;

        // Successor lists are rebuilt from parent links.
        let links: Vec<(NodeId, NodeId)> = nodes
            .values()
            .filter_map(|n| n.parent.map(|p| (p, n.id)))
            .collect();
        for (parent, child) in links {
            nodes
                .get_mut(&parent)
                .ok_or(StructuralViolation::UnknownNode(parent))?
                .successors
                .push(child);
        }

        for node in nodes.values() {
            if let Some(missing) = node
                .additional_parents
                .iter()
                .find(|other| !nodes.contains_key(other))
            {
                return Err(StructuralViolation::UnknownNode(*missing));
            }
            let mut keys = HashSet::new();
            for child in &node.successors {
                let key = nodes[child].order_key;
                if !keys.insert(key) {
                    return Err(StructuralViolation::DuplicateOrderKey {
                        parent: node.id,
                        order_key: key,
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if seen.insert(id) {
                queue.extend(nodes[&id].successors.iter().copied());
            }
        }
        if let Some(orphan) = nodes.keys().find(|id| !seen.contains(id)) {
            return Err(StructuralViolation::Disconnected { node: *orphan });
        }

        let next_id = nodes
            .keys()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(1)
            .max(record.next_id);
        Ok(Self {
            name: record.name,
            emoji_icon: record.emoji_icon,
            color: record.color,
            root,
            nodes,
            next_id,
            generation: 0,
        })
    }
}
