//! A user's set of progress trees.
//!
//! Every mutation goes through [`Forest`], which relays out the touched tree
//! before returning. Readers therefore never see a structure newer than its
//! coordinates. Layouts are memoized per tree, so milestone-only edits reuse the
//! previous result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::Config;
use crate::error::{ForestError, InvalidCompletionAction, StructuralViolation};
use crate::geometry::Size;
use crate::history;
use crate::insertion::{InsertionSlot, insertion_points};
use crate::layout::{LayoutCache, LayoutResult};
use crate::milestone::{CompletionModeKind, CompletionOutcome, Milestone, ProgressAction};
use crate::store::TreeStore;
use crate::tree::{NodeId, ProgressTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(pub u64);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree-{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct TreeEntry {
    tree: ProgressTree,
    cache: LayoutCache,
}

#[derive(Debug, Clone, Default)]
pub struct Forest {
    trees: BTreeMap<TreeId, TreeEntry>,
    next_id: u64,
    config: Config,
    viewport: Option<Size>,
}

impl Forest {
    pub fn new(config: Config) -> Self {
        Self {
            trees: BTreeMap::new(),
            next_id: 1,
            config,
            viewport: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn tree(&self, id: TreeId) -> Option<&ProgressTree> {
        self.trees.get(&id).map(|entry| &entry.tree)
    }

    pub fn trees(&self) -> impl Iterator<Item = (TreeId, &ProgressTree)> {
        self.trees.iter().map(|(id, entry)| (*id, &entry.tree))
    }

    /// Layout produced by the last mutation of the tree.
    pub fn layout(&self, id: TreeId) -> Option<&LayoutResult> {
        self.trees.get(&id).and_then(|entry| entry.cache.last())
    }

    /// Changes the minimum canvas size and relays out every tree.
    pub fn set_viewport(&mut self, viewport: Option<Size>) {
        self.viewport = viewport;
        for entry in self.trees.values_mut() {
            entry
                .cache
                .layout(&mut entry.tree, &self.config.layout, self.viewport);
        }
    }

    pub fn add_tree(&mut self, tree: ProgressTree) -> TreeId {
        let id = TreeId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.insert_entry(id, tree);
        tracing::debug!(tree = %id, "tree added");
        id
    }

    pub fn create_tree(&mut self, name: impl Into<String>, root_name: impl Into<String>) -> TreeId {
        self.add_tree(ProgressTree::new(name, root_name))
    }

    pub fn remove_tree(&mut self, id: TreeId) -> Result<ProgressTree, StructuralViolation> {
        self.trees
            .remove(&id)
            .map(|entry| entry.tree)
            .ok_or(StructuralViolation::UnknownTree(id))
    }

    pub fn add_node(
        &mut self,
        tree: TreeId,
        parent: NodeId,
        after_order_key: Option<i64>,
        name: impl Into<String>,
    ) -> Result<NodeId, ForestError> {
        self.edit(tree, |t| t.add_node(parent, after_order_key, name))
    }

    pub fn delete_node(&mut self, tree: TreeId, node: NodeId) -> Result<Vec<NodeId>, ForestError> {
        self.edit(tree, |t| t.delete_node(node))
    }

    pub fn reparent(
        &mut self,
        tree: TreeId,
        node: NodeId,
        new_parent: NodeId,
        after_order_key: Option<i64>,
    ) -> Result<(), ForestError> {
        self.edit(tree, |t| t.reparent(node, new_parent, after_order_key))
    }

    pub fn link_additional_parent(
        &mut self,
        tree: TreeId,
        node: NodeId,
        other: NodeId,
    ) -> Result<bool, ForestError> {
        self.edit(tree, |t| t.link_additional_parent(node, other))
    }

    pub fn unlink_additional_parent(
        &mut self,
        tree: TreeId,
        node: NodeId,
        other: NodeId,
    ) -> Result<bool, ForestError> {
        self.edit(tree, |t| t.unlink_additional_parent(node, other))
    }

    pub fn insertion_points(&self, tree: TreeId) -> Result<Vec<InsertionSlot>, StructuralViolation> {
        let entry = self
            .trees
            .get(&tree)
            .ok_or(StructuralViolation::UnknownTree(tree))?;
        Ok(insertion_points(&entry.tree, &self.config.layout))
    }

    pub fn insert_at(
        &mut self,
        tree: TreeId,
        slot: &InsertionSlot,
        name: impl Into<String>,
    ) -> Result<NodeId, ForestError> {
        self.edit(tree, |t| t.insert_at(slot, name))
    }

    pub fn progress_milestone(
        &mut self,
        tree: TreeId,
        node: NodeId,
        action: ProgressAction,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, ForestError> {
        self.edit(tree, |t| t.progress_milestone(node, action, now))
    }

    pub fn undo_last_completion(&mut self, tree: TreeId, node: NodeId) -> Result<bool, ForestError> {
        self.edit(tree, |t| t.undo_last_completion(node))
    }

    /// Switches a node's completion mode, treating history per the configured policy.
    pub fn set_mode(
        &mut self,
        tree: TreeId,
        node: NodeId,
        kind: CompletionModeKind,
    ) -> Result<(), ForestError> {
        let policy = self.config.milestones.mode_switch;
        self.edit_milestone(tree, node, |m| {
            m.set_mode(kind, policy);
            Ok(())
        })
    }

    pub fn edit_milestone<T>(
        &mut self,
        tree: TreeId,
        node: NodeId,
        edit: impl FnOnce(&mut Milestone) -> Result<T, InvalidCompletionAction>,
    ) -> Result<T, ForestError> {
        self.edit(tree, |t| t.edit_milestone(node, edit))
    }

    /// Nodes across all trees progressed within the configured recent window.
    pub fn recently_progressed_count(&self, now: DateTime<Utc>) -> usize {
        let window = self.config.history.recent_window();
        self.trees
            .values()
            .map(|entry| history::recently_progressed_count(entry.tree.nodes(), now, window))
            .sum()
    }

    pub fn save_all(&self, store: &mut impl TreeStore) -> Result<(), ForestError> {
        for (id, entry) in &self.trees {
            store.save(*id, &entry.tree)?;
        }
        Ok(())
    }

    /// Loads every stored tree and lays each one out.
    pub fn load_all(store: &impl TreeStore, config: Config) -> Result<Self, ForestError> {
        let mut forest = Self::new(config);
        for id in store.ids()? {
            if let Some(tree) = store.load(id)? {
                forest.insert_entry(id, tree);
                forest.next_id = forest.next_id.max(id.0 + 1);
            }
        }
        tracing::info!(trees = forest.len(), "forest loaded");
        Ok(forest)
    }

    fn insert_entry(&mut self, id: TreeId, tree: ProgressTree) {
        let mut entry = TreeEntry {
            tree,
            cache: LayoutCache::new(),
        };
        entry
            .cache
            .layout(&mut entry.tree, &self.config.layout, self.viewport);
        self.trees.insert(id, entry);
    }

    /// Runs one mutation and relays out the tree, whether or not it succeeded.
    fn edit<T, E>(
        &mut self,
        id: TreeId,
        mutation: impl FnOnce(&mut ProgressTree) -> Result<T, E>,
    ) -> Result<T, ForestError>
    where
        E: Into<ForestError>,
    {
        let entry = self
            .trees
            .get_mut(&id)
            .ok_or(StructuralViolation::UnknownTree(id))?;
        let result: Result<T, ForestError> = mutation(&mut entry.tree).map_err(Into::into);
        entry
            .cache
            .layout(&mut entry.tree, &self.config.layout, self.viewport);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeSwitchPolicy;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn every_edit_is_laid_out_before_returning() {
        let mut forest = Forest::default();
        let id = forest.create_tree("Music", "Start");
        let root = forest.tree(id).unwrap().root();
        let a = forest.add_node(id, root, None, "Scales").unwrap();
        let layout = forest.layout(id).unwrap();
        assert_eq!(layout.layers[&a], 2);
        assert_eq!(layout.coordinates.len(), 2);

        let b = forest.add_node(id, root, None, "Chords").unwrap();
        let layout = forest.layout(id).unwrap();
        assert!(layout.position(a).unwrap().x < layout.position(b).unwrap().x);
    }

    #[test]
    fn delete_relayouts_without_disturbing_other_families() {
        // root -> L, R; L -> A, B, C; A -> a1; B -> b1, b2; C -> c1; R -> r1
        let mut forest = Forest::default();
        let id = forest.create_tree("t", "root");
        let root = forest.tree(id).unwrap().root();
        let l = forest.add_node(id, root, None, "L").unwrap();
        let r = forest.add_node(id, root, None, "R").unwrap();
        let a = forest.add_node(id, l, None, "A").unwrap();
        let b = forest.add_node(id, l, None, "B").unwrap();
        let c = forest.add_node(id, l, None, "C").unwrap();
        let a1 = forest.add_node(id, a, None, "a1").unwrap();
        forest.add_node(id, b, None, "b1").unwrap();
        forest.add_node(id, b, None, "b2").unwrap();
        let c1 = forest.add_node(id, c, None, "c1").unwrap();
        let r1 = forest.add_node(id, r, None, "r1").unwrap();
        let before = forest.layout(id).unwrap().clone();
        assert_eq!(before.position(b).unwrap().x, -200.0);

        let removed = forest.delete_node(id, b).unwrap();
        assert_eq!(removed.len(), 3);
        let layout = forest.layout(id).unwrap();
        assert_eq!(layout.coordinates.len(), 8);
        assert!(!layout.degenerate);
        for node in [root, r, r1] {
            assert_eq!(layout.position(node), before.position(node));
        }
        let x = |n: NodeId| layout.position(n).unwrap().x;
        assert_eq!(x(a1) - x(a), 0.0);
        assert_eq!(x(c1) - x(c), 0.0);
        assert_eq!(x(c) - x(a), 100.0);
        assert_eq!(x(l), -100.0);
        assert_eq!(layout.layers[&c1], 4);
    }

    #[test]
    fn milestone_edits_reuse_the_cached_layout() {
        let mut forest = Forest::default();
        let id = forest.create_tree("t", "root");
        let root = forest.tree(id).unwrap().root();
        let node = forest.add_node(id, root, None, "Run").unwrap();
        forest
            .edit_milestone(id, node, |m| {
                *m = Milestone::repeat_counter(2);
                Ok(())
            })
            .unwrap();
        let before = forest.layout(id).unwrap().clone();
        let outcome = forest
            .progress_milestone(id, node, ProgressAction::Step, now())
            .unwrap();
        assert!(outcome.record_appended);
        assert_eq!(forest.layout(id), Some(&before));
        assert_eq!(forest.recently_progressed_count(now()), 1);
    }

    #[test]
    fn failed_edit_leaves_tree_unchanged() {
        let mut forest = Forest::default();
        let id = forest.create_tree("t", "root");
        let root = forest.tree(id).unwrap().root();
        let err = forest.delete_node(id, root).unwrap_err();
        assert!(matches!(
            err,
            ForestError::Structural(StructuralViolation::RootImmutable(_))
        ));
        assert_eq!(forest.tree(id).unwrap().node_count(), 1);
        assert!(matches!(
            forest.add_node(TreeId(42), root, None, "x"),
            Err(ForestError::Structural(StructuralViolation::UnknownTree(TreeId(42))))
        ));
    }

    #[test]
    fn mode_switch_follows_configured_policy() {
        let mut config = Config::default();
        config.milestones.mode_switch = ModeSwitchPolicy::ClearHistory;
        let mut forest = Forest::new(config);
        let id = forest.create_tree("t", "root");
        let root = forest.tree(id).unwrap().root();
        forest
            .edit_milestone(id, root, |m| {
                *m = Milestone::repeat_counter(3);
                Ok(())
            })
            .unwrap();
        forest
            .progress_milestone(id, root, ProgressAction::Step, now())
            .unwrap();
        forest
            .set_mode(id, root, CompletionModeKind::Progressive)
            .unwrap();
        let milestone = &forest.tree(id).unwrap().root_node().milestone;
        assert_eq!(milestone.kind(), CompletionModeKind::Progressive);
        assert!(milestone.history().is_empty());
    }

    #[test]
    fn viewport_widens_every_canvas() {
        let mut forest = Forest::default();
        let first = forest.create_tree("a", "root");
        let second = forest.create_tree("b", "root");
        forest.set_viewport(Some(Size::new(2000.0, 1000.0)));
        for id in [first, second] {
            assert_eq!(forest.layout(id).unwrap().canvas.size, Size::new(2000.0, 1000.0));
        }
    }

    #[test]
    fn store_round_trip_keeps_ids() {
        let mut forest = Forest::default();
        let id = forest.create_tree("t", "root");
        let root = forest.tree(id).unwrap().root();
        forest.add_node(id, root, None, "child").unwrap();
        let mut store = MemoryStore::new();
        forest.save_all(&mut store).unwrap();

        let mut loaded = Forest::load_all(&store, Config::default()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.layout(id), forest.layout(id));
        let next = loaded.create_tree("u", "root");
        assert!(next > id);
    }
}
