mod cache;
mod canvas;
pub mod contour;
mod resolve;
pub(crate) mod types;
pub use cache::LayoutCache;
pub use canvas::canvas_bounds;
pub use contour::{ContourEntry, ContourTable};
pub use types::*;

use crate::config::LayoutConfig;
use crate::geometry::{Point, Size};
use crate::tree::{NodeId, ProgressTree, UNPLACED_LAYER};
use std::collections::{BTreeMap, VecDeque};

pub fn recompute_layout(tree: &mut ProgressTree, config: &LayoutConfig) -> LayoutResult {
    recompute_layout_with_viewport(tree, config, None)
}

/// Full pass: layering, initial placement, overlap resolution, canvas sizing.
/// Node layers and coordinates are written back into the tree.
pub fn recompute_layout_with_viewport(
    tree: &mut ProgressTree,
    config: &LayoutConfig,
    viewport: Option<Size>,
) -> LayoutResult {
    let deepest_layer = assign_layers(tree);
    place_initial(tree, config);
    let outcome = resolve::resolve_overlaps(tree, config, deepest_layer);
    let degenerate = outcome.remaining.is_some();
    if let Some(violation) = &outcome.remaining {
        tracing::warn!(
            tree = %tree.name,
            iterations = outcome.iterations,
            layer = violation.layer,
            magnitude = violation.magnitude,
            "layout did not converge; keeping best-effort coordinates"
        );
    }

    let mut coordinates = BTreeMap::new();
    let mut layers = BTreeMap::new();
    for node in tree.nodes() {
        coordinates.insert(node.id, node.coordinates());
        layers.insert(node.id, node.layer());
    }
    LayoutResult {
        coordinates,
        layers,
        canvas: canvas_bounds(tree.nodes(), config, viewport),
        deepest_layer,
        degenerate,
        iterations: outcome.iterations,
        remaining: outcome.remaining,
    }
}

/// Breadth-first from the root: root layer 1, children one below their parent.
/// Returns the deepest layer.
pub(crate) fn assign_layers(tree: &mut ProgressTree) -> i32 {
    let ids: Vec<NodeId> = tree.node_ids().collect();
    for id in ids {
        if let Some(node) = tree.node_mut(id) {
            node.layer = UNPLACED_LAYER;
        }
    }
    let root = tree.root();
    let mut deepest = 1;
    let mut queue = VecDeque::from([(root, 1)]);
    while let Some((id, layer)) = queue.pop_front() {
        let Some(node) = tree.node_mut(id) else {
            continue;
        };
        node.layer = layer;
        deepest = deepest.max(layer);
        let children = node.successors.clone();
        for child in children {
            queue.push_back((child, layer + 1));
        }
    }
    deepest
}

/// Centres each family of successors under its parent at exactly the spacing.
pub(crate) fn place_initial(tree: &mut ProgressTree, config: &LayoutConfig) {
    let spacing = config.node_spacing;
    let root = tree.root();
    if let Some(node) = tree.node_mut(root) {
        node.coordinates = Point::new(0.0, f64::from(node.layer) * config.row_height);
    }
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(parent_x) = tree.node(id).map(|n| n.coordinates().x) else {
            continue;
        };
        let children = tree.sorted_successors(id);
        let count = children.len() as f64;
        for (index, child) in children.iter().enumerate() {
            if let Some(node) = tree.node_mut(*child) {
                let x = parent_x + index as f64 * spacing - (count - 1.0) * spacing / 2.0;
                node.coordinates = Point::new(x, f64::from(node.layer) * config.row_height);
            }
        }
        stack.extend(children.into_iter().rev());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaced(spacing: f64) -> LayoutConfig {
        LayoutConfig {
            node_spacing: spacing,
            row_height: 20.0,
            node_width: spacing / 2.0,
            node_height: 10.0,
            ..LayoutConfig::default()
        }
    }

    fn x(tree: &ProgressTree, id: NodeId) -> f64 {
        tree.get(id).unwrap().coordinates().x
    }

    #[test]
    fn two_children_straddle_the_root() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        let a = tree.add_node(root, None, "a").unwrap();
        let b = tree.add_node(root, None, "b").unwrap();
        let result = recompute_layout(&mut tree, &spaced(10.0));
        assert!(!result.degenerate);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.position(root), Some(Point::new(0.0, 20.0)));
        assert_eq!(result.position(a), Some(Point::new(-5.0, 40.0)));
        assert_eq!(result.position(b), Some(Point::new(5.0, 40.0)));
    }

    #[test]
    fn cousin_overlap_moves_left_branch() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        let a = tree.add_node(root, None, "a").unwrap();
        let b = tree.add_node(root, None, "b").unwrap();
        let a1 = tree.add_node(a, None, "a1").unwrap();
        let a2 = tree.add_node(a, None, "a2").unwrap();
        let b1 = tree.add_node(b, None, "b1").unwrap();
        let b2 = tree.add_node(b, None, "b2").unwrap();
        let result = recompute_layout(&mut tree, &spaced(10.0));
        assert!(!result.degenerate);
        assert_eq!(result.iterations, 1);
        assert_eq!(x(&tree, a), -15.0);
        assert_eq!(x(&tree, b), 5.0);
        assert_eq!(x(&tree, a1), -20.0);
        assert_eq!(x(&tree, a2), -10.0);
        assert_eq!(x(&tree, b1), 0.0);
        assert_eq!(x(&tree, b2), 10.0);
    }

    #[test]
    fn between_group_moves_half() {
        // root -> [p, q, r]; p and r each get three children, q none. The conflict on
        // layer 3 is between p's and r's families, so q moves half the distance.
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        let p = tree.add_node(root, None, "p").unwrap();
        let q = tree.add_node(root, None, "q").unwrap();
        let r = tree.add_node(root, None, "r").unwrap();
        for parent in [p, r] {
            for i in 0..3 {
                tree.add_node(parent, None, format!("c{i}")).unwrap();
            }
        }
        // p at -10 with children -20..0, r at 10 with children 0..20.
        let result = recompute_layout(&mut tree, &spaced(10.0));
        assert!(!result.degenerate);
        assert_eq!(result.iterations, 1);
        assert_eq!(x(&tree, p), -20.0);
        assert_eq!(x(&tree, q), -5.0);
        assert_eq!(x(&tree, r), 10.0);
    }

    #[test]
    fn layers_follow_parent_chain() {
        let mut tree = ProgressTree::new("t", "root");
        let mut parent = tree.root();
        for i in 0..5 {
            parent = tree.add_node(parent, None, format!("n{i}")).unwrap();
        }
        let result = recompute_layout(&mut tree, &spaced(10.0));
        assert_eq!(result.deepest_layer, 6);
        assert_eq!(result.layers[&parent], 6);
        assert_eq!(result.position(parent).map(|p| p.y), Some(120.0));
    }

    #[test]
    fn repeated_layout_is_identical() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        for i in 0..4 {
            let child = tree.add_node(root, None, format!("c{i}")).unwrap();
            for j in 0..i {
                tree.add_node(child, None, format!("g{j}")).unwrap();
            }
        }
        let config = spaced(10.0);
        let first = recompute_layout(&mut tree, &config);
        let second = recompute_layout(&mut tree, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn cross_links_do_not_affect_layout() {
        let mut tree = ProgressTree::new("t", "root");
        let root = tree.root();
        let a = tree.add_node(root, None, "a").unwrap();
        let b = tree.add_node(root, None, "b").unwrap();
        let b1 = tree.add_node(b, None, "b1").unwrap();
        let config = spaced(10.0);
        let before = recompute_layout(&mut tree, &config);
        tree.link_additional_parent(b1, a).unwrap();
        let after = recompute_layout(&mut tree, &config);
        assert_eq!(before.coordinates, after.coordinates);
    }
}
