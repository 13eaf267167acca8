use super::contour::ContourTable;
use super::types::Violation;
use crate::config::{LayoutConfig, ShiftPolicy};
use crate::tree::{NodeId, ProgressTree};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ResolveOutcome {
    pub iterations: usize,
    pub remaining: Option<Violation>,
}

/// Repeatedly fixes the worst contour violation, for at most
/// `iterations_per_layer * deepest_layer` rounds.
pub(crate) fn resolve_overlaps(
    tree: &mut ProgressTree,
    config: &LayoutConfig,
    deepest_layer: i32,
) -> ResolveOutcome {
    let bound = config.iterations_per_layer * deepest_layer.max(1) as usize;
    let spacing = config.node_spacing;
    let mut iterations = 0;
    while iterations < bound {
        let Some(violation) = ContourTable::build(tree).worst_violation(tree, spacing) else {
            return ResolveOutcome {
                iterations,
                remaining: None,
            };
        };
        iterations += 1;
        tracing::debug!(
            iteration = iterations,
            layer = violation.layer,
            left = %violation.left,
            right = %violation.right,
            magnitude = violation.magnitude,
            "resolving contour violation"
        );
        separate(tree, &violation, &config.shift_policy);
    }
    ResolveOutcome {
        iterations,
        remaining: ContourTable::build(tree).worst_violation(tree, spacing),
    }
}

/// Last node shared by both root paths.
pub(crate) fn lowest_common_ancestor(tree: &ProgressTree, a: NodeId, b: NodeId) -> Option<NodeId> {
    let left = tree.path_from_root(a);
    let right = tree.path_from_root(b);
    left.iter()
        .zip(right.iter())
        .take_while(|(l, r)| l == r)
        .last()
        .map(|(l, _)| *l)
}

/// Splits the ancestor's sorted children into the left group (through the branch
/// holding `left`), the between group, and the right group (from the branch
/// holding `right`).
pub(crate) fn partition_children(
    tree: &ProgressTree,
    ancestor: NodeId,
    left: NodeId,
    right: NodeId,
) -> Option<(Vec<NodeId>, Vec<NodeId>, Vec<NodeId>)> {
    let depth = tree.path_from_root(ancestor).len();
    let left_branch = *tree.path_from_root(left).get(depth)?;
    let right_branch = *tree.path_from_root(right).get(depth)?;
    let children = tree.sorted_successors(ancestor);
    let left_index = children.iter().position(|c| *c == left_branch)?;
    let right_index = children.iter().position(|c| *c == right_branch)?;
    if left_index >= right_index {
        return None;
    }
    Some((
        children[..=left_index].to_vec(),
        children[left_index + 1..right_index].to_vec(),
        children[right_index..].to_vec(),
    ))
}

fn separate(tree: &mut ProgressTree, violation: &Violation, policy: &ShiftPolicy) {
    let Some(ancestor) = lowest_common_ancestor(tree, violation.left, violation.right) else {
        return;
    };
    let Some((left_group, between_group, _)) =
        partition_children(tree, ancestor, violation.left, violation.right)
    else {
        tracing::warn!(
            left = %violation.left,
            right = %violation.right,
            "conflicting nodes do not split under a common ancestor"
        );
        return;
    };
    let full = -policy.left_share * violation.magnitude;
    let half = -policy.between_share * violation.magnitude;
    for child in left_group {
        shift_subtree(tree, child, full);
    }
    for child in between_group {
        shift_subtree(tree, child, half);
    }
}

pub(crate) fn shift_subtree(tree: &mut ProgressTree, id: NodeId, dx: f64) {
    for member in tree.subtree(id) {
        if let Some(node) = tree.node_mut(member) {
            node.coordinates.translate_x(dx);
        }
    }
}
