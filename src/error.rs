use thiserror::Error;

use crate::forest::TreeId;
use crate::milestone::{CompletionModeKind, ItemId};
use crate::tree::NodeId;

pub type Result<T, E = ForestError> = std::result::Result<T, E>;

/// A structural edit that would break the tree invariants. The tree is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralViolation {
    #[error("node not found: {0}")]
    UnknownNode(NodeId),

    #[error("tree not found: {0}")]
    UnknownTree(TreeId),

    #[error("moving {node} under {parent} would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },

    #[error("the root node {0} cannot be deleted or moved")]
    RootImmutable(NodeId),

    #[error("node {0} cannot be its own additional parent")]
    SelfLink(NodeId),

    #[error("node id {0} is used twice")]
    DuplicateNode(NodeId),

    #[error("tree has no root")]
    MissingRoot,

    #[error("tree has more than one root: {first} and {second}")]
    MultipleRoots { first: NodeId, second: NodeId },

    #[error("node {node} is not reachable from the root")]
    Disconnected { node: NodeId },

    #[error("order key {order_key} is used twice under {parent}")]
    DuplicateOrderKey { parent: NodeId, order_key: i64 },

    #[error("insertion slot beside {anchor} no longer matches the tree")]
    StaleSlot { anchor: NodeId },

    #[error("no order key is left after the last sibling under {parent}")]
    OrderKeyOverflow { parent: NodeId },

    #[error("checklist item {item} is used twice on {node}")]
    DuplicateItem { node: NodeId, item: ItemId },
}

/// A completion action that is not legal for the node's current mode or settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCompletionAction {
    #[error("checklist progress follows its items; toggle an item instead")]
    NoExplicitAction,

    #[error("{action} is not valid for {mode} milestones")]
    WrongMode {
        action: &'static str,
        mode: CompletionModeKind,
    },

    #[error("progressive milestones need a unit")]
    EmptyUnit,

    #[error("repeat target must be at least 1")]
    RepeatTargetUnset,

    #[error("target amount must be positive, got {0}")]
    TargetUnset(f64),

    #[error("amount must be a finite, non-negative number, got {0}")]
    InvalidAmount(f64),

    #[error("amount {requested} is below the current amount {current}")]
    AmountDecreased { current: f64, requested: f64 },

    #[error("checklist item not found: {0}")]
    UnknownItem(ItemId),
}

#[derive(Debug, Error)]
pub enum ForestError {
    #[error(transparent)]
    Structural(#[from] StructuralViolation),

    #[error(transparent)]
    Completion(#[from] InvalidCompletionAction),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid outline: {0}")]
    Outline(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_convert_into_forest_error() {
        let err: ForestError = StructuralViolation::UnknownNode(NodeId(7)).into();
        assert!(matches!(err, ForestError::Structural(_)));
        assert_eq!(err.to_string(), "node not found: #7");
    }

    #[test]
    fn wrong_mode_message_names_mode() {
        let err = InvalidCompletionAction::WrongMode {
            action: "step",
            mode: CompletionModeKind::Progressive,
        };
        assert_eq!(err.to_string(), "step is not valid for progressive milestones");
    }
}
