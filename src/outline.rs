//! Hand-written tree outlines.
//!
//! An outline is nested JSON: every entry has a `name`, optional `emoji`, `color`
//! (hex) and `completion` settings, and its `children` in drawing order.
//!
//! ```json
//! { "name": "Guitar", "children": [
//!     { "name": "Chords", "completion": { "mode": "repeatCounter", "repeatTarget": 10 } },
//!     { "name": "Practice", "completion": { "mode": "progressive", "unit": "h", "targetAmount": 20 } }
//! ] }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::color::NodeColor;
use crate::error::ForestError;
use crate::milestone::{CompletionMode, CompletionModeKind, Milestone};
use crate::tree::{NodeId, ProgressTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outline {
    pub name: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<OutlineCompletion>,
    #[serde(default)]
    pub children: Vec<Outline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum OutlineCompletion {
    Checklist {
        #[serde(default)]
        items: Vec<OutlineItem>,
    },
    #[serde(rename_all = "camelCase")]
    RepeatCounter { repeat_target: u32 },
    #[serde(rename_all = "camelCase")]
    Progressive { unit: String, target_amount: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineItem {
    pub name: String,
    #[serde(default)]
    pub complete: bool,
}

impl Outline {
    pub fn from_json(input: &str) -> Result<Self, ForestError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Number of entries, this one included.
    pub fn entry_count(&self) -> usize {
        1 + self.children.iter().map(Outline::entry_count).sum::<usize>()
    }
}

fn parse_color(value: &str) -> Result<NodeColor, ForestError> {
    NodeColor::from_hex(value)
        .ok_or_else(|| ForestError::Outline(format!("bad color {value:?}")))
}

fn milestone_for(
    completion: Option<&OutlineCompletion>,
    now: DateTime<Utc>,
) -> Result<Milestone, ForestError> {
    let Some(completion) = completion else {
        return Ok(Milestone::default());
    };
    let milestone = match completion {
        OutlineCompletion::Checklist { items } => {
            let mut milestone = Milestone::default();
            for item in items {
                let id = milestone.add_item(&item.name, now)?;
                milestone.set_item_complete(id, item.complete)?;
            }
            milestone
        }
        OutlineCompletion::RepeatCounter { repeat_target } => {
            let mut milestone =
                Milestone::new(CompletionMode::zeroed(CompletionModeKind::RepeatCounter));
            milestone.set_repeat_target(*repeat_target)?;
            milestone
        }
        OutlineCompletion::Progressive {
            unit,
            target_amount,
        } => {
            let mut milestone =
                Milestone::new(CompletionMode::zeroed(CompletionModeKind::Progressive));
            milestone.set_progressive_goal(unit, *target_amount)?;
            milestone
        }
    };
    Ok(milestone)
}

impl ProgressTree {
    /// Builds a tree whose root is the top outline entry. The tree takes the root's
    /// name, emoji and color.
    pub fn from_outline(outline: &Outline, now: DateTime<Utc>) -> Result<Self, ForestError> {
        let mut tree = ProgressTree::new(&outline.name, &outline.name);
        tree.emoji_icon = outline.emoji.clone();
        if let Some(color) = &outline.color {
            tree.color = parse_color(color)?;
        }

        let mut pending: Vec<(&Outline, NodeId)> = vec![(outline, tree.root())];
        while let Some((entry, id)) = pending.pop() {
            let milestone = milestone_for(entry.completion.as_ref(), now)?;
            let color = entry.color.as_deref().map(parse_color).transpose()?;
            let node = tree.get_mut(id)?;
            node.emoji_icon = entry.emoji.clone();
            node.milestone = milestone;
            if let Some(color) = color {
                node.color = color;
            }
            for child in &entry.children {
                let child_id = tree.add_node(id, None, &child.name)?;
                pending.push((child, child_id));
            }
        }
        Ok(tree)
    }
}
