//! Milestone completion state machine.
//!
//! Every node carries a [`Milestone`]: a tagged [`CompletionMode`] plus the
//! append-only completion history. `complete` and `progress` are derived from
//! the mode and history and refreshed after every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ModeSwitchPolicy;
use crate::error::InvalidCompletionAction;
use crate::tree::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub complete: bool,
    pub created: DateTime<Utc>,
}

/// One completion event. Records are only created by [`Milestone::progress_milestone`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    date: DateTime<Utc>,
    unit: String,
    amount: f64,
    node: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    previous_amount: Option<f64>,
}

impl CompletionRecord {
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Amount the milestone held before this record; set for progressive records.
    pub fn previous_amount(&self) -> Option<f64> {
        self.previous_amount
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionModeKind {
    Checklist,
    RepeatCounter,
    Progressive,
}

impl fmt::Display for CompletionModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompletionModeKind::Checklist => "checklist",
            CompletionModeKind::RepeatCounter => "repeat-counter",
            CompletionModeKind::Progressive => "progressive",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum CompletionMode {
    Checklist {
        #[serde(default)]
        items: Vec<ChecklistItem>,
    },
    #[serde(rename_all = "camelCase")]
    RepeatCounter {
        #[serde(default)]
        repeat_target: u32,
    },
    #[serde(rename_all = "camelCase")]
    Progressive {
        #[serde(default)]
        unit: String,
        #[serde(default)]
        target_amount: f64,
        #[serde(default)]
        amount: f64,
    },
}

impl CompletionMode {
    /// The mode with every mode-specific field at its zero value.
    pub fn zeroed(kind: CompletionModeKind) -> Self {
        match kind {
            CompletionModeKind::Checklist => CompletionMode::Checklist { items: Vec::new() },
            CompletionModeKind::RepeatCounter => CompletionMode::RepeatCounter { repeat_target: 0 },
            CompletionModeKind::Progressive => CompletionMode::Progressive {
                unit: String::new(),
                target_amount: 0.0,
                amount: 0.0,
            },
        }
    }

    pub fn kind(&self) -> CompletionModeKind {
        match self {
            CompletionMode::Checklist { .. } => CompletionModeKind::Checklist,
            CompletionMode::RepeatCounter { .. } => CompletionModeKind::RepeatCounter,
            CompletionMode::Progressive { .. } => CompletionModeKind::Progressive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressAction {
    /// Count one more repetition.
    Step,
    /// Record a new absolute amount for a progressive milestone.
    SetAmount(f64),
}

impl ProgressAction {
    fn name(&self) -> &'static str {
        match self {
            ProgressAction::Step => "step",
            ProgressAction::SetAmount(_) => "set-amount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub new_progress: f64,
    pub new_complete: bool,
    pub record_appended: bool,
    /// The milestone was already complete; nothing changed.
    pub already_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[serde(flatten)]
    mode: CompletionMode,
    #[serde(default)]
    history: Vec<CompletionRecord>,
    #[serde(default)]
    next_item: u64,
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    progress: f64,
}

impl Default for Milestone {
    fn default() -> Self {
        Self::new(CompletionMode::zeroed(CompletionModeKind::Checklist))
    }
}

impl Milestone {
    pub fn new(mode: CompletionMode) -> Self {
        let mut milestone = Self {
            mode,
            history: Vec::new(),
            next_item: 0,
            complete: false,
            progress: 0.0,
        };
        milestone.refresh();
        milestone
    }

    pub fn repeat_counter(repeat_target: u32) -> Self {
        Self::new(CompletionMode::RepeatCounter { repeat_target })
    }

    pub fn progressive(unit: impl Into<String>, target_amount: f64) -> Self {
        Self::new(CompletionMode::Progressive {
            unit: unit.into(),
            target_amount,
            amount: 0.0,
        })
    }

    pub fn mode(&self) -> &CompletionMode {
        &self.mode
    }

    pub fn kind(&self) -> CompletionModeKind {
        self.mode.kind()
    }

    pub fn history(&self) -> &[CompletionRecord] {
        &self.history
    }

    pub fn complete(&self) -> bool {
        self.complete
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn items(&self) -> &[ChecklistItem] {
        match &self.mode {
            CompletionMode::Checklist { items } => items,
            _ => &[],
        }
    }

    /// Current progressive amount, `None` for other modes.
    pub fn amount(&self) -> Option<f64> {
        match &self.mode {
            CompletionMode::Progressive { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    /// Recomputes `complete` and `progress` from the mode and history.
    pub fn refresh(&mut self) {
        let (complete, progress) = match &self.mode {
            CompletionMode::Checklist { items } => {
                if items.is_empty() {
                    (false, 0.0)
                } else {
                    let done = items.iter().filter(|item| item.complete).count();
                    (done == items.len(), done as f64 / items.len() as f64)
                }
            }
            CompletionMode::RepeatCounter { repeat_target } => {
                if *repeat_target == 0 {
                    (false, 0.0)
                } else {
                    let count = self.history.len();
                    let target = *repeat_target as usize;
                    (count >= target, (count as f64 / target as f64).min(1.0))
                }
            }
            CompletionMode::Progressive {
                target_amount,
                amount,
                ..
            } => {
                if !target_amount.is_finite() || *target_amount <= 0.0 {
                    (false, 0.0)
                } else {
                    (
                        *amount >= *target_amount,
                        (*amount / *target_amount).clamp(0.0, 1.0),
                    )
                }
            }
        };
        self.complete = complete;
        self.progress = progress;
    }

    /// Brings an imported milestone back in line: the item allocator moves past
    /// every existing item and derived fields are recomputed. Returns the first
    /// item id that appears twice.
    pub(crate) fn normalize(&mut self) -> Result<(), ItemId> {
        if let CompletionMode::Checklist { items } = &self.mode {
            let mut seen = std::collections::HashSet::new();
            for item in items {
                if !seen.insert(item.id) {
                    return Err(item.id);
                }
                self.next_item = self.next_item.max(item.id.0 + 1);
            }
        }
        self.refresh();
        Ok(())
    }

    /// Applies one completion action for `node`.
    ///
    /// Already complete repeat-counter and progressive milestones return an
    /// outcome with `already_complete` set and are left untouched.
    pub fn progress_milestone(
        &mut self,
        node: NodeId,
        action: ProgressAction,
        now: DateTime<Utc>,
    ) -> Result<CompletionOutcome, InvalidCompletionAction> {
        let kind = self.kind();
        let already = self.complete.then(|| self.already_complete_outcome());
        let record = match (&mut self.mode, action) {
            (CompletionMode::Checklist { .. }, _) => {
                return Err(InvalidCompletionAction::NoExplicitAction);
            }
            (CompletionMode::RepeatCounter { repeat_target }, ProgressAction::Step) => {
                if *repeat_target == 0 {
                    return Err(InvalidCompletionAction::RepeatTargetUnset);
                }
                if let Some(outcome) = already {
                    return Ok(outcome);
                }
                CompletionRecord {
                    date: now,
                    unit: String::new(),
                    amount: 1.0,
                    node,
                    previous_amount: None,
                }
            }
            (
                CompletionMode::Progressive {
                    unit,
                    target_amount,
                    amount,
                },
                ProgressAction::SetAmount(requested),
            ) => {
                validate_goal(unit, *target_amount)?;
                if let Some(outcome) = already {
                    return Ok(outcome);
                }
                if !requested.is_finite() || requested < 0.0 {
                    return Err(InvalidCompletionAction::InvalidAmount(requested));
                }
                if requested < *amount {
                    return Err(InvalidCompletionAction::AmountDecreased {
                        current: *amount,
                        requested,
                    });
                }
                let previous = *amount;
                *amount = requested;
                CompletionRecord {
                    date: now,
                    unit: unit.clone(),
                    amount: requested,
                    node,
                    previous_amount: Some(previous),
                }
            }
            (_, action) => {
                return Err(InvalidCompletionAction::WrongMode {
                    action: action.name(),
                    mode: kind,
                });
            }
        };
        self.history.push(record);
        self.refresh();
        Ok(CompletionOutcome {
            new_progress: self.progress,
            new_complete: self.complete,
            record_appended: true,
            already_complete: false,
        })
    }

    /// Removes the most recent record. Returns false when there is nothing to undo.
    pub fn undo_last_completion(&mut self) -> bool {
        let Some(record) = self.history.pop() else {
            return false;
        };
        // Records from before a mode switch refer to a discarded amount.
        if let (CompletionMode::Progressive { amount, .. }, Some(previous)) =
            (&mut self.mode, record.previous_amount)
            && *amount == record.amount
        {
            *amount = previous;
        }
        self.refresh();
        true
    }

    /// Switches to another completion mode, zeroing mode-specific fields.
    pub fn set_mode(&mut self, kind: CompletionModeKind, policy: ModeSwitchPolicy) {
        if self.kind() == kind {
            return;
        }
        self.mode = CompletionMode::zeroed(kind);
        if policy == ModeSwitchPolicy::ClearHistory {
            self.history.clear();
        }
        self.refresh();
    }

    pub fn set_repeat_target(&mut self, target: u32) -> Result<(), InvalidCompletionAction> {
        let kind = self.kind();
        let CompletionMode::RepeatCounter { repeat_target } = &mut self.mode else {
            return Err(InvalidCompletionAction::WrongMode {
                action: "set-repeat-target",
                mode: kind,
            });
        };
        if target == 0 {
            return Err(InvalidCompletionAction::RepeatTargetUnset);
        }
        *repeat_target = target;
        self.refresh();
        Ok(())
    }

    pub fn set_progressive_goal(
        &mut self,
        new_unit: impl Into<String>,
        new_target: f64,
    ) -> Result<(), InvalidCompletionAction> {
        let kind = self.kind();
        let CompletionMode::Progressive {
            unit,
            target_amount,
            ..
        } = &mut self.mode
        else {
            return Err(InvalidCompletionAction::WrongMode {
                action: "set-goal",
                mode: kind,
            });
        };
        let new_unit = new_unit.into();
        validate_goal(&new_unit, new_target)?;
        *unit = new_unit;
        *target_amount = new_target;
        self.refresh();
        Ok(())
    }

    pub fn add_item(
        &mut self,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<ItemId, InvalidCompletionAction> {
        let id = ItemId(self.next_item);
        let items = self.items_mut("add-item")?;
        items.push(ChecklistItem {
            id,
            name: name.into(),
            complete: false,
            created: now,
        });
        self.next_item += 1;
        self.refresh();
        Ok(id)
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<ChecklistItem, InvalidCompletionAction> {
        let items = self.items_mut("remove-item")?;
        let index = items
            .iter()
            .position(|item| item.id == id)
            .ok_or(InvalidCompletionAction::UnknownItem(id))?;
        let removed = items.remove(index);
        self.refresh();
        Ok(removed)
    }

    pub fn rename_item(
        &mut self,
        id: ItemId,
        name: impl Into<String>,
    ) -> Result<(), InvalidCompletionAction> {
        self.item_mut(id, "rename-item")?.name = name.into();
        Ok(())
    }

    pub fn set_item_complete(
        &mut self,
        id: ItemId,
        complete: bool,
    ) -> Result<(), InvalidCompletionAction> {
        self.item_mut(id, "set-item")?.complete = complete;
        self.refresh();
        Ok(())
    }

    /// Flips an item and returns its new state.
    pub fn toggle_item(&mut self, id: ItemId) -> Result<bool, InvalidCompletionAction> {
        let item = self.item_mut(id, "toggle-item")?;
        item.complete = !item.complete;
        let state = item.complete;
        self.refresh();
        Ok(state)
    }

    fn items_mut(
        &mut self,
        action: &'static str,
    ) -> Result<&mut Vec<ChecklistItem>, InvalidCompletionAction> {
        let kind = self.kind();
        match &mut self.mode {
            CompletionMode::Checklist { items } => Ok(items),
            _ => Err(InvalidCompletionAction::WrongMode { action, mode: kind }),
        }
    }

    fn item_mut(
        &mut self,
        id: ItemId,
        action: &'static str,
    ) -> Result<&mut ChecklistItem, InvalidCompletionAction> {
        self.items_mut(action)?
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(InvalidCompletionAction::UnknownItem(id))
    }

    fn already_complete_outcome(&self) -> CompletionOutcome {
        CompletionOutcome {
            new_progress: self.progress,
            new_complete: self.complete,
            record_appended: false,
            already_complete: true,
        }
    }
}

fn validate_goal(unit: &str, target_amount: f64) -> Result<(), InvalidCompletionAction> {
    if unit.trim().is_empty() {
        return Err(InvalidCompletionAction::EmptyUnit);
    }
    if !target_amount.is_finite() || target_amount <= 0.0 {
        return Err(InvalidCompletionAction::TargetUnset(target_amount));
    }
    Ok(())
}
