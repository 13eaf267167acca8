use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::geometry::Size;

/// How far each group of the lowest common ancestor's children moves when a
/// violation is resolved, as a share of the violation magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftPolicy {
    /// Children up to and including the branch of the left node.
    pub left_share: f64,
    /// Children strictly between the two conflicting branches.
    pub between_share: f64,
}

impl Default for ShiftPolicy {
    fn default() -> Self {
        Self {
            left_share: 1.0,
            between_share: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Minimum horizontal distance between the centres of neighbouring nodes.
    pub node_spacing: f64,
    pub row_height: f64,
    pub node_width: f64,
    pub node_height: f64,
    pub canvas_margin: f64,
    /// Resolution rounds allowed per layer of depth.
    pub iterations_per_layer: usize,
    /// Side of the square drop target offered for an insertion slot.
    pub slot_size: f64,
    pub shift_policy: ShiftPolicy,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_spacing: 100.0,
            row_height: 120.0,
            node_width: 60.0,
            node_height: 60.0,
            canvas_margin: 40.0,
            iterations_per_layer: 2,
            slot_size: 24.0,
            shift_policy: ShiftPolicy::default(),
        }
    }
}

impl LayoutConfig {
    pub fn node_size(&self) -> Size {
        Size::new(self.node_width, self.node_height)
    }

    pub fn slot_box(&self) -> Size {
        Size::new(self.slot_size, self.slot_size)
    }

    /// Node boxes must fit inside the spacing grid, otherwise a valid layout can
    /// still draw overlapping boxes.
    pub fn validate(&self) -> anyhow::Result<()> {
        let positive = [
            ("nodeSpacing", self.node_spacing),
            ("rowHeight", self.row_height),
            ("nodeWidth", self.node_width),
            ("nodeHeight", self.node_height),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                anyhow::bail!("{name} must be a positive number, got {value}");
            }
        }
        if self.node_width > self.node_spacing {
            anyhow::bail!(
                "nodeWidth ({}) must not exceed nodeSpacing ({})",
                self.node_width,
                self.node_spacing
            );
        }
        if self.node_height > self.row_height {
            anyhow::bail!(
                "nodeHeight ({}) must not exceed rowHeight ({})",
                self.node_height,
                self.row_height
            );
        }
        if self.iterations_per_layer == 0 {
            anyhow::bail!("iterationsPerLayer must be at least 1");
        }
        if self.canvas_margin < 0.0 || self.slot_size < 0.0 {
            anyhow::bail!("canvasMargin and slotSize must not be negative");
        }
        Ok(())
    }
}

/// What happens to the completion history when a node changes mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModeSwitchPolicy {
    #[default]
    PreserveHistory,
    ClearHistory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MilestoneConfig {
    pub mode_switch: ModeSwitchPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// `chrono` format string used for chart labels.
    pub date_format: String,
    /// Offset applied before bucketing records by day.
    pub utc_offset_minutes: i32,
    /// Window used for the recently-progressed signal.
    pub recent_window_hours: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            date_format: "%b %d".to_string(),
            utc_offset_minutes: 0,
            recent_window_hours: 24 * 7,
        }
    }
}

impl HistoryConfig {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn recent_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.recent_window_hours.max(0))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub layout: LayoutConfig,
    pub milestones: MilestoneConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShiftPolicyFile {
    left_share: Option<f64>,
    between_share: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    node_spacing: Option<f64>,
    row_height: Option<f64>,
    node_width: Option<f64>,
    node_height: Option<f64>,
    canvas_margin: Option<f64>,
    iterations_per_layer: Option<usize>,
    slot_size: Option<f64>,
    shift_policy: Option<ShiftPolicyFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MilestoneConfigFile {
    mode_switch: Option<ModeSwitchPolicy>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryConfigFile {
    date_format: Option<String>,
    utc_offset_minutes: Option<i32>,
    recent_window_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    layout: Option<LayoutConfigFile>,
    milestones: Option<MilestoneConfigFile>,
    history: Option<HistoryConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.node_spacing {
            config.layout.node_spacing = v;
        }
        if let Some(v) = layout.row_height {
            config.layout.row_height = v;
        }
        if let Some(v) = layout.node_width {
            config.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            config.layout.node_height = v;
        }
        if let Some(v) = layout.canvas_margin {
            config.layout.canvas_margin = v;
        }
        if let Some(v) = layout.iterations_per_layer {
            config.layout.iterations_per_layer = v;
        }
        if let Some(v) = layout.slot_size {
            config.layout.slot_size = v;
        }
        if let Some(policy) = layout.shift_policy {
            if let Some(v) = policy.left_share {
                config.layout.shift_policy.left_share = v;
            }
            if let Some(v) = policy.between_share {
                config.layout.shift_policy.between_share = v;
            }
        }
    }

    if let Some(milestones) = parsed.milestones
        && let Some(v) = milestones.mode_switch
    {
        config.milestones.mode_switch = v;
    }

    if let Some(history) = parsed.history {
        if let Some(v) = history.date_format {
            config.history.date_format = v;
        }
        if let Some(v) = history.utc_offset_minutes {
            config.history.utc_offset_minutes = v;
        }
        if let Some(v) = history.recent_window_hours {
            config.history.recent_window_hours = v;
        }
    }

    config.layout.validate()?;
    Ok(config)
}
