#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod forest;
pub mod geometry;
pub mod history;
pub mod insertion;
pub mod layout;
pub mod layout_dump;
pub mod milestone;
pub mod outline;
pub mod store;
pub mod tree;

#[cfg(feature = "cli")]
pub use cli::run;
pub use color::NodeColor;
pub use config::{Config, HistoryConfig, LayoutConfig, ModeSwitchPolicy, ShiftPolicy, load_config};
pub use error::{ForestError, InvalidCompletionAction, StructuralViolation};
pub use forest::{Forest, TreeId};
pub use geometry::{Point, Size};
pub use history::{HistoryBucket, daily_series, recently_progressed_count};
pub use insertion::{InsertionSlot, SlotKind, insertion_points};
pub use layout::{LayoutCache, LayoutResult, Violation, ViolationKind, recompute_layout};
pub use milestone::{
    CompletionMode, CompletionModeKind, CompletionOutcome, CompletionRecord, ItemId, Milestone,
    ProgressAction,
};
pub use outline::Outline;
pub use store::{MemoryStore, TreeStore};
pub use tree::{NodeId, ProgressTree, TreeNode};
