//! Completion history analytics: per-day chart series and the
//! recently-progressed signal.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::HistoryConfig;
use crate::milestone::CompletionRecord;
use crate::tree::TreeNode;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBucket {
    pub day: NaiveDate,
    pub label: String,
    pub count: usize,
    /// Progress gained that day: one per repetition, the increase for progressive
    /// records.
    pub amount: f64,
}

fn gained(record: &CompletionRecord) -> f64 {
    match record.previous_amount() {
        Some(previous) => record.amount() - previous,
        None => record.amount(),
    }
}

/// One bucket per local day in `from..=to`, empty days included. Days are cut at
/// the configured UTC offset.
pub fn daily_series<'a>(
    records: impl IntoIterator<Item = &'a CompletionRecord>,
    config: &HistoryConfig,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<HistoryBucket> {
    let offset = config.offset();
    let mut totals: BTreeMap<NaiveDate, (usize, f64)> = BTreeMap::new();
    for record in records {
        let day = record.date().with_timezone(&offset).date_naive();
        if day < from || day > to {
            continue;
        }
        let entry = totals.entry(day).or_default();
        entry.0 += 1;
        entry.1 += gained(record);
    }

    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| {
            let (count, amount) = totals.get(&day).copied().unwrap_or_default();
            HistoryBucket {
                day,
                label: day.format(&config.date_format).to_string(),
                count,
                amount,
            }
        })
        .collect()
}

pub fn last_progressed(node: &TreeNode) -> Option<DateTime<Utc>> {
    node.milestone.history().iter().map(|r| r.date()).max()
}

/// Nodes with at least one record in `(now - window, now]`.
pub fn recently_progressed_count<'a>(
    nodes: impl IntoIterator<Item = &'a TreeNode>,
    now: DateTime<Utc>,
    window: Duration,
) -> usize {
    let since = now - window;
    nodes
        .into_iter()
        .filter(|node| {
            node.milestone
                .history()
                .iter()
                .any(|r| r.date() > since && r.date() <= now)
        })
        .count()
}
