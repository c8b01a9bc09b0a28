use std::collections::HashMap;

use super::model::{CellValue, Dataset};
use crate::error::Result;

/// Mean of a numeric column within one category.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMean {
    pub group: CellValue,
    pub mean: f64,
    /// Number of rows that contributed a numeric value.
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Smallest,
    Largest,
}

/// Per-group means in first-appearance order.
fn means_in_appearance_order(dataset: &Dataset, by: &str, value: &str) -> Result<Vec<GroupMean>> {
    let by_idx = dataset.column_index(by)?;
    let value_idx = dataset.column_index(value)?;

    // (sum, count) per group, keyed into `order` so the first-seen order
    // survives for tie-breaking.
    let mut slots: HashMap<&CellValue, usize> = HashMap::new();
    let mut order: Vec<(&CellValue, f64, usize)> = Vec::new();

    for row in &dataset.rows {
        let key = &row[by_idx];
        if key.is_null() {
            continue;
        }
        let slot = *slots.entry(key).or_insert_with(|| {
            order.push((key, 0.0, 0));
            order.len() - 1
        });
        if let Some(v) = row[value_idx].as_f64() {
            order[slot].1 += v;
            order[slot].2 += 1;
        }
    }

    Ok(order
        .into_iter()
        .filter(|(_, _, count)| *count > 0)
        .map(|(group, sum, count)| GroupMean {
            group: group.clone(),
            mean: sum / count as f64,
            count,
        })
        .collect())
}

/// Group rows by `by` and average `value` within each group.
///
/// Rows with a null group key are dropped; null or non-numeric values do not
/// contribute, and a group left with no contributing value is omitted
/// rather than reported as zero. Ordered by descending mean, ties in order
/// of first appearance.
pub fn grouped_means(dataset: &Dataset, by: &str, value: &str) -> Result<Vec<GroupMean>> {
    let mut means = means_in_appearance_order(dataset, by, value)?;
    means.sort_by(|a, b| b.mean.total_cmp(&a.mean));
    Ok(means)
}

/// The `n` groups with the smallest or largest mean, in that order.
/// Returns every group when `n` exceeds the group count.
pub fn ranked_means(
    dataset: &Dataset,
    by: &str,
    value: &str,
    n: usize,
    direction: Direction,
) -> Result<Vec<GroupMean>> {
    let mut means = means_in_appearance_order(dataset, by, value)?;
    match direction {
        Direction::Smallest => means.sort_by(|a, b| a.mean.total_cmp(&b.mean)),
        Direction::Largest => means.sort_by(|a, b| b.mean.total_cmp(&a.mean)),
    }
    means.truncate(n);
    Ok(means)
}
