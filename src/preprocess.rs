//! Cleaning and merging
//!
//! Turns the three source tables into one daily table with at most one record
//! per (user, day):
//!
//! 1. drop exact duplicate rows per table
//! 2. impute missing values per table with that table's column medians
//! 3. outer-merge on (user_id, date); a repeated key keeps its first row
//! 4. impute again with medians of the merged table
//!
//! A column with no values at all stays missing so that downstream stages can
//! degrade gracefully.

use crate::sources::{SourceRow, SourceTable, SourceTables};
use crate::types::{DailyRecord, MetricGroup};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Counts of what cleaning changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Exact duplicate rows dropped across all tables
    pub duplicates_removed: usize,
    /// Rows dropped because their (user_id, date) was already present
    pub conflicting_keys_dropped: usize,
    /// Values filled from per-table medians
    pub imputed_before_merge: usize,
    /// Values filled from merged-table medians
    pub imputed_after_merge: usize,
    /// Records in the merged table
    pub merged_records: usize,
}

/// Cleaner and merger for source tables
pub struct Preprocessor;

impl Preprocessor {
    /// Clean each table, merge, and clean the merged table
    pub fn merge(tables: SourceTables) -> (Vec<DailyRecord>, CleaningReport) {
        let mut report = CleaningReport::default();

        let activity = clean_table(tables.activity, &mut report);
        let sleep = clean_table(tables.sleep, &mut report);
        let heart_rate = clean_table(tables.heart_rate, &mut report);

        let mut merged: BTreeMap<(String, NaiveDate), DailyRecord> = BTreeMap::new();
        merge_table(&mut merged, activity, &mut report, |r| &mut r.activity);
        merge_table(&mut merged, sleep, &mut report, |r| &mut r.sleep);
        merge_table(&mut merged, heart_rate, &mut report, |r| &mut r.heart_rate);

        let mut records: Vec<DailyRecord> = merged.into_values().collect();
        report.imputed_after_merge =
            impute_column_medians(&mut records, |r| r.raw_values_mut());
        report.merged_records = records.len();

        info!(
            records = report.merged_records,
            duplicates = report.duplicates_removed,
            imputed_before_merge = report.imputed_before_merge,
            imputed_after_merge = report.imputed_after_merge,
            "merged source tables"
        );

        (records, report)
    }
}

fn clean_table<M: MetricGroup>(
    table: SourceTable<M>,
    report: &mut CleaningReport,
) -> SourceTable<M> {
    let before = table.rows.len();
    let mut seen = HashSet::new();
    let mut rows: Vec<SourceRow<M>> = table
        .rows
        .into_iter()
        .filter(|row| seen.insert(fingerprint(row)))
        .collect();

    let removed = before - rows.len();
    if removed > 0 {
        info!(table = %table.name, removed, "removed duplicate rows");
    }
    report.duplicates_removed += removed;
    report.imputed_before_merge += impute_column_medians(&mut rows, |r| r.metrics.values_mut());

    SourceTable {
        name: table.name,
        rows,
    }
}

/// Identity of a row for exact-duplicate detection
fn fingerprint<M: MetricGroup>(row: &SourceRow<M>) -> (String, NaiveDate, Vec<Option<u64>>) {
    let values = row
        .metrics
        .values()
        .into_iter()
        .map(|v| v.map(f64::to_bits))
        .collect();
    (row.user_id.clone(), row.date, values)
}

fn merge_table<M, F>(
    merged: &mut BTreeMap<(String, NaiveDate), DailyRecord>,
    table: SourceTable<M>,
    report: &mut CleaningReport,
    group: F,
) where
    M: MetricGroup,
    F: Fn(&mut DailyRecord) -> &mut M,
{
    let mut keys = HashSet::new();

    for row in table.rows {
        let key = (row.user_id, row.date);
        if !keys.insert(key.clone()) {
            warn!(
                table = %table.name,
                user_id = %key.0,
                date = %key.1,
                "conflicting rows for the same day, keeping the first"
            );
            report.conflicting_keys_dropped += 1;
            continue;
        }

        let record = merged
            .entry(key)
            .or_insert_with_key(|(user_id, date)| DailyRecord::new(user_id.clone(), *date));
        *group(record) = row.metrics;
    }
}

/// Fill missing slots with the median of their column; returns values filled
fn impute_column_medians<T, F>(items: &mut [T], mut slots: F) -> usize
where
    F: FnMut(&mut T) -> Vec<&mut Option<f64>>,
{
    let width = match items.first_mut() {
        Some(first) => slots(first).len(),
        None => return 0,
    };

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); width];
    for item in items.iter_mut() {
        for (column, slot) in columns.iter_mut().zip(slots(item)) {
            if let Some(value) = *slot {
                column.push(value);
            }
        }
    }
    let medians: Vec<Option<f64>> = columns.into_iter().map(median).collect();

    let mut imputed = 0;
    for item in items.iter_mut() {
        for (slot, median) in slots(item).into_iter().zip(&medians) {
            if slot.is_none() {
                if let Some(m) = median {
                    *slot = Some(*m);
                    imputed += 1;
                }
            }
        }
    }
    imputed
}

/// Median; even counts average the two middle values
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
