//! # Batch Aggregation Engine
//!
//! Groups trays by exact `batch_code` equality and derives batch-level statistics.
//!
//! Pipeline order:
//! 1. Filter the flat tray collection (search, status, stage)
//! 2. Group into [`BatchView`]s
//! 3. Sort the groups
//! 4. Paginate in memory
//!
//! A batch shows up when at least one of its trays matched the filter, and its
//! statistics are computed over the matched trays only. Grouping needs every matched
//! row, so the whole filtered set is materialized before any page is cut.

use crate::models::{BatchStatus, BatchView, StatusCounts, Tray, TraySummary};
use crate::query_builder::{SortField, TraySort};
use crate::services::batch_code::compare_batch_codes;
use crate::state_machine::Stage;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Round to one decimal place, half away from zero
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean catalog progress of `trays` as a percentage, rounded to one decimal
pub fn progress_of(trays: &[&Tray]) -> f64 {
    if trays.is_empty() {
        return 0.0;
    }
    let total: f64 = trays.iter().map(|tray| tray.progress()).sum();
    round_one_decimal(total / trays.len() as f64)
}

/// Most frequent stage; ties go to the stage encountered first
pub fn dominant_stage(trays: &[&Tray]) -> Stage {
    let mut tallies: Vec<(Stage, usize)> = Vec::new();
    for tray in trays {
        match tallies.iter_mut().find(|(stage, _)| *stage == tray.stage) {
            Some((_, count)) => *count += 1,
            None => tallies.push((tray.stage, 1)),
        }
    }

    let mut best: Option<(Stage, usize)> = None;
    for (stage, count) in tallies {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((stage, count));
        }
    }
    best.map_or_else(Stage::first, |(stage, _)| stage)
}

/// Completed when every member is, attention when failures exceed `attention_ratio`
pub fn batch_status(counts: &StatusCounts, attention_ratio: f64) -> BatchStatus {
    let total = counts.total();
    if total > 0 && counts.completed == total {
        return BatchStatus::Completed;
    }
    if total > 0 && counts.failed as f64 / total as f64 > attention_ratio {
        return BatchStatus::Attention;
    }
    BatchStatus::Active
}

/// Build the view for one group of trays sharing a code
fn build_view(batch_code: String, members: &[&Tray], attention_ratio: f64) -> Option<BatchView> {
    let first = members.first()?;

    let mut counts = StatusCounts::default();
    for tray in members {
        counts.record(tray.status);
    }

    Some(BatchView {
        batch_code,
        total_trays: members.len(),
        progress: progress_of(members),
        dominant_stage: dominant_stage(members),
        batch_status: batch_status(&counts, attention_ratio),
        counts,
        location: first.location.clone(),
        notes: first.notes.clone(),
        created_at: first.created_at,
        planted_at: first.planted_at,
        trays: members.iter().map(|tray| TraySummary::from(*tray)).collect(),
    })
}

/// Group trays into batches, keeping first-appearance order
pub fn aggregate(trays: &[Tray], attention_ratio: f64) -> Vec<BatchView> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&Tray>> = HashMap::new();

    for tray in trays {
        let code = tray.batch_code.as_str();
        groups
            .entry(code)
            .or_insert_with(|| {
                order.push(code);
                Vec::new()
            })
            .push(tray);
    }

    order
        .into_iter()
        .filter_map(|code| {
            let members = groups.get(code)?;
            build_view(code.to_string(), members, attention_ratio)
        })
        .collect()
}

fn compare_views(field: SortField, a: &BatchView, b: &BatchView) -> Ordering {
    match field {
        SortField::BatchCode => compare_batch_codes(&a.batch_code, &b.batch_code),
        SortField::Stage => a
            .dominant_stage
            .sort_order()
            .cmp(&b.dominant_stage.sort_order()),
        SortField::Status => a
            .batch_status
            .to_string()
            .cmp(&b.batch_status.to_string()),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::Progress => a.progress.total_cmp(&b.progress),
        SortField::TotalTrays => a.total_trays.cmp(&b.total_trays),
        SortField::PlantedAt => a
            .planted_at
            .unwrap_or(a.created_at)
            .cmp(&b.planted_at.unwrap_or(b.created_at)),
    }
}

/// Stable sort of grouped batches; equal keys keep their grouping order
pub fn sort_batches(batches: &mut [BatchView], sort: &TraySort) {
    batches.sort_by(|a, b| sort.direction.apply(compare_views(sort.field, a, b)));
}
