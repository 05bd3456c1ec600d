//! # Batch Views
//!
//! Read-side projections over trays. A batch has no row of its own: it is every live
//! tray sharing a `batch_code`, and these views are rebuilt on every read.

use super::tray::Tray;
use crate::state_machine::{Stage, TrayStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived status of a whole batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    /// Too many member trays have failed
    Attention,
    Completed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Attention => write!(f, "attention"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Member counts by tray status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: TrayStatus) {
        match status {
            TrayStatus::Active => self.active += 1,
            TrayStatus::Completed => self.completed += 1,
            TrayStatus::Failed => self.failed += 1,
            TrayStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.active + self.completed + self.failed + self.cancelled
    }
}

/// Compact member entry inside a [`BatchView`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraySummary {
    pub tray_id: i64,
    pub tray_label: String,
    pub tray_number: String,
    pub stage: Stage,
    pub status: TrayStatus,
    pub position_x: i32,
    pub position_y: i32,
    pub location: String,
}

impl From<&Tray> for TraySummary {
    fn from(tray: &Tray) -> Self {
        Self {
            tray_id: tray.id,
            tray_label: tray.tray_label.clone(),
            tray_number: tray.tray_number.clone(),
            stage: tray.stage,
            status: tray.status,
            position_x: tray.position_x,
            position_y: tray.position_y,
            location: tray.location.clone(),
        }
    }
}

/// One batch with statistics derived from its member trays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchView {
    pub batch_code: String,
    pub total_trays: usize,
    pub counts: StatusCounts,
    /// Mean catalog progress of the members, rounded to one decimal
    pub progress: f64,
    pub dominant_stage: Stage,
    pub batch_status: BatchStatus,
    pub location: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub planted_at: Option<DateTime<Utc>>,
    #[serde(rename = "memberTraySummaries")]
    pub trays: Vec<TraySummary>,
}

/// Per-tray row used by the flat listing mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatTrayView {
    pub tray_id: i64,
    pub batch_code: String,
    pub tray_label: String,
    pub stage: Stage,
    pub status: TrayStatus,
    pub location: String,
    pub days_in_production: i64,
}

impl FlatTrayView {
    pub fn from_tray(tray: &Tray, now: DateTime<Utc>) -> Self {
        Self {
            tray_id: tray.id,
            batch_code: tray.batch_code.clone(),
            tray_label: tray.tray_label.clone(),
            stage: tray.stage,
            status: tray.status,
            location: tray.location.clone(),
            days_in_production: tray.days_in_production(now),
        }
    }
}
