//! # Tray Model
//!
//! One row per physical growing tray.
//!
//! ## Overview
//!
//! A `Tray` carries its current [`Stage`] and [`TrayStatus`], a timestamp for every
//! stage it has entered, and yield/quality data recorded at harvest. Trays are grouped
//! into batches purely by equal `batch_code` values; there is no batch table.
//!
//! ## Database Schema
//!
//! Maps to the `trays` table:
//! - `id`: Primary key (BIGSERIAL)
//! - `uuid`: External identity (UUID, unique)
//! - `batch_code`: Shared batch identifier (VARCHAR, indexed, not a foreign key)
//! - `stage` / `status`: Slugs of the stage catalog and status enum (VARCHAR)
//! - `deleted_at`: Soft-delete marker (TIMESTAMPTZ, NULL while live)
//!
//! Soft-deleted rows are never removed. The batch code generator scans them so a code
//! is never issued twice.

use crate::error::SproutError;
use crate::state_machine::{Stage, TrayStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// Harvest quality grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grade = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(grade)
    }
}

impl std::str::FromStr for QualityGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "F" => Ok(Self::F),
            _ => Err(format!("Invalid quality grade: {s}")),
        }
    }
}

/// A physical tray and everything recorded about its production run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tray {
    pub id: i64,
    pub uuid: Uuid,
    pub batch_code: String,
    pub tray_label: String,
    pub tray_number: String,
    pub location: String,
    pub position_x: i32,
    pub position_y: i32,
    pub stage: Stage,
    pub status: TrayStatus,
    pub stage_entered_at: DateTime<Utc>,
    pub planted_at: Option<DateTime<Utc>>,
    pub soak_started_at: Option<DateTime<Utc>>,
    pub germination_started_at: Option<DateTime<Utc>>,
    pub blackout_started_at: Option<DateTime<Utc>>,
    pub light_started_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub harvested_at: Option<DateTime<Utc>>,
    pub harvested_weight_grams: Option<f64>,
    pub yield_percentage: Option<f64>,
    pub quality_grade: Option<QualityGrade>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// New Tray for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTray {
    pub batch_code: String,
    pub tray_label: String,
    pub tray_number: String,
    pub location: String,
    pub position_x: i32,
    pub position_y: i32,
    pub notes: Option<String>,
    pub planted_at: DateTime<Utc>,
}

impl Tray {
    /// Materialize a freshly inserted tray: first stage, active, all entry stamps at `planted_at`.
    pub fn from_new(id: i64, new_tray: NewTray) -> Self {
        let now = new_tray.planted_at;
        Self {
            id,
            uuid: Uuid::new_v4(),
            batch_code: new_tray.batch_code,
            tray_label: new_tray.tray_label,
            tray_number: new_tray.tray_number,
            location: new_tray.location,
            position_x: new_tray.position_x,
            position_y: new_tray.position_y,
            stage: Stage::first(),
            status: TrayStatus::Active,
            stage_entered_at: now,
            planted_at: Some(now),
            soak_started_at: Some(now),
            germination_started_at: None,
            blackout_started_at: None,
            light_started_at: None,
            ready_at: None,
            harvested_at: None,
            harvested_weight_grams: None,
            yield_percentage: None,
            quality_grade: None,
            notes: new_tray.notes,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.status == TrayStatus::Active
    }

    /// Human label used in operator-facing messages, e.g. `"12-A3"`
    pub fn display_label(&self) -> String {
        format!("{}-{}", self.batch_code, self.tray_label)
    }

    /// Whole days since planting, falling back to creation time.
    pub fn days_in_production(&self, now: DateTime<Utc>) -> i64 {
        let started = self.planted_at.unwrap_or(self.created_at);
        (now - started).num_days().max(0)
    }

    /// When the tray entered `stage`, if it has
    pub fn stage_entry(&self, stage: Stage) -> Option<DateTime<Utc>> {
        match stage {
            Stage::Soaking => self.soak_started_at,
            Stage::Germination => self.germination_started_at,
            Stage::Blackout => self.blackout_started_at,
            Stage::Light => self.light_started_at,
            Stage::Ready => self.ready_at,
            Stage::Harvested => self.harvested_at,
        }
    }

    /// Stamp the per-stage entry column for `stage`
    pub fn stamp_stage_entry(&mut self, stage: Stage, at: DateTime<Utc>) {
        let slot = match stage {
            Stage::Soaking => &mut self.soak_started_at,
            Stage::Germination => &mut self.germination_started_at,
            Stage::Blackout => &mut self.blackout_started_at,
            Stage::Light => &mut self.light_started_at,
            Stage::Ready => &mut self.ready_at,
            Stage::Harvested => &mut self.harvested_at,
        };
        *slot = Some(at);
    }

    /// Percentage of the catalog this tray has passed through
    pub fn progress(&self) -> f64 {
        f64::from(self.stage.sort_order()) / f64::from(Stage::max_sort_order()) * 100.0
    }
}

/// Raw `trays` row as read by sqlx; stage, status and grade are still strings.
#[derive(Debug, Clone, FromRow)]
pub struct TrayRow {
    pub id: i64,
    pub uuid: Uuid,
    pub batch_code: String,
    pub tray_label: String,
    pub tray_number: String,
    pub location: String,
    pub position_x: i32,
    pub position_y: i32,
    pub stage: String,
    pub status: String,
    pub stage_entered_at: DateTime<Utc>,
    pub planted_at: Option<DateTime<Utc>>,
    pub soak_started_at: Option<DateTime<Utc>>,
    pub germination_started_at: Option<DateTime<Utc>>,
    pub blackout_started_at: Option<DateTime<Utc>>,
    pub light_started_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub harvested_at: Option<DateTime<Utc>>,
    pub harvested_weight_grams: Option<f64>,
    pub yield_percentage: Option<f64>,
    pub quality_grade: Option<String>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Column list shared by every `SELECT` against `trays`
pub const TRAY_COLUMNS: &str = "id, uuid, batch_code, tray_label, tray_number, location, \
    position_x, position_y, stage, status, stage_entered_at, planted_at, soak_started_at, \
    germination_started_at, blackout_started_at, light_started_at, ready_at, harvested_at, \
    harvested_weight_grams, yield_percentage, quality_grade, notes, failure_reason, \
    created_at, updated_at, deleted_at";

impl TryFrom<TrayRow> for Tray {
    type Error = SproutError;

    fn try_from(row: TrayRow) -> Result<Self, Self::Error> {
        let stage = row
            .stage
            .parse::<Stage>()
            .map_err(|e| SproutError::DatabaseError(format!("tray {}: {e}", row.id)))?;
        let status = row
            .status
            .parse::<TrayStatus>()
            .map_err(|e| SproutError::DatabaseError(format!("tray {}: {e}", row.id)))?;
        let quality_grade = row
            .quality_grade
            .as_deref()
            .map(str::parse::<QualityGrade>)
            .transpose()
            .map_err(|e| SproutError::DatabaseError(format!("tray {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            uuid: row.uuid,
            batch_code: row.batch_code,
            tray_label: row.tray_label,
            tray_number: row.tray_number,
            location: row.location,
            position_x: row.position_x,
            position_y: row.position_y,
            stage,
            status,
            stage_entered_at: row.stage_entered_at,
            planted_at: row.planted_at,
            soak_started_at: row.soak_started_at,
            germination_started_at: row.germination_started_at,
            blackout_started_at: row.blackout_started_at,
            light_started_at: row.light_started_at,
            ready_at: row.ready_at,
            harvested_at: row.harvested_at,
            harvested_weight_grams: row.harvested_weight_grams,
            yield_percentage: row.yield_percentage,
            quality_grade,
            notes: row.notes,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}
