//! # Tray Service
//!
//! The operational surface of the core. Every call authorizes through the injected
//! [`AuthorizationProvider`] and touches trays only through a [`TrayStore`].
//!
//! Single-tray calls fail outright on denial. Bulk calls delegate to the
//! [`BulkCoordinator`], where denial is recorded per item.

use crate::auth::{Actor, AuthorizationProvider};
use crate::config::SproutConfig;
use crate::constants;
use crate::error::{Result, SproutError};
use crate::logging::log_tray_operation;
use crate::models::{NewTray, QualityGrade, Tray, TraySummary};
use crate::services::batch_code::BatchCodeGenerator;
use crate::services::bulk::{ensure_distinct_within, BulkCoordinator, BulkOperation, BulkSummary};
use crate::services::listing::{self, ListRequest, ListResponse};
use crate::state_machine::{tray_state_machine, Stage, StageInfo, TrayEvent};
use crate::store::{TrayFilter, TrayStore, TrayTransaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub tray_labels: Vec<String>,
    pub location_prefix: String,
    pub notes: Option<String>,
}

impl CreateBatchRequest {
    pub fn validate(&self, max_trays: usize) -> Result<()> {
        if self.tray_labels.is_empty() {
            return Err(SproutError::validation("at least one tray label is required"));
        }
        ensure_distinct_within(&self.tray_labels, max_trays, "tray labels")?;

        for label in &self.tray_labels {
            if label.is_empty() || label.len() > constants::fields::MAX_TRAY_LABEL_LENGTH {
                return Err(SproutError::validation(format!(
                    "tray label '{label}' must be 1 to {} characters",
                    constants::fields::MAX_TRAY_LABEL_LENGTH
                )));
            }
            if !label
                .chars()
                .all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit())
            {
                return Err(SproutError::validation(format!(
                    "tray label '{label}' may contain only A-Z and 0-9"
                )));
            }
        }

        if self.location_prefix.trim().is_empty() {
            return Err(SproutError::validation("location prefix is required"));
        }
        if self.location_prefix.chars().count() > constants::fields::MAX_LOCATION_LENGTH {
            return Err(SproutError::validation(format!(
                "location prefix may be at most {} characters",
                constants::fields::MAX_LOCATION_LENGTH
            )));
        }
        if let Some(notes) = &self.notes {
            if notes.chars().count() > constants::fields::MAX_NOTES_LENGTH {
                return Err(SproutError::validation(format!(
                    "notes may be at most {} characters",
                    constants::fields::MAX_NOTES_LENGTH
                )));
            }
        }
        Ok(())
    }

    /// Row for the `index`-th (0-based) label, laid out on a ten-column grid
    fn new_tray(&self, batch_code: &str, index: usize, label: &str, planted_at: DateTime<Utc>) -> NewTray {
        let number = index + 1;
        let columns = constants::batch::GRID_COLUMNS;
        let notes = match self.notes.as_deref().map(str::trim) {
            Some(notes) if !notes.is_empty() => format!("{notes} (Tray {label})"),
            _ => format!("Tray {label}"),
        };

        NewTray {
            batch_code: batch_code.to_string(),
            tray_label: label.to_string(),
            tray_number: format!("{number:02}"),
            location: format!("{} - {label}", self.location_prefix),
            position_x: (index % columns + 1) as i32,
            position_y: (index / columns + 1) as i32,
            notes: Some(notes),
            planted_at,
        }
    }
}

/// Direct edit of one tray's recorded data. `None` leaves a field unchanged; an empty
/// `notes` or `failure_reason` clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrayUpdate {
    pub location: Option<String>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub harvested_weight_grams: Option<f64>,
    pub yield_percentage: Option<f64>,
    pub quality_grade: Option<QualityGrade>,
}

impl TrayUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(SproutError::validation("no tray fields to update"));
        }
        if let Some(location) = &self.location {
            if location.trim().is_empty() {
                return Err(SproutError::validation("location must not be blank"));
            }
            check_length("location", location, constants::fields::MAX_LOCATION_LENGTH)?;
        }
        if let Some(notes) = &self.notes {
            check_length("notes", notes, constants::fields::MAX_NOTES_LENGTH)?;
        }
        if let Some(reason) = &self.failure_reason {
            check_length(
                "failure reason",
                reason,
                constants::fields::MAX_FAILURE_REASON_LENGTH,
            )?;
        }
        if let Some(weight) = self.harvested_weight_grams {
            check_range("harvested weight", weight, constants::fields::MAX_HARVESTED_WEIGHT_GRAMS)?;
        }
        if let Some(yield_percentage) = self.yield_percentage {
            check_range("yield percentage", yield_percentage, constants::fields::MAX_YIELD_PERCENTAGE)?;
        }
        Ok(())
    }

    fn apply_to(&self, tray: &mut Tray, now: DateTime<Utc>) {
        if let Some(location) = &self.location {
            tray.location = location.trim().to_string();
        }
        if let Some(notes) = &self.notes {
            tray.notes = non_blank(notes);
        }
        if let Some(reason) = &self.failure_reason {
            tray.failure_reason = non_blank(reason);
        }
        if let Some(weight) = self.harvested_weight_grams {
            tray.harvested_weight_grams = Some(weight);
        }
        if let Some(yield_percentage) = self.yield_percentage {
            tray.yield_percentage = Some(yield_percentage);
        }
        if let Some(grade) = self.quality_grade {
            tray.quality_grade = Some(grade);
        }
        tray.updated_at = now;
    }
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(SproutError::validation(format!(
            "{field} may be at most {max} characters"
        )));
    }
    Ok(())
}

fn check_range(field: &str, value: f64, max: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=max).contains(&value) {
        return Err(SproutError::validation(format!(
            "{field} must be between 0 and {max}, got {value}"
        )));
    }
    Ok(())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBatch {
    pub batch_code: String,
    pub trays: Vec<Tray>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrayDetail {
    pub tray: Tray,
    pub stage: StageInfo,
    pub next_stage: Option<StageInfo>,
    pub days_in_production: i64,
    /// Live trays sharing this tray's batch code, itself included
    pub batch_trays: Vec<TraySummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCount {
    pub stage: Stage,
    pub count: usize,
}

/// Dashboard counters over live active trays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrayStatistics {
    pub total_active: usize,
    pub harvest_ready: usize,
    pub active_batches: usize,
    /// One entry per catalog stage, in catalog order
    pub by_stage: Vec<StageCount>,
}

pub struct TrayService {
    store: Arc<dyn TrayStore>,
    auth: Arc<dyn AuthorizationProvider>,
    config: SproutConfig,
}

impl TrayService {
    pub fn new(
        store: Arc<dyn TrayStore>,
        auth: Arc<dyn AuthorizationProvider>,
        config: SproutConfig,
    ) -> Self {
        Self {
            store,
            auth,
            config,
        }
    }

    pub fn config(&self) -> &SproutConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TrayStore> {
        &self.store
    }

    fn coordinator(&self) -> BulkCoordinator<'_> {
        BulkCoordinator::new(self.store.as_ref(), self.auth.as_ref(), &self.config.bulk)
    }

    /// Plant a new batch: allocate a code and insert one tray per label
    pub async fn create_batch(
        &self,
        actor: &Actor,
        request: &CreateBatchRequest,
    ) -> Result<CreatedBatch> {
        if !self.auth.can_create(actor).await {
            return Err(SproutError::denied("create", "trays"));
        }
        request.validate(self.config.batch.max_trays_per_batch)?;

        let mut tx = self.store.begin().await?;
        let batch_code = BatchCodeGenerator::allocate(tx.as_mut()).await?;

        let now = Utc::now();
        let mut trays = Vec::with_capacity(request.tray_labels.len());
        for (index, label) in request.tray_labels.iter().enumerate() {
            let new_tray = request.new_tray(&batch_code, index, label, now);
            trays.push(tx.insert_tray(new_tray).await?);
        }
        tx.commit().await?;

        let details = format!("{} trays at {}", trays.len(), request.location_prefix);
        log_tray_operation("create_batch", None, Some(&batch_code), "completed", Some(&details));

        Ok(CreatedBatch { batch_code, trays })
    }

    /// Preview the code the next create-batch would receive
    pub async fn next_batch_code(&self, actor: &Actor) -> Result<String> {
        if !self.auth.can_create(actor).await {
            return Err(SproutError::denied("create", "trays"));
        }
        BatchCodeGenerator::preview(self.store.as_ref()).await
    }

    pub async fn advance_one(&self, actor: &Actor, tray_id: i64) -> Result<Tray> {
        self.transition_one(actor, tray_id, TrayEvent::Advance).await
    }

    /// Mark an active tray failed; `reason` is required
    pub async fn fail_tray(&self, actor: &Actor, tray_id: i64, reason: &str) -> Result<Tray> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SproutError::validation("a failure reason is required"));
        }
        if reason.chars().count() > constants::fields::MAX_FAILURE_REASON_LENGTH {
            return Err(SproutError::validation(format!(
                "failure reason may be at most {} characters",
                constants::fields::MAX_FAILURE_REASON_LENGTH
            )));
        }
        self.transition_one(actor, tray_id, TrayEvent::fail_with_reason(reason))
            .await
    }

    pub async fn cancel_tray(&self, actor: &Actor, tray_id: i64) -> Result<Tray> {
        self.transition_one(actor, tray_id, TrayEvent::Cancel).await
    }

    async fn transition_one(&self, actor: &Actor, tray_id: i64, event: TrayEvent) -> Result<Tray> {
        let mut tx = self.store.begin().await?;
        let locked = lock_one(tx.as_mut(), tray_id).await?;
        if !self.auth.can_update(actor, &locked).await {
            tx.rollback().await?;
            return Err(SproutError::denied(
                "update",
                format!("tray {}", locked.display_label()),
            ));
        }

        let updated = tray_state_machine::apply(locked, &event, Utc::now())?;
        let saved = tx.update_tray(&updated).await?;
        tx.commit().await?;

        log_tray_operation(
            event.event_type(),
            Some(saved.id),
            Some(&saved.batch_code),
            "completed",
            Some(event.failure_reason().unwrap_or(saved.stage.slug())),
        );
        Ok(saved)
    }

    /// Edit the recorded data of one live tray. Stage and status only change through
    /// lifecycle events.
    pub async fn update_tray(&self, actor: &Actor, tray_id: i64, update: &TrayUpdate) -> Result<Tray> {
        update.validate()?;

        let mut tx = self.store.begin().await?;
        let mut tray = lock_one(tx.as_mut(), tray_id).await?;
        if !self.auth.can_update(actor, &tray).await {
            tx.rollback().await?;
            return Err(SproutError::denied(
                "update",
                format!("tray {}", tray.display_label()),
            ));
        }

        update.apply_to(&mut tray, Utc::now());
        let saved = tx.update_tray(&tray).await?;
        tx.commit().await?;

        log_tray_operation("update", Some(saved.id), Some(&saved.batch_code), "completed", None);
        Ok(saved)
    }

    /// Soft-delete one live tray; returns it with `deleted_at` set
    pub async fn delete_one(&self, actor: &Actor, tray_id: i64) -> Result<Tray> {
        let mut tx = self.store.begin().await?;
        let mut tray = lock_one(tx.as_mut(), tray_id).await?;
        if !self.auth.can_delete(actor, &tray).await {
            tx.rollback().await?;
            return Err(SproutError::denied(
                "delete",
                format!("tray {}", tray.display_label()),
            ));
        }

        let now = Utc::now();
        tx.soft_delete(tray.id, now).await?;
        tx.commit().await?;
        tray.deleted_at = Some(now);
        tray.updated_at = now;

        let details = format!("deleted by {}", actor.name);
        log_tray_operation("delete", Some(tray.id), Some(&tray.batch_code), "completed", Some(&details));
        Ok(tray)
    }

    pub async fn advance_many(&self, actor: &Actor, tray_ids: &[i64]) -> Result<BulkSummary> {
        self.coordinator()
            .run_trays(actor, BulkOperation::Advance, tray_ids)
            .await
    }

    pub async fn advance_batches(&self, actor: &Actor, batch_codes: &[String]) -> Result<BulkSummary> {
        self.coordinator()
            .run_batches(actor, BulkOperation::Advance, batch_codes)
            .await
    }

    pub async fn delete_many(&self, actor: &Actor, tray_ids: &[i64]) -> Result<BulkSummary> {
        self.coordinator()
            .run_trays(actor, BulkOperation::Delete, tray_ids)
            .await
    }

    pub async fn delete_batches(&self, actor: &Actor, batch_codes: &[String]) -> Result<BulkSummary> {
        self.coordinator()
            .run_batches(actor, BulkOperation::Delete, batch_codes)
            .await
    }

    pub async fn list(&self, actor: &Actor, request: &ListRequest) -> Result<ListResponse> {
        if !self.auth.can_view_any(actor).await {
            return Err(SproutError::denied("view", "trays"));
        }
        let query = request.validate(&self.config.listing)?;
        listing::list(
            self.store.as_ref(),
            &query,
            self.config.batch.attention_failure_ratio,
        )
        .await
    }

    pub async fn tray_detail(&self, actor: &Actor, tray_id: i64) -> Result<TrayDetail> {
        let tray = self
            .store
            .find(tray_id)
            .await?
            .ok_or_else(|| SproutError::not_found(format!("tray {tray_id}")))?;
        if !self.auth.can_view(actor, &tray).await {
            return Err(SproutError::denied(
                "view",
                format!("tray {}", tray.display_label()),
            ));
        }

        let batch_trays = self
            .store
            .find_by_batch_codes(std::slice::from_ref(&tray.batch_code), false)
            .await?
            .iter()
            .map(TraySummary::from)
            .collect();

        Ok(TrayDetail {
            stage: tray.stage.info(),
            next_stage: tray.stage.next().map(|stage| stage.info()),
            days_in_production: tray.days_in_production(Utc::now()),
            batch_trays,
            tray,
        })
    }

    pub async fn statistics(&self, actor: &Actor) -> Result<TrayStatistics> {
        if !self.auth.can_view_any(actor).await {
            return Err(SproutError::denied("view", "trays"));
        }

        let active: Vec<Tray> = self
            .store
            .list(&TrayFilter::live())
            .await?
            .into_iter()
            .filter(Tray::is_active)
            .collect();

        let by_stage = Stage::ALL
            .iter()
            .map(|&stage| StageCount {
                stage,
                count: active.iter().filter(|tray| tray.stage == stage).count(),
            })
            .collect();
        let active_batches = active
            .iter()
            .map(|tray| tray.batch_code.as_str())
            .collect::<HashSet<_>>()
            .len();

        Ok(TrayStatistics {
            total_active: active.len(),
            harvest_ready: active.iter().filter(|tray| tray.stage.can_harvest()).count(),
            active_batches,
            by_stage,
        })
    }
}

/// Lock the live tray `tray_id` inside `tx`
async fn lock_one(tx: &mut dyn TrayTransaction, tray_id: i64) -> Result<Tray> {
    tx.lock_trays(&[tray_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| SproutError::not_found(format!("tray {tray_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(labels: &[&str]) -> CreateBatchRequest {
        CreateBatchRequest {
            tray_labels: labels.iter().map(|label| label.to_string()).collect(),
            location_prefix: "Rack1".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_label_rules() {
        assert!(request(&["A1", "B22", "0"]).validate(100).is_ok());
        assert!(request(&[]).validate(100).is_err());
        assert!(request(&["a1"]).validate(100).is_err());
        assert!(request(&["A-1"]).validate(100).is_err());
        assert!(request(&["ABCDEFGHIJK"]).validate(100).is_err());
        assert!(request(&["A1", "A1"]).validate(100).is_err());
        assert!(request(&["A1", "A2", "A3"]).validate(2).is_err());
    }

    #[test]
    fn test_location_and_notes_rules() {
        let mut blank = request(&["A1"]);
        blank.location_prefix = "  ".to_string();
        assert!(blank.validate(100).is_err());

        let mut long_notes = request(&["A1"]);
        long_notes.notes = Some("n".repeat(2001));
        assert!(long_notes.validate(100).is_err());
    }

    #[test]
    fn test_new_tray_layout() {
        let mut req = request(&["A1"]);
        let now = Utc::now();

        let first = req.new_tray("4", 0, "A1", now);
        assert_eq!(first.tray_number, "01");
        assert_eq!(first.location, "Rack1 - A1");
        assert_eq!(first.notes.as_deref(), Some("Tray A1"));
        assert_eq!((first.position_x, first.position_y), (1, 1));

        let eleventh = req.new_tray("4", 10, "K1", now);
        assert_eq!(eleventh.tray_number, "11");
        assert_eq!((eleventh.position_x, eleventh.position_y), (1, 2));

        req.notes = Some("Sunflower".to_string());
        let noted = req.new_tray("4", 9, "J1", now);
        assert_eq!(noted.notes.as_deref(), Some("Sunflower (Tray J1)"));
        assert_eq!((noted.position_x, noted.position_y), (10, 1));
    }

    #[test]
    fn test_tray_update_bounds() {
        assert!(TrayUpdate::default().validate().is_err());

        let weight = |grams: f64| TrayUpdate {
            harvested_weight_grams: Some(grams),
            ..TrayUpdate::default()
        };
        assert!(weight(0.0).validate().is_ok());
        assert!(weight(100_000.0).validate().is_ok());
        assert!(weight(100_000.5).validate().is_err());
        assert!(weight(-1.0).validate().is_err());
        assert!(weight(f64::NAN).validate().is_err());

        let yield_of = |pct: f64| TrayUpdate {
            yield_percentage: Some(pct),
            ..TrayUpdate::default()
        };
        assert!(yield_of(500.0).validate().is_ok());
        assert!(yield_of(500.1).validate().is_err());

        let location = |value: &str| TrayUpdate {
            location: Some(value.to_string()),
            ..TrayUpdate::default()
        };
        assert!(location(" ").validate().is_err());
        assert!(location(&"L".repeat(256)).validate().is_err());

        let notes = TrayUpdate {
            notes: Some("n".repeat(2001)),
            ..TrayUpdate::default()
        };
        assert!(notes.validate().is_err());

        let reason = TrayUpdate {
            failure_reason: Some("r".repeat(1001)),
            ..TrayUpdate::default()
        };
        assert!(reason.validate().is_err());
    }

    #[test]
    fn test_tray_update_leaves_unset_fields_alone() {
        let now = Utc::now();
        let mut tray = Tray::from_new(1, request(&["A1"]).new_tray("2", 0, "A1", now));
        let update = TrayUpdate {
            notes: Some("  ".to_string()),
            quality_grade: Some(QualityGrade::B),
            ..TrayUpdate::default()
        };
        update.apply_to(&mut tray, now);

        assert_eq!(tray.location, "Rack1 - A1");
        assert_eq!(tray.notes, None);
        assert_eq!(tray.quality_grade, Some(QualityGrade::B));
        assert_eq!(tray.harvested_weight_grams, None);
    }
}
