//! Tray fixtures for the in-memory store.

use chrono::{DateTime, Duration, Utc};
use sprout_core::auth::{Actor, AllowAll, AuthorizationProvider, Role};
use sprout_core::config::SproutConfig;
use sprout_core::models::{NewTray, Tray};
use sprout_core::services::TrayService;
use sprout_core::state_machine::{Stage, TrayStatus};
use sprout_core::store::{InMemoryTrayStore, TrayStore};
use std::sync::Arc;

pub fn manager() -> Actor {
    Actor::new(1, "morgan", Role::Manager)
}

pub fn grower() -> Actor {
    Actor::new(2, "robin", Role::Grower)
}

pub fn viewer() -> Actor {
    Actor::new(3, "sam", Role::Viewer)
}

/// Service over `store` with default config and the given policy
pub fn service_with(
    store: &InMemoryTrayStore,
    auth: Arc<dyn AuthorizationProvider>,
) -> TrayService {
    TrayService::new(Arc::new(store.clone()), auth, SproutConfig::default())
}

/// Service over any store double
pub fn service_over(store: Arc<dyn TrayStore>, auth: Arc<dyn AuthorizationProvider>) -> TrayService {
    TrayService::new(store, auth, SproutConfig::default())
}

pub fn allow_all_service(store: &InMemoryTrayStore) -> TrayService {
    service_with(store, Arc::new(AllowAll))
}

/// Builder for trays seeded straight into an [`InMemoryTrayStore`]
pub struct TrayBuilder {
    batch_code: String,
    label: String,
    stage: Stage,
    status: TrayStatus,
    location: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    deleted: bool,
}

impl TrayBuilder {
    pub fn new(batch_code: &str, label: &str) -> Self {
        Self {
            batch_code: batch_code.to_string(),
            label: label.to_string(),
            stage: Stage::Soaking,
            status: TrayStatus::Active,
            location: format!("Rack1 - {label}"),
            notes: None,
            created_at: Utc::now() - Duration::days(3),
            deleted: false,
        }
    }

    pub fn at_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    pub fn with_status(mut self, status: TrayStatus) -> Self {
        self.status = status;
        self
    }

    /// Harvested and completed
    pub fn harvested(self) -> Self {
        self.at_stage(Stage::Harvested).with_status(TrayStatus::Completed)
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    /// Created `days` days ago
    pub fn created_days_ago(mut self, days: i64) -> Self {
        self.created_at = Utc::now() - Duration::days(days);
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn seed(self, store: &InMemoryTrayStore) -> Tray {
        let mut tray = Tray::from_new(
            0,
            NewTray {
                batch_code: self.batch_code,
                tray_label: self.label.clone(),
                tray_number: "01".to_string(),
                location: self.location,
                position_x: 1,
                position_y: 1,
                notes: self.notes,
                planted_at: self.created_at,
            },
        );
        tray.stage = self.stage;
        tray.status = self.status;
        if self.deleted {
            tray.deleted_at = Some(Utc::now());
        }
        store.seed(tray)
    }
}

/// Seed `labels` as one active batch at the first stage
pub fn seed_batch(store: &InMemoryTrayStore, batch_code: &str, labels: &[&str]) -> Vec<Tray> {
    labels
        .iter()
        .map(|label| TrayBuilder::new(batch_code, label).seed(store))
        .collect()
}
