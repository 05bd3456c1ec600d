//! In-memory tray store.
//!
//! Transactions are serialized on an async lock and work on a snapshot that replaces
//! the shared state on commit. That gives the same isolation a row-locking database
//! gives the bulk paths, without a server.

use super::{TrayFilter, TrayStore, TrayTransaction};
use crate::error::{Result, SproutError};
use crate::models::{NewTray, Tray};
use crate::query_builder::{Pagination, SortField, TraySort};
use crate::services::batch_code::compare_batch_codes;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    trays: BTreeMap<i64, Tray>,
    next_id: i64,
    batch_sequence: i64,
    /// Mutations against these ids fail, for exercising partial-failure paths
    failing_ids: HashSet<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTrayStore {
    state: Arc<Mutex<MemoryState>>,
    tx_lock: Arc<tokio::sync::Mutex<()>>,
}

impl InMemoryTrayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed tray directly, bypassing transactions. Assigns a fresh id
    /// when `tray.id` is 0.
    pub fn seed(&self, mut tray: Tray) -> Tray {
        let mut state = self.state.lock();
        if tray.id == 0 {
            state.next_id += 1;
            tray.id = state.next_id;
        } else {
            state.next_id = state.next_id.max(tray.id);
        }
        state.trays.insert(tray.id, tray.clone());
        tray
    }

    /// Make every later mutation of `tray_id` fail with a database error
    pub fn inject_failure(&self, tray_id: i64) {
        self.state.lock().failing_ids.insert(tray_id);
    }

    pub fn clear_failures(&self) {
        self.state.lock().failing_ids.clear();
    }

    /// Snapshot of every stored tray, deleted ones included
    pub fn snapshot(&self) -> Vec<Tray> {
        self.state.lock().trays.values().cloned().collect()
    }

    fn compare(sort: &TraySort, a: &Tray, b: &Tray) -> Ordering {
        let ordering = match sort.field {
            SortField::BatchCode => compare_batch_codes(&a.batch_code, &b.batch_code),
            SortField::Stage | SortField::Progress => a.stage.sort_order().cmp(&b.stage.sort_order()),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::PlantedAt => a
                .planted_at
                .unwrap_or(a.created_at)
                .cmp(&b.planted_at.unwrap_or(b.created_at)),
            SortField::CreatedAt | SortField::TotalTrays => a.created_at.cmp(&b.created_at),
        };
        sort.direction.apply(ordering).then_with(|| a.id.cmp(&b.id))
    }
}

#[async_trait]
impl TrayStore for InMemoryTrayStore {
    async fn begin(&self) -> Result<Box<dyn TrayTransaction>> {
        let guard = Arc::clone(&self.tx_lock).lock_owned().await;
        let working = self.state.lock().clone();
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.state),
            working,
            _guard: guard,
        }))
    }

    async fn find(&self, id: i64) -> Result<Option<Tray>> {
        let state = self.state.lock();
        Ok(state.trays.get(&id).filter(|tray| !tray.is_deleted()).cloned())
    }

    async fn list(&self, filter: &TrayFilter) -> Result<Vec<Tray>> {
        let state = self.state.lock();
        Ok(state
            .trays
            .values()
            .filter(|tray| filter.matches(tray))
            .cloned()
            .collect())
    }

    async fn page(
        &self,
        filter: &TrayFilter,
        sort: &TraySort,
        pagination: &Pagination,
    ) -> Result<(Vec<Tray>, u64)> {
        let mut trays = self.list(filter).await?;
        trays.sort_by(|a, b| Self::compare(sort, a, b));
        let total = trays.len() as u64;
        Ok((pagination.slice(trays), total))
    }

    async fn find_many(&self, ids: &[i64], include_deleted: bool) -> Result<Vec<Tray>> {
        let state = self.state.lock();
        Ok(select_ids(&state, ids, include_deleted))
    }

    async fn find_by_batch_codes(
        &self,
        codes: &[String],
        include_deleted: bool,
    ) -> Result<Vec<Tray>> {
        let state = self.state.lock();
        Ok(select_batches(&state, codes, include_deleted))
    }

    async fn all_batch_codes(&self) -> Result<Vec<String>> {
        let state = self.state.lock();
        Ok(distinct_codes(&state))
    }

    async fn batch_sequence_value(&self) -> Result<i64> {
        Ok(self.state.lock().batch_sequence)
    }
}

fn select_ids(state: &MemoryState, ids: &[i64], include_deleted: bool) -> Vec<Tray> {
    let wanted: BTreeSet<i64> = ids.iter().copied().collect();
    wanted
        .into_iter()
        .filter_map(|id| state.trays.get(&id))
        .filter(|tray| include_deleted || !tray.is_deleted())
        .cloned()
        .collect()
}

fn select_batches(state: &MemoryState, codes: &[String], include_deleted: bool) -> Vec<Tray> {
    let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();
    state
        .trays
        .values()
        .filter(|tray| wanted.contains(tray.batch_code.as_str()))
        .filter(|tray| include_deleted || !tray.is_deleted())
        .cloned()
        .collect()
}

fn distinct_codes(state: &MemoryState) -> Vec<String> {
    let codes: BTreeSet<&str> = state
        .trays
        .values()
        .map(|tray| tray.batch_code.as_str())
        .collect();
    codes.into_iter().map(str::to_string).collect()
}

pub struct InMemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    _guard: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    fn check_injected(&self, id: i64) -> Result<()> {
        if self.working.failing_ids.contains(&id) {
            return Err(SproutError::DatabaseError(format!(
                "injected failure for tray {id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TrayTransaction for InMemoryTransaction {
    async fn lock_trays(&mut self, ids: &[i64]) -> Result<Vec<Tray>> {
        Ok(select_ids(&self.working, ids, false))
    }

    async fn lock_batches(&mut self, codes: &[String]) -> Result<Vec<Tray>> {
        Ok(select_batches(&self.working, codes, false))
    }

    async fn insert_tray(&mut self, new_tray: NewTray) -> Result<Tray> {
        self.working.next_id += 1;
        let tray = Tray::from_new(self.working.next_id, new_tray);
        self.working.trays.insert(tray.id, tray.clone());
        Ok(tray)
    }

    async fn update_tray(&mut self, tray: &Tray) -> Result<Tray> {
        self.check_injected(tray.id)?;
        match self.working.trays.get_mut(&tray.id) {
            Some(stored) if !stored.is_deleted() => {
                *stored = tray.clone();
                Ok(stored.clone())
            }
            _ => Err(SproutError::not_found(format!("tray {}", tray.id))),
        }
    }

    async fn soft_delete(&mut self, id: i64, at: DateTime<Utc>) -> Result<()> {
        self.check_injected(id)?;
        match self.working.trays.get_mut(&id) {
            Some(stored) if !stored.is_deleted() => {
                stored.deleted_at = Some(at);
                stored.updated_at = at;
                Ok(())
            }
            _ => Err(SproutError::not_found(format!("tray {id}"))),
        }
    }

    async fn lock_batch_sequence(&mut self) -> Result<i64> {
        Ok(self.working.batch_sequence)
    }

    async fn set_batch_sequence(&mut self, value: i64) -> Result<()> {
        self.working.batch_sequence = value;
        Ok(())
    }

    async fn batch_codes(&mut self) -> Result<Vec<String>> {
        Ok(distinct_codes(&self.working))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut shared = this.shared.lock();
        // Failure injection may have been configured while this transaction was open
        let failing_ids = std::mem::take(&mut shared.failing_ids);
        *shared = this.working;
        shared.failing_ids = failing_ids;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::SortDirection;
    use crate::state_machine::Stage;

    fn new_tray(batch_code: &str, label: &str) -> NewTray {
        NewTray {
            batch_code: batch_code.to_string(),
            tray_label: label.to_string(),
            tray_number: "01".to_string(),
            location: format!("Rack - {label}"),
            position_x: 1,
            position_y: 1,
            notes: None,
            planted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_uncommitted_work_is_invisible() {
        let store = InMemoryTrayStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_tray(new_tray("1", "A1")).await.unwrap();
        tx.rollback().await.unwrap();

        assert!(store.list(&TrayFilter::live()).await.unwrap().is_empty());

        let mut tx = store.begin().await.unwrap();
        let tray = tx.insert_tray(new_tray("1", "A1")).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.find(tray.id).await.unwrap(), Some(tray));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_codes() {
        let store = InMemoryTrayStore::new();
        let tray = store.seed(Tray::from_new(0, new_tray("4", "A1")));

        let mut tx = store.begin().await.unwrap();
        tx.soft_delete(tray.id, Utc::now()).await.unwrap();
        let again = tx.soft_delete(tray.id, Utc::now()).await;
        assert!(matches!(again, Err(SproutError::NotFound(_))));
        tx.commit().await.unwrap();

        assert_eq!(store.find(tray.id).await.unwrap(), None);
        assert_eq!(store.find_many(&[tray.id], true).await.unwrap().len(), 1);
        assert_eq!(store.all_batch_codes().await.unwrap(), vec!["4".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_tray_untouched() {
        let store = InMemoryTrayStore::new();
        let tray = store.seed(Tray::from_new(0, new_tray("1", "A1")));
        store.inject_failure(tray.id);

        let mut tx = store.begin().await.unwrap();
        let mut changed = tray.clone();
        changed.stage = Stage::Germination;
        assert!(tx.update_tray(&changed).await.is_err());
        tx.commit().await.unwrap();

        assert_eq!(store.find(tray.id).await.unwrap().unwrap().stage, Stage::Soaking);
    }

    #[tokio::test]
    async fn test_page_sorts_batch_codes_numerically() {
        let store = InMemoryTrayStore::new();
        for code in ["10", "9", "LEGACY", "100"] {
            store.seed(Tray::from_new(0, new_tray(code, "A1")));
        }

        let sort = TraySort::new(SortField::BatchCode, SortDirection::Asc);
        let (page, total) = store
            .page(&TrayFilter::live(), &sort, &Pagination::new(1, 3))
            .await
            .unwrap();

        assert_eq!(total, 4);
        let codes: Vec<&str> = page.iter().map(|tray| tray.batch_code.as_str()).collect();
        assert_eq!(codes, vec!["9", "10", "100"]);
    }
}
