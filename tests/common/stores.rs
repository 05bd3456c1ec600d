//! Store doubles.

use async_trait::async_trait;
use sprout_core::error::Result;
use sprout_core::models::Tray;
use sprout_core::query_builder::{Pagination, TraySort};
use sprout_core::store::{InMemoryTrayStore, TrayFilter, TrayStore, TrayTransaction};

/// Serves committed reads from a snapshot taken at construction while transactions go
/// to the live store. Reads lag every mutation made after the snapshot.
#[derive(Debug, Clone)]
pub struct FrozenReadStore {
    live: InMemoryTrayStore,
    frozen: Vec<Tray>,
}

impl FrozenReadStore {
    pub fn freeze(live: &InMemoryTrayStore) -> Self {
        Self {
            live: live.clone(),
            frozen: live.snapshot(),
        }
    }

    fn frozen_where(&self, keep: impl Fn(&Tray) -> bool) -> Vec<Tray> {
        self.frozen.iter().filter(|tray| keep(tray)).cloned().collect()
    }
}

#[async_trait]
impl TrayStore for FrozenReadStore {
    async fn begin(&self) -> Result<Box<dyn TrayTransaction>> {
        self.live.begin().await
    }

    async fn find(&self, id: i64) -> Result<Option<Tray>> {
        Ok(self
            .frozen_where(|tray| tray.id == id && !tray.is_deleted())
            .into_iter()
            .next())
    }

    async fn list(&self, filter: &TrayFilter) -> Result<Vec<Tray>> {
        Ok(self.frozen_where(|tray| filter.matches(tray)))
    }

    async fn page(
        &self,
        filter: &TrayFilter,
        sort: &TraySort,
        pagination: &Pagination,
    ) -> Result<(Vec<Tray>, u64)> {
        self.live.page(filter, sort, pagination).await
    }

    async fn find_many(&self, ids: &[i64], include_deleted: bool) -> Result<Vec<Tray>> {
        Ok(self.frozen_where(|tray| {
            ids.contains(&tray.id) && (include_deleted || !tray.is_deleted())
        }))
    }

    async fn find_by_batch_codes(
        &self,
        codes: &[String],
        include_deleted: bool,
    ) -> Result<Vec<Tray>> {
        Ok(self.frozen_where(|tray| {
            codes.contains(&tray.batch_code) && (include_deleted || !tray.is_deleted())
        }))
    }

    async fn all_batch_codes(&self) -> Result<Vec<String>> {
        self.live.all_batch_codes().await
    }

    async fn batch_sequence_value(&self) -> Result<i64> {
        self.live.batch_sequence_value().await
    }
}
