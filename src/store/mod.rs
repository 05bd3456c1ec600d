//! # Tray Store
//!
//! Storage boundary for trays. [`PgTrayStore`] is the production implementation;
//! [`InMemoryTrayStore`] backs tests and demos with the same semantics.
//!
//! Reads through [`TrayStore`] see committed data only. Every mutation goes through a
//! [`TrayTransaction`], and each mutating call inside it runs under its own savepoint so
//! one failed item does not poison the rest of the transaction.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryTrayStore;
pub use postgres::PgTrayStore;

use crate::error::Result;
use crate::models::{NewTray, Tray};
use crate::query_builder::{Pagination, TraySort};
use crate::state_machine::{Stage, TrayStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row filter applied before any grouping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrayFilter {
    /// Case-insensitive substring over batch code, label, location and notes
    pub search: Option<String>,
    pub status: Option<TrayStatus>,
    pub stage: Option<Stage>,
    pub include_deleted: bool,
}

impl TrayFilter {
    pub fn live() -> Self {
        Self::default()
    }

    /// Normalized search term, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    pub fn matches(&self, tray: &Tray) -> bool {
        if !self.include_deleted && tray.is_deleted() {
            return false;
        }
        if self.status.is_some_and(|status| tray.status != status) {
            return false;
        }
        if self.stage.is_some_and(|stage| tray.stage != stage) {
            return false;
        }

        match self.search_term() {
            None => true,
            Some(term) => {
                let needle = term.to_lowercase();
                [
                    Some(tray.batch_code.as_str()),
                    Some(tray.tray_label.as_str()),
                    Some(tray.location.as_str()),
                    tray.notes.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|haystack| haystack.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Committed-read access to trays
#[async_trait]
pub trait TrayStore: Send + Sync {
    /// Open a transaction for read-modify-write work
    async fn begin(&self) -> Result<Box<dyn TrayTransaction>>;

    /// Live tray by id
    async fn find(&self, id: i64) -> Result<Option<Tray>>;

    /// Every tray matching `filter`, ascending by id
    async fn list(&self, filter: &TrayFilter) -> Result<Vec<Tray>>;

    /// One sorted page of trays matching `filter`, with the unpaginated total
    async fn page(
        &self,
        filter: &TrayFilter,
        sort: &TraySort,
        pagination: &Pagination,
    ) -> Result<(Vec<Tray>, u64)>;

    /// Trays with the given ids, ascending by id
    async fn find_many(&self, ids: &[i64], include_deleted: bool) -> Result<Vec<Tray>>;

    /// Members of the given batches, ascending by id
    async fn find_by_batch_codes(&self, codes: &[String], include_deleted: bool)
        -> Result<Vec<Tray>>;

    /// Distinct batch codes on every tray ever written, soft-deleted rows included
    async fn all_batch_codes(&self) -> Result<Vec<String>>;

    /// Current value of the batch code counter
    async fn batch_sequence_value(&self) -> Result<i64>;
}

/// A unit of work against the tray store.
///
/// Dropping a transaction without committing rolls it back.
#[async_trait]
pub trait TrayTransaction: Send {
    /// Lock and return the live trays with the given ids, ascending by id
    async fn lock_trays(&mut self, ids: &[i64]) -> Result<Vec<Tray>>;

    /// Lock and return the live members of the given batches, ascending by id
    async fn lock_batches(&mut self, codes: &[String]) -> Result<Vec<Tray>>;

    async fn insert_tray(&mut self, new_tray: NewTray) -> Result<Tray>;

    /// Persist the mutable lifecycle fields of a live tray
    async fn update_tray(&mut self, tray: &Tray) -> Result<Tray>;

    /// Mark a live tray deleted; `NotFound` if it is missing or already deleted
    async fn soft_delete(&mut self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Lock the batch code counter row and return its value
    async fn lock_batch_sequence(&mut self) -> Result<i64>;

    async fn set_batch_sequence(&mut self, value: i64) -> Result<()>;

    /// Distinct batch codes visible to this transaction, soft-deleted rows included
    async fn batch_codes(&mut self) -> Result<Vec<String>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Escape `%`, `_` and `\` for use inside a LIKE pattern
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
