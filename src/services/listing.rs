//! # Tray Listing
//!
//! Builds the paginated listing in either mode:
//!
//! - **Batches**: every matching tray is loaded, grouped, sorted and paginated in memory.
//! - **Trays**: filtering, sorting and pagination are pushed down to the store.

use crate::config::ListingConfig;
use crate::constants;
use crate::error::{Result, SproutError};
use crate::models::{BatchView, FlatTrayView};
use crate::query_builder::{PageInfo, Pagination, SortDirection, SortField, TraySort};
use crate::services::aggregation;
use crate::state_machine::{Stage, StageInfo, TrayStatus};
use crate::store::{TrayFilter, TrayStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Batches,
    Trays,
}

impl std::str::FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "batches" => Ok(Self::Batches),
            "trays" => Ok(Self::Trays),
            _ => Err(format!("Invalid view mode: {s}")),
        }
    }
}

/// Listing parameters; `None` fields take their defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub search: Option<String>,
    pub status: Option<TrayStatus>,
    pub stage: Option<Stage>,
    pub sort_by: Option<SortField>,
    pub sort_direction: Option<SortDirection>,
    pub view_mode: ViewMode,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Validated listing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: TrayFilter,
    pub sort: TraySort,
    pub view_mode: ViewMode,
    pub pagination: Pagination,
}

impl ListRequest {
    /// Apply defaults and bounds
    pub fn validate(&self, limits: &ListingConfig) -> Result<ListQuery> {
        if let Some(search) = &self.search {
            let length = search.chars().count();
            if length > constants::listing::MAX_SEARCH_LENGTH {
                return Err(SproutError::validation(format!(
                    "search may be at most {} characters, got {length}",
                    constants::listing::MAX_SEARCH_LENGTH
                )));
            }
        }

        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(SproutError::validation("page must be at least 1"));
        }

        let per_page = self.per_page.unwrap_or(limits.default_per_page);
        if per_page < limits.min_per_page || per_page > limits.max_per_page {
            return Err(SproutError::validation(format!(
                "per_page must be between {} and {}, got {per_page}",
                limits.min_per_page, limits.max_per_page
            )));
        }

        let field = self.sort_by.unwrap_or_default();
        if self.view_mode == ViewMode::Trays && field.is_batch_only() {
            return Err(SproutError::validation(format!(
                "sort field {field} is only available in batches mode"
            )));
        }

        Ok(ListQuery {
            filter: TrayFilter {
                search: self.search.clone(),
                status: self.status,
                stage: self.stage,
                include_deleted: false,
            },
            sort: TraySort::new(field, self.sort_direction.unwrap_or_default()),
            view_mode: self.view_mode,
            pagination: Pagination::new(page, per_page),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "data", rename_all = "snake_case")]
pub enum ListItems {
    Batches(Vec<BatchView>),
    Trays(Vec<FlatTrayView>),
}

impl ListItems {
    pub fn len(&self) -> usize {
        match self {
            Self::Batches(batches) => batches.len(),
            Self::Trays(trays) => trays.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Filters as applied, echoed back for the caller to round-trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterEcho {
    pub search: Option<String>,
    pub status: Option<TrayStatus>,
    pub stage: Option<Stage>,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
    pub view_mode: ViewMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub items: ListItems,
    pub page_info: PageInfo,
    pub filters: FilterEcho,
    pub stages: Vec<StageInfo>,
}

/// Run a validated listing against `store`
pub async fn list(
    store: &dyn TrayStore,
    query: &ListQuery,
    attention_ratio: f64,
) -> Result<ListResponse> {
    let (items, total) = match query.view_mode {
        ViewMode::Batches => {
            let trays = store.list(&query.filter).await?;
            let mut batches = aggregation::aggregate(&trays, attention_ratio);
            aggregation::sort_batches(&mut batches, &query.sort);
            let total = batches.len() as u64;
            (ListItems::Batches(query.pagination.slice(batches)), total)
        }
        ViewMode::Trays => {
            let (trays, total) = store
                .page(&query.filter, &query.sort, &query.pagination)
                .await?;
            let now = Utc::now();
            let views = trays
                .iter()
                .map(|tray| FlatTrayView::from_tray(tray, now))
                .collect();
            (ListItems::Trays(views), total)
        }
    };

    tracing::debug!(
        view_mode = ?query.view_mode,
        total = total,
        returned = items.len(),
        "Listed trays"
    );

    Ok(ListResponse {
        items,
        page_info: query.pagination.page_info(total),
        filters: FilterEcho {
            search: query.filter.search_term().map(str::to_string),
            status: query.filter.status,
            stage: query.filter.stage,
            sort_by: query.sort.field,
            sort_direction: query.sort.direction,
            view_mode: query.view_mode,
        },
        stages: Stage::catalog(),
    })
}
