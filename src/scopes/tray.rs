//! # Tray Scopes
//!
//! Chainable query scopes over the `trays` table, built on sqlx's `QueryBuilder`.
//! All values are bound; only fixed column names and keywords are pushed as SQL.

use crate::error::Result;
use crate::models::{Tray, TrayRow, TRAY_COLUMNS};
use crate::query_builder::{Pagination, SortField, TraySort};
use crate::state_machine::Stage;
use crate::store::{escape_like, TrayFilter};
use sqlx::{Executor, Postgres, QueryBuilder};

/// Query builder for Tray scopes
pub struct TrayScope {
    query: QueryBuilder<'static, Postgres>,
    has_conditions: bool,
}

impl Tray {
    /// Start building a scoped query
    pub fn scope() -> TrayScope {
        TrayScope {
            query: QueryBuilder::new(format!("SELECT {TRAY_COLUMNS} FROM trays")),
            has_conditions: false,
        }
    }

    /// Start building a `COUNT(*)` query with the same scopes
    pub fn count_scope() -> TrayScope {
        TrayScope {
            query: QueryBuilder::new("SELECT COUNT(*) FROM trays"),
            has_conditions: false,
        }
    }
}

/// SQL expression ordering trays by catalog position
fn stage_order_sql() -> String {
    let arms: String = Stage::ALL
        .iter()
        .map(|stage| format!(" WHEN '{}' THEN {}", stage.slug(), stage.sort_order()))
        .collect();
    format!("(CASE stage{arms} END)")
}

impl TrayScope {
    /// Add WHERE clause helper
    fn add_condition(&mut self, condition: &str) {
        if self.has_conditions {
            self.query.push(" AND ");
        } else {
            self.query.push(" WHERE ");
            self.has_conditions = true;
        }
        self.query.push(condition);
    }

    /// Exclude soft-deleted rows
    pub fn live(mut self) -> Self {
        self.add_condition("deleted_at IS NULL");
        self
    }

    /// Apply every predicate of `filter`
    pub fn matching(mut self, filter: &TrayFilter) -> Self {
        if !filter.include_deleted {
            self = self.live();
        }
        if let Some(status) = filter.status {
            self.add_condition("status = ");
            self.query.push_bind(status.as_str());
        }
        if let Some(stage) = filter.stage {
            self.add_condition("stage = ");
            self.query.push_bind(stage.slug());
        }
        if let Some(term) = filter.search_term() {
            self = self.search(term);
        }
        self
    }

    /// Case-insensitive substring match on batch code, label, location and notes
    pub fn search(mut self, term: &str) -> Self {
        let pattern = format!("%{}%", escape_like(term));
        self.add_condition("(");
        for (index, column) in ["batch_code", "tray_label", "location", "notes"]
            .iter()
            .enumerate()
        {
            if index > 0 {
                self.query.push(" OR ");
            }
            self.query.push(*column);
            self.query.push(" ILIKE ");
            self.query.push_bind(pattern.clone());
            self.query.push(" ESCAPE '\\'");
        }
        self.query.push(")");
        self
    }

    pub fn with_ids(mut self, ids: &[i64]) -> Self {
        self.add_condition("id = ANY(");
        self.query.push_bind(ids.to_vec());
        self.query.push(")");
        self
    }

    pub fn in_batches(mut self, codes: &[String]) -> Self {
        self.add_condition("batch_code = ANY(");
        self.query.push_bind(codes.to_vec());
        self.query.push(")");
        self
    }

    pub fn order_by_id(mut self) -> Self {
        self.query.push(" ORDER BY id ASC");
        self
    }

    /// Order by a listing sort key, then by id for a stable result
    pub fn order_by(mut self, sort: &TraySort) -> Self {
        let direction = sort.direction.as_sql();
        let keys = match sort.field {
            SortField::BatchCode => format!(
                "(CASE WHEN batch_code ~ '^[0-9]{{1,18}}$' THEN batch_code::BIGINT END) {direction}, \
                 batch_code {direction}"
            ),
            SortField::Stage | SortField::Progress => format!("{} {direction}", stage_order_sql()),
            SortField::Status => format!("status {direction}"),
            SortField::PlantedAt => format!("COALESCE(planted_at, created_at) {direction}"),
            // Member counts do not exist per row
            SortField::CreatedAt | SortField::TotalTrays => format!("created_at {direction}"),
        };
        self.query.push(" ORDER BY ");
        self.query.push(keys);
        self.query.push(", id ASC");
        self
    }

    pub fn paginate(mut self, pagination: &Pagination) -> Self {
        if let Some(limit) = pagination.limit {
            self.query.push(" LIMIT ");
            self.query.push_bind(i64::from(limit));
        }
        if let Some(offset) = pagination.offset {
            self.query.push(" OFFSET ");
            self.query.push_bind(i64::from(offset));
        }
        self
    }

    /// Lock selected rows until the surrounding transaction ends
    pub fn for_update(mut self) -> Self {
        self.query.push(" FOR UPDATE");
        self
    }

    /// SQL text built so far
    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    /// Execute and convert every row
    pub async fn all<'e, E>(mut self, executor: E) -> Result<Vec<Tray>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = self
            .query
            .build_query_as::<TrayRow>()
            .fetch_all(executor)
            .await?;
        rows.into_iter().map(Tray::try_from).collect()
    }

    /// Execute a scope started with [`Tray::count_scope`]
    pub async fn count<'e, E>(mut self, executor: E) -> Result<i64>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = self
            .query
            .build_query_scalar::<i64>()
            .fetch_one(executor)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::SortDirection;
    use crate::state_machine::TrayStatus;

    #[test]
    fn test_live_scope_sql() {
        let scope = Tray::scope().live().order_by_id();
        assert!(scope.sql().ends_with("FROM trays WHERE deleted_at IS NULL ORDER BY id ASC"));
    }

    #[test]
    fn test_filter_binds_every_predicate() {
        let filter = TrayFilter {
            search: Some("rack".to_string()),
            status: Some(TrayStatus::Active),
            stage: Some(Stage::Light),
            include_deleted: false,
        };
        let scope = Tray::count_scope().matching(&filter);
        let sql = scope.sql();

        assert!(sql.starts_with("SELECT COUNT(*) FROM trays WHERE deleted_at IS NULL"));
        assert!(sql.contains("AND status = $1"));
        assert!(sql.contains("AND stage = $2"));
        assert!(sql.contains("batch_code ILIKE $3"));
        assert!(sql.contains("notes ILIKE $6"));
        assert!(!sql.contains("rack"));
    }

    #[test]
    fn test_include_deleted_skips_live_condition() {
        let filter = TrayFilter {
            include_deleted: true,
            ..TrayFilter::default()
        };
        let scope = Tray::scope().matching(&filter).order_by_id();
        assert!(!scope.sql().contains("deleted_at IS NULL"));
        assert!(!scope.sql().contains("WHERE"));
    }

    #[test]
    fn test_order_by_stage_uses_catalog_position() {
        let sort = TraySort::new(SortField::Stage, SortDirection::Asc);
        let scope = Tray::scope().live().order_by(&sort);
        assert!(scope
            .sql()
            .contains("ORDER BY (CASE stage WHEN 'soaking' THEN 1 WHEN 'germination' THEN 2"));
        assert!(scope.sql().ends_with("END) ASC, id ASC"));
    }

    #[test]
    fn test_locking_scope_for_batches() {
        let codes = vec!["1".to_string(), "2".to_string()];
        let scope = Tray::scope().live().in_batches(&codes).order_by_id().for_update();
        assert!(scope
            .sql()
            .ends_with("deleted_at IS NULL AND batch_code = ANY($1) ORDER BY id ASC FOR UPDATE"));
    }

    #[test]
    fn test_paginate_binds_limit_and_offset() {
        let scope = Tray::scope().live().paginate(&Pagination::new(3, 15));
        assert!(scope.sql().ends_with("LIMIT $1 OFFSET $2"));
    }
}
