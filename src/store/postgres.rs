//! PostgreSQL-backed tray store.

use super::{TrayFilter, TrayStore, TrayTransaction};
use crate::error::{Result, SproutError};
use crate::models::{NewTray, Tray, TrayRow, TRAY_COLUMNS};
use crate::query_builder::{Pagination, TraySort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Postgres, Transaction};

const BATCH_SEQUENCE_NAME: &str = "batch_code";

#[derive(Debug, Clone)]
pub struct PgTrayStore {
    pool: PgPool,
}

impl PgTrayStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TrayStore for PgTrayStore {
    async fn begin(&self) -> Result<Box<dyn TrayTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTrayTransaction { tx }))
    }

    async fn find(&self, id: i64) -> Result<Option<Tray>> {
        let row = sqlx::query_as::<_, TrayRow>(&format!(
            "SELECT {TRAY_COLUMNS} FROM trays WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Tray::try_from).transpose()
    }

    async fn list(&self, filter: &TrayFilter) -> Result<Vec<Tray>> {
        Tray::scope()
            .matching(filter)
            .order_by_id()
            .all(&self.pool)
            .await
    }

    async fn page(
        &self,
        filter: &TrayFilter,
        sort: &TraySort,
        pagination: &Pagination,
    ) -> Result<(Vec<Tray>, u64)> {
        let total = Tray::count_scope()
            .matching(filter)
            .count(&self.pool)
            .await?;
        let trays = Tray::scope()
            .matching(filter)
            .order_by(sort)
            .paginate(pagination)
            .all(&self.pool)
            .await?;

        Ok((trays, u64::try_from(total).unwrap_or(0)))
    }

    async fn find_many(&self, ids: &[i64], include_deleted: bool) -> Result<Vec<Tray>> {
        let mut scope = Tray::scope();
        if !include_deleted {
            scope = scope.live();
        }
        scope.with_ids(ids).order_by_id().all(&self.pool).await
    }

    async fn find_by_batch_codes(
        &self,
        codes: &[String],
        include_deleted: bool,
    ) -> Result<Vec<Tray>> {
        let mut scope = Tray::scope();
        if !include_deleted {
            scope = scope.live();
        }
        scope.in_batches(codes).order_by_id().all(&self.pool).await
    }

    async fn all_batch_codes(&self) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>("SELECT DISTINCT batch_code FROM trays")
            .fetch_all(&self.pool)
            .await?;
        Ok(codes)
    }

    async fn batch_sequence_value(&self) -> Result<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            "SELECT last_value FROM tray_batch_sequences WHERE name = $1",
        )
        .bind(BATCH_SEQUENCE_NAME)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value.unwrap_or(0))
    }
}

/// A live PostgreSQL transaction; every mutation runs under a savepoint
pub struct PgTrayTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl TrayTransaction for PgTrayTransaction {
    async fn lock_trays(&mut self, ids: &[i64]) -> Result<Vec<Tray>> {
        Tray::scope()
            .live()
            .with_ids(ids)
            .order_by_id()
            .for_update()
            .all(&mut *self.tx)
            .await
    }

    async fn lock_batches(&mut self, codes: &[String]) -> Result<Vec<Tray>> {
        Tray::scope()
            .live()
            .in_batches(codes)
            .order_by_id()
            .for_update()
            .all(&mut *self.tx)
            .await
    }

    async fn insert_tray(&mut self, new_tray: NewTray) -> Result<Tray> {
        let tray = Tray::from_new(0, new_tray);
        let mut savepoint = self.tx.begin().await?;

        let inserted = sqlx::query_as::<_, TrayRow>(&format!(
            "INSERT INTO trays (uuid, batch_code, tray_label, tray_number, location, \
             position_x, position_y, stage, status, stage_entered_at, planted_at, \
             soak_started_at, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {TRAY_COLUMNS}"
        ))
        .bind(tray.uuid)
        .bind(&tray.batch_code)
        .bind(&tray.tray_label)
        .bind(&tray.tray_number)
        .bind(&tray.location)
        .bind(tray.position_x)
        .bind(tray.position_y)
        .bind(tray.stage.slug())
        .bind(tray.status.as_str())
        .bind(tray.stage_entered_at)
        .bind(tray.planted_at)
        .bind(tray.soak_started_at)
        .bind(&tray.notes)
        .bind(tray.created_at)
        .bind(tray.updated_at)
        .fetch_one(&mut *savepoint)
        .await;

        match inserted {
            Ok(row) => {
                savepoint.commit().await?;
                Tray::try_from(row)
            }
            Err(err) => {
                savepoint.rollback().await?;
                Err(err.into())
            }
        }
    }

    async fn update_tray(&mut self, tray: &Tray) -> Result<Tray> {
        let mut savepoint = self.tx.begin().await?;

        let updated = sqlx::query_as::<_, TrayRow>(&format!(
            "UPDATE trays SET stage = $2, status = $3, stage_entered_at = $4, \
             soak_started_at = $5, germination_started_at = $6, blackout_started_at = $7, \
             light_started_at = $8, ready_at = $9, harvested_at = $10, \
             harvested_weight_grams = $11, yield_percentage = $12, quality_grade = $13, \
             notes = $14, failure_reason = $15, updated_at = $16, location = $17 \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {TRAY_COLUMNS}"
        ))
        .bind(tray.id)
        .bind(tray.stage.slug())
        .bind(tray.status.as_str())
        .bind(tray.stage_entered_at)
        .bind(tray.soak_started_at)
        .bind(tray.germination_started_at)
        .bind(tray.blackout_started_at)
        .bind(tray.light_started_at)
        .bind(tray.ready_at)
        .bind(tray.harvested_at)
        .bind(tray.harvested_weight_grams)
        .bind(tray.yield_percentage)
        .bind(tray.quality_grade.map(|grade| grade.to_string()))
        .bind(&tray.notes)
        .bind(&tray.failure_reason)
        .bind(tray.updated_at)
        .bind(&tray.location)
        .fetch_optional(&mut *savepoint)
        .await;

        match updated {
            Ok(Some(row)) => {
                savepoint.commit().await?;
                Tray::try_from(row)
            }
            Ok(None) => {
                savepoint.rollback().await?;
                Err(SproutError::not_found(format!("tray {}", tray.id)))
            }
            Err(err) => {
                savepoint.rollback().await?;
                Err(err.into())
            }
        }
    }

    async fn soft_delete(&mut self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut savepoint = self.tx.begin().await?;

        let deleted = sqlx::query(
            "UPDATE trays SET deleted_at = $2, updated_at = $2 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&mut *savepoint)
        .await;

        match deleted {
            Ok(result) if result.rows_affected() > 0 => {
                savepoint.commit().await?;
                Ok(())
            }
            Ok(_) => {
                savepoint.rollback().await?;
                Err(SproutError::not_found(format!("tray {id}")))
            }
            Err(err) => {
                savepoint.rollback().await?;
                Err(err.into())
            }
        }
    }

    async fn lock_batch_sequence(&mut self) -> Result<i64> {
        // Seed the row if the migration insert was skipped
        sqlx::query(
            "INSERT INTO tray_batch_sequences (name, last_value) VALUES ($1, 0) \
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(BATCH_SEQUENCE_NAME)
        .execute(&mut *self.tx)
        .await?;

        let value = sqlx::query_scalar::<_, i64>(
            "SELECT last_value FROM tray_batch_sequences WHERE name = $1 FOR UPDATE",
        )
        .bind(BATCH_SEQUENCE_NAME)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(value)
    }

    async fn set_batch_sequence(&mut self, value: i64) -> Result<()> {
        sqlx::query(
            "UPDATE tray_batch_sequences SET last_value = $2, updated_at = NOW() WHERE name = $1",
        )
        .bind(BATCH_SEQUENCE_NAME)
        .bind(value)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn batch_codes(&mut self) -> Result<Vec<String>> {
        let codes = sqlx::query_scalar::<_, String>("SELECT DISTINCT batch_code FROM trays")
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(codes)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
