//! # Database Migrations
//!
//! Schema migrations live in `migrations/` as `YYYYMMDDHHMMSS_description.sql` and are
//! embedded at compile time. sqlx records applied versions in `_sqlx_migrations` and
//! takes an advisory lock while migrating, so concurrent starters are safe.

use crate::error::Result;
use sqlx::migrate::Migrator;
use sqlx::PgPool;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Run all pending migrations in order
    pub async fn run_all(pool: &PgPool) -> Result<()> {
        MIGRATOR.run(pool).await?;
        tracing::info!(
            migrations = MIGRATOR.iter().count(),
            "Database migrations applied"
        );
        Ok(())
    }

    /// Versions embedded in this build, oldest first
    pub fn embedded_versions() -> Vec<i64> {
        MIGRATOR.iter().map(|migration| migration.version).collect()
    }
}
