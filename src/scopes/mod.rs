//! # Query Scopes Module
//!
//! Chainable, composable queries for the tray model.
//!
//! ```rust,no_run
//! use sprout_core::models::Tray;
//! # async fn example(pool: &sqlx::PgPool) -> sprout_core::error::Result<()> {
//! let codes = vec!["14".to_string()];
//! let members = Tray::scope().live().in_batches(&codes).order_by_id().all(pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod tray;

pub use tray::TrayScope;
