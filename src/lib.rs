#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Sprout Core
//!
//! Tray and batch lifecycle engine for microgreen production.
//!
//! ## Overview
//!
//! A tray moves forward through a fixed stage catalog (soaking, germination, blackout,
//! light, ready, harvested). Trays planted together share a batch code. A batch has no
//! row of its own: it is derived from its member trays on every read.
//!
//! The core covers:
//!
//! - **Stage transitions** for one tray at a time, forward only
//! - **Batch code allocation** that never reissues a code, deleted trays included
//! - **Batch aggregation** with progress, dominant stage and batch status
//! - **Bulk advance and delete** over tray ids or batch codes, with per-item authorization
//!   and partial success inside one transaction
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Stage catalog, tray status and the transition engine
//! - [`models`] - Tray records and read-side batch views
//! - [`store`] - Storage trait with PostgreSQL and in-memory implementations
//! - [`scopes`] - SQL query scopes over the `trays` table
//! - [`services`] - Code allocation, aggregation, listing, bulk operations
//! - [`auth`] - Injected authorization
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sprout_core::auth::{Actor, Role, RoleBasedPolicy};
//! use sprout_core::config::SproutConfig;
//! use sprout_core::services::{CreateBatchRequest, TrayService};
//! use sprout_core::store::InMemoryTrayStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> sprout_core::Result<()> {
//! let service = TrayService::new(
//!     Arc::new(InMemoryTrayStore::new()),
//!     Arc::new(RoleBasedPolicy),
//!     SproutConfig::default(),
//! );
//! let grower = Actor::new(1, "robin", Role::Grower);
//!
//! let created = service
//!     .create_batch(
//!         &grower,
//!         &CreateBatchRequest {
//!             tray_labels: vec!["A1".into(), "A2".into()],
//!             location_prefix: "Rack1".into(),
//!             notes: None,
//!         },
//!     )
//!     .await?;
//! let summary = service.advance_batches(&grower, &[created.batch_code]).await?;
//! println!("{}", summary.message);
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and in-memory integration tests
//! ```

pub mod auth;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod query_builder;
pub mod scopes;
pub mod services;
pub mod state_machine;
pub mod store;

pub use auth::{Action, Actor, AllowAll, AuthorizationProvider, ResourceKind, Role, RoleBasedPolicy};
pub use config::{ConfigManager, SproutConfig};
pub use error::{Result, SproutError};
pub use models::{BatchStatus, BatchView, NewTray, Tray};
pub use services::{BulkSummary, TrayService};
pub use state_machine::{Stage, TrayStatus};
pub use store::{InMemoryTrayStore, PgTrayStore, TrayStore, TrayTransaction};
