//! # Services
//!
//! Business logic over the tray store: code allocation, aggregation, listing, bulk
//! mutation and the [`TrayService`] facade that ties them together.

pub mod aggregation;
pub mod batch_code;
pub mod bulk;
pub mod listing;
pub mod tray_service;

pub use batch_code::BatchCodeGenerator;
pub use bulk::{
    BulkCoordinator, BulkOperation, BulkScope, BulkSummary, FailureKind, ItemOutcome, ItemResult,
    VerificationReport,
};
pub use listing::{FilterEcho, ListItems, ListQuery, ListRequest, ListResponse, ViewMode};
pub use tray_service::{
    CreateBatchRequest, CreatedBatch, StageCount, TrayDetail, TrayService, TrayStatistics,
    TrayUpdate,
};
