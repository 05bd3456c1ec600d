//! # System Constants
//!
//! Operational limits and defaults for tray production. Most of these are also the
//! defaults of the matching [`crate::config::SproutConfig`] sections; configuration
//! may tighten them per environment.

/// Limits applied to bulk advance/delete calls
pub mod bulk {
    /// Most tray ids accepted by one tray-scoped bulk call
    pub const MAX_TRAYS_PER_CALL: usize = 100;
    /// Most batch codes accepted by one batch-scoped bulk call
    pub const MAX_BATCHES_PER_CALL: usize = 50;
    /// Error strings shown before "and N more..." in tray scope
    pub const TRAY_SCOPE_ERROR_DISPLAY: usize = 3;
    /// Error strings shown before "and N more..." in batch scope
    pub const BATCH_SCOPE_ERROR_DISPLAY: usize = 2;
    /// Member errors folded into each "Batch <code>: ..." line
    pub const ERRORS_PER_BATCH: usize = 2;
}

/// Listing defaults and bounds
pub mod listing {
    pub const DEFAULT_PER_PAGE: u32 = 15;
    pub const MIN_PER_PAGE: u32 = 5;
    pub const MAX_PER_PAGE: u32 = 100;
    pub const MAX_SEARCH_LENGTH: usize = 255;
}

/// Batch planting rules
pub mod batch {
    /// Most trays one create-batch call may plant
    pub const MAX_TRAYS_PER_BATCH: usize = 100;
    /// Failed share above which a batch needs attention
    pub const ATTENTION_FAILURE_RATIO: f64 = 0.2;
    /// Batch codes longer than this cannot be held in an i64
    pub const MAX_BATCH_CODE_DIGITS: usize = 18;
    /// Grid width used to lay out trays in planting order
    pub const GRID_COLUMNS: usize = 10;
}

/// Field-level validation bounds
pub mod fields {
    pub const MAX_TRAY_LABEL_LENGTH: usize = 10;
    pub const MAX_LOCATION_LENGTH: usize = 255;
    pub const MAX_NOTES_LENGTH: usize = 2000;
    pub const MAX_FAILURE_REASON_LENGTH: usize = 1000;
    pub const MAX_HARVESTED_WEIGHT_GRAMS: f64 = 100_000.0;
    pub const MAX_YIELD_PERCENTAGE: f64 = 500.0;
}
