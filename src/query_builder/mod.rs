//! # Query Building Utilities
//!
//! Pagination and sort descriptors shared by the SQL scopes and the in-memory
//! aggregation pipeline.

pub mod pagination;
pub mod sort;

pub use pagination::{PageInfo, Pagination};
pub use sort::{SortDirection, SortField, TraySort};
