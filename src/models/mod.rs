pub mod batch;
pub mod tray;

// Re-export core models for easy access
pub use batch::{BatchStatus, BatchView, FlatTrayView, StatusCounts, TraySummary};
pub use tray::{NewTray, QualityGrade, Tray, TrayRow, TRAY_COLUMNS};
