// State machine module for tray lifecycle management
//
// Stages form a fixed forward-only catalog; status is tracked separately and becomes
// terminal at most once.

pub mod errors;
pub mod events;
pub mod guards;
pub mod states;
pub mod tray_state_machine;

// Re-export main types for convenient access
pub use errors::{TransitionError, TransitionResult};
pub use events::TrayEvent;
pub use states::{Stage, StageInfo, TrayStatus};
pub use tray_state_machine::TrayStateMachine;

// Common traits and utilities
pub use guards::StateGuard;
