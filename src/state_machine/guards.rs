use super::errors::{TransitionError, TransitionResult};
use crate::models::Tray;

/// Trait for implementing state transition guards
pub trait StateGuard<T> {
    /// Check if a transition is allowed
    fn check(&self, entity: &T) -> TransitionResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard to check the tray has not already failed, been cancelled or completed
pub struct TrayActiveGuard;

impl StateGuard<Tray> for TrayActiveGuard {
    fn check(&self, tray: &Tray) -> TransitionResult<()> {
        if tray.is_active() {
            return Ok(());
        }

        Err(TransitionError::NotActive {
            label: tray.display_label(),
            status: tray.status,
        })
    }

    fn description(&self) -> &'static str {
        "Tray must be active"
    }
}

/// Guard to check a later stage exists in the catalog
pub struct HasNextStageGuard;

impl StateGuard<Tray> for HasNextStageGuard {
    fn check(&self, tray: &Tray) -> TransitionResult<()> {
        if tray.stage.next().is_some() {
            return Ok(());
        }

        Err(TransitionError::AlreadyTerminal {
            label: tray.display_label(),
            stage: tray.stage,
        })
    }

    fn description(&self) -> &'static str {
        "Tray must not be at the final stage"
    }
}
