use super::states::{Stage, TrayStatus};
use crate::error::SproutError;
use thiserror::Error;

/// Why a lifecycle transition was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Tray {label} is not active (status: {status})")]
    NotActive { label: String, status: TrayStatus },

    #[error("Tray {label} is already at the final stage ({stage})")]
    AlreadyTerminal { label: String, stage: Stage },
}

impl TransitionError {
    /// The refusal without the tray label, for messages already keyed by tray
    pub fn reason(&self) -> String {
        match self {
            Self::NotActive { status, .. } => format!("not active (status: {status})"),
            Self::AlreadyTerminal { stage, .. } => format!("already at the final stage ({stage})"),
        }
    }
}

pub type TransitionResult<T> = Result<T, TransitionError>;

impl From<TransitionError> for SproutError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotActive { .. } => SproutError::InvalidState(err.to_string()),
            TransitionError::AlreadyTerminal { label, .. } => SproutError::AlreadyTerminal { label },
        }
    }
}
