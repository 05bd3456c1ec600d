use serde::{Deserialize, Serialize};

/// Events that can trigger tray lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TrayEvent {
    /// Move one stage forward
    Advance,
    /// Mark the tray as lost, with a reason
    Fail(String),
    /// Pull the tray from production
    Cancel,
}

impl TrayEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Fail(_) => "fail",
            Self::Cancel => "cancel",
        }
    }

    /// Extract the failure reason if this is a failure event
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Fail(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn fail_with_reason(reason: impl Into<String>) -> Self {
        Self::Fail(reason.into())
    }
}
