//! Authorization doubles.

use async_trait::async_trait;
use sprout_core::auth::{Action, Actor, AuthorizationProvider, ResourceKind};
use sprout_core::models::Tray;
use sprout_core::state_machine::Stage;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Allows everything except the (tray id, action) pairs on its deny list.
/// Records every check it answers, with the stage of the tray it was shown.
#[derive(Debug, Clone, Default)]
pub struct DenyListPolicy {
    denied: Arc<Mutex<HashSet<(i64, Action)>>>,
    checks: Arc<Mutex<Vec<(Option<i64>, Option<Stage>, Action)>>>,
}

impl DenyListPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, tray_id: i64, action: Action) {
        self.denied.lock().unwrap().insert((tray_id, action));
    }

    /// Number of checks answered for `tray_id`
    pub fn checks_for(&self, tray_id: i64) -> usize {
        self.checks
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| *id == Some(tray_id))
            .count()
    }

    /// Stage of `tray_id` as presented to the most recent check
    pub fn last_seen_stage(&self, tray_id: i64) -> Option<Stage> {
        self.checks
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _, _)| *id == Some(tray_id))
            .and_then(|(_, stage, _)| *stage)
    }
}

#[async_trait]
impl AuthorizationProvider for DenyListPolicy {
    async fn can_perform(
        &self,
        _actor: &Actor,
        _kind: ResourceKind,
        resource: Option<&Tray>,
        action: Action,
    ) -> bool {
        let tray_id = resource.map(|tray| tray.id);
        let stage = resource.map(|tray| tray.stage);
        self.checks.lock().unwrap().push((tray_id, stage, action));
        match tray_id {
            Some(id) => !self.denied.lock().unwrap().contains(&(id, action)),
            None => true,
        }
    }
}
