use super::{
    errors::TransitionResult,
    events::TrayEvent,
    guards::{HasNextStageGuard, StateGuard, TrayActiveGuard},
    states::TrayStatus,
};
use crate::models::Tray;
use chrono::{DateTime, Utc};

/// Stage transition engine for a single tray.
///
/// Works on an owned copy of the tray and returns the updated record; persisting it is
/// the caller's job. Advancement moves exactly one catalog entry forward, never back.
#[derive(Debug, Clone)]
pub struct TrayStateMachine {
    tray: Tray,
}

impl TrayStateMachine {
    pub fn new(tray: Tray) -> Self {
        Self { tray }
    }

    pub fn into_tray(self) -> Tray {
        self.tray
    }

    /// Apply `event` at `now`, returning the updated tray
    pub fn transition(&mut self, event: &TrayEvent, now: DateTime<Utc>) -> TransitionResult<&Tray> {
        self.check_guard(&TrayActiveGuard, event)?;

        match event {
            TrayEvent::Advance => {
                self.check_guard(&HasNextStageGuard, event)?;
                self.apply_advance(now);
            }
            TrayEvent::Fail(reason) => {
                self.tray.status = TrayStatus::Failed;
                self.tray.failure_reason = Some(reason.clone());
            }
            TrayEvent::Cancel => {
                self.tray.status = TrayStatus::Cancelled;
            }
        }

        self.tray.updated_at = now;
        tracing::debug!(
            tray_id = self.tray.id,
            event = event.event_type(),
            stage = %self.tray.stage,
            status = %self.tray.status,
            "Tray transition applied"
        );
        Ok(&self.tray)
    }

    fn check_guard(&self, guard: &dyn StateGuard<Tray>, event: &TrayEvent) -> TransitionResult<()> {
        guard.check(&self.tray).inspect_err(|err| {
            tracing::debug!(
                tray_id = self.tray.id,
                event = event.event_type(),
                guard = guard.description(),
                error = %err,
                "Tray transition refused"
            );
        })
    }

    fn apply_advance(&mut self, now: DateTime<Utc>) {
        // HasNextStageGuard has already run
        let Some(next) = self.tray.stage.next() else {
            return;
        };

        self.tray.stage = next;
        self.tray.stage_entered_at = now;
        self.tray.stamp_stage_entry(next, now);

        if next.is_terminal() {
            self.tray.status = TrayStatus::Completed;
        }
    }
}

/// Advance `tray` one stage, consuming it
pub fn advance(tray: Tray, now: DateTime<Utc>) -> TransitionResult<Tray> {
    apply(tray, &TrayEvent::Advance, now)
}

/// Apply any lifecycle event, consuming the tray
pub fn apply(tray: Tray, event: &TrayEvent, now: DateTime<Utc>) -> TransitionResult<Tray> {
    let mut machine = TrayStateMachine::new(tray);
    machine.transition(event, now)?;
    Ok(machine.into_tray())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTray;
    use crate::state_machine::{Stage, TransitionError};

    fn tray_at(stage: Stage) -> Tray {
        let now = Utc::now();
        let mut tray = Tray::from_new(
            1,
            NewTray {
                batch_code: "1".to_string(),
                tray_label: "A1".to_string(),
                tray_number: "01".to_string(),
                location: "Rack1 - A1".to_string(),
                position_x: 1,
                position_y: 1,
                notes: None,
                planted_at: now,
            },
        );
        tray.stage = stage;
        tray
    }

    #[test]
    fn test_advance_moves_exactly_one_stage() {
        let now = Utc::now();
        let tray = advance(tray_at(Stage::Soaking), now).unwrap();

        assert_eq!(tray.stage, Stage::Germination);
        assert_eq!(tray.stage_entered_at, now);
        assert_eq!(tray.germination_started_at, Some(now));
        assert_eq!(tray.status, TrayStatus::Active);
    }

    #[test]
    fn test_advance_into_harvested_completes_tray() {
        let now = Utc::now();
        let tray = advance(tray_at(Stage::Ready), now).unwrap();

        assert_eq!(tray.stage, Stage::Harvested);
        assert_eq!(tray.status, TrayStatus::Completed);
        assert_eq!(tray.harvested_at, Some(now));
    }

    #[test]
    fn test_advance_after_completion_is_refused() {
        let now = Utc::now();
        let harvested = advance(tray_at(Stage::Ready), now).unwrap();

        let err = advance(harvested, now).unwrap_err();
        assert!(matches!(err, TransitionError::NotActive { .. }));
    }

    #[test]
    fn test_advance_at_terminal_stage_while_active() {
        // Legacy rows can be harvested but still flagged active
        let err = advance(tray_at(Stage::Harvested), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            TransitionError::AlreadyTerminal {
                label: "1-A1".to_string(),
                stage: Stage::Harvested,
            }
        );
    }

    #[test]
    fn test_fail_keeps_stage() {
        let now = Utc::now();
        let tray = apply(tray_at(Stage::Blackout), &TrayEvent::fail_with_reason("mold"), now).unwrap();

        assert_eq!(tray.stage, Stage::Blackout);
        assert_eq!(tray.status, TrayStatus::Failed);
        assert_eq!(tray.failure_reason.as_deref(), Some("mold"));
    }

    #[test]
    fn test_status_becomes_terminal_at_most_once() {
        let now = Utc::now();
        let cancelled = apply(tray_at(Stage::Light), &TrayEvent::Cancel, now).unwrap();
        assert_eq!(cancelled.status, TrayStatus::Cancelled);

        let err = apply(cancelled.clone(), &TrayEvent::fail_with_reason("late"), now).unwrap_err();
        assert!(matches!(err, TransitionError::NotActive { status: TrayStatus::Cancelled, .. }));

        let err = advance(cancelled, now).unwrap_err();
        assert!(matches!(err, TransitionError::NotActive { .. }));
    }
}
