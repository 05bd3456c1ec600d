//! # Bulk Operation Coordinator
//!
//! Drives advance and delete across a tray-id set or a batch-code set.
//!
//! One storage transaction wraps the whole call. Each resolved tray is authorized and
//! mutated on its own: a denial or a failed mutation becomes a per-item outcome and the
//! loop moves on. The transaction commits at the end whatever the item outcomes were;
//! only systemic storage errors abort the call.

use crate::auth::{Actor, AuthorizationProvider, ResourceKind};
use crate::auth::Action;
use crate::config::BulkConfig;
use crate::error::{Result, SproutError};
use crate::logging::log_bulk_operation;
use crate::models::Tray;
use crate::state_machine::{tray_state_machine, Stage, TransitionError};
use crate::store::{TrayStore, TrayTransaction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    Advance,
    Delete,
}

impl BulkOperation {
    /// Capability checked per item
    pub fn action(&self) -> Action {
        match self {
            Self::Advance => Action::Update,
            Self::Delete => Action::Delete,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Advance => "advance",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkScope {
    /// An explicit set of tray ids
    Trays,
    /// A set of batch codes, expanded to their live member trays
    Batches,
}

impl BulkScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trays => "trays",
            Self::Batches => "batches",
        }
    }
}

/// Why an item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Denied,
    NotFound,
    /// The tray's lifecycle state refused the operation
    Ineligible,
    /// The mutation itself failed
    Error,
}

impl FailureKind {
    /// Denied, missing and ineligible items do not count as attempted work
    pub fn is_ineligible(&self) -> bool {
        !matches!(self, Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// `stage` is the tray's stage after an advance
    Succeeded { stage: Option<Stage> },
    Skipped { reason: String },
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub tray_id: i64,
    pub batch_code: Option<String>,
    pub tray_label: Option<String>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl ItemResult {
    fn for_tray(tray: &Tray, outcome: ItemOutcome) -> Self {
        Self {
            tray_id: tray.id,
            batch_code: Some(tray.batch_code.clone()),
            tray_label: Some(tray.tray_label.clone()),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ItemOutcome::Succeeded { .. })
    }
}

/// Post-commit re-read of the succeeded items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub expected: usize,
    pub observed: usize,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.expected == self.observed
    }
}

/// Result of one bulk call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub operation: BulkOperation,
    pub scope: BulkScope,
    pub succeeded: usize,
    /// Batches with at least one succeeded member; always 0 in tray scope
    pub batches_processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// First few error strings, in processing order
    pub errors: Vec<String>,
    /// Error strings left out of `errors`
    pub more_errors: usize,
    /// Nothing was eligible; `errors` is empty and `message` says so
    pub no_eligible_items: bool,
    pub message: String,
    pub items: Vec<ItemResult>,
    pub verification: Option<VerificationReport>,
}

impl BulkSummary {
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    fn no_eligible(operation: BulkOperation, scope: BulkScope, items: Vec<ItemResult>) -> Self {
        let message = match (operation, scope) {
            (BulkOperation::Advance, _) => "No eligible trays found for stage advancement.",
            (BulkOperation::Delete, BulkScope::Trays) => "No trays found for deletion.",
            (BulkOperation::Delete, BulkScope::Batches) => "No tray batches found for deletion.",
        };
        let skipped = count_skipped(&items);
        let failed = items.len() - skipped;

        Self {
            operation,
            scope,
            succeeded: 0,
            batches_processed: 0,
            skipped,
            failed,
            errors: Vec::new(),
            more_errors: 0,
            no_eligible_items: true,
            message: message.to_string(),
            items,
            verification: None,
        }
    }

    fn build(
        operation: BulkOperation,
        scope: BulkScope,
        items: Vec<ItemResult>,
        errors: Vec<String>,
        batches_processed: usize,
        display_limit: usize,
    ) -> Self {
        let succeeded = items.iter().filter(|item| item.is_success()).count();
        let ineligible_only = items.iter().all(|item| match &item.outcome {
            ItemOutcome::Failed { kind, .. } => kind.is_ineligible(),
            _ => true,
        });
        if succeeded == 0 && ineligible_only {
            return Self::no_eligible(operation, scope, items);
        }

        let skipped = count_skipped(&items);
        let failed = items.len() - succeeded - skipped;
        let shown = errors.len().min(display_limit);
        let more_errors = errors.len() - shown;

        let mut message = match (operation, scope) {
            (BulkOperation::Advance, BulkScope::Trays) => {
                format!("Successfully advanced {succeeded} tray(s) to the next stage.")
            }
            (BulkOperation::Delete, BulkScope::Trays) => {
                format!("Successfully deleted {succeeded} tray(s).")
            }
            (BulkOperation::Advance, BulkScope::Batches) => format!(
                "Successfully advanced {batches_processed} batch(es) with {succeeded} total trays."
            ),
            (BulkOperation::Delete, BulkScope::Batches) => format!(
                "Successfully deleted {batches_processed} batch(es) with {succeeded} total trays."
            ),
        };

        let shown_errors: Vec<String> = errors.into_iter().take(shown).collect();
        if !shown_errors.is_empty() {
            message.push_str(" Errors: ");
            message.push_str(&shown_errors.join(" "));
            if more_errors > 0 {
                message.push_str(&format!(" and {more_errors} more..."));
            }
        }

        Self {
            operation,
            scope,
            succeeded,
            batches_processed,
            skipped,
            failed,
            errors: shown_errors,
            more_errors,
            no_eligible_items: false,
            message,
            items,
            verification: None,
        }
    }
}

fn count_skipped(items: &[ItemResult]) -> usize {
    items
        .iter()
        .filter(|item| matches!(item.outcome, ItemOutcome::Skipped { .. }))
        .count()
}

/// Reject oversized or duplicated identifier sets
pub fn ensure_distinct_within<T>(items: &[T], max: usize, what: &str) -> Result<()>
where
    T: Eq + Hash + Display,
{
    if items.len() > max {
        return Err(SproutError::validation(format!(
            "at most {max} {what} may be given, got {}",
            items.len()
        )));
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item) {
            return Err(SproutError::validation(format!("duplicate {what}: {item}")));
        }
    }
    Ok(())
}

enum AttemptError {
    Ineligible(TransitionError),
    Store(SproutError),
}

/// Run one mutation; the store wraps it in a savepoint
async fn attempt(
    tx: &mut dyn TrayTransaction,
    operation: BulkOperation,
    tray: &Tray,
    now: DateTime<Utc>,
) -> std::result::Result<Option<Stage>, AttemptError> {
    match operation {
        BulkOperation::Advance => {
            let advanced =
                tray_state_machine::advance(tray.clone(), now).map_err(AttemptError::Ineligible)?;
            let saved = tx
                .update_tray(&advanced)
                .await
                .map_err(AttemptError::Store)?;
            Ok(Some(saved.stage))
        }
        BulkOperation::Delete => {
            tx.soft_delete(tray.id, now)
                .await
                .map_err(AttemptError::Store)?;
            Ok(None)
        }
    }
}

pub struct BulkCoordinator<'a> {
    store: &'a dyn TrayStore,
    auth: &'a dyn AuthorizationProvider,
    limits: &'a BulkConfig,
}

impl<'a> BulkCoordinator<'a> {
    pub fn new(
        store: &'a dyn TrayStore,
        auth: &'a dyn AuthorizationProvider,
        limits: &'a BulkConfig,
    ) -> Self {
        Self {
            store,
            auth,
            limits,
        }
    }

    /// Apply `operation` to every tray in `ids`, in the order given
    pub async fn run_trays(
        &self,
        actor: &Actor,
        operation: BulkOperation,
        ids: &[i64],
    ) -> Result<BulkSummary> {
        if ids.is_empty() {
            return Ok(BulkSummary::no_eligible(operation, BulkScope::Trays, Vec::new()));
        }
        ensure_distinct_within(ids, self.limits.max_trays, "tray ids")?;
        log_bulk_operation(operation.as_str(), "trays", Some(actor.id), ids.len(), "started", None);

        let mut tx = self.store.begin().await?;
        let locked: HashMap<i64, Tray> = tx
            .lock_trays(ids)
            .await?
            .into_iter()
            .map(|tray| (tray.id, tray))
            .collect();

        let now = Utc::now();
        let verb = operation.action().verb();
        let mut items = Vec::with_capacity(ids.len());
        let mut errors = Vec::new();

        for &id in ids {
            let Some(tray) = locked.get(&id) else {
                let message = format!("Tray #{id} not found");
                debug!(tray_id = id, "Bulk item does not resolve to a live tray");
                errors.push(message.clone());
                items.push(ItemResult {
                    tray_id: id,
                    batch_code: None,
                    tray_label: None,
                    outcome: ItemOutcome::Failed {
                        kind: FailureKind::NotFound,
                        message,
                    },
                });
                continue;
            };

            let label = tray.display_label();
            let allowed = self
                .auth
                .can_perform(actor, ResourceKind::Tray, Some(tray), operation.action())
                .await;
            if !allowed {
                let message = SproutError::denied(verb, format!("tray {label}")).to_string();
                warn!(tray_id = id, actor_id = actor.id, operation = operation.as_str(), "Bulk item denied");
                errors.push(message.clone());
                items.push(ItemResult::for_tray(
                    tray,
                    ItemOutcome::Failed {
                        kind: FailureKind::Denied,
                        message,
                    },
                ));
                continue;
            }

            let outcome = match attempt(tx.as_mut(), operation, tray, now).await {
                Ok(stage) => ItemOutcome::Succeeded { stage },
                Err(AttemptError::Ineligible(err)) => ItemOutcome::Failed {
                    kind: FailureKind::Ineligible,
                    message: err.to_string(),
                },
                Err(AttemptError::Store(err)) => {
                    warn!(tray_id = id, error = %err, operation = operation.as_str(), "Bulk item failed");
                    ItemOutcome::Failed {
                        kind: if matches!(err, SproutError::NotFound(_)) {
                            FailureKind::NotFound
                        } else {
                            FailureKind::Error
                        },
                        message: format!("Failed to {} tray {label}: {err}", operation.as_str()),
                    }
                }
            };
            if let ItemOutcome::Failed { message, .. } = &outcome {
                errors.push(message.clone());
            }
            items.push(ItemResult::for_tray(tray, outcome));
        }

        tx.commit().await?;

        let summary = BulkSummary::build(
            operation,
            BulkScope::Trays,
            items,
            errors,
            0,
            self.limits.tray_error_display_limit,
        );
        Ok(self.finish(actor, summary).await)
    }

    /// Apply `operation` to the live members of every batch in `codes`.
    ///
    /// When advancing, members that are no longer active are skipped without an error.
    pub async fn run_batches(
        &self,
        actor: &Actor,
        operation: BulkOperation,
        codes: &[String],
    ) -> Result<BulkSummary> {
        if codes.is_empty() {
            return Ok(BulkSummary::no_eligible(operation, BulkScope::Batches, Vec::new()));
        }
        ensure_distinct_within(codes, self.limits.max_batches, "batch codes")?;
        if codes.iter().any(|code| code.trim().is_empty()) {
            return Err(SproutError::validation("batch codes must not be blank"));
        }
        log_bulk_operation(operation.as_str(), "batches", Some(actor.id), codes.len(), "started", None);

        let mut tx = self.store.begin().await?;
        let members = tx.lock_batches(codes).await?;
        let mut by_batch: HashMap<&str, Vec<&Tray>> = HashMap::new();
        for tray in &members {
            by_batch.entry(tray.batch_code.as_str()).or_default().push(tray);
        }

        let now = Utc::now();
        let verb = operation.action().verb();
        let mut items = Vec::with_capacity(members.len());
        let mut errors = Vec::new();
        let mut batches_processed = 0;

        for code in codes {
            let Some(batch) = by_batch.get(code.as_str()) else {
                debug!(batch_code = %code, "Batch has no live trays");
                continue;
            };

            let mut batch_errors: Vec<String> = Vec::new();
            let mut batch_succeeded = 0;

            for &tray in batch {
                if operation == BulkOperation::Advance && !tray.is_active() {
                    items.push(ItemResult::for_tray(
                        tray,
                        ItemOutcome::Skipped {
                            reason: format!("status {}", tray.status),
                        },
                    ));
                    continue;
                }

                let allowed = self
                    .auth
                    .can_perform(actor, ResourceKind::Tray, Some(tray), operation.action())
                    .await;
                if !allowed {
                    let message = format!("Not authorized to {verb} tray {}", tray.tray_label);
                    warn!(tray_id = tray.id, batch_code = %code, actor_id = actor.id, "Bulk item denied");
                    batch_errors.push(message.clone());
                    items.push(ItemResult::for_tray(
                        tray,
                        ItemOutcome::Failed {
                            kind: FailureKind::Denied,
                            message,
                        },
                    ));
                    continue;
                }

                let outcome = match attempt(tx.as_mut(), operation, tray, now).await {
                    Ok(stage) => {
                        batch_succeeded += 1;
                        ItemOutcome::Succeeded { stage }
                    }
                    Err(AttemptError::Ineligible(err)) => ItemOutcome::Failed {
                        kind: FailureKind::Ineligible,
                        message: format!("Tray {}: {}", tray.tray_label, err.reason()),
                    },
                    Err(AttemptError::Store(err)) => {
                        warn!(tray_id = tray.id, batch_code = %code, error = %err, "Bulk item failed");
                        ItemOutcome::Failed {
                            kind: FailureKind::Error,
                            message: format!("Tray {}: {err}", tray.tray_label),
                        }
                    }
                };
                if let ItemOutcome::Failed { message, .. } = &outcome {
                    batch_errors.push(message.clone());
                }
                items.push(ItemResult::for_tray(tray, outcome));
            }

            if batch_succeeded > 0 {
                batches_processed += 1;
            }
            if !batch_errors.is_empty() {
                let shown = batch_errors.len().min(self.limits.errors_per_batch);
                errors.push(format!("Batch {code}: {}", batch_errors[..shown].join(", ")));
            }
        }

        tx.commit().await?;

        let summary = BulkSummary::build(
            operation,
            BulkScope::Batches,
            items,
            errors,
            batches_processed,
            self.limits.batch_error_display_limit,
        );
        Ok(self.finish(actor, summary).await)
    }

    async fn finish(&self, actor: &Actor, mut summary: BulkSummary) -> BulkSummary {
        summary.verification = self.verify(&summary).await;

        let status = if summary.is_success() { "completed" } else { "no_changes" };
        log_bulk_operation(
            summary.operation.as_str(),
            summary.scope.as_str(),
            Some(actor.id),
            summary.items.len(),
            status,
            Some(&summary.message),
        );
        info!(
            operation = summary.operation.as_str(),
            scope = summary.scope.as_str(),
            succeeded = summary.succeeded,
            batches_processed = summary.batches_processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "Bulk operation committed"
        );
        summary
    }

    /// Re-read succeeded trays and count those carrying the mutated state.
    ///
    /// Runs after commit; a mismatch is logged and never undoes anything.
    async fn verify(&self, summary: &BulkSummary) -> Option<VerificationReport> {
        let expected: HashMap<i64, Option<Stage>> = summary
            .items
            .iter()
            .filter_map(|item| match item.outcome {
                ItemOutcome::Succeeded { stage } => Some((item.tray_id, stage)),
                _ => None,
            })
            .collect();
        if expected.is_empty() {
            return None;
        }

        let ids: Vec<i64> = expected.keys().copied().collect();
        let trays = match self.store.find_many(&ids, true).await {
            Ok(trays) => trays,
            Err(err) => {
                warn!(error = %err, "Bulk verification query failed");
                return None;
            }
        };

        let observed = trays
            .iter()
            .filter(|tray| match summary.operation {
                BulkOperation::Advance => {
                    !tray.is_deleted() && expected.get(&tray.id) == Some(&Some(tray.stage))
                }
                BulkOperation::Delete => tray.is_deleted(),
            })
            .count();

        let report = VerificationReport {
            expected: expected.len(),
            observed,
        };
        if report.passed() {
            debug!(expected = report.expected, "Bulk verification passed");
        } else {
            let anomaly = SproutError::ConsistencyAnomaly {
                operation: format!("{} {}", summary.operation.as_str(), summary.scope.as_str()),
                expected: report.expected,
                observed: report.observed,
            };
            warn!(error = %anomaly, "Bulk verification mismatch");
        }
        Some(report)
    }
}
