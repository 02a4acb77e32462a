//! Best-effort side effects of a lifecycle operation on previews and
//! auxiliary files, collected as `(action, target) -> outcome` steps.

use std::fmt;
use std::future::Future;

use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CascadeAction {
    DeletePreview,
    ArchivePreview,
    UnarchivePreview,
    CopyPreview,
    MovePreview,
    PurgeAuxiliary,
    CopyAuxiliary,
    MoveAuxiliary,
}

impl fmt::Display for CascadeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CascadeAction::DeletePreview => "delete preview",
            CascadeAction::ArchivePreview => "archive preview",
            CascadeAction::UnarchivePreview => "unarchive preview",
            CascadeAction::CopyPreview => "copy preview",
            CascadeAction::MovePreview => "move preview",
            CascadeAction::PurgeAuxiliary => "purge auxiliary",
            CascadeAction::CopyAuxiliary => "copy auxiliary",
            CascadeAction::MoveAuxiliary => "move auxiliary",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum CascadeOutcome {
    Done,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeStep {
    pub action: CascadeAction,
    /// Store key the step acted on (the destination for copies and moves).
    pub target: String,
    pub outcome: CascadeOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CascadeReport {
    steps: Vec<CascadeStep>,
}

impl CascadeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[CascadeStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn record(&mut self, action: CascadeAction, target: impl Into<String>, outcome: CascadeOutcome) {
        let target = target.into();
        if let CascadeOutcome::Failed(reason) = &outcome {
            warn!(%action, key = %target, %reason, "cascade step failed");
        }
        self.steps.push(CascadeStep {
            action,
            target,
            outcome,
        });
    }

    pub fn skip(&mut self, action: CascadeAction, target: impl Into<String>, reason: impl Into<String>) {
        self.record(action, target, CascadeOutcome::Skipped(reason.into()));
    }

    /// Runs one step per target concurrently and records every outcome in
    /// target order. A failing step never affects its siblings.
    pub async fn fan_out<T, F, Fut, E>(&mut self, action: CascadeAction, targets: Vec<T>, run: F)
    where
        T: Into<String> + Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: fmt::Display,
    {
        let futures = targets.iter().cloned().map(&run);
        let results = futures::future::join_all(futures).await;
        for (target, result) in targets.into_iter().zip(results) {
            let outcome = match result {
                Ok(()) => CascadeOutcome::Done,
                Err(e) => CascadeOutcome::Failed(e.to_string()),
            };
            self.record(action, target, outcome);
        }
    }

    /// Targets of steps of `action` that completed.
    pub fn done(&self, action: CascadeAction) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(move |s| s.action == action && s.outcome == CascadeOutcome::Done)
            .map(|s| s.target.as_str())
    }

    pub fn count(&self, action: CascadeAction) -> usize {
        self.steps.iter().filter(|s| s.action == action).count()
    }

    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, CascadeOutcome::Failed(_)))
            .count()
    }

    pub fn extend(&mut self, other: CascadeReport) {
        self.steps.extend(other.steps);
    }
}
