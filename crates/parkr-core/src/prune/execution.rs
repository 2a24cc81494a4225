use super::safety::{self, Reason, VerifyMode};
use super::selection::SelectionResult;
use crate::progress::PruneReporter;
use crate::report::ProjectReport;
use crate::scanner;
use crate::storage::ProjectStore;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Why a selected project was not (cleanly) deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum FailureKind {
    /// Gone from the store, released, or without a local path.
    NotTracked,
    /// Re-verification right before deletion said no.
    Unverified(Reason),
    /// The OS refused; the tree may be partially removed.
    DeleteFailed(String),
    /// The tree is gone but the store does not know it.
    DirectoryDeletedButStateSaveFailed(String),
}

impl FailureKind {
    pub fn is_state_inconsistent(&self) -> bool {
        matches!(self, FailureKind::DirectoryDeletedButStateSaveFailed(_))
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::NotTracked => write!(f, "no longer tracked as grabbed"),
            FailureKind::Unverified(reason) => write!(f, "{}", reason),
            FailureKind::DeleteFailed(detail) => write!(f, "delete failed: {}", detail),
            FailureKind::DirectoryDeletedButStateSaveFailed(detail) => {
                write!(f, "directory deleted but state not saved: {}", detail)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDeletion {
    pub report: ProjectReport,
    pub kind: FailureKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    pub deleted: Vec<ProjectReport>,
    pub failed: Vec<FailedDeletion>,
    /// Selected but never attempted: the target was reached or the batch stopped.
    pub skipped: Vec<ProjectReport>,
    /// Bytes actually removed from disk.
    pub total_freed: u64,
    pub target_bytes: u64,
}

impl ExecutionResult {
    pub fn unsaved_deletions(&self) -> impl Iterator<Item = &FailedDeletion> {
        self.failed.iter().filter(|failure| failure.kind.is_state_inconsistent())
    }

    pub fn has_unsaved_deletions(&self) -> bool {
        self.unsaved_deletions().next().is_some()
    }
}

/// Delete the selected candidates one at a time, in selection order.
///
/// Each candidate is re-resolved against the store and, unless `mode` is
/// `ForceSkip`, verified again immediately before its tree is removed.
/// After every successful removal the project is released and the whole
/// store saved, so persisted state always matches a prefix of the batch.
///
/// Per-candidate failures are recorded and the batch continues. A save
/// failure after a removal stops the batch. The batch also stops once
/// `total_freed` reaches the selection target.
pub fn execute<S: ProjectStore + ?Sized>(
    store: &mut S,
    selection: &SelectionResult,
    mode: VerifyMode,
    reporter: &dyn PruneReporter,
) -> ExecutionResult {
    let mut result = ExecutionResult {
        target_bytes: selection.target_bytes,
        ..ExecutionResult::default()
    };
    let mut stopped = false;

    for report in selection.selected() {
        if stopped {
            result.skipped.push(report.clone());
            continue;
        }

        notify("on_delete_start", || reporter.on_delete_start(report));

        match delete_candidate(store, report, mode) {
            Ok(freed) => {
                info!("Deleted {} ({} bytes)", report.name, freed);
                result.total_freed += freed;
                result.deleted.push(report.clone());
                notify("on_delete_result", || reporter.on_delete_result(report, true, freed));
            }
            Err(Failure { kind, freed }) => {
                if kind.is_state_inconsistent() {
                    error!("{}: {}", report.name, kind);
                    stopped = true;
                } else {
                    warn!("Failed to delete {}: {}", report.name, kind);
                }
                result.total_freed += freed;
                result.failed.push(FailedDeletion {
                    report: report.clone(),
                    kind,
                });
                notify("on_delete_result", || reporter.on_delete_result(report, false, 0));
            }
        }

        if result.total_freed >= result.target_bytes {
            debug!("Target of {} bytes reached", result.target_bytes);
            stopped = true;
        }
    }

    info!(
        "Prune executed: {} deleted, {} failed, {} skipped, {} bytes freed",
        result.deleted.len(),
        result.failed.len(),
        result.skipped.len(),
        result.total_freed
    );
    notify("on_batch_complete", || {
        reporter.on_batch_complete(result.deleted.len(), result.failed.len(), result.total_freed)
    });
    result
}

struct Failure {
    kind: FailureKind,
    freed: u64,
}

impl From<FailureKind> for Failure {
    fn from(kind: FailureKind) -> Self {
        Self { kind, freed: 0 }
    }
}

fn delete_candidate<S: ProjectStore + ?Sized>(
    store: &mut S,
    report: &ProjectReport,
    mode: VerifyMode,
) -> Result<u64, Failure> {
    let project = match store.projects().get(&report.name) {
        Some(project) if project.is_grabbed => project.clone(),
        _ => return Err(FailureKind::NotTracked.into()),
    };

    if mode != VerifyMode::ForceSkip {
        let verdict = safety::verify(&project, mode);
        if !verdict.safe {
            return Err(FailureKind::Unverified(verdict.reason).into());
        }
    }

    let local_path = project.local_path.ok_or(FailureKind::NotTracked)?;

    let size = scanner::dir_size(&local_path).unwrap_or(report.local_size);

    fs::remove_dir_all(&local_path)
        .map_err(|err| FailureKind::DeleteFailed(format!("{}: {}", local_path.display(), err)))?;

    if let Some(project) = store.project_mut(&report.name) {
        project.mark_released();
    }

    store.save().map_err(|err| Failure {
        kind: FailureKind::DirectoryDeletedButStateSaveFailed(err.to_string()),
        freed: size,
    })?;

    Ok(size)
}

fn notify<F: FnOnce()>(callback: &str, f: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        warn!(
            "Progress reporter panicked in {}: {}",
            callback,
            panic_message(payload.as_ref())
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
