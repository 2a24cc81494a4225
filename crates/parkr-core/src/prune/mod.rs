pub mod execution;
pub mod safety;
pub mod selection;

pub use execution::{execute, ExecutionResult, FailedDeletion, FailureKind};
pub use safety::{verify, Reason, Verdict, VerifyMode};
pub use selection::{select, select_with, PruneCandidate, SelectOptions, SelectionResult};

use serde::Serialize;

/// Everything one prune invocation produced. `execution` is `None` for a
/// dry run or a cancelled interactive session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneResult {
    pub selection: SelectionResult,
    pub execution: Option<ExecutionResult>,
}
