use crate::report::ProjectReport;

/// Trait for reporting prune progress.
///
/// CLI implements with indicatif; tests record calls. All methods have
/// default no-op implementations. A panicking implementation is caught by
/// the executor and never stops a batch.
pub trait PruneReporter {
    fn on_delete_start(&self, _project: &ProjectReport) {}
    fn on_delete_result(&self, _project: &ProjectReport, _success: bool, _freed: u64) {}
    fn on_batch_complete(&self, _deleted: usize, _failed: usize, _freed: u64) {}
}

/// No-op reporter for silent operation.
pub struct SilentReporter;

impl PruneReporter for SilentReporter {}
