use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use parkr_core::report::ProjectReport;
use parkr_core::size::format_size;
use parkr_core::PruneReporter;
use std::sync::Mutex;
use std::time::Duration;

/// Prune progress on stderr: a spinner while each project is deleted and
/// one result line per project.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl PruneReporter for CliReporter {
    fn on_delete_start(&self, project: &ProjectReport) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(format!(
            "Deleting {} ({})...",
            project.name,
            format_size(project.local_size)
        ));
        pb.enable_steady_tick(Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_delete_result(&self, project: &ProjectReport, success: bool, freed: u64) {
        self.finish_bar();
        if success {
            eprintln!(
                "  {} Deleted {} ({})",
                "✓".green(),
                project.name,
                format_size(freed)
            );
        } else {
            eprintln!("  {} Failed to delete {}", "✗".red(), project.name);
        }
    }

    fn on_batch_complete(&self, deleted: usize, failed: usize, freed: u64) {
        self.finish_bar();
        eprintln!(
            "  {} deleted, {} failed, {} freed",
            deleted.to_string().green(),
            failed.to_string().red(),
            format_size(freed).cyan()
        );
    }
}
