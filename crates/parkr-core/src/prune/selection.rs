use super::safety::VerifyMode;
use crate::report::{self, ProjectReport, SortField};
use crate::storage::Project;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const FORCE_WARNING: &str = "force skips verification; data may be lost";

/// A report plus whether it is currently chosen for deletion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PruneCandidate {
    #[serde(flatten)]
    pub report: ProjectReport,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectOptions {
    pub target_bytes: u64,
    /// Pool every grabbed project, verified or not.
    pub force: bool,
    /// Verification used to build the pool when not forced.
    pub mode: VerifyMode,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectionResult {
    /// The whole pool, oldest first.
    pub candidates: Vec<PruneCandidate>,
    pub target_bytes: u64,
    pub total_selected: u64,
    pub insufficient_space: bool,
    pub no_candidates: bool,
    pub warnings: Vec<String>,
}

impl SelectionResult {
    pub fn selected(&self) -> impl Iterator<Item = &ProjectReport> {
        self.candidates
            .iter()
            .filter(|candidate| candidate.selected)
            .map(|candidate| &candidate.report)
    }

    pub fn selected_count(&self) -> usize {
        self.selected().count()
    }

    /// Replace the selection, e.g. with choices made interactively.
    pub fn apply_selection(&mut self, names: &[String]) {
        self.total_selected = 0;
        for candidate in &mut self.candidates {
            candidate.selected = names.contains(&candidate.report.name);
            if candidate.selected {
                self.total_selected += candidate.report.local_size;
            }
        }
    }
}

/// Pick the oldest safe grabbed projects until `target_bytes` is reached.
pub fn select(
    projects: &BTreeMap<String, Project>,
    target_bytes: u64,
    force: bool,
) -> SelectionResult {
    select_with(
        projects,
        &SelectOptions {
            target_bytes,
            force,
            mode: VerifyMode::Auto,
        },
    )
}

/// Build the candidate pool, sort it oldest first and greedily select.
///
/// Without `force` the pool holds only grabbed projects that verify as
/// safe under `options.mode`. With `force` every grabbed project is pooled,
/// including never-parked ones, and a warning is attached.
pub fn select_with(projects: &BTreeMap<String, Project>, options: &SelectOptions) -> SelectionResult {
    let mut result = SelectionResult {
        target_bytes: options.target_bytes,
        ..SelectionResult::default()
    };

    if options.force {
        warn!("{}", FORCE_WARNING);
        result.warnings.push(FORCE_WARNING.to_string());
    }
    let pool_mode = if options.force {
        VerifyMode::ForceSkip
    } else {
        options.mode
    };

    let mut pool: Vec<ProjectReport> = projects
        .iter()
        .filter(|(_, project)| project.is_grabbed)
        .map(|(name, project)| report::build_report(name, project, pool_mode))
        .filter(|report| {
            let keep = options.force || report.is_safe_delete;
            if !keep {
                debug!("Excluding {} from prune pool: {}", report.name, report.status);
            }
            keep
        })
        .collect();

    if pool.is_empty() {
        result.no_candidates = true;
        return result;
    }

    report::sort_projects(&mut pool, SortField::Modified);

    let mut total_selected = 0u64;
    for report in pool {
        let selected = total_selected < options.target_bytes;
        if selected {
            total_selected += report.local_size;
        }
        result.candidates.push(PruneCandidate { report, selected });
    }

    result.total_selected = total_selected;
    result.insufficient_space = total_selected < options.target_bytes;

    info!(
        "Selected {} of {} candidates ({} of {} bytes)",
        result.selected_count(),
        result.candidates.len(),
        total_selected,
        options.target_bytes
    );
    result
}
