use crate::prune::safety::{self, Reason, VerifyMode};
use crate::scanner;
use crate::storage::Project;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

/// Per-run view of one grabbed project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectReport {
    pub name: String,
    pub local_path: Option<PathBuf>,
    pub local_size: u64,
    /// Newest file mtime in the local copy.
    pub last_modified: Option<DateTime<Utc>>,
    pub last_park_at: Option<DateTime<Utc>>,
    pub never_parked: bool,
    pub no_hash_mode: bool,
    pub is_safe_delete: bool,
    pub status: String,
    pub reason: Reason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub total_projects: usize,
    pub total_size: u64,
    pub safe_to_delete: usize,
    pub recoverable_space: u64,
    pub projects: Vec<ProjectReport>,
    /// Safe projects, oldest first.
    pub candidates: Vec<ProjectReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// Largest first.
    Size,
    /// Oldest first.
    #[default]
    Modified,
    Name,
}

impl std::str::FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "size" => Ok(SortField::Size),
            "modified" => Ok(SortField::Modified),
            "name" => Ok(SortField::Name),
            other => Err(format!("unknown sort field '{}'", other)),
        }
    }
}

/// Measure one project on disk and attach a safety verdict under `mode`.
pub fn build_report(name: &str, project: &Project, mode: VerifyMode) -> ProjectReport {
    let mut local_size = 0;
    let mut last_modified = None;

    if let Some(path) = project.local_path.as_deref().filter(|path| path.is_dir()) {
        match scanner::dir_size(path) {
            Ok(size) => local_size = size,
            Err(err) => warn!("Failed to size {}: {}", path.display(), err),
        }
        match scanner::newest_mtime(path) {
            Ok(newest) => last_modified = newest,
            Err(err) => warn!("Failed to read mtimes under {}: {}", path.display(), err),
        }
    }

    let verdict = safety::verify(project, mode);

    ProjectReport {
        name: name.to_string(),
        local_path: project.local_path.clone(),
        local_size,
        last_modified,
        last_park_at: project.last_park_at,
        never_parked: project.last_park_at.is_none(),
        no_hash_mode: project.no_hash_mode,
        is_safe_delete: verdict.safe,
        status: verdict.reason.to_string(),
        reason: verdict.reason,
    }
}

/// Report on every grabbed project.
pub fn generate_report(projects: &BTreeMap<String, Project>, mode: VerifyMode) -> ReportSummary {
    let mut summary = ReportSummary::default();

    for (name, project) in projects.iter().filter(|(_, project)| project.is_grabbed) {
        let report = build_report(name, project, mode);

        summary.total_size += report.local_size;
        if report.is_safe_delete {
            summary.safe_to_delete += 1;
            summary.recoverable_space += report.local_size;
            summary.candidates.push(report.clone());
        }
        summary.projects.push(report);
    }

    summary.total_projects = summary.projects.len();
    sort_projects(&mut summary.candidates, SortField::Modified);
    summary
}

pub fn sort_projects(projects: &mut [ProjectReport], field: SortField) {
    match field {
        SortField::Size => projects.sort_by(|a, b| b.local_size.cmp(&a.local_size)),
        SortField::Name => projects.sort_by(|a, b| a.name.cmp(&b.name)),
        // `None` (no files) sorts before any timestamp.
        SortField::Modified => projects.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.name.cmp(&b.name))
        }),
    }
}

pub fn filter_candidates(projects: &[ProjectReport]) -> Vec<ProjectReport> {
    projects
        .iter()
        .filter(|report| report.is_safe_delete)
        .cloned()
        .collect()
}
