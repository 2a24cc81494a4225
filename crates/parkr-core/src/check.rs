use crate::inventory::scan_local;
use crate::storage::State;
use serde::Serialize;
use std::path::PathBuf;

/// Findings of [`check_state`]. Issues need attention; warnings are
/// inconsistencies that do not block any operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.warnings.is_empty()
    }
}

/// Compare the state document with what is on disk.
pub fn check_state(state: &State, local_directories: &[PathBuf]) -> CheckReport {
    let mut report = CheckReport::default();

    for (master_name, categories) in &state.masters {
        for (category_name, category_path) in categories {
            if !category_path.exists() {
                report.warnings.push(format!(
                    "Master '{}' category '{}' path does not exist: {}",
                    master_name,
                    category_name,
                    category_path.display()
                ));
            }
        }
    }

    for (name, project) in &state.projects {
        match state.archive_path(name) {
            Ok(archive_path) if !archive_path.exists() => report.issues.push(format!(
                "Project '{}': archive path does not exist: {}",
                name,
                archive_path.display()
            )),
            Ok(_) => {}
            Err(err) => report.issues.push(format!("Project '{}': {}", name, err)),
        }

        if project.is_grabbed {
            match &project.local_path {
                None => report.issues.push(format!(
                    "Project '{}': marked as grabbed but no local path set",
                    name
                )),
                Some(path) if !path.exists() => report.issues.push(format!(
                    "Project '{}': marked as grabbed but local path does not exist: {}",
                    name,
                    path.display()
                )),
                Some(_) => {}
            }
            if project.grabbed_at.is_none() {
                report.warnings.push(format!(
                    "Project '{}': grabbed but no grabbed_at timestamp",
                    name
                ));
            }
        } else if let Some(path) = project.local_path.as_ref().filter(|path| path.exists()) {
            report.warnings.push(format!(
                "Project '{}': not marked as grabbed but local path exists: {}",
                name,
                path.display()
            ));
        }

        if !project.no_hash_mode
            && project.local_content_hash.is_some()
            && project.local_hash_computed_at.is_none()
        {
            report.warnings.push(format!(
                "Project '{}': has local hash but no hash computed timestamp",
                name
            ));
        }

        if project.last_park_at.is_some() && project.last_park_mtime.is_none() {
            report.warnings.push(format!(
                "Project '{}': has last_park_at but no last_park_mtime",
                name
            ));
        }
    }

    for entry in scan_local(state, local_directories, true) {
        report.warnings.push(format!(
            "Untracked project found in local directory: {}",
            entry.path.display()
        ));
    }

    report
}
