use crate::error::Error;
use crate::prune::safety::{self, VerifyMode};
use crate::report::{self, ProjectReport, SortField};
use crate::scanner;
use crate::storage::{discover_archive_projects, State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A project directory in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveEntry {
    pub name: String,
    pub category: String,
    pub path: PathBuf,
    /// `None` when the tree could not be measured.
    pub size: Option<u64>,
    pub grabbed: bool,
}

/// Every archived project, sorted by name, optionally limited to one category.
pub fn list_archive(state: &State, category: Option<&str>) -> Result<Vec<ArchiveEntry>, Error> {
    let entries = discover_archive_projects(state)?
        .into_values()
        .filter(|project| category.map_or(true, |c| project.category == c))
        .map(|project| {
            let size = match scanner::dir_size(&project.path) {
                Ok(size) => Some(size),
                Err(err) => {
                    warn!("Failed to size {}: {}", project.path.display(), err);
                    None
                }
            };
            let grabbed = state
                .projects
                .get(&project.name)
                .is_some_and(|tracked| tracked.is_grabbed);
            ArchiveEntry {
                name: project.name,
                category: project.category,
                path: project.path,
                size,
                grabbed,
            }
        })
        .collect();
    Ok(entries)
}

/// A directory found directly under one of the local roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalEntry {
    /// The tracked project name when managed, otherwise the directory name.
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Whether a grabbed project points at this directory.
    pub managed: bool,
}

/// Scan `local_directories` for project directories, sorted by path.
///
/// Hidden directories and missing roots are skipped. With `unmanaged_only`
/// directories owned by a grabbed project are left out.
pub fn scan_local(
    state: &State,
    local_directories: &[PathBuf],
    unmanaged_only: bool,
) -> Vec<LocalEntry> {
    let managed: BTreeMap<&Path, &str> = state
        .projects
        .iter()
        .filter(|(_, project)| project.is_grabbed)
        .filter_map(|(name, project)| Some((project.local_path.as_deref()?, name.as_str())))
        .collect();

    let mut entries = Vec::new();
    for local_dir in local_directories {
        let Ok(dir_entries) = fs::read_dir(local_dir) else {
            debug!("Skipping local directory {}", local_dir.display());
            continue;
        };
        for entry in dir_entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !is_dir || file_name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            let owner = managed.get(path.as_path()).copied();
            if unmanaged_only && owner.is_some() {
                continue;
            }
            entries.push(LocalEntry {
                name: owner.map(str::to_string).unwrap_or(file_name),
                size: scanner::dir_size(&path).unwrap_or(0),
                managed: owner.is_some(),
                path,
            });
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

/// Grabbed projects sorted by name, with their mtime-based status.
pub fn status_report(state: &State) -> Vec<ProjectReport> {
    let mut projects = report::generate_report(&state.projects, VerifyMode::MtimeOnly).projects;
    report::sort_projects(&mut projects, SortField::Name);
    projects
}

/// Everything known about one project, tracked or only archived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub tracked: bool,
    pub archive_path: PathBuf,
    /// `None` when the archive copy is missing.
    pub archive_size: Option<u64>,
    /// Set only while the project is grabbed.
    pub local_path: Option<PathBuf>,
    /// `None` when there is no local copy on disk.
    pub local_size: Option<u64>,
    pub grabbed_at: Option<DateTime<Utc>>,
    pub last_park_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    pub status: String,
    pub no_hash_mode: bool,
    pub hash_computed_at: Option<DateTime<Utc>>,
}

impl ProjectInfo {
    pub fn archive_exists(&self) -> bool {
        self.archive_size.is_some()
    }

    pub fn local_exists(&self) -> bool {
        self.local_size.is_some()
    }
}

fn existing_dir_size(path: &Path) -> Option<u64> {
    if path.is_dir() {
        scanner::dir_size(path).ok()
    } else {
        None
    }
}

/// Look a project up in the state, then in the archive.
pub fn project_info(state: &State, name: &str) -> Result<ProjectInfo, Error> {
    let Some(project) = state.projects.get(name) else {
        let archived = discover_archive_projects(state)?;
        let archive_project = archived.get(name).ok_or_else(|| {
            Error::Other(format!("project '{}' not found in state or archive", name))
        })?;
        return Ok(ProjectInfo {
            name: name.to_string(),
            tracked: false,
            archive_path: archive_project.path.clone(),
            archive_size: existing_dir_size(&archive_project.path),
            local_path: None,
            local_size: None,
            grabbed_at: None,
            last_park_at: None,
            last_modified: None,
            status: "Archived (not tracked in state)".to_string(),
            no_hash_mode: false,
            hash_computed_at: None,
        });
    };

    let archive_path = state.archive_path(name)?;
    let local_path = project.local_path.clone().filter(|_| project.is_grabbed);
    let local_size = local_path.as_deref().and_then(existing_dir_size);
    let last_modified = match (&local_path, local_size) {
        (Some(path), Some(_)) => scanner::newest_mtime(path).ok().flatten(),
        _ => None,
    };

    let status = if !project.is_grabbed {
        "Archived".to_string()
    } else if local_size.is_some() {
        safety::verify(project, VerifyMode::MtimeOnly).reason.to_string()
    } else {
        "Unknown".to_string()
    };

    Ok(ProjectInfo {
        name: name.to_string(),
        tracked: true,
        archive_size: existing_dir_size(&archive_path),
        archive_path,
        local_path,
        local_size,
        grabbed_at: project.grabbed_at,
        last_park_at: project.last_park_at,
        last_modified,
        status,
        no_hash_mode: project.no_hash_mode,
        hash_computed_at: project
            .local_content_hash
            .as_ref()
            .and(project.local_hash_computed_at),
    })
}

/// Archive category for a local project, judged by its marker files.
pub fn detect_category(path: &Path) -> &'static str {
    const PYTHON_MARKERS: [&str; 4] = ["pyproject.toml", "requirements.txt", "setup.py", "Pipfile"];

    if PYTHON_MARKERS.iter().any(|marker| path.join(marker).exists()) {
        return "pycharm";
    }
    if path.join("DESCRIPTION").exists() || has_rproj_file(path) {
        return "rstudio";
    }
    "code"
}

fn has_rproj_file(path: &Path) -> bool {
    let Ok(entries) = fs::read_dir(path) else {
        return false;
    };
    entries.flatten().any(|entry| {
        Path::new(&entry.file_name())
            .extension()
            .is_some_and(|ext| ext == "Rproj")
    })
}

/// What `remove` is about to delete, gathered before asking for
/// confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalPlan {
    pub name: String,
    /// Whether the state has an entry to forget.
    pub tracked: bool,
    pub archive_path: PathBuf,
    pub archive_size: u64,
    /// Local copy of a grabbed project, kept either way.
    pub local_copy: Option<PathBuf>,
}

impl RemovalPlan {
    /// The archive holds the only copy of the project.
    pub fn is_only_copy(&self) -> bool {
        self.local_copy.is_none()
    }
}

/// Resolve the archive copy of `name` for removal. The project may be
/// tracked or only present in the archive; either way its archive
/// directory must exist.
pub fn plan_removal(state: &State, name: &str) -> Result<RemovalPlan, Error> {
    let tracked = state.projects.get(name);
    let archive_path = match tracked {
        Some(_) => state.archive_path(name)?,
        None => discover_archive_projects(state)?
            .remove(name)
            .map(|project| project.path)
            .ok_or_else(|| {
                Error::Other(format!("project '{}' not found in archive or state", name))
            })?,
    };

    if !archive_path.is_dir() {
        return Err(Error::Other(format!(
            "archive path does not exist: {}",
            archive_path.display()
        )));
    }
    let archive_size = scanner::dir_size(&archive_path)?;

    let local_copy = tracked
        .filter(|project| project.is_grabbed)
        .and_then(|project| project.local_path.clone())
        .filter(|path| path.is_dir());

    Ok(RemovalPlan {
        name: name.to_string(),
        tracked: tracked.is_some(),
        archive_path,
        archive_size,
        local_copy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_detect_category_from_markers() {
        let tmp = tempdir().unwrap();
        let python = tmp.path().join("py");
        let r_pkg = tmp.path().join("rpkg");
        let r_proj = tmp.path().join("rproj");
        let plain = tmp.path().join("plain");
        for dir in [&python, &r_pkg, &r_proj, &plain] {
            fs::create_dir(dir).unwrap();
        }
        fs::write(python.join("requirements.txt"), "requests").unwrap();
        fs::write(r_pkg.join("DESCRIPTION"), "Package: x").unwrap();
        fs::write(r_proj.join("analysis.Rproj"), "Version: 1.0").unwrap();
        fs::write(plain.join("Cargo.toml"), "[package]").unwrap();

        assert_eq!(detect_category(&python), "pycharm");
        assert_eq!(detect_category(&r_pkg), "rstudio");
        assert_eq!(detect_category(&r_proj), "rstudio");
        assert_eq!(detect_category(&plain), "code");
    }

    #[test]
    fn test_python_markers_win_over_r() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("setup.py"), "").unwrap();
        fs::write(tmp.path().join("DESCRIPTION"), "").unwrap();
        assert_eq!(detect_category(tmp.path()), "pycharm");
    }
}
