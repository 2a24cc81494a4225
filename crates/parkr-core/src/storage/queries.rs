use super::models::{ArchiveProject, State};
use crate::error::Error;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

impl State {
    /// Full archive path of a tracked project: `<category root>/<name>`.
    pub fn archive_path(&self, project_name: &str) -> Result<PathBuf, Error> {
        let project = self
            .projects
            .get(project_name)
            .ok_or_else(|| Error::ProjectNotFound(project_name.to_string()))?;

        let master = self
            .masters
            .get(&project.master)
            .ok_or_else(|| Error::Other(format!("master '{}' not found", project.master)))?;

        let category_path = master.get(&project.archive_category).ok_or_else(|| {
            Error::Other(format!(
                "category '{}' not found in master '{}'",
                project.archive_category, project.master
            ))
        })?;

        Ok(category_path.join(project_name))
    }

    /// Local directories to scan for projects, falling back to `defaults`
    /// when the state does not list any.
    pub fn local_directories_or(&self, defaults: &[PathBuf]) -> Vec<PathBuf> {
        if self.local_directories.is_empty() {
            defaults.to_vec()
        } else {
            self.local_directories.clone()
        }
    }
}

/// Find every project directory across all archive masters and categories.
/// Missing category roots are skipped; hidden directories are ignored.
pub fn discover_archive_projects(state: &State) -> Result<BTreeMap<String, ArchiveProject>, Error> {
    let mut projects = BTreeMap::new();

    for (master_name, categories) in &state.masters {
        for (category_name, category_path) in categories {
            let entries = match fs::read_dir(category_path) {
                Ok(entries) => entries,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!("Archive category {} does not exist", category_path.display());
                    continue;
                }
                Err(err) => {
                    return Err(io::Error::new(
                        err.kind(),
                        format!("failed to read {}: {}", category_path.display(), err),
                    )
                    .into());
                }
            };

            for entry in entries {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }

                projects.insert(
                    name.clone(),
                    ArchiveProject {
                        name,
                        master: master_name.clone(),
                        category: category_name.clone(),
                        path: entry.path(),
                    },
                );
            }
        }
    }

    Ok(projects)
}

/// Default local root for an archive category.
pub fn default_local_root(home: &Path, category: &str) -> PathBuf {
    match category {
        "pycharm" => home.join("PycharmProjects"),
        "rstudio" => home.join("RStudioProjects"),
        _ => home.join("code"),
    }
}
