use crate::error::Error;
use crate::hasher;
use crate::inventory::{self, RemovalPlan};
use crate::prune::safety::{self, VerifyMode};
use crate::scanner;
use crate::storage::{self, JsonStateStore, Project, ProjectStore};
use crate::sync::DirectorySync;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Add, grab, park and remove projects against one archive.
pub struct ProjectEngine<D: DirectorySync> {
    sync: D,
    home: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParkSummary {
    pub local_path: PathBuf,
    pub archive_path: PathBuf,
    pub parked_at: DateTime<Utc>,
    pub last_park_mtime: DateTime<Utc>,
    /// `None` when parked without hashes.
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSummary {
    pub name: String,
    pub category: String,
    pub local_path: PathBuf,
    pub archive_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed { freed: u64 },
    /// The local directory was already gone; only the state was updated.
    AlreadyGone,
}

impl<D: DirectorySync> ProjectEngine<D> {
    pub fn new(sync: D, home: PathBuf) -> Self {
        Self { sync, home }
    }

    /// Start tracking an existing local directory by copying it into the
    /// archive under the default master.
    ///
    /// The category is detected from marker files unless given. The new
    /// project counts as grabbed and parked now, in no-hash mode.
    pub fn add(
        &self,
        store: &mut JsonStateStore,
        path: &Path,
        category: Option<&str>,
    ) -> Result<AddSummary, Error> {
        let local_path = self.expand_path(path)?;
        if !local_path.is_dir() {
            return Err(Error::Other(format!("not a directory: {}", local_path.display())));
        }
        let name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Other(format!("no project name in {}", local_path.display())))?;

        if store.projects().contains_key(&name) {
            return Err(Error::Other(format!("project '{}' is already tracked", name)));
        }

        let category = category
            .map(str::to_string)
            .unwrap_or_else(|| inventory::detect_category(&local_path).to_string());
        let master = store.state().default_master.clone();
        let category_root = store
            .state()
            .masters
            .get(&master)
            .and_then(|categories| categories.get(&category))
            .cloned()
            .ok_or_else(|| {
                Error::Other(format!(
                    "category '{}' not found in master '{}'",
                    category, master
                ))
            })?;

        let archive_path = category_root.join(&name);
        if archive_path.exists() {
            return Err(Error::Other(format!(
                "archive path already exists: {}",
                archive_path.display()
            )));
        }
        fs::create_dir_all(&archive_path)?;

        info!(
            "Adding {} from {} to {}",
            name,
            local_path.display(),
            archive_path.display()
        );
        if let Err(err) = self.sync.sync(&local_path, &archive_path) {
            let _ = fs::remove_dir_all(&archive_path);
            return Err(err);
        }

        let now = Utc::now();
        let last_park_mtime = scanner::newest_mtime(&local_path)?.unwrap_or(now);
        store.state_mut().projects.insert(
            name.clone(),
            Project {
                local_path: Some(local_path.clone()),
                master,
                archive_category: category.clone(),
                grabbed_at: Some(now),
                last_park_at: Some(now),
                last_park_mtime: Some(last_park_mtime),
                no_hash_mode: true,
                is_grabbed: true,
                ..Project::default()
            },
        );
        store.save()?;

        Ok(AddSummary {
            name,
            category,
            local_path,
            archive_path,
        })
    }

    /// Copy `name` from the archive into a local working directory.
    ///
    /// The project starts in no-hash mode and is not a prune candidate
    /// until it has been parked.
    pub fn grab(
        &self,
        store: &mut JsonStateStore,
        name: &str,
        force: bool,
        custom_path: Option<&Path>,
    ) -> Result<PathBuf, Error> {
        if let Some(existing) = store.projects().get(name).filter(|p| p.is_grabbed) {
            if !force {
                return Err(Error::Other(format!(
                    "project '{}' is already grabbed at {} (use --force to overwrite)",
                    name,
                    display_path(existing.local_path.as_deref())
                )));
            }
            warn!("Project '{}' is already grabbed, overwriting", name);
        }

        let archive_projects = storage::discover_archive_projects(store.state())?;
        let archive_project = archive_projects
            .get(name)
            .ok_or_else(|| Error::Other(format!("project '{}' not found in archive", name)))?;

        let local_path = match custom_path {
            Some(path) => self.expand_path(path)?,
            None => storage::default_local_root(&self.home, &archive_project.category).join(name),
        };

        if local_path.exists() {
            if !force {
                return Err(Error::Other(format!(
                    "local path already exists: {} (use --force to overwrite)",
                    local_path.display()
                )));
            }
            warn!("Removing existing local copy at {}", local_path.display());
            fs::remove_dir_all(&local_path)?;
        }
        fs::create_dir_all(&local_path)?;

        info!(
            "Grabbing {} from {} to {}",
            name,
            archive_project.path.display(),
            local_path.display()
        );
        if let Err(err) = self.sync.sync(&archive_project.path, &local_path) {
            let _ = fs::remove_dir_all(&local_path);
            return Err(err);
        }

        store.state_mut().projects.insert(
            name.to_string(),
            Project {
                local_path: Some(local_path.clone()),
                master: archive_project.master.clone(),
                archive_category: archive_project.category.clone(),
                grabbed_at: Some(Utc::now()),
                is_grabbed: true,
                no_hash_mode: true,
                ..Project::default()
            },
        );
        store.save()?;
        Ok(local_path)
    }

    /// Sync the local copy back to the archive and record the safe point.
    ///
    /// Unless `no_hash`, the local tree is hashed before the sync and the
    /// archive after it; differing digests fail the park without touching
    /// the recorded state.
    pub fn park(
        &self,
        store: &mut JsonStateStore,
        name: &str,
        no_hash: bool,
    ) -> Result<ParkSummary, Error> {
        let project = grabbed_project(store, name)?;
        let local_path = project
            .local_path
            .clone()
            .filter(|path| path.is_dir())
            .ok_or_else(|| {
                Error::Other(format!(
                    "local path does not exist: {}",
                    display_path(project.local_path.as_deref())
                ))
            })?;

        let archive_path = store.state().archive_path(name)?;
        if !archive_path.is_dir() {
            return Err(Error::Other(format!(
                "archive path does not exist: {}",
                archive_path.display()
            )));
        }

        let local_hash = if no_hash {
            None
        } else {
            debug!("Computing local content hash for {}", name);
            Some(hasher::hash_tree(&local_path)?)
        };

        info!(
            "Parking {} from {} to {}",
            name,
            local_path.display(),
            archive_path.display()
        );
        self.sync.sync(&local_path, &archive_path)?;

        let parked_at = Utc::now();
        let last_park_mtime = scanner::newest_mtime(&local_path)?.unwrap_or(parked_at);

        let archive_hash = match &local_hash {
            Some(local_hash) => {
                let archive_hash = hasher::hash_tree(&archive_path)?;
                if &archive_hash != local_hash {
                    return Err(Error::Verification {
                        name: name.to_string(),
                        reason: format!(
                            "hash mismatch after sync (local {}, archive {})",
                            local_hash, archive_hash
                        ),
                    });
                }
                Some(archive_hash)
            }
            None => None,
        };

        let project = store
            .project_mut(name)
            .ok_or_else(|| Error::ProjectNotFound(name.to_string()))?;
        project.last_park_at = Some(parked_at);
        project.last_park_mtime = Some(last_park_mtime);
        project.no_hash_mode = no_hash;
        project.local_content_hash = local_hash.clone();
        project.archive_content_hash = archive_hash;
        project.local_hash_computed_at = local_hash.as_ref().map(|_| Utc::now());
        store.save()?;

        Ok(ParkSummary {
            local_path,
            archive_path,
            parked_at,
            last_park_mtime,
            content_hash: local_hash,
        })
    }

    /// Delete one project's local copy after verifying it under `mode`.
    pub fn remove_local(
        &self,
        store: &mut JsonStateStore,
        name: &str,
        mode: VerifyMode,
    ) -> Result<RemoveOutcome, Error> {
        let project = grabbed_project(store, name)?;

        let Some(local_path) = project.local_path.clone().filter(|path| path.exists()) else {
            warn!(
                "Local path for '{}' does not exist: {}",
                name,
                display_path(project.local_path.as_deref())
            );
            release(store, name)?;
            return Ok(RemoveOutcome::AlreadyGone);
        };

        let verdict = safety::verify(&project, mode);
        if !verdict.safe {
            return Err(Error::Verification {
                name: name.to_string(),
                reason: verdict.reason.to_string(),
            });
        }

        let freed = scanner::dir_size(&local_path).unwrap_or(0);
        info!("Removing local copy at {}", local_path.display());
        fs::remove_dir_all(&local_path)?;
        release(store, name)?;

        Ok(RemoveOutcome::Removed { freed })
    }

    /// Forget a project, and with `delete_archive` also delete its archive
    /// copy. Any local copy is left alone.
    ///
    /// The state entry goes first; if the archive cannot be deleted the
    /// entry is restored.
    pub fn remove_project(
        &self,
        store: &mut JsonStateStore,
        plan: &RemovalPlan,
        delete_archive: bool,
    ) -> Result<(), Error> {
        if !plan.tracked && !delete_archive {
            return Err(Error::Other(format!(
                "project '{}' is not tracked (use --archive to delete its archive copy)",
                plan.name
            )));
        }

        let forgotten = store.state_mut().projects.remove(&plan.name);
        if forgotten.is_some() {
            store.save()?;
            info!("Removed '{}' from state", plan.name);
        }

        if delete_archive {
            info!("Removing archive copy at {}", plan.archive_path.display());
            if let Err(err) = fs::remove_dir_all(&plan.archive_path) {
                if let Some(project) = forgotten {
                    store.state_mut().projects.insert(plan.name.clone(), project);
                    if let Err(save_err) = store.save() {
                        warn!("Failed to restore '{}' in state: {}", plan.name, save_err);
                    }
                }
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn expand_path(&self, path: &Path) -> Result<PathBuf, Error> {
        let expanded = match path.strip_prefix("~") {
            Ok(rest) => self.home.join(rest),
            Err(_) => path.to_path_buf(),
        };
        if expanded.is_absolute() {
            Ok(expanded)
        } else {
            Ok(std::env::current_dir()?.join(expanded))
        }
    }
}

fn grabbed_project(store: &JsonStateStore, name: &str) -> Result<Project, Error> {
    store
        .projects()
        .get(name)
        .filter(|project| project.is_grabbed)
        .cloned()
        .ok_or_else(|| Error::NotGrabbed(name.to_string()))
}

fn release(store: &mut JsonStateStore, name: &str) -> Result<(), Error> {
    if let Some(project) = store.project_mut(name) {
        project.mark_released();
    }
    store.save()
}

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "<none>".to_string())
}
