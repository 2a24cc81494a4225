use super::models::{Project, State};
use super::ProjectStore;
use crate::error::Error;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CATEGORIES: [&str; 4] = ["code", "pycharm", "rstudio", "misc"];

/// Project store backed by a pretty-printed JSON file.
///
/// Saves write a sibling temp file, fsync it and rename it over the
/// existing file, so readers only ever see a complete document.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    state: State,
}

impl JsonStateStore {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::StateNotFound(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        let state: State = serde_json::from_slice(&data)?;
        debug!(
            "Loaded state from {} ({} projects)",
            path.display(),
            state.projects.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            state,
        })
    }

    /// Wrap an in-memory state; nothing is written until `save`.
    pub fn with_state(path: &Path, state: State) -> Self {
        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    /// Write a fresh state whose `primary` master points at `archive_root`.
    pub fn create_with_root(path: &Path, archive_root: &Path) -> Result<Self, Error> {
        let categories: BTreeMap<String, PathBuf> = DEFAULT_CATEGORIES
            .iter()
            .map(|category| (category.to_string(), archive_root.join(category)))
            .collect();

        let mut masters = BTreeMap::new();
        masters.insert("primary".to_string(), categories);

        let store = Self::with_state(
            path,
            State {
                masters,
                default_master: "primary".to_string(),
                ..State::default()
            },
        );
        store.save()?;
        Ok(store)
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }
}

impl ProjectStore for JsonStateStore {
    fn projects(&self) -> &BTreeMap<String, Project> {
        &self.state.projects
    }

    fn project_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.state.projects.get_mut(name)
    }

    fn save(&self) -> Result<(), Error> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let data = serde_json::to_vec_pretty(&self.state)?;
        let tmp_path = self.path.with_extension(format!("tmp.{}", std::process::id()));

        let write_result = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(err.into());
        }

        debug!("Saved state to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_file_reports_state_not_found() {
        let tmp = tempdir().unwrap();
        let err = JsonStateStore::open(&tmp.path().join("state.json")).unwrap_err();
        assert!(matches!(err, Error::StateNotFound(_)));
    }

    #[test]
    fn test_create_with_root_seeds_primary_master() {
        let tmp = tempdir().unwrap();
        let state_path = tmp.path().join("nested/state.json");
        let archive = tmp.path().join("archive");

        JsonStateStore::create_with_root(&state_path, &archive).unwrap();
        let store = JsonStateStore::open(&state_path).unwrap();

        assert_eq!(store.state().default_master, "primary");
        let primary = &store.state().masters["primary"];
        assert_eq!(primary.len(), 4);
        assert_eq!(primary["code"], archive.join("code"));
    }

    #[test]
    fn test_save_round_trips_projects() {
        let tmp = tempdir().unwrap();
        let state_path = tmp.path().join("state.json");
        let mut store = JsonStateStore::with_state(&state_path, State::default());

        let now = Utc::now();
        store.state_mut().projects.insert(
            "alpha".to_string(),
            Project {
                local_path: Some(tmp.path().join("alpha")),
                is_grabbed: true,
                last_park_at: Some(now),
                archive_content_hash: Some("abc".to_string()),
                ..Project::default()
            },
        );
        store.save().unwrap();

        let reopened = JsonStateStore::open(&state_path).unwrap();
        assert_eq!(reopened.projects()["alpha"], store.projects()["alpha"]);
        assert!(!tmp.path().join(format!("state.tmp.{}", std::process::id())).exists());
    }

    #[test]
    fn test_open_tolerates_missing_optional_fields() {
        let tmp = tempdir().unwrap();
        let state_path = tmp.path().join("state.json");
        fs::write(
            &state_path,
            r#"{"projects": {"beta": {"local_path": "/tmp/beta", "is_grabbed": true}}}"#,
        )
        .unwrap();

        let store = JsonStateStore::open(&state_path).unwrap();
        let beta = &store.projects()["beta"];
        assert!(beta.is_grabbed);
        assert!(beta.last_park_at.is_none());
        assert!(!beta.no_hash_mode);
    }
}
