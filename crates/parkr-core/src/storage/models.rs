use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One tracked project and the bookkeeping from its last grab and park.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub master: String,
    #[serde(default)]
    pub archive_category: String,
    #[serde(default)]
    pub grabbed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_park_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archive_content_hash: Option<String>,
    #[serde(default)]
    pub local_content_hash: Option<String>,
    #[serde(default)]
    pub local_hash_computed_at: Option<DateTime<Utc>>,
    /// Newest file mtime in the local tree when it was last parked.
    #[serde(default)]
    pub last_park_mtime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub no_hash_mode: bool,
    #[serde(default)]
    pub is_grabbed: bool,
}

impl Project {
    /// Clear the grab once the local copy is gone.
    pub fn mark_released(&mut self) {
        self.is_grabbed = false;
        self.grabbed_at = None;
    }
}

/// The whole persisted state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// master name -> archive category -> category root.
    #[serde(default)]
    pub masters: BTreeMap<String, BTreeMap<String, PathBuf>>,
    #[serde(default)]
    pub default_master: String,
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_directories: Vec<PathBuf>,
}

/// A project directory found in one of the archive categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveProject {
    pub name: String,
    pub master: String,
    pub category: String,
    pub path: PathBuf,
}
