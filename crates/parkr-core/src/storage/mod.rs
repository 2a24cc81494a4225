pub mod json;
pub mod models;
pub mod queries;

pub use json::JsonStateStore;
pub use models::{ArchiveProject, Project, State};
pub use queries::{default_local_root, discover_archive_projects};

use crate::error::Error;
use std::collections::BTreeMap;

/// Handle to the persisted project state.
///
/// Callers mutate projects in memory and call `save` to make the whole
/// document durable. Implementations must save atomically.
pub trait ProjectStore {
    fn projects(&self) -> &BTreeMap<String, Project>;
    fn project_mut(&mut self, name: &str) -> Option<&mut Project>;
    fn save(&self) -> Result<(), Error>;
}
