pub mod check;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod interactive;
pub mod inventory;
pub mod platform;
pub mod progress;
pub mod prune;
pub mod report;
pub mod scanner;
pub mod size;
pub mod storage;
pub mod sync;

pub use config::AppConfig;
pub use engine::{AddSummary, ParkSummary, ProjectEngine, RemoveOutcome};
pub use error::{Error, HashError};
pub use progress::{PruneReporter, SilentReporter};
pub use prune::{PruneResult, VerifyMode};
pub use storage::{JsonStateStore, Project, ProjectStore, State};
