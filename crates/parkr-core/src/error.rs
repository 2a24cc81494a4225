use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("State file error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("state file not found at {} - run 'parkr init' first", .0.display())]
    StateNotFound(PathBuf),

    #[error("project '{0}' not found in state")]
    ProjectNotFound(String),

    #[error("project '{0}' is not currently grabbed")]
    NotGrabbed(String),

    #[error("Hash error: {0}")]
    Hash(#[from] HashError),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("invalid size: {0}")]
    InvalidSize(String),

    #[error("interactive mode requires a terminal on stdin")]
    NotATerminal,

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("project '{name}' failed verification: {reason}")]
    Verification { name: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Failures of [`crate::hasher::hash_tree`].
#[derive(Error, Debug)]
pub enum HashError {
    #[error("no regular files under {}", .0.display())]
    EmptyTree(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
