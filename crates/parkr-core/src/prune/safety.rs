use crate::error::HashError;
use crate::hasher;
use crate::scanner;
use crate::storage::Project;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// How a local copy should be checked against its archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyMode {
    /// Hash verification, or mtime for projects parked without hashes.
    #[default]
    Auto,
    /// Modification times only.
    MtimeOnly,
    /// Hash verification required; no-hash projects are rejected.
    Hash,
    /// No verification at all.
    ForceSkip,
}

/// Why a project was judged safe or unsafe to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum Reason {
    NeverParkedBefore,
    ForcedNoVerification,
    HashUnavailable,
    LocalPathMissing,
    UncommittedWork,
    MissingHashData,
    ContentMismatch,
    EmptyTree,
    Io(String),
    SafeByMtime,
    SafeByHash,
}

impl Reason {
    pub fn is_safe(&self) -> bool {
        matches!(
            self,
            Reason::ForcedNoVerification | Reason::SafeByMtime | Reason::SafeByHash
        )
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NeverParkedBefore => write!(f, "Never checked in"),
            Reason::ForcedNoVerification => write!(f, "Verification skipped (forced)"),
            Reason::HashUnavailable => {
                write!(f, "Parked without hashes; use mtime verification")
            }
            Reason::LocalPathMissing => write!(f, "Local path not found"),
            Reason::UncommittedWork => write!(f, "Has uncommitted work"),
            Reason::MissingHashData => write!(f, "Missing hash data"),
            Reason::ContentMismatch => write!(f, "Content differs from archive"),
            Reason::EmptyTree => write!(f, "No files to verify"),
            Reason::Io(detail) => write!(f, "Error reading local copy: {}", detail),
            Reason::SafeByMtime | Reason::SafeByHash => write!(f, "Safe to delete"),
        }
    }
}

/// Outcome of [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub safe: bool,
    pub reason: Reason,
}

impl From<Reason> for Verdict {
    fn from(reason: Reason) -> Self {
        Self {
            safe: reason.is_safe(),
            reason,
        }
    }
}

/// Decide whether the local copy of `project` can be deleted without losing
/// work. Read-only: the project and its files are never modified.
///
/// Order of evaluation:
/// 1. never parked -> unsafe
/// 2. forced -> safe
/// 3. mtime method for `MtimeOnly` or no-hash projects, hash method otherwise
pub fn verify(project: &Project, mode: VerifyMode) -> Verdict {
    let Some(last_park_at) = project.last_park_at else {
        return Reason::NeverParkedBefore.into();
    };

    if mode == VerifyMode::ForceSkip {
        return Reason::ForcedNoVerification.into();
    }

    if mode == VerifyMode::Hash && project.no_hash_mode {
        return Reason::HashUnavailable.into();
    }

    let Some(local_path) = project.local_path.as_deref().filter(|path| path.is_dir()) else {
        return Reason::LocalPathMissing.into();
    };

    let reason = if mode == VerifyMode::MtimeOnly || project.no_hash_mode {
        let baseline = project.last_park_mtime.unwrap_or(last_park_at);
        verify_by_mtime(local_path, baseline)
    } else {
        verify_by_hash(project, local_path, last_park_at)
    };

    debug!("Verified {} ({:?}): {:?}", local_path.display(), mode, reason);
    reason.into()
}

fn verify_by_mtime(local_path: &Path, baseline: DateTime<Utc>) -> Reason {
    match modified_since(local_path, baseline) {
        Ok(true) => Reason::UncommittedWork,
        Ok(false) => Reason::SafeByMtime,
        Err(reason) => reason,
    }
}

fn verify_by_hash(project: &Project, local_path: &Path, last_park_at: DateTime<Utc>) -> Reason {
    // Cheap dirty check first; a clean result still goes on to the full hash.
    let baseline = project.local_hash_computed_at.unwrap_or(last_park_at);
    match modified_since(local_path, baseline) {
        Ok(true) => return Reason::UncommittedWork,
        Ok(false) => {}
        Err(reason) => return reason,
    }

    let (Some(archive_hash), Some(_)) = (
        project.archive_content_hash.as_deref(),
        project.local_content_hash.as_deref(),
    ) else {
        return Reason::MissingHashData;
    };

    match hasher::hash_tree(local_path) {
        Ok(current) if current == archive_hash => Reason::SafeByHash,
        Ok(_) => Reason::ContentMismatch,
        Err(HashError::EmptyTree(_)) => Reason::EmptyTree,
        Err(err) => Reason::Io(err.to_string()),
    }
}

/// A tree without regular files cannot be compared against the archive and
/// is never treated as clean.
fn modified_since(local_path: &Path, baseline: DateTime<Utc>) -> Result<bool, Reason> {
    match scanner::newest_mtime(local_path) {
        Ok(Some(newest)) => Ok(newest > baseline),
        Ok(None) => Err(Reason::EmptyTree),
        Err(err) => Err(Reason::Io(err.to_string())),
    }
}
