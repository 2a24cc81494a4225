use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;
use walkdir::WalkDir;

/// A regular file found under a project root.
#[derive(Debug, Clone)]
pub struct RegularFile {
    pub path: PathBuf,
    /// Path relative to the walk root.
    pub relative: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Walk `root` without following links and return every regular file.
///
/// Symlinks are skipped entirely, as are directories, sockets, FIFOs and
/// device nodes. Any stat or read_dir failure aborts the walk.
pub fn regular_files(root: &Path) -> io::Result<Vec<RegularFile>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|err| walk_error(root, err))?;
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            trace!("Skipping symlink {}", entry.path().display());
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let metadata = entry.metadata().map_err(|err| walk_error(root, err))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| entry.path().to_path_buf());

        files.push(RegularFile {
            path: entry.path().to_path_buf(),
            relative,
            size: metadata.len(),
            modified: metadata.modified()?,
        });
    }

    Ok(files)
}

/// Newest modification time of any regular file under `root`.
/// `None` when the tree holds no regular files.
pub fn newest_mtime(root: &Path) -> io::Result<Option<DateTime<Utc>>> {
    let newest = regular_files(root)?
        .into_iter()
        .map(|file| file.modified)
        .max();
    Ok(newest.map(DateTime::<Utc>::from))
}

/// Total size in bytes of the regular files under `root`.
pub fn dir_size(root: &Path) -> io::Result<u64> {
    Ok(regular_files(root)?.iter().map(|file| file.size).sum())
}

fn walk_error(root: &Path, err: walkdir::Error) -> io::Error {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let kind = err
        .io_error()
        .map(io::Error::kind)
        .unwrap_or(io::ErrorKind::Other);
    io::Error::new(
        kind,
        format!("Error walking {}: {}", path.display(), err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_regular_files_skips_directories() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/one.txt"), "1").unwrap();
        fs::write(tmp.path().join("two.txt"), "22").unwrap();

        let mut files = regular_files(tmp.path()).unwrap();
        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].relative, PathBuf::from("a/b/one.txt"));
        assert_eq!(files[1].size, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_regular_files_skips_symlinks() {
        let tmp = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "outside").unwrap();
        fs::write(tmp.path().join("real.txt"), "inside").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("linked_dir")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("real.txt"), tmp.path().join("alias.txt"))
            .unwrap();

        let files = regular_files(tmp.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("real.txt"));
    }

    #[test]
    fn test_newest_mtime_empty_tree_is_none() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        assert_eq!(newest_mtime(tmp.path()).unwrap(), None);
    }

    #[test]
    fn test_newest_mtime_picks_latest_file() {
        let tmp = tempdir().unwrap();
        let old = tmp.path().join("old.txt");
        let new = tmp.path().join("new.txt");
        fs::write(&old, "old").unwrap();
        fs::write(&new, "new").unwrap();

        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let later = base + Duration::from_secs(3600);
        fs::File::options().write(true).open(&old).unwrap().set_modified(base).unwrap();
        fs::File::options().write(true).open(&new).unwrap().set_modified(later).unwrap();

        let newest = newest_mtime(tmp.path()).unwrap().unwrap();
        assert_eq!(newest, DateTime::<Utc>::from(later));
    }

    #[test]
    fn test_dir_size_sums_files() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("a.bin"), vec![0u8; 10]).unwrap();
        fs::write(tmp.path().join("sub/b.bin"), vec![0u8; 25]).unwrap();
        assert_eq!(dir_size(tmp.path()).unwrap(), 35);
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = tempdir().unwrap();
        assert!(regular_files(&tmp.path().join("nope")).is_err());
    }
}
