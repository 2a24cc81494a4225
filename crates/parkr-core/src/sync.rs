use crate::error::Error;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Makes `dst` hold exactly the contents of `src`, deleting anything extra.
pub trait DirectorySync {
    fn sync(&self, src: &Path, dst: &Path) -> Result<(), Error>;
}

/// `rsync -a --delete src/ dst`, falling back to [`mirror_tree`] when rsync
/// is not installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsyncSync;

impl DirectorySync for RsyncSync {
    fn sync(&self, src: &Path, dst: &Path) -> Result<(), Error> {
        // Trailing slash: copy the contents of src, not src itself.
        let mut src_arg = src.as_os_str().to_os_string();
        if !src_arg.to_string_lossy().ends_with('/') {
            src_arg.push("/");
        }

        debug!("rsync {} -> {}", src.display(), dst.display());
        let output = match Command::new("rsync")
            .arg("-a")
            .arg("--delete")
            .arg(&src_arg)
            .arg(dst)
            .output()
        {
            Ok(output) => output,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("rsync not found, falling back to a built-in mirror");
                return mirror_tree(src, dst).map_err(Error::from);
            }
            Err(err) => return Err(err.into()),
        };

        if !output.status.success() {
            return Err(Error::Sync(format!(
                "rsync failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Make `dst` an exact copy of `src`.
///
/// Entries in `dst` with no counterpart of the same kind in `src` are removed
/// first, then directories, files and symlinks are copied over. File
/// modification times are carried across.
pub fn mirror_tree(src: &Path, dst: &Path) -> io::Result<()> {
    if !fs::metadata(src)?.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", src.display()),
        ));
    }
    fs::create_dir_all(dst)?;

    let removed = remove_extras(src, dst)?;
    if removed > 0 {
        debug!("Removed {} stale entries from {}", removed, dst.display());
    }
    copy_entries(src, dst)
}

/// Kinds compared by [`remove_extras`]. Symlinks are always recreated.
#[derive(PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
    Other,
}

fn kind_of(file_type: fs::FileType) -> EntryKind {
    if file_type.is_symlink() {
        EntryKind::Other
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

fn remove_extras(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut stale = Vec::new();
    let mut walker = WalkDir::new(dst).min_depth(1).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(dst) else {
            continue;
        };
        let dst_kind = kind_of(entry.file_type());

        let keep = match fs::symlink_metadata(src.join(relative)) {
            Ok(meta) => dst_kind != EntryKind::Other && kind_of(meta.file_type()) == dst_kind,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => return Err(err),
        };
        if keep {
            continue;
        }

        if dst_kind == EntryKind::Dir {
            walker.skip_current_dir();
        }
        stale.push((entry.into_path(), dst_kind));
    }

    for (path, kind) in &stale {
        if *kind == EntryKind::Dir {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }
    Ok(stale.len())
}

fn copy_entries(src: &Path, dst: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
            let modified = entry.metadata().map_err(io::Error::from)?.modified()?;
            fs::File::options()
                .write(true)
                .open(&target)?
                .set_modified(modified)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, _target: &Path) -> io::Result<()> {
    warn!("Skipping symlink {}", link.display());
    Ok(())
}
