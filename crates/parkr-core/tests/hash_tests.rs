use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

use parkr_core::hasher::hash_tree;
use parkr_core::HashError;

/// Layout:
///   root/
///     README.md     ("# demo")
///     src/main.rs   ("fn main() {}")
///     data/raw.bin  (2KB of 0x5A)
fn create_project(root: &Path) {
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();
    fs::write(root.join("README.md"), "# demo").unwrap();
    fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
    fs::write(root.join("data/raw.bin"), vec![0x5Au8; 2048]).unwrap();
}

#[test]
fn test_identical_trees_hash_identically() {
    let a = tempdir().unwrap();
    let b = tempdir().unwrap();
    create_project(a.path());
    create_project(b.path());

    let first = hash_tree(a.path()).unwrap();
    assert_eq!(first, hash_tree(a.path()).unwrap());
    assert_eq!(first, hash_tree(b.path()).unwrap());
    assert_eq!(first.len(), 64);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn test_content_change_changes_digest() {
    let tmp = tempdir().unwrap();
    create_project(tmp.path());
    let before = hash_tree(tmp.path()).unwrap();

    fs::write(tmp.path().join("src/main.rs"), "fn main() { todo!() }").unwrap();
    assert_ne!(before, hash_tree(tmp.path()).unwrap());
}

#[test]
fn test_rename_changes_digest() {
    let tmp = tempdir().unwrap();
    create_project(tmp.path());
    let before = hash_tree(tmp.path()).unwrap();

    fs::rename(tmp.path().join("README.md"), tmp.path().join("README.txt")).unwrap();
    assert_ne!(before, hash_tree(tmp.path()).unwrap());
}

#[test]
fn test_moving_file_between_directories_changes_digest() {
    let tmp = tempdir().unwrap();
    create_project(tmp.path());
    let before = hash_tree(tmp.path()).unwrap();

    fs::rename(tmp.path().join("data/raw.bin"), tmp.path().join("src/raw.bin")).unwrap();
    assert_ne!(before, hash_tree(tmp.path()).unwrap());
}

#[test]
fn test_mtime_and_empty_dirs_do_not_affect_digest() {
    let tmp = tempdir().unwrap();
    create_project(tmp.path());
    let before = hash_tree(tmp.path()).unwrap();

    let past = SystemTime::now() - Duration::from_secs(86_400 * 30);
    fs::File::options()
        .write(true)
        .open(tmp.path().join("README.md"))
        .unwrap()
        .set_modified(past)
        .unwrap();
    fs::create_dir_all(tmp.path().join("empty/nested")).unwrap();

    assert_eq!(before, hash_tree(tmp.path()).unwrap());
}

#[cfg(unix)]
#[test]
fn test_symlinks_are_ignored() {
    let tmp = tempdir().unwrap();
    create_project(tmp.path());
    let before = hash_tree(tmp.path()).unwrap();

    std::os::unix::fs::symlink(tmp.path().join("README.md"), tmp.path().join("link.md"))
        .unwrap();
    std::os::unix::fs::symlink(tmp.path().join("src"), tmp.path().join("src-link")).unwrap();

    assert_eq!(before, hash_tree(tmp.path()).unwrap());
}

#[test]
fn test_tree_without_files_is_an_error() {
    let tmp = tempdir().unwrap();
    assert!(matches!(hash_tree(tmp.path()), Err(HashError::EmptyTree(_))));

    fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
    assert!(matches!(hash_tree(tmp.path()), Err(HashError::EmptyTree(_))));
}

#[cfg(unix)]
#[test]
fn test_tree_of_only_symlinks_is_an_error() {
    let tmp = tempdir().unwrap();
    let outside = tempdir().unwrap();
    fs::write(outside.path().join("target.txt"), "outside").unwrap();
    std::os::unix::fs::symlink(outside.path().join("target.txt"), tmp.path().join("link"))
        .unwrap();

    assert!(matches!(hash_tree(tmp.path()), Err(HashError::EmptyTree(_))));
}

#[test]
fn test_missing_root_is_an_io_error() {
    let tmp = tempdir().unwrap();
    let result = hash_tree(&tmp.path().join("missing"));
    assert!(matches!(result, Err(HashError::Io { .. })));
}
