use chrono::{Duration, Utc};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;
use tempfile::tempdir;

use parkr_core::hasher::hash_tree;
use parkr_core::prune::{execute, select, FailureKind, Reason};
use parkr_core::report::ProjectReport;
use parkr_core::{
    Error, JsonStateStore, Project, ProjectStore, PruneReporter, SilentReporter, State,
    VerifyMode,
};

/// Parked no-hash projects `a`, `b`, `c` of 10, 20 and 30 bytes, oldest first.
fn create_store(root: &Path) -> JsonStateStore {
    let mut state = State::default();
    for (index, (name, size)) in [("a", 10usize), ("b", 20), ("c", 30)].iter().enumerate() {
        let local = root.join("local").join(name);
        fs::create_dir_all(&local).unwrap();
        let file = local.join("data.bin");
        fs::write(&file, vec![1u8; *size]).unwrap();
        fs::File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(SystemTime::from(Utc::now() - Duration::days(10 - index as i64)))
            .unwrap();

        let parked = Utc::now() - Duration::days(1);
        state.projects.insert(
            name.to_string(),
            Project {
                local_path: Some(local),
                master: "primary".to_string(),
                archive_category: "code".to_string(),
                grabbed_at: Some(Utc::now() - Duration::days(30)),
                last_park_at: Some(parked),
                last_park_mtime: Some(parked),
                no_hash_mode: true,
                is_grabbed: true,
                ..Project::default()
            },
        );
    }

    let store = JsonStateStore::with_state(&root.join("state.json"), state);
    store.save().unwrap();
    store
}

/// Same fixture, parked with content hashes recorded.
fn create_hashed_store(root: &Path) -> JsonStateStore {
    let mut store = create_store(root);
    for name in ["a", "b", "c"] {
        let project = store.project_mut(name).unwrap();
        let digest = hash_tree(project.local_path.as_deref().unwrap()).unwrap();
        project.no_hash_mode = false;
        project.archive_content_hash = Some(digest.clone());
        project.local_content_hash = Some(digest);
        project.local_hash_computed_at = Some(Utc::now() - Duration::days(1));
    }
    store.save().unwrap();
    store
}

fn names(reports: &[ProjectReport]) -> Vec<&str> {
    reports.iter().map(|report| report.name.as_str()).collect()
}

/// Delegates to a JSON store but fails the `fail_on`-th save.
struct FailingStore {
    inner: JsonStateStore,
    saves: Cell<usize>,
    fail_on: usize,
}

impl ProjectStore for FailingStore {
    fn projects(&self) -> &BTreeMap<String, Project> {
        self.inner.projects()
    }

    fn project_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.inner.project_mut(name)
    }

    fn save(&self) -> Result<(), Error> {
        let count = self.saves.get() + 1;
        self.saves.set(count);
        if count == self.fail_on {
            return Err(Error::Io(io::Error::new(io::ErrorKind::Other, "disk full")));
        }
        self.inner.save()
    }
}

#[derive(Default)]
struct RecordingReporter {
    events: RefCell<Vec<String>>,
}

impl PruneReporter for RecordingReporter {
    fn on_delete_start(&self, project: &ProjectReport) {
        self.events.borrow_mut().push(format!("start {}", project.name));
    }

    fn on_delete_result(&self, project: &ProjectReport, success: bool, freed: u64) {
        self.events
            .borrow_mut()
            .push(format!("result {} {} {}", project.name, success, freed));
    }

    fn on_batch_complete(&self, deleted: usize, failed: usize, freed: u64) {
        self.events
            .borrow_mut()
            .push(format!("complete {} {} {}", deleted, failed, freed));
    }
}

struct PanickingReporter;

impl PruneReporter for PanickingReporter {
    fn on_delete_start(&self, _project: &ProjectReport) {
        panic!("reporter exploded");
    }

    fn on_batch_complete(&self, _deleted: usize, _failed: usize, _freed: u64) {
        panic!("reporter exploded again");
    }
}

#[test]
fn test_deletes_selected_and_persists_release() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let selection = select(store.projects(), 25, false);
    let reporter = RecordingReporter::default();

    let result = execute(&mut store, &selection, VerifyMode::Auto, &reporter);

    assert_eq!(names(&result.deleted), vec!["a", "b"]);
    assert!(result.failed.is_empty());
    assert!(result.skipped.is_empty());
    assert_eq!(result.total_freed, 30);
    assert!(!tmp.path().join("local/a").exists());
    assert!(!tmp.path().join("local/b").exists());
    assert!(tmp.path().join("local/c").exists());

    let reloaded = JsonStateStore::open(&tmp.path().join("state.json")).unwrap();
    assert!(!reloaded.projects()["a"].is_grabbed);
    assert!(reloaded.projects()["a"].grabbed_at.is_none());
    assert!(!reloaded.projects()["b"].is_grabbed);
    assert!(reloaded.projects()["c"].is_grabbed);

    assert_eq!(
        *reporter.events.borrow(),
        vec![
            "start a",
            "result a true 10",
            "start b",
            "result b true 20",
            "complete 2 0 30",
        ]
    );
}

#[test]
fn test_reverifies_before_each_deletion() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let selection = select(store.projects(), 1_000, false);
    assert_eq!(selection.selected_count(), 3);

    // Work lands in `b` between selection and execution.
    fs::write(tmp.path().join("local/b/late.txt"), "late edit").unwrap();

    let result = execute(&mut store, &selection, VerifyMode::Auto, &SilentReporter);

    assert_eq!(names(&result.deleted), vec!["a", "c"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].report.name, "b");
    assert_eq!(
        result.failed[0].kind,
        FailureKind::Unverified(Reason::UncommittedWork)
    );
    assert!(tmp.path().join("local/b/late.txt").exists());
    assert_eq!(result.total_freed, 40);

    let reloaded = JsonStateStore::open(&tmp.path().join("state.json")).unwrap();
    assert!(reloaded.projects()["b"].is_grabbed);
}

#[test]
fn test_reverifies_hash_when_content_changes_under_old_mtime() {
    let tmp = tempdir().unwrap();
    let mut store = create_hashed_store(tmp.path());
    let selection = select(store.projects(), 1_000, false);
    assert_eq!(selection.selected_count(), 3);

    // Same size and mtime as at park time; only the bytes differ.
    let file = tmp.path().join("local/b/data.bin");
    let pinned = fs::metadata(&file).unwrap().modified().unwrap();
    fs::write(&file, vec![2u8; 20]).unwrap();
    fs::File::options()
        .write(true)
        .open(&file)
        .unwrap()
        .set_modified(pinned)
        .unwrap();

    let result = execute(&mut store, &selection, VerifyMode::Auto, &SilentReporter);

    assert_eq!(names(&result.deleted), vec!["a", "c"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].report.name, "b");
    assert_eq!(
        result.failed[0].kind,
        FailureKind::Unverified(Reason::ContentMismatch)
    );
    assert!(file.exists());
    assert!(store.projects()["b"].is_grabbed);
}

#[test]
fn test_project_emptied_after_selection_is_kept() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let selection = select(store.projects(), 5, false);
    assert_eq!(selection.selected_count(), 1);

    fs::remove_file(tmp.path().join("local/a/data.bin")).unwrap();
    let result = execute(&mut store, &selection, VerifyMode::Auto, &SilentReporter);

    assert!(result.deleted.is_empty());
    assert_eq!(result.failed[0].kind, FailureKind::Unverified(Reason::EmptyTree));
    assert!(tmp.path().join("local/a").is_dir());
}

#[test]
fn test_project_released_after_selection_is_not_tracked() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let selection = select(store.projects(), 5, false);

    store.project_mut("a").unwrap().mark_released();
    let result = execute(&mut store, &selection, VerifyMode::Auto, &SilentReporter);

    assert!(result.deleted.is_empty());
    assert_eq!(result.failed[0].kind, FailureKind::NotTracked);
    assert!(tmp.path().join("local/a").exists());
}

#[test]
fn test_save_failure_stops_batch_and_keeps_prefix_durable() {
    let tmp = tempdir().unwrap();
    let mut store = FailingStore {
        inner: create_store(tmp.path()),
        saves: Cell::new(0),
        fail_on: 2,
    };
    let selection = select(store.projects(), 1_000, false);
    let reporter = RecordingReporter::default();

    let result = execute(&mut store, &selection, VerifyMode::Auto, &reporter);

    assert_eq!(names(&result.deleted), vec!["a"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].report.name, "b");
    assert!(matches!(
        result.failed[0].kind,
        FailureKind::DirectoryDeletedButStateSaveFailed(_)
    ));
    assert!(result.has_unsaved_deletions());
    assert_eq!(names(&result.skipped), vec!["c"]);
    // `b` is gone from disk, so its bytes count as freed.
    assert_eq!(result.total_freed, 30);

    assert!(!tmp.path().join("local/b").exists());
    assert!(tmp.path().join("local/c").exists());

    let reloaded = JsonStateStore::open(&tmp.path().join("state.json")).unwrap();
    assert!(!reloaded.projects()["a"].is_grabbed);
    assert!(reloaded.projects()["b"].is_grabbed);
    assert!(reloaded.projects()["c"].is_grabbed);

    assert!(reporter
        .events
        .borrow()
        .contains(&"result b false 0".to_string()));
}

#[test]
fn test_stops_once_target_reached() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let mut selection = select(store.projects(), 25, false);
    selection.apply_selection(&["a".to_string(), "b".to_string(), "c".to_string()]);

    let result = execute(&mut store, &selection, VerifyMode::Auto, &SilentReporter);

    assert_eq!(names(&result.deleted), vec!["a", "b"]);
    assert_eq!(names(&result.skipped), vec!["c"]);
    assert_eq!(result.total_freed, 30);
    assert_eq!(result.target_bytes, 25);
    assert!(tmp.path().join("local/c").exists());
}

#[test]
fn test_panicking_reporter_does_not_stop_batch() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let selection = select(store.projects(), 1_000, false);

    let result = execute(&mut store, &selection, VerifyMode::Auto, &PanickingReporter);

    assert_eq!(names(&result.deleted), vec!["a", "b", "c"]);
    assert_eq!(result.total_freed, 60);
}

#[test]
fn test_force_deletes_never_parked_projects() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let a = store.project_mut("a").unwrap();
    a.last_park_at = None;
    a.last_park_mtime = None;

    let unforced = select(store.projects(), 5, false);
    assert!(!unforced.selected().any(|report| report.name == "a"));

    let selection = select(store.projects(), 5, true);
    let result = execute(&mut store, &selection, VerifyMode::ForceSkip, &SilentReporter);

    assert_eq!(names(&result.deleted), vec!["a"]);
    assert!(!tmp.path().join("local/a").exists());
}

#[test]
fn test_empty_selection_is_a_no_op() {
    let tmp = tempdir().unwrap();
    let mut store = create_store(tmp.path());
    let mut selection = select(store.projects(), 25, false);
    selection.apply_selection(&[]);

    let result = execute(&mut store, &selection, VerifyMode::Auto, &SilentReporter);

    assert!(result.deleted.is_empty());
    assert!(result.failed.is_empty());
    assert_eq!(result.total_freed, 0);
    assert!(tmp.path().join("local/a").exists());
}
