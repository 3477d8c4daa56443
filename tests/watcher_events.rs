//! Watcher end-to-end tests
//!
//! Real filesystem, real notify backend: write files under a registered
//! project root and observe the recorded events. Assertions poll the store
//! with generous timeouts since notification latency varies by platform.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use codetrail::config::Config;
use codetrail::models::event::{Event, EventKind};
use codetrail::models::project::{NewProject, Project, ProjectConfig};
use codetrail::services::{Broadcaster, WatcherSupervisor};
use codetrail::storage::{Database, EventFilter};

const SETTLE: Duration = Duration::from_millis(400);

struct Harness {
    _dir: TempDir,
    root: std::path::PathBuf,
    db: Arc<Database>,
    supervisor: WatcherSupervisor,
    project: Project,
}

async fn start(config: Config, ignore_patterns: Vec<String>) -> Harness {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let db = Arc::new(Database::in_memory().unwrap());
    let project = db
        .create_project(&NewProject {
            name: "p".to_string(),
            path: root.to_string_lossy().to_string(),
            description: None,
            ignore_patterns,
            feature_doc_path: None,
            active: true,
        })
        .unwrap();
    let supervisor = WatcherSupervisor::new(&config, db.clone(), Broadcaster::new(), None);
    supervisor.start_project(&project).await;
    // Let the watch registration settle before the first write.
    tokio::time::sleep(SETTLE).await;
    Harness {
        _dir: dir,
        root,
        db,
        supervisor,
        project,
    }
}

/// Poll until the filter yields at least `count` events, or time out.
async fn wait_for_events(
    db: &Database,
    project_id: i64,
    kind: EventKind,
    count: usize,
) -> Vec<Event> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(8);
    loop {
        let (items, _) = db
            .list_events(&EventFilter {
                project_id: Some(project_id),
                kind: Some(kind),
                limit: 100,
                ..Default::default()
            })
            .unwrap();
        if items.len() >= count {
            return items;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "timed out waiting for {} {:?} events, have {}",
                count,
                kind,
                items.len()
            );
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn count_events(db: &Database, project_id: i64, kind: EventKind) -> usize {
    let (items, _) = db
        .list_events(&EventFilter {
            project_id: Some(project_id),
            kind: Some(kind),
            limit: 100,
            ..Default::default()
        })
        .unwrap();
    items.len()
}

#[tokio::test]
async fn create_and_edit_records_file_change() {
    let harness = start(Config::default(), vec![]).await;
    std::fs::write(harness.root.join("f.txt"), "hello\n").unwrap();

    let events = wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    let event = &events[0];
    assert_eq!(event.path.as_deref(), Some("f.txt"));
    assert_eq!(event.payload["size"], 6);
    assert_eq!(event.payload["baseline"], "cache");
    let diff = event.payload["diff"].as_str().unwrap();
    assert!(diff.contains("+hello"));
    assert_eq!(event.payload["sha"].as_str().unwrap().len(), 64);

    harness.supervisor.stop_all().await;
}

#[tokio::test]
async fn byte_equal_rewrite_coalesces() {
    let harness = start(Config::default(), vec![]).await;
    std::fs::write(harness.root.join("same.txt"), "stable\n").unwrap();
    wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;

    std::fs::write(harness.root.join("same.txt"), "stable\n").unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        count_events(&harness.db, harness.project.id, EventKind::FileChange).await,
        1
    );

    harness.supervisor.stop_all().await;
}

#[tokio::test]
async fn ignored_paths_produce_no_events() {
    let harness = start(Config::default(), vec!["*.log".to_string()]).await;
    std::fs::write(harness.root.join("x.log"), "ignored\n").unwrap();
    std::fs::write(harness.root.join("x.txt"), "recorded\n").unwrap();

    let events = wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path.as_deref(), Some("x.txt"));

    // Give the ignored write every chance to surface, then confirm silence.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let all_paths: Vec<Event> =
        wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    assert!(all_paths.iter().all(|e| e.path.as_deref() != Some("x.log")));

    harness.supervisor.stop_all().await;
}

#[tokio::test]
async fn global_ignore_segments_apply() {
    let harness = start(Config::default(), vec![]).await;
    std::fs::create_dir_all(harness.root.join("node_modules/dep")).unwrap();
    std::fs::write(harness.root.join("node_modules/dep/index.js"), "x\n").unwrap();
    std::fs::write(harness.root.join("app.js"), "y\n").unwrap();

    let events = wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    assert!(events.iter().all(|e| e.path.as_deref() == Some("app.js")));

    harness.supervisor.stop_all().await;
}

#[tokio::test]
async fn config_swap_applies_new_ignores() {
    let harness = start(Config::default(), vec!["*.log".to_string()]).await;

    harness
        .db
        .update_project_config(
            harness.project.id,
            &ProjectConfig {
                ignore_patterns: vec!["*.tmp".to_string()],
                feature_doc_path: None,
            },
        )
        .unwrap();
    harness
        .supervisor
        .restart_project(harness.project.id)
        .await
        .unwrap();
    tokio::time::sleep(SETTLE).await;

    std::fs::write(harness.root.join("x.tmp"), "now ignored\n").unwrap();
    std::fs::write(harness.root.join("x.log"), "now recorded\n").unwrap();

    let events = wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    assert!(events.iter().any(|e| e.path.as_deref() == Some("x.log")));
    assert!(events.iter().all(|e| e.path.as_deref() != Some("x.tmp")));

    harness.supervisor.stop_all().await;
}

#[tokio::test]
async fn deletion_and_folders_record_typed_events() {
    let harness = start(Config::default(), vec![]).await;

    std::fs::write(harness.root.join("doomed.txt"), "bye\n").unwrap();
    wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    std::fs::remove_file(harness.root.join("doomed.txt")).unwrap();
    let deleted =
        wait_for_events(&harness.db, harness.project.id, EventKind::FileDeleted, 1).await;
    assert_eq!(deleted[0].path.as_deref(), Some("doomed.txt"));
    assert_eq!(deleted[0].payload, serde_json::json!({"event": "deleted"}));

    std::fs::create_dir(harness.root.join("subdir")).unwrap();
    let created =
        wait_for_events(&harness.db, harness.project.id, EventKind::FolderCreated, 1).await;
    assert_eq!(
        created[0].payload,
        serde_json::json!({"event": "created", "type": "directory"})
    );

    std::fs::remove_dir(harness.root.join("subdir")).unwrap();
    let removed =
        wait_for_events(&harness.db, harness.project.id, EventKind::FolderDeleted, 1).await;
    assert_eq!(removed[0].path.as_deref(), Some("subdir"));

    harness.supervisor.stop_all().await;
}

#[tokio::test]
async fn size_cap_boundary() {
    let config = Config {
        max_file_bytes: 10,
        ..Default::default()
    };
    let harness = start(config, vec![]).await;

    // Exactly at the cap: processed.
    std::fs::write(harness.root.join("fits.bin"), vec![b'a'; 10]).unwrap();
    let events = wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    assert_eq!(events[0].path.as_deref(), Some("fits.bin"));

    // One byte over: dropped entirely.
    std::fs::write(harness.root.join("big.bin"), vec![b'a'; 11]).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let all = wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;
    assert!(all.iter().all(|e| e.path.as_deref() != Some("big.bin")));

    harness.supervisor.stop_all().await;
}

#[tokio::test]
async fn second_write_diffs_against_cached_baseline() {
    let harness = start(Config::default(), vec![]).await;
    let file = harness.root.join("grow.txt");

    std::fs::write(&file, "one\n").unwrap();
    wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 1).await;

    std::fs::write(&file, "one\ntwo\n").unwrap();
    let events = wait_for_events(&harness.db, harness.project.id, EventKind::FileChange, 2).await;

    // Newest first: the second event's diff adds only the new line.
    let latest = &events[0];
    let diff = latest.payload["diff"].as_str().unwrap();
    assert!(diff.contains("+two"));
    assert!(!diff.contains("+one\n+two"));
    assert_eq!(latest.payload["baseline"], "cache");
    assert_eq!(latest.payload["event"], "modified");

    harness.supervisor.stop_all().await;
}
