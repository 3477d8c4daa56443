//! Watcher Supervisor
//!
//! Owns the set of running project watchers. Starts one per active project
//! at boot, swaps a watcher when its project configuration changes, and
//! tears one down on deactivation or deletion. Swaps are serialized so no
//! two watchers for the same project are ever live simultaneously; a dead
//! watcher stays dead until the next configuration update.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use super::broadcaster::Broadcaster;
use super::watcher::{ProjectWatcher, WatcherHandle};
use crate::config::Config;
use crate::models::event::Event;
use crate::models::project::Project;
use crate::storage::Database;
use crate::utils::error::AppResult;

/// Grace period for a watcher to acknowledge teardown.
const STOP_GRACE: Duration = Duration::from_secs(2);

pub struct WatcherSupervisor {
    db: Arc<Database>,
    broadcaster: Broadcaster,
    global_ignores: Vec<String>,
    max_file_bytes: u64,
    debounce_ms: u64,
    fallback_repo: Option<std::path::PathBuf>,
    impact_tx: Option<mpsc::UnboundedSender<Event>>,
    /// Live watcher handles by project id. The mutex also serializes
    /// start/stop/swap sequences.
    watchers: Mutex<HashMap<i64, WatcherHandle>>,
}

impl WatcherSupervisor {
    pub fn new(
        config: &Config,
        db: Arc<Database>,
        broadcaster: Broadcaster,
        impact_tx: Option<mpsc::UnboundedSender<Event>>,
    ) -> Self {
        Self {
            db,
            broadcaster,
            global_ignores: config.global_ignores.clone(),
            max_file_bytes: config.max_file_bytes,
            debounce_ms: config.debounce_ms,
            fallback_repo: config.repo_path.clone(),
            impact_tx,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Start a watcher for every active project. Called once at boot.
    pub async fn start_all(&self) -> AppResult<usize> {
        let projects = self.db.list_projects(Some(true))?;
        let mut started = 0;
        for summary in projects {
            self.start_project(&summary.project).await;
            started += 1;
        }
        tracing::info!(count = started, "watchers started");
        Ok(started)
    }

    /// Start a watcher for one project, replacing any existing one.
    pub async fn start_project(&self, project: &Project) {
        let mut watchers = self.watchers.lock().await;
        if let Some(old) = watchers.remove(&project.id) {
            old.stop(STOP_GRACE).await;
        }
        let handle = self.build_watcher(project).spawn();
        watchers.insert(project.id, handle);
    }

    /// Tear down and join the watcher for a project, if any.
    pub async fn stop_project(&self, project_id: i64) {
        let handle = self.watchers.lock().await.remove(&project_id);
        if let Some(handle) = handle {
            handle.stop(STOP_GRACE).await;
        }
    }

    /// Two-phase swap after a configuration update: construct the
    /// replacement with the fresh configuration, tear down and join the old
    /// watcher, then begin the new one. The map lock serializes swaps, so
    /// no interval sees two live watchers for the same project.
    pub async fn restart_project(&self, project_id: i64) -> AppResult<()> {
        let project = self.db.get_project(project_id)?;
        let mut watchers = self.watchers.lock().await;

        let replacement = if project.active {
            Some(self.build_watcher(&project))
        } else {
            None
        };

        if let Some(old) = watchers.remove(&project_id) {
            old.stop(STOP_GRACE).await;
        }
        if let Some(replacement) = replacement {
            watchers.insert(project_id, replacement.spawn());
        }
        Ok(())
    }

    /// Number of watcher handles currently held (live or finished-dead).
    pub async fn watcher_count(&self) -> usize {
        self.watchers.lock().await.len()
    }

    /// Stop everything. Used on shutdown.
    pub async fn stop_all(&self) {
        let mut watchers = self.watchers.lock().await;
        for (_, handle) in watchers.drain() {
            handle.stop(STOP_GRACE).await;
        }
    }

    fn build_watcher(&self, project: &Project) -> ProjectWatcher {
        ProjectWatcher::new(
            project,
            &self.global_ignores,
            self.max_file_bytes,
            self.debounce_ms,
            self.fallback_repo.as_deref(),
            self.db.clone(),
            self.broadcaster.clone(),
            self.impact_tx.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::NewProject;
    use tempfile::TempDir;

    fn supervisor(db: Arc<Database>) -> WatcherSupervisor {
        WatcherSupervisor::new(&Config::default(), db, Broadcaster::new(), None)
    }

    fn new_project(path: &str) -> NewProject {
        NewProject {
            name: "p".to_string(),
            path: path.to_string(),
            description: None,
            ignore_patterns: vec![],
            feature_doc_path: None,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let project = db
            .create_project(&new_project(&dir.path().to_string_lossy()))
            .unwrap();
        let supervisor = supervisor(db);

        supervisor.start_project(&project).await;
        assert_eq!(supervisor.watcher_count().await, 1);

        supervisor.stop_project(project.id).await;
        assert_eq!(supervisor.watcher_count().await, 0);
    }

    #[tokio::test]
    async fn test_restart_keeps_single_handle() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let project = db
            .create_project(&new_project(&dir.path().to_string_lossy()))
            .unwrap();
        let supervisor = supervisor(db);

        supervisor.start_project(&project).await;
        supervisor.restart_project(project.id).await.unwrap();
        assert_eq!(supervisor.watcher_count().await, 1);
    }

    #[tokio::test]
    async fn test_restart_of_inactive_project_stops_watcher() {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::in_memory().unwrap());
        let project = db
            .create_project(&new_project(&dir.path().to_string_lossy()))
            .unwrap();
        let supervisor = supervisor(db.clone());
        supervisor.start_project(&project).await;

        db.update_project(
            project.id,
            &crate::models::project::ProjectUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .unwrap();
        supervisor.restart_project(project.id).await.unwrap();
        assert_eq!(supervisor.watcher_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_directory_records_error_event() {
        let db = Arc::new(Database::in_memory().unwrap());
        let project = db
            .create_project(&new_project("/nonexistent/codetrail-test-root"))
            .unwrap();
        let supervisor = supervisor(db.clone());
        supervisor.start_project(&project).await;

        // The watcher task fails fast; give it a moment to record the error.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let (items, total) = db
            .list_events(&crate::storage::EventFilter {
                project_id: Some(project.id),
                limit: 10,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].kind, crate::models::event::EventKind::Error);
    }
}
