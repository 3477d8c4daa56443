//! Application State
//!
//! Builds and holds the long-lived components: database, broadcaster,
//! watcher supervisor, and the analysis services. Cloned freely into axum
//! handlers; everything inside is reference-counted.

use std::sync::Arc;

use codetrail_llm::{build_model, ClientConfig};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::services::git::GitRepo;
use crate::services::{
    ArchitectureTracker, Broadcaster, Correlator, Summarizer, TaskPool, WatcherSupervisor,
};
use crate::storage::Database;
use crate::utils::error::AppResult;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub broadcaster: Broadcaster,
    pub supervisor: Arc<WatcherSupervisor>,
    pub correlator: Arc<Correlator>,
    pub tracker: Arc<ArchitectureTracker>,
    pub summarizer: Arc<Summarizer>,
    pub tasks: TaskPool,
}

impl AppState {
    /// Open the configured database and assemble the component graph.
    pub fn new(config: Config) -> AppResult<Self> {
        let db = Arc::new(Database::new(&config.db_path)?);
        Self::with_database(config, db)
    }

    /// Assemble around an existing database (tests use an in-memory one).
    pub fn with_database(config: Config, db: Arc<Database>) -> AppResult<Self> {
        let broadcaster = Broadcaster::new();
        let model = build_model(config.openai_api_key.as_ref().map(|api_key| ClientConfig {
            api_key: api_key.clone(),
            base_url: None,
            impact_model: config.openai_model.clone(),
            matching_model: config.openai_matching_model.clone(),
            timeout_secs: config.llm_timeout_secs,
        }));
        if !model.enabled() {
            tracing::info!("no analysis credential configured; correlation and impact tracking disabled");
        }

        let tasks = TaskPool::new(config.max_background_tasks);
        let tracker = Arc::new(ArchitectureTracker::new(
            db.clone(),
            model.clone(),
            broadcaster.clone(),
        ));
        let correlator = Arc::new(Correlator::new(
            db.clone(),
            model.clone(),
            broadcaster.clone(),
            config.correlation_window_secs,
        ));
        let summarizer = Arc::new(Summarizer::new(
            db.clone(),
            model.clone(),
            broadcaster.clone(),
            config.repo_path.as_deref().and_then(GitRepo::discover),
        ));

        // Watchers forward appended file_change events here; each becomes an
        // impact-analysis task when the tracker is enabled.
        let impact_tx = if tracker.enabled() {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let pool = tasks.clone();
            let tracker_for_loop = tracker.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let tracker = tracker_for_loop.clone();
                    pool.spawn("impact-analysis", async move {
                        tracker.analyze_event(event).await;
                    });
                }
            });
            Some(tx)
        } else {
            None
        };

        let supervisor = Arc::new(WatcherSupervisor::new(
            &config,
            db.clone(),
            broadcaster.clone(),
            impact_tx,
        ));

        Ok(Self {
            config: Arc::new(config),
            db,
            broadcaster,
            supervisor,
            correlator,
            tracker,
            summarizer,
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_builds_without_credential() {
        let db = Arc::new(Database::in_memory().unwrap());
        let state = AppState::with_database(Config::default(), db).unwrap();
        assert!(!state.correlator.enabled());
        assert!(!state.tracker.enabled());
        assert_eq!(state.supervisor.watcher_count().await, 0);
    }
}
