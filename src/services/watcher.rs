//! Project Watcher
//!
//! One instance per active project. Translates raw file-system
//! notifications under the project root into typed events: applies the
//! ignore filter, computes unified diffs against the baseline cache, writes
//! through the store, and publishes each appended event on the broadcaster.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{EventKind as FsEventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::baseline::BaselineCache;
use super::broadcaster::Broadcaster;
use super::diff::diff_bytes;
use super::git::GitRepo;
use super::ignore::IgnoreFilter;
use crate::models::event::{
    ChangeAction, Envelope, Event, EventKind, EventPayload, FileChangePayload,
};
use crate::models::project::Project;
use crate::storage::Database;
use crate::utils::error::AppResult;

/// Store-write retry attempts before the watcher gives up on an event.
const STORE_RETRIES: u32 = 3;

/// Messages flowing from the notify callback thread into the async loop.
enum WatcherMsg {
    Fs(notify::Event),
    Failed(String),
}

/// A running watcher task, owned by the supervisor.
pub struct WatcherHandle {
    pub project_id: i64,
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl WatcherHandle {
    /// Request teardown and wait up to `grace` for the task to finish.
    /// A task that cannot stop in time is abandoned and logged.
    pub async fn stop(self, grace: Duration) {
        self.cancel.cancel();
        if tokio::time::timeout(grace, self.join).await.is_err() {
            tracing::warn!(project_id = self.project_id, "watcher did not stop in time; abandoning");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// A constructed-but-not-yet-started watcher for one project.
pub struct ProjectWatcher {
    project_id: i64,
    root: PathBuf,
    filter: IgnoreFilter,
    baseline: BaselineCache,
    max_file_bytes: u64,
    debounce_ms: u64,
    db: Arc<Database>,
    broadcaster: Broadcaster,
    /// Appended `file_change` events are forwarded here for impact analysis.
    impact_tx: Option<mpsc::UnboundedSender<Event>>,
}

impl ProjectWatcher {
    pub fn new(
        project: &Project,
        global_ignores: &[String],
        max_file_bytes: u64,
        debounce_ms: u64,
        fallback_repo: Option<&Path>,
        db: Arc<Database>,
        broadcaster: Broadcaster,
        impact_tx: Option<mpsc::UnboundedSender<Event>>,
    ) -> Self {
        let root = PathBuf::from(&project.path);
        let repo = GitRepo::discover(&root).or_else(|| {
            // REPO_PATH fallback, only if the project lives inside it.
            fallback_repo
                .and_then(GitRepo::discover)
                .filter(|repo| root.starts_with(repo.root()))
        });
        if let Some(ref repo) = repo {
            tracing::debug!(project_id = project.id, root = %repo.root().display(), "baseline seeded from git HEAD");
        }
        Self {
            project_id: project.id,
            root,
            filter: IgnoreFilter::new(global_ignores, &project.ignore_patterns),
            baseline: BaselineCache::new(repo),
            max_file_bytes,
            debounce_ms,
            db,
            broadcaster,
            impact_tx,
        }
    }

    /// Begin watching. The returned handle owns the spawned task.
    pub fn spawn(self) -> WatcherHandle {
        let project_id = self.project_id;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            self.run(task_cancel).await;
        });
        WatcherHandle {
            project_id,
            cancel,
            join,
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        if !self.root.is_dir() {
            self.record_failure(format!(
                "Watch root does not exist: {}",
                self.root.display()
            ))
            .await;
            return;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<WatcherMsg>();
        let callback_tx = tx.clone();
        let mut watcher: RecommendedWatcher = match notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| {
                let msg = match result {
                    Ok(event) => WatcherMsg::Fs(event),
                    Err(e) => WatcherMsg::Failed(e.to_string()),
                };
                let _ = callback_tx.send(msg);
            },
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.record_failure(format!("Failed to create watcher: {}", e))
                    .await;
                return;
            }
        };
        if let Err(e) = watcher.watch(&self.root, RecursiveMode::Recursive) {
            self.record_failure(format!(
                "Failed to watch {}: {}",
                self.root.display(),
                e
            ))
            .await;
            return;
        }

        tracing::info!(project_id = self.project_id, root = %self.root.display(), "watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(WatcherMsg::Fs(event)) => {
                        let mut batch = vec![event];
                        if self.debounce_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(self.debounce_ms)).await;
                            while let Ok(WatcherMsg::Fs(next)) = rx.try_recv() {
                                batch.push(next);
                            }
                            coalesce_batch(&mut batch);
                        }
                        for event in batch {
                            self.handle_notification(event).await;
                        }
                    }
                    Some(WatcherMsg::Failed(message)) => {
                        self.record_failure(format!("Watch subscription failed: {}", message))
                            .await;
                        break;
                    }
                    None => break,
                },
            }
        }

        tracing::info!(project_id = self.project_id, "watcher stopped");
    }

    async fn handle_notification(&mut self, event: notify::Event) {
        for path in &event.paths {
            let rel = match path.strip_prefix(&self.root) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
                _ => continue, // outside the root, or the root itself
            };
            if self.filter.is_ignored(&rel) {
                continue;
            }
            let rel_str = rel.to_string_lossy().replace('\\', "/");

            match event.kind {
                FsEventKind::Create(CreateKind::Folder) => {
                    self.append_and_publish(EventKind::FolderCreated, &rel_str, EventPayload::FolderCreated)
                        .await;
                }
                FsEventKind::Create(_) => {
                    if path.is_dir() {
                        self.append_and_publish(EventKind::FolderCreated, &rel_str, EventPayload::FolderCreated)
                            .await;
                    } else {
                        self.handle_file_write(path, &rel_str, ChangeAction::Created)
                            .await;
                    }
                }
                FsEventKind::Modify(ModifyKind::Name(_)) => {
                    // Renames surface as Name modifications; resolve by
                    // looking at what is on disk now.
                    if path.is_dir() {
                        self.append_and_publish(EventKind::FolderCreated, &rel_str, EventPayload::FolderCreated)
                            .await;
                    } else if path.is_file() {
                        self.handle_file_write(path, &rel_str, ChangeAction::Created)
                            .await;
                    } else {
                        self.baseline.forget(path);
                        self.append_and_publish(EventKind::FileDeleted, &rel_str, EventPayload::FileDeleted)
                            .await;
                    }
                }
                FsEventKind::Modify(_) => {
                    if path.is_file() {
                        self.handle_file_write(path, &rel_str, ChangeAction::Modified)
                            .await;
                    }
                }
                FsEventKind::Remove(RemoveKind::Folder) => {
                    self.append_and_publish(EventKind::FolderDeleted, &rel_str, EventPayload::FolderDeleted)
                        .await;
                }
                FsEventKind::Remove(_) => {
                    self.baseline.forget(path);
                    self.append_and_publish(EventKind::FileDeleted, &rel_str, EventPayload::FileDeleted)
                        .await;
                }
                _ => {}
            }
        }
    }

    /// Read a created/modified file and append a `file_change` event.
    ///
    /// Oversized files and read failures drop the notification silently;
    /// byte-equal rewrites coalesce to nothing.
    async fn handle_file_write(&mut self, path: &Path, rel_str: &str, action: ChangeAction) {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.max_file_bytes => {
                tracing::debug!(path = rel_str, size = meta.len(), "skipping oversized file");
                return;
            }
            Ok(_) => {}
            Err(_) => return,
        }
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path = rel_str, error = %e, "unreadable file dropped");
                return;
            }
        };

        let (previous, source) = self.baseline.previous(path);
        if bytes == previous {
            return; // coalesce byte-equal rewrites
        }

        let diff = diff_bytes(&previous, &bytes, rel_str);
        let sha = sha256_hex(&bytes);
        let payload = EventPayload::FileChange(FileChangePayload {
            event: action,
            diff,
            sha,
            size: bytes.len() as u64,
            baseline: source,
        });

        self.baseline.update(path.to_path_buf(), bytes);
        self.append_and_publish(EventKind::FileChange, rel_str, payload).await;
    }

    async fn append_and_publish(&self, kind: EventKind, rel_str: &str, payload: EventPayload) {
        match self
            .append_with_retry(kind, Some(rel_str), &payload.to_value())
            .await
        {
            Ok(event) => {
                self.broadcaster.publish(Envelope::from(&event));
                if kind == EventKind::FileChange {
                    if let Some(tx) = &self.impact_tx {
                        let _ = tx.send(event);
                    }
                }
            }
            Err(e) => {
                tracing::error!(project_id = self.project_id, path = rel_str, error = %e, "dropping event after store failures");
            }
        }
    }

    /// Append with bounded retry on transient store errors. After the final
    /// failure an `error` event is recorded (best effort) and the original
    /// error returned.
    async fn append_with_retry(
        &self,
        kind: EventKind,
        path: Option<&str>,
        payload: &serde_json::Value,
    ) -> AppResult<Event> {
        let mut attempt = 0;
        loop {
            match self
                .db
                .append_event(kind, Some(self.project_id), path, payload)
            {
                Ok(event) => return Ok(event),
                Err(e) if e.is_transient() && attempt < STORE_RETRIES => {
                    attempt += 1;
                    tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                }
                Err(e) => {
                    let note = EventPayload::Error(crate::models::event::ErrorPayload {
                        message: format!("Store write failed: {}", e),
                        context: path.map(|p| serde_json::json!({"path": p})),
                    });
                    if let Ok(event) = self.db.append_event(
                        EventKind::Error,
                        Some(self.project_id),
                        None,
                        &note.to_value(),
                    ) {
                        self.broadcaster.publish(Envelope::from(&event));
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Record a fatal watcher error as an `error` event and publish it.
    async fn record_failure(&self, message: String) {
        tracing::error!(project_id = self.project_id, "{}", message);
        let payload = EventPayload::Error(crate::models::event::ErrorPayload {
            message,
            context: Some(serde_json::json!({"component": "watcher"})),
        });
        match self.db.append_event(
            EventKind::Error,
            Some(self.project_id),
            None,
            &payload.to_value(),
        ) {
            Ok(event) => self.broadcaster.publish(Envelope::from(&event)),
            Err(e) => tracing::error!(project_id = self.project_id, error = %e, "failed to record watcher error"),
        }
    }
}

/// Keep only the last content-bearing notification per path in a debounce
/// window; structural events (create/remove of directories, deletions)
/// pass through untouched.
fn coalesce_batch(batch: &mut Vec<notify::Event>) {
    use std::collections::HashMap;
    let mut last_write: HashMap<PathBuf, usize> = HashMap::new();
    for (idx, event) in batch.iter().enumerate() {
        if matches!(
            event.kind,
            FsEventKind::Create(CreateKind::File) | FsEventKind::Modify(ModifyKind::Data(_))
        ) {
            if let Some(path) = event.paths.first() {
                last_write.insert(path.clone(), idx);
            }
        }
    }
    let mut idx = 0;
    batch.retain(|event| {
        let keep = match event.kind {
            FsEventKind::Create(CreateKind::File) | FsEventKind::Modify(ModifyKind::Data(_)) => {
                event
                    .paths
                    .first()
                    .and_then(|path| last_write.get(path))
                    .map(|last| *last == idx)
                    .unwrap_or(true)
            }
            _ => true,
        };
        idx += 1;
        keep
    });
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_is_stable() {
        let hash = sha256_hex(b"hello\n");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn test_coalesce_keeps_last_write_per_path() {
        let write = |path: &str| {
            let mut event = notify::Event::new(FsEventKind::Modify(ModifyKind::Data(
                notify::event::DataChange::Content,
            )));
            event.paths.push(PathBuf::from(path));
            event
        };
        let mut batch = vec![write("/p/a"), write("/p/b"), write("/p/a")];
        coalesce_batch(&mut batch);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].paths[0], PathBuf::from("/p/b"));
        assert_eq!(batch[1].paths[0], PathBuf::from("/p/a"));
    }

    #[test]
    fn test_coalesce_passes_structural_events() {
        let mut remove = notify::Event::new(FsEventKind::Remove(RemoveKind::File));
        remove.paths.push(PathBuf::from("/p/a"));
        let mut batch = vec![remove.clone(), remove];
        coalesce_batch(&mut batch);
        assert_eq!(batch.len(), 2);
    }
}
