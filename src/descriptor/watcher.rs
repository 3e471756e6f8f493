//! Filesystem watcher for the descriptor directory, debounced per the
//! store's watcher protocol: events on recognised extensions are coalesced
//! per-path within a configurable window, then dispatched as either a
//! reload (file exists) or a delete (file gone).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};

use super::store::{ChangeCallback, DeleteCallback};
use super::{DescriptorStore, DESCRIPTOR_EXTENSIONS};
use crate::utilities::errors::DescriptorStoreError;

/// A live watch on a descriptor directory. Dropping this handle stops the
/// watch.
pub struct DescriptorWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
}

impl DescriptorWatcher {
    /// Begin watching `store`'s directory, debounced by `debounce`.
    /// Successful reparses invoke `on_change`; a source file disappearing
    /// invokes `on_delete`. Both callbacks run on the current Tokio runtime.
    pub fn start(
        store: Arc<DescriptorStore>,
        debounce: Duration,
        on_change: ChangeCallback,
        on_delete: DeleteCallback,
    ) -> Result<Self, DescriptorStoreError> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<PathBuf>();

        let mut debouncer = new_debouncer(debounce, move |res| match res {
            Ok(events) => forward_events(events, &tx),
            Err(e) => log::error!("descriptor watcher error: {e}"),
        })
        .map_err(|e| {
            DescriptorStoreError::DirectoryInaccessible(std::io::Error::new(
                std::io::ErrorKind::Other,
                e,
            ))
        })?;

        debouncer
            .watcher()
            .watch(store.dir(), RecursiveMode::NonRecursive)
            .map_err(|e| {
                DescriptorStoreError::DirectoryInaccessible(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e,
                ))
            })?;

        tokio::spawn(async move {
            while let Some(path) = rx.recv().await {
                handle_event(&store, &path, &on_change, &on_delete).await;
            }
        });

        Ok(Self { _debouncer: debouncer })
    }
}

fn forward_events(
    events: Vec<notify_debouncer_mini::DebouncedEvent>,
    tx: &tokio::sync::mpsc::UnboundedSender<PathBuf>,
) {
    for event in events {
        if event.kind != DebouncedEventKind::Any {
            continue;
        }
        if !has_descriptor_extension(&event.path) {
            continue;
        }
        let _ = tx.send(event.path);
    }
}

fn has_descriptor_extension(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| DESCRIPTOR_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

async fn handle_event(
    store: &Arc<DescriptorStore>,
    path: &std::path::Path,
    on_change: &ChangeCallback,
    on_delete: &DeleteCallback,
) {
    if path.exists() {
        match store.reload_path(path).await {
            Ok(Some(descriptor)) => {
                log::info!("reloaded descriptor {} from {path:?}", descriptor.id);
                on_change(descriptor);
            }
            Ok(None) => {}
            Err(e) => log::warn!("descriptor reload failed for {path:?}: {e}"),
        }
    } else if let Some(id) = store.id_for_path(path).await {
        store.remove_in_memory(&id).await;
        log::info!("descriptor {id} removed ({path:?} deleted)");
        on_delete(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{AgentDescriptor, ToolConfig};
    use std::sync::Mutex;

    fn sample_descriptor(id: &str) -> AgentDescriptor {
        AgentDescriptor {
            id: id.to_string(),
            name: "Watched Agent".to_string(),
            description: "a watcher test agent".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_steps: 10,
            timeout: Duration::from_secs(120),
            system_prompt: "You are helpful.".to_string(),
            tools: vec![ToolConfig { name: "echo".to_string(), enabled: true, config: Default::default() }],
            evaluation: None,
            embedding: Vec::new(),
            embedding_hash: String::new(),
            metadata: Default::default(),
            source_path: None,
            loaded_at: None,
        }
    }

    /// Past the debounce window, polls `condition` until it's true or the
    /// timeout elapses — avoids a single fixed sleep racing the debouncer's
    /// own timer under test-runner load.
    async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while !condition() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn writing_a_descriptor_file_triggers_on_change() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(DescriptorStore::new(tmp.path()).unwrap());

        let changes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let changes_cb = changes.clone();
        let on_change: ChangeCallback = Arc::new(move |d: AgentDescriptor| {
            changes_cb.lock().unwrap().push(d.id);
        });
        let on_delete: DeleteCallback = Arc::new(|_id: String| {});

        let _watcher =
            DescriptorWatcher::start(store.clone(), Duration::from_millis(50), on_change, on_delete).unwrap();

        std::fs::write(
            tmp.path().join("agent.yaml"),
            serde_yaml::to_string(&sample_descriptor("agent-1")).unwrap(),
        )
        .unwrap();

        wait_until(|| !changes.lock().unwrap().is_empty(), Duration::from_secs(2)).await;

        assert_eq!(changes.lock().unwrap().as_slice(), ["agent-1".to_string()]);
        assert!(store.get("agent-1").await.is_some());
    }

    #[tokio::test]
    async fn two_rapid_writes_within_the_debounce_window_coalesce_to_one_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(DescriptorStore::new(tmp.path()).unwrap());

        let changes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let changes_cb = changes.clone();
        let on_change: ChangeCallback = Arc::new(move |d: AgentDescriptor| {
            changes_cb.lock().unwrap().push(d.id);
        });
        let on_delete: DeleteCallback = Arc::new(|_id: String| {});

        // Debounce window wider than the gap between the two writes below,
        // so the debouncer coalesces them into a single event.
        let _watcher =
            DescriptorWatcher::start(store.clone(), Duration::from_millis(300), on_change, on_delete).unwrap();

        let path = tmp.path().join("agent.yaml");
        std::fs::write(&path, serde_yaml::to_string(&sample_descriptor("agent-1")).unwrap()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        std::fs::write(&path, serde_yaml::to_string(&sample_descriptor("agent-1")).unwrap()).unwrap();

        wait_until(|| !changes.lock().unwrap().is_empty(), Duration::from_secs(2)).await;
        // Give any (incorrect) second coalesced event a chance to land too.
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(changes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_a_descriptor_file_triggers_on_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(DescriptorStore::new(tmp.path()).unwrap());
        let saved = store.save(sample_descriptor("agent-1")).await.unwrap();
        let path = saved.source_path.clone().unwrap();

        let on_change: ChangeCallback = Arc::new(|_d: AgentDescriptor| {});
        let deletes: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let deletes_cb = deletes.clone();
        let on_delete: DeleteCallback = Arc::new(move |id: String| {
            deletes_cb.lock().unwrap().push(id);
        });

        let _watcher =
            DescriptorWatcher::start(store.clone(), Duration::from_millis(50), on_change, on_delete).unwrap();

        std::fs::remove_file(&path).unwrap();

        wait_until(|| !deletes.lock().unwrap().is_empty(), Duration::from_secs(2)).await;

        assert_eq!(deletes.lock().unwrap().as_slice(), ["agent-1".to_string()]);
        assert!(store.get("agent-1").await.is_none());
    }
}
