//! Live mirror of a remote collection.
//!
//! The synchronizer owns a subscription and publishes every snapshot as a new
//! [`ListState`] through a `tokio::sync::watch` channel. Each snapshot replaces
//! the previous list; nothing is merged locally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::dedupe::dedupe;
use super::store::{RemoteCollectionStore, Subscription};
use crate::models::Entity;
use crate::remote::RemoteTree;
use crate::Error;

/// Lifecycle of a synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Uninitialized,
    Subscribing,
    Live,
    Unsubscribed,
}

/// What the consumer sees.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<E> {
    pub items: Vec<E>,
    /// True until the first snapshot or error arrives
    pub loading: bool,
    pub error: Option<String>,
    pub phase: SyncPhase,
    /// Bumped on every published change
    pub version: u64,
    has_data: bool,
}

impl<E> Default for ListState<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            error: None,
            phase: SyncPhase::Uninitialized,
            version: 0,
            has_data: false,
        }
    }
}

impl<E: Entity> ListState<E> {
    fn apply_snapshot(&mut self, snapshot: Vec<E>, collection: &str) -> bool {
        if self.phase == SyncPhase::Unsubscribed {
            return false;
        }
        let (items, dropped) = dedupe(snapshot);
        if dropped > 0 {
            tracing::warn!(
                "Dropped {} duplicate entities from {} snapshot",
                dropped,
                collection
            );
        }
        self.items = items;
        self.loading = false;
        self.error = None;
        self.phase = SyncPhase::Live;
        self.has_data = true;
        self.version += 1;
        true
    }

    fn apply_error(&mut self, message: String) -> bool {
        if self.phase == SyncPhase::Unsubscribed {
            return false;
        }
        if !self.has_data {
            self.items.clear();
        }
        self.loading = false;
        self.error = Some(message);
        self.version += 1;
        true
    }
}

/// Mirrors one collection until dropped or shut down.
#[derive(Debug)]
pub struct EntityListSynchronizer<E> {
    state: Arc<watch::Sender<ListState<E>>>,
    alive: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<E: Entity> EntityListSynchronizer<E> {
    /// Subscribe to the store's collection and start publishing snapshots.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T: RemoteTree>(store: &RemoteCollectionStore<T, E>) -> Self {
        let collection = store.collection();
        let (sender, _) = watch::channel(ListState {
            phase: SyncPhase::Subscribing,
            ..ListState::default()
        });
        let state = Arc::new(sender);
        let alive = Arc::new(AtomicBool::new(true));

        tracing::info!("Synchronizing {}", collection);
        let subscription = store.subscribe();
        let worker = tokio::spawn(run(
            subscription,
            Arc::clone(&state),
            Arc::clone(&alive),
            collection.to_string(),
        ));

        Self {
            state,
            alive,
            worker: Some(worker),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> ListState<E> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<E> {
        self.state.borrow().items.clone()
    }

    /// Receiver that is notified on every published change.
    pub fn watch(&self) -> watch::Receiver<ListState<E>> {
        self.state.subscribe()
    }

    /// Stop and wait for the worker to finish.
    pub async fn shutdown(mut self) {
        self.teardown();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

impl<E> EntityListSynchronizer<E> {
    /// Stop listening. No state change is published afterwards.
    pub fn teardown(&mut self) {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return;
        }
        self.state.send_modify(|state| {
            state.phase = SyncPhase::Unsubscribed;
            state.loading = false;
        });
        if let Some(worker) = &self.worker {
            worker.abort();
        }
        tracing::debug!("Synchronizer torn down");
    }
}

impl<E> Drop for EntityListSynchronizer<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn run<E: Entity>(
    mut subscription: Subscription<E>,
    state: Arc<watch::Sender<ListState<E>>>,
    alive: Arc<AtomicBool>,
    collection: String,
) {
    while let Some(event) = subscription.next().await {
        if !alive.load(Ordering::SeqCst) {
            break;
        }
        match event {
            Ok(snapshot) => {
                tracing::debug!("Snapshot of {} with {} entities", collection, snapshot.len());
                state.send_if_modified(|current| current.apply_snapshot(snapshot, &collection));
            }
            Err(error) => {
                let message = subscription_message(&error);
                tracing::warn!("Subscription to {} failed: {}", collection, message);
                state.send_if_modified(|current| current.apply_error(message));
            }
        }
    }
    subscription.cancel();
}

fn subscription_message(error: &Error) -> String {
    match error {
        Error::Subscription(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::models::Vehicle;
    use crate::remote::MemoryTree;

    async fn wait_for<E: Entity>(
        receiver: &mut watch::Receiver<ListState<E>>,
        predicate: impl Fn(&ListState<E>) -> bool,
    ) -> ListState<E> {
        tokio::time::timeout(Duration::from_secs(2), receiver.wait_for(|s| predicate(s)))
            .await
            .expect("state never matched")
            .expect("synchronizer closed")
            .clone()
    }

    fn ids(state: &ListState<Vehicle>) -> Vec<String> {
        state.items.iter().map(|v| v.meta.id.clone()).collect()
    }

    #[tokio::test]
    async fn publishes_initial_snapshot() {
        let tree = MemoryTree::with_root(json!({
            "vehicles": {
                "V1": {"registrationNumber": "KA01"},
                "V2": {"registrationNumber": "KA02"}
            }
        }));
        let store = RemoteCollectionStore::<_, Vehicle>::new(tree);
        let sync = EntityListSynchronizer::start(&store);
        let mut receiver = sync.watch();

        let state = wait_for(&mut receiver, |s| !s.loading).await;
        assert_eq!(ids(&state), vec!["V1", "V2"]);
        assert_eq!(state.phase, SyncPhase::Live);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn snapshots_replace_rather_than_merge() {
        let tree = MemoryTree::with_root(json!({
            "vehicles": {"V1": {"registrationNumber": "KA01"}}
        }));
        let store = RemoteCollectionStore::<_, Vehicle>::new(tree.clone());
        let sync = EntityListSynchronizer::start(&store);
        let mut receiver = sync.watch();
        wait_for(&mut receiver, |s| s.items.len() == 1).await;

        store.delete("V1").await.unwrap();
        let mut replacement = Vehicle::new("KA09");
        replacement.meta.id = "V9".to_string();
        store.create(replacement).await.unwrap();

        let state = wait_for(&mut receiver, |s| ids(s) == vec!["V9"]).await;
        assert_eq!(state.items.len(), 1);
    }

    #[tokio::test]
    async fn error_after_data_keeps_last_items() {
        let tree = MemoryTree::with_root(json!({
            "vehicles": {"V1": {"registrationNumber": "KA01"}}
        }));
        let store = RemoteCollectionStore::<_, Vehicle>::new(tree.clone());
        let sync = EntityListSynchronizer::start(&store);
        let mut receiver = sync.watch();
        wait_for(&mut receiver, |s| s.items.len() == 1).await;

        tree.fail_listeners("vehicles", "permission denied");
        let state = wait_for(&mut receiver, |s| s.error.is_some()).await;
        assert_eq!(state.error.as_deref(), Some("permission denied"));
        assert_eq!(ids(&state), vec!["V1"]);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn error_before_data_leaves_empty_list() {
        let tree = MemoryTree::with_root(json!({"vehicles": "corrupt"}));
        let store = RemoteCollectionStore::<_, Vehicle>::new(tree);
        let sync = EntityListSynchronizer::start(&store);
        let mut receiver = sync.watch();

        let state = wait_for(&mut receiver, |s| !s.loading).await;
        assert!(state.error.is_some());
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first_occurrence() {
        let tree = MemoryTree::with_root(json!({
            "vehicles": {
                "A": {"id": "V1", "registrationNumber": "first"},
                "B": {"id": "V1", "registrationNumber": "second"}
            }
        }));
        let store = RemoteCollectionStore::<_, Vehicle>::new(tree);
        let sync = EntityListSynchronizer::start(&store);
        let mut receiver = sync.watch();

        let state = wait_for(&mut receiver, |s| !s.loading).await;
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].registration_number, "first");
    }

    #[tokio::test]
    async fn no_updates_after_teardown() {
        let tree = MemoryTree::new();
        let store = RemoteCollectionStore::<_, Vehicle>::new(tree.clone());
        let mut sync = EntityListSynchronizer::start(&store);
        let mut receiver = sync.watch();
        wait_for(&mut receiver, |s| !s.loading).await;

        sync.teardown();
        let version = sync.state().version;
        assert_eq!(sync.state().phase, SyncPhase::Unsubscribed);

        store.create(Vehicle::new("KA01")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = sync.state();
        assert_eq!(state.version, version);
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn dropping_releases_the_listener() {
        let tree = MemoryTree::new();
        let store = RemoteCollectionStore::<_, Vehicle>::new(tree.clone());
        let sync = EntityListSynchronizer::start(&store);
        let mut receiver = sync.watch();
        wait_for(&mut receiver, |s| !s.loading).await;
        assert_eq!(tree.listener_count(), 1);

        sync.shutdown().await;
        assert_eq!(tree.listener_count(), 0);
    }
}
