//! In-process remote tree.
//!
//! Behaves like the hosted tree (full-value listeners, echo of local writes,
//! shallow patch, idempotent delete) and adds fault injection so callers can
//! exercise offline, slow and revoked-permission paths.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::{
    merge_at, paths_overlap, set_at, value_at, ListenEvent, Listener, RemoteError, RemoteResult,
    RemoteTree,
};
use crate::util::path_segments;

#[derive(Debug, Default)]
struct MemoryTreeState {
    root: Value,
    listeners: Vec<ListenerEntry>,
    offline: bool,
    latency: Duration,
}

#[derive(Debug)]
struct ListenerEntry {
    path: String,
    sender: mpsc::UnboundedSender<ListenEvent>,
}

/// Shared in-memory tree. Clones address the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryTree {
    state: Arc<Mutex<MemoryTreeState>>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing JSON document.
    pub fn with_root(root: Value) -> Self {
        let tree = Self::new();
        tree.lock().root = root;
        tree
    }

    /// Make every subsequent read and write fail with [`RemoteError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delay every read and write by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Deliver a listener error to every listener at or below `path`.
    pub fn fail_listeners(&self, path: &str, message: &str) {
        let mut state = self.lock();
        let prefix = path_segments(path);
        state.listeners.retain(|listener| {
            let listened = path_segments(&listener.path);
            if listened.len() >= prefix.len() && listened[..prefix.len()] == prefix[..] {
                listener
                    .sender
                    .send(ListenEvent::Error(message.to_string()))
                    .is_ok()
            } else {
                !listener.sender.is_closed()
            }
        });
    }

    /// Current value at `path`, bypassing latency and offline mode.
    pub fn value(&self, path: &str) -> Option<Value> {
        value_at(&self.lock().root, path).cloned()
    }

    /// Number of listeners that are still registered.
    pub fn listener_count(&self) -> usize {
        let mut state = self.lock();
        state.listeners.retain(|listener| !listener.sender.is_closed());
        state.listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryTreeState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    async fn admit(&self) -> RemoteResult<()> {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.lock().offline {
            return Err(RemoteError::Offline);
        }
        Ok(())
    }

    fn mutate(&self, path: &str, apply: impl FnOnce(&mut Value)) {
        let mut state = self.lock();
        apply(&mut state.root);
        let MemoryTreeState {
            root, listeners, ..
        } = &mut *state;
        listeners.retain(|listener| {
            if !paths_overlap(&listener.path, path) {
                return !listener.sender.is_closed();
            }
            let value = value_at(root, &listener.path).cloned();
            listener.sender.send(ListenEvent::Value(value)).is_ok()
        });
    }
}

impl RemoteTree for MemoryTree {
    async fn get(&self, path: &str) -> RemoteResult<Option<Value>> {
        self.admit().await?;
        Ok(value_at(&self.lock().root, path).cloned())
    }

    async fn put(&self, path: &str, value: Value) -> RemoteResult<()> {
        self.admit().await?;
        self.mutate(path, |root| set_at(root, path, value));
        Ok(())
    }

    async fn patch(&self, path: &str, fields: Map<String, Value>) -> RemoteResult<()> {
        self.admit().await?;
        self.mutate(path, |root| merge_at(root, path, fields));
        Ok(())
    }

    async fn delete(&self, path: &str) -> RemoteResult<()> {
        self.admit().await?;
        self.mutate(path, |root| set_at(root, path, Value::Null));
        Ok(())
    }

    fn listen(&self, path: &str) -> Listener {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock();
        let current = value_at(&state.root, path).cloned();
        // The receiver is still in scope, so the initial send cannot fail.
        let _ = sender.send(ListenEvent::Value(current));
        state.listeners.push(ListenerEntry {
            path: path.to_string(),
            sender,
        });
        Listener::new(receiver, None)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn listener_receives_initial_value_and_own_writes() {
        let tree = MemoryTree::with_root(json!({"vehicles": {"V1": {"driver": "A"}}}));
        let mut listener = tree.listen("vehicles");

        assert_eq!(
            listener.next().await,
            Some(ListenEvent::Value(Some(json!({"V1": {"driver": "A"}}))))
        );

        tree.put("vehicles/V2", json!({"driver": "B"})).await.unwrap();
        assert_eq!(
            listener.next().await,
            Some(ListenEvent::Value(Some(
                json!({"V1": {"driver": "A"}, "V2": {"driver": "B"}})
            )))
        );
    }

    #[tokio::test]
    async fn unrelated_paths_do_not_notify() {
        let tree = MemoryTree::new();
        let mut listener = tree.listen("vehicles");
        assert_eq!(listener.next().await, Some(ListenEvent::Value(None)));

        tree.put("trips/T1", json!({"vehicleId": "V1"})).await.unwrap();
        tree.put("vehicles/V1", json!({"driver": "A"})).await.unwrap();

        assert_eq!(
            listener.next().await,
            Some(ListenEvent::Value(Some(json!({"V1": {"driver": "A"}}))))
        );
    }

    #[tokio::test]
    async fn delete_of_missing_path_succeeds() {
        let tree = MemoryTree::new();
        tree.delete("vehicles/missing").await.unwrap();
        assert_eq!(tree.value("vehicles"), None);
    }

    #[tokio::test]
    async fn offline_mode_rejects_operations() {
        let tree = MemoryTree::new();
        tree.set_offline(true);
        assert!(matches!(
            tree.put("vehicles/V1", json!({})).await,
            Err(RemoteError::Offline)
        ));
        assert!(matches!(tree.get("vehicles").await, Err(RemoteError::Offline)));

        tree.set_offline(false);
        assert!(tree.get("vehicles").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_listeners_are_pruned() {
        let tree = MemoryTree::new();
        let listener = tree.listen("vehicles");
        let _other = tree.listen("trips");
        assert_eq!(tree.listener_count(), 2);

        drop(listener);
        assert_eq!(tree.listener_count(), 1);
    }

    #[tokio::test]
    async fn fail_listeners_targets_subtree() {
        let tree = MemoryTree::new();
        let mut vehicles = tree.listen("vehicles");
        let mut trips = tree.listen("trips");
        vehicles.next().await;
        trips.next().await;

        tree.fail_listeners("vehicles", "permission revoked");
        assert_eq!(
            vehicles.next().await,
            Some(ListenEvent::Error("permission revoked".to_string()))
        );

        tree.put("trips/T1", json!({"vehicleId": "V1"})).await.unwrap();
        assert_eq!(
            trips.next().await,
            Some(ListenEvent::Value(Some(json!({"T1": {"vehicleId": "V1"}}))))
        );
    }
}
