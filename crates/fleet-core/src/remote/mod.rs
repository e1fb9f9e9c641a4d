//! Path-addressed access to the hosted realtime JSON tree.
//!
//! [`RemoteTree`] is the only seam between the sync layer and the hosted
//! database. Paths are `/`-separated keys (`vehicles/VEH123`); a listener on a
//! path receives the full value at that path on every change.

mod memory;
mod rest;
mod sse;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::util::path_segments;

pub use memory::MemoryTree;
pub use rest::RestTree;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote tree is offline")]
    Offline,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Operations offered by the hosted tree.
#[allow(async_fn_in_trait)]
pub trait RemoteTree: Clone + Send + Sync + 'static {
    /// Read the value at `path`; `None` when absent.
    async fn get(&self, path: &str) -> RemoteResult<Option<Value>>;

    /// Replace the value at `path`.
    async fn put(&self, path: &str, value: Value) -> RemoteResult<()>;

    /// Shallow-merge top-level `fields` into the value at `path`.
    async fn patch(&self, path: &str, fields: Map<String, Value>) -> RemoteResult<()>;

    /// Remove the subtree at `path`. Removing an absent path succeeds.
    async fn delete(&self, path: &str) -> RemoteResult<()>;

    /// Open a live listener on `path`.
    ///
    /// The current value is delivered first, then the full value again after
    /// every change below `path`.
    fn listen(&self, path: &str) -> Listener;
}

/// Event delivered to a [`Listener`].
#[derive(Debug, Clone, PartialEq)]
pub enum ListenEvent {
    /// Full value at the listened path (`None` when nothing is stored there).
    Value(Option<Value>),
    /// Listener-level failure, e.g. revoked permission.
    Error(String),
}

/// Handle on a live listener. Dropping it unregisters the listener.
#[derive(Debug)]
pub struct Listener {
    events: mpsc::UnboundedReceiver<ListenEvent>,
    worker: Option<AbortHandle>,
}

impl Listener {
    pub(crate) const fn new(
        events: mpsc::UnboundedReceiver<ListenEvent>,
        worker: Option<AbortHandle>,
    ) -> Self {
        Self { events, worker }
    }

    /// Wait for the next event. `None` once the listener has ended.
    pub async fn next(&mut self) -> Option<ListenEvent> {
        self.events.recv().await
    }

    /// Unregister the listener.
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.events.close();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Value stored at `path` below `root`, ignoring nulls.
pub(crate) fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = root;
    for segment in path_segments(path) {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Write `value` at `path` below `root`.
///
/// Writing `null` removes the key, and parents left empty are pruned, so an
/// empty collection reads back as absent.
pub(crate) fn set_at(root: &mut Value, path: &str, value: Value) {
    set_segments(root, &path_segments(path), value);
}

/// Shallow-merge `fields` into the value at `path`.
pub(crate) fn merge_at(root: &mut Value, path: &str, fields: Map<String, Value>) {
    for (key, value) in fields {
        let mut child_path = path_segments(path);
        child_path.push(&key);
        set_segments(root, &child_path, value);
    }
}

/// Whether a change at `changed` is visible to a listener on `listened`.
pub(crate) fn paths_overlap(listened: &str, changed: &str) -> bool {
    let listened = path_segments(listened);
    let changed = path_segments(changed);
    listened
        .iter()
        .zip(changed.iter())
        .all(|(left, right)| left == right)
}

fn set_segments(node: &mut Value, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if value.is_null() {
        if let Value::Object(map) = node {
            if rest.is_empty() {
                map.remove(*first);
            } else if let Some(child) = map.get_mut(*first) {
                set_segments(child, rest, Value::Null);
                if is_empty_node(child) {
                    map.remove(*first);
                }
            }
            if map.is_empty() {
                *node = Value::Null;
            }
        }
        return;
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry((*first).to_string()).or_insert(Value::Null);
        set_segments(child, rest, value);
    }
}

fn is_empty_node(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn set_at_creates_intermediate_objects() {
        let mut root = Value::Null;
        set_at(&mut root, "vehicles/V1", json!({"driver": "A"}));
        assert_eq!(root, json!({"vehicles": {"V1": {"driver": "A"}}}));
    }

    #[test]
    fn set_at_null_prunes_empty_parents() {
        let mut root = json!({"vehicles": {"V1": {"driver": "A"}}, "trips": {"T1": {}}});
        set_at(&mut root, "vehicles/V1", Value::Null);
        assert_eq!(root, json!({"trips": {"T1": {}}}));
        assert_eq!(value_at(&root, "vehicles"), None);
    }

    #[test]
    fn merge_at_replaces_nested_objects() {
        let mut root = json!({"V1": {"driver": "A", "specs": {"seats": 4, "doors": 5}}});
        let fields = json!({"specs": {"seats": 2}, "driver": "B"});
        merge_at(&mut root, "V1", fields.as_object().cloned().unwrap());
        assert_eq!(root, json!({"V1": {"driver": "B", "specs": {"seats": 2}}}));
    }

    #[test]
    fn value_at_root_and_missing_paths() {
        let root = json!({"a": {"b": 1}});
        assert_eq!(value_at(&root, ""), Some(&root));
        assert_eq!(value_at(&root, "a/b"), Some(&json!(1)));
        assert_eq!(value_at(&root, "a/c"), None);
        assert_eq!(value_at(&root, "a/b/c"), None);
    }

    #[test]
    fn paths_overlap_in_both_directions() {
        assert!(paths_overlap("vehicles", "vehicles/V1"));
        assert!(paths_overlap("vehicles/V1", "vehicles"));
        assert!(paths_overlap("", "trips/T1"));
        assert!(!paths_overlap("vehicles", "trips/T1"));
        assert!(!paths_overlap("vehicles", "vehicleLocations/V1"));
    }
}
