//! Uniform add/update/remove with busy/error tracking.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use super::store::RemoteCollectionStore;
use crate::models::Entity;
use crate::remote::RemoteTree;
use crate::{Error, Result};

/// Busy flag plus the message of the last failed action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    pub busy: bool,
    pub error: Option<String>,
}

/// Outcome handed back to callers. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(id: Option<String>) -> Self {
        Self {
            success: true,
            id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            id: None,
            error: Some(error.into()),
        }
    }
}

/// How transient failures are retried. One attempt means no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
        }
    }

    pub const fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::none()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Runs create/update/delete against one collection store.
#[derive(Debug, Clone)]
pub struct CrudActionDispatcher<T, E> {
    store: RemoteCollectionStore<T, E>,
    retry: RetryPolicy,
    state: Arc<watch::Sender<ActionState>>,
}

impl<T: RemoteTree, E: Entity> CrudActionDispatcher<T, E> {
    pub fn new(store: RemoteCollectionStore<T, E>) -> Self {
        let (sender, _) = watch::channel(ActionState::default());
        Self {
            store,
            retry: RetryPolicy::default(),
            state: Arc::new(sender),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> ActionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ActionState> {
        self.state.subscribe()
    }

    pub const fn store(&self) -> &RemoteCollectionStore<T, E> {
        &self.store
    }

    /// Create `entity`; the result carries the stored id.
    ///
    /// The id is fixed before the first attempt so retries rewrite the same key.
    pub async fn add(&self, mut entity: E) -> ActionResult {
        self.store.assign_id(&mut entity);
        let outcome = self
            .run("add", || self.store.create(entity.clone()))
            .await;
        into_result(outcome, Some)
    }

    pub async fn update(&self, id: &str, fields: Map<String, Value>) -> ActionResult {
        let outcome = self
            .run("update", || self.store.update(id, fields.clone()))
            .await;
        into_result(outcome, |()| None)
    }

    /// Update from any serializable patch object.
    pub async fn update_with<P: Serialize>(&self, id: &str, patch: &P) -> ActionResult {
        match serde_json::to_value(patch) {
            Ok(Value::Object(fields)) => self.update(id, fields).await,
            Ok(_) => self.reject("update", "patch must be a JSON object".to_string()),
            Err(error) => self.reject("update", error.to_string()),
        }
    }

    pub async fn remove(&self, id: &str) -> ActionResult {
        let outcome = self.run("remove", || self.store.delete(id)).await;
        into_result(outcome, |()| None)
    }

    async fn run<R, F, Fut>(&self, action: &str, mut operation: F) -> Result<R>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.state.send_modify(|state| {
            state.busy = true;
            state.error = None;
        });

        let mut attempt = 1;
        let outcome = loop {
            match operation().await {
                Err(error) if error.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    tracing::warn!(
                        "{} on {} failed (attempt {}), retrying in {:?}: {}",
                        action,
                        self.store.collection(),
                        attempt,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => break outcome,
            }
        };

        self.state.send_modify(|state| {
            state.busy = false;
            if let Err(error) = &outcome {
                state.error = Some(error.to_string());
            }
        });
        if let Err(error) = &outcome {
            tracing::warn!("{} on {} failed: {}", action, self.store.collection(), error);
        }
        outcome
    }

    fn reject(&self, action: &str, message: String) -> ActionResult {
        let error = Error::Validation(message);
        tracing::warn!("{} on {} rejected: {}", action, self.store.collection(), error);
        self.state
            .send_modify(|state| state.error = Some(error.to_string()));
        ActionResult::failed(error.to_string())
    }
}

fn into_result<R>(outcome: Result<R>, id: impl FnOnce(R) -> Option<String>) -> ActionResult {
    match outcome {
        Ok(value) => ActionResult::ok(id(value)),
        Err(error) => ActionResult::failed(error.to_string()),
    }
}
