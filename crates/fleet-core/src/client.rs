//! Entry point wiring a remote tree to stores, dispatchers and synchronizers.

use std::time::Duration;

use crate::config::FleetConfig;
use crate::models::{Collection, Entity};
use crate::otp::OtpRateLimiter;
use crate::remote::{RemoteTree, RestTree};
use crate::sync::{
    CrudActionDispatcher, EntityListSynchronizer, IdentifierAllocator, RemoteCollectionStore,
    RetryPolicy, DEFAULT_TIMEOUT,
};
use crate::Result;

/// Shared handle passed to every view that talks to the fleet database.
#[derive(Debug, Clone)]
pub struct FleetClient<T> {
    tree: T,
    timeout: Duration,
    retry: RetryPolicy,
    allocator: IdentifierAllocator,
}

impl FleetClient<RestTree> {
    /// Client for the database named in `config`.
    pub fn from_config(config: &FleetConfig) -> Result<Self> {
        config.validate()?;
        let tree = config.rest_tree()?;
        tracing::info!("Using fleet database at {}", tree.base_url());
        Ok(Self::new(tree)
            .with_timeout(config.request_timeout())
            .with_retry(config.retry_policy()))
    }
}

impl<T: RemoteTree> FleetClient<T> {
    pub fn new(tree: T) -> Self {
        Self {
            tree,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            allocator: IdentifierAllocator::default(),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn with_allocator(mut self, allocator: IdentifierAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub const fn tree(&self) -> &T {
        &self.tree
    }

    /// Store for the entity type's own collection.
    pub fn collection<E: Entity>(&self) -> RemoteCollectionStore<T, E> {
        self.collection_at(E::COLLECTION)
    }

    /// Store reading `E` from an arbitrary collection.
    pub fn collection_at<E: Entity>(&self, collection: Collection) -> RemoteCollectionStore<T, E> {
        RemoteCollectionStore::new(self.tree.clone())
            .with_collection(collection)
            .with_timeout(self.timeout)
            .with_allocator(self.allocator)
    }

    pub fn dispatcher<E: Entity>(&self) -> CrudActionDispatcher<T, E> {
        self.dispatcher_at(E::COLLECTION)
    }

    pub fn dispatcher_at<E: Entity>(&self, collection: Collection) -> CrudActionDispatcher<T, E> {
        CrudActionDispatcher::new(self.collection_at(collection)).with_retry(self.retry)
    }

    /// Start mirroring `E`'s collection. Requires a tokio runtime.
    pub fn synchronize<E: Entity>(&self) -> EntityListSynchronizer<E> {
        self.synchronize_at(E::COLLECTION)
    }

    pub fn synchronize_at<E: Entity>(&self, collection: Collection) -> EntityListSynchronizer<E> {
        EntityListSynchronizer::start(&self.collection_at::<E>(collection))
    }

    pub fn otp_limiter(&self, config: &FleetConfig) -> OtpRateLimiter<T> {
        OtpRateLimiter::new(self.tree.clone())
            .with_limits(config.otp_limits())
            .with_timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::models::{Document, Vehicle};
    use crate::remote::MemoryTree;
    use crate::sync::ListState;
    use crate::Error;

    async fn wait_for(
        receiver: &mut tokio::sync::watch::Receiver<ListState<Vehicle>>,
        predicate: impl Fn(&ListState<Vehicle>) -> bool,
    ) -> ListState<Vehicle> {
        tokio::time::timeout(Duration::from_secs(2), receiver.wait_for(|s| predicate(s)))
            .await
            .expect("state never matched")
            .expect("synchronizer closed")
            .clone()
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_update_delete_flows_through_to_the_synchronizer() {
        let client = FleetClient::new(MemoryTree::new());
        let dispatcher = client.dispatcher::<Vehicle>();
        let sync = client.synchronize::<Vehicle>();
        let mut receiver = sync.watch();
        wait_for(&mut receiver, |s| !s.loading).await;

        let mut vehicle = Vehicle::new("KA01AB1234");
        vehicle.meta.id = "V1".to_string();
        vehicle.driver = Some("A".to_string());
        let created = dispatcher.add(vehicle).await;
        assert!(created.success);
        assert_eq!(created.id.as_deref(), Some("V1"));

        let state = wait_for(&mut receiver, |s| s.items.len() == 1).await;
        let stored = &state.items[0];
        assert_eq!(stored.driver.as_deref(), Some("A"));
        assert!(stored.meta.created_at.is_some());
        assert_eq!(stored.meta.created_at, stored.meta.updated_at);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let updated = dispatcher.update("V1", fields(json!({"driver": "B"}))).await;
        assert!(updated.success);
        let state = wait_for(&mut receiver, |s| {
            s.items
                .first()
                .is_some_and(|v| v.driver.as_deref() == Some("B"))
        })
        .await;
        let stored = &state.items[0];
        assert!(stored.meta.updated_at > stored.meta.created_at);

        let removed = dispatcher.remove("V1").await;
        assert!(removed.success);
        let state = wait_for(&mut receiver, |s| s.items.is_empty()).await;
        assert_eq!(state.error, None);
        assert_eq!(dispatcher.state().error, None);
    }

    #[tokio::test]
    async fn collection_at_reads_untyped_collections() {
        let tree = MemoryTree::with_root(json!({
            "customers": {"C1": {"name": "Acme"}}
        }));
        let client = FleetClient::new(tree);
        let store = client.collection_at::<Document>(Collection::Customers);
        let customer = store.read("C1").await.unwrap().unwrap();
        assert_eq!(customer.meta.id, "C1");
        assert_eq!(customer.get("name"), Some(&json!("Acme")));
    }

    #[tokio::test]
    async fn configured_timeout_reaches_stores() {
        let tree = MemoryTree::new();
        tree.set_latency(Duration::from_millis(200));
        let client = FleetClient::new(tree).with_timeout(Duration::from_millis(10));
        let error = client
            .collection::<Vehicle>()
            .read("V1")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::RemoteTimeout(10)));

        let error = client
            .otp_limiter(&FleetConfig::default())
            .check("+919876543210")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::RemoteTimeout(10)));
    }

    #[test]
    fn from_config_requires_a_database_url() {
        let error = FleetClient::from_config(&FleetConfig::default()).unwrap_err();
        assert!(matches!(error, Error::Config(_)));

        let config = FleetConfig {
            database_url: Some("https://fleet-demo.firebaseio.com".to_string()),
            ..FleetConfig::default()
        };
        let client = FleetClient::from_config(&config).unwrap();
        assert_eq!(client.tree().base_url(), "https://fleet-demo.firebaseio.com");
    }
}
