//! Typed CRUD and subscriptions over one remote collection.

use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::dedupe::dedupe;
use super::ids::IdentifierAllocator;
use crate::models::{Collection, Entity};
use crate::remote::{ListenEvent, Listener, RemoteTree};
use crate::util::{is_valid_key, join_path};
use crate::{Error, Result};

/// Bound applied to every remote operation unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const PROTECTED_FIELDS: [&str; 2] = ["id", "createdAt"];

/// Create/read/update/delete/subscribe against `<collection>/<id>`.
#[derive(Debug, Clone)]
pub struct RemoteCollectionStore<T, E> {
    tree: T,
    collection: Collection,
    allocator: IdentifierAllocator,
    timeout: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<T: RemoteTree, E: Entity> RemoteCollectionStore<T, E> {
    /// Store for the entity type's own collection.
    pub fn new(tree: T) -> Self {
        Self {
            tree,
            collection: E::COLLECTION,
            allocator: IdentifierAllocator::default(),
            timeout: DEFAULT_TIMEOUT,
            _entity: PhantomData,
        }
    }

    #[must_use]
    pub const fn with_collection(mut self, collection: Collection) -> Self {
        self.collection = collection;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_allocator(mut self, allocator: IdentifierAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub const fn collection(&self) -> Collection {
        self.collection
    }

    pub const fn tree(&self) -> &T {
        &self.tree
    }

    /// Write `entity` at its id, allocating one when empty, and stamp
    /// `createdAt == updatedAt`. An existing entity at that id is overwritten.
    pub async fn create(&self, mut entity: E) -> Result<String> {
        entity.validate()?;

        self.assign_id(&mut entity);
        let id = entity.meta().id.clone();
        ensure_valid_id(&id)?;

        let now = Utc::now();
        let meta = entity.meta_mut();
        meta.created_at = Some(now);
        meta.updated_at = Some(now);

        let value = serde_json::to_value(&entity)?;
        let path = self.entity_path(&id);
        self.bounded(self.tree.put(&path, value))
            .await?
            .map_err(Error::write)?;

        tracing::debug!("Created {}", path);
        Ok(id)
    }

    /// Give `entity` a freshly allocated id when it has none.
    pub fn assign_id(&self, entity: &mut E) {
        if entity.meta().id.trim().is_empty() {
            entity.meta_mut().id = self.allocator.allocate(E::ID_PREFIX);
        }
    }

    /// Shallow-merge `fields` into the entity at `id` and stamp `updatedAt`.
    ///
    /// Nested objects in `fields` replace stored ones. Fails when the entity
    /// does not exist or the merged entity would not validate.
    ///
    /// The existence check and the patch are separate requests. A delete
    /// landing between them leaves only the patched fields at `id`; this is
    /// part of the last-write-wins model, like two concurrent updates.
    pub async fn update(&self, id: &str, fields: Map<String, Value>) -> Result<()> {
        ensure_valid_id(id)?;
        if let Some(field) = PROTECTED_FIELDS
            .iter()
            .find(|field| fields.contains_key(**field))
        {
            return Err(Error::Validation(format!("{field} cannot be updated")));
        }

        let path = self.entity_path(id);
        self.bounded(self.merge_and_patch(&path, id, fields))
            .await??;
        tracing::debug!("Updated {}", path);
        Ok(())
    }

    /// Remove the entity at `id`. Deleting a missing id succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        ensure_valid_id(id)?;
        let path = self.entity_path(id);
        self.bounded(self.tree.delete(&path))
            .await?
            .map_err(Error::write)?;
        tracing::debug!("Deleted {}", path);
        Ok(())
    }

    /// One-shot fetch of a single entity.
    pub async fn read(&self, id: &str) -> Result<Option<E>> {
        ensure_valid_id(id)?;
        let path = self.entity_path(id);
        let value = self
            .bounded(self.tree.get(&path))
            .await?
            .map_err(Error::read)?;

        value
            .map(|value| {
                decode_entity::<E>(id, value)
                    .map_err(|error| Error::RemoteRead(format!("malformed entity at {path}: {error}")))
            })
            .transpose()
    }

    /// One-shot fetch of the whole collection, first occurrence of each id.
    pub async fn list(&self) -> Result<Vec<E>> {
        let value = self
            .bounded(self.tree.get(self.collection.path()))
            .await?
            .map_err(Error::read)?;
        let (entities, dropped) = dedupe(decode_snapshot(self.collection, value)?);
        if dropped > 0 {
            tracing::warn!("Dropped {} duplicate entities from {}", dropped, self.collection);
        }
        Ok(entities)
    }

    /// Live view of the whole collection.
    pub fn subscribe(&self) -> Subscription<E> {
        tracing::debug!("Listening on {}", self.collection);
        Subscription {
            listener: self.tree.listen(self.collection.path()),
            collection: self.collection,
            _entity: PhantomData,
        }
    }

    async fn merge_and_patch(
        &self,
        path: &str,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<()> {
        let Some(Value::Object(mut stored)) = self.tree.get(path).await.map_err(Error::write)?
        else {
            return Err(Error::RemoteWrite(format!("{path} does not exist")));
        };

        let created_at = stored
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc));
        let now = Utc::now();
        let updated_at = created_at.map_or(now, |created| created.max(now));
        fields.insert("updatedAt".to_string(), serde_json::to_value(updated_at)?);

        for (key, value) in &fields {
            stored.insert(key.clone(), value.clone());
        }
        stored
            .entry("id".to_string())
            .or_insert_with(|| Value::String(id.to_string()));
        let merged = serde_json::from_value::<E>(Value::Object(stored))
            .map_err(|error| Error::Validation(format!("invalid update for {path}: {error}")))?;
        merged.validate()?;

        self.tree.patch(path, fields).await.map_err(Error::write)
    }

    fn entity_path(&self, id: &str) -> String {
        join_path(self.collection.path(), id)
    }

    async fn bounded<F: Future>(&self, operation: F) -> Result<F::Output> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| Error::RemoteTimeout(self.timeout.as_millis()))
    }
}

/// Decoded snapshots of one collection. Dropping it unregisters the listener.
#[derive(Debug)]
pub struct Subscription<E> {
    listener: Listener,
    collection: Collection,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Subscription<E> {
    /// Next full snapshot, or the listener error. `None` once closed.
    pub async fn next(&mut self) -> Option<Result<Vec<E>>> {
        let event = self.listener.next().await?;
        Some(match event {
            ListenEvent::Value(value) => decode_snapshot(self.collection, value),
            ListenEvent::Error(message) => Err(Error::Subscription(message)),
        })
    }

    pub fn cancel(self) {
        self.listener.cancel();
    }
}

/// Turn the stored value of a collection into entities, in key order.
///
/// Entries that cannot be decoded are skipped; a collection that is not a
/// keyed object (or a sequential array) is a subscription error.
pub fn decode_snapshot<E: Entity>(collection: Collection, value: Option<Value>) -> Result<Vec<E>> {
    let entries: Vec<(String, Value)> = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter(|(_, item)| !item.is_null())
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Some(other) => {
            return Err(Error::Subscription(format!(
                "{collection} is not a collection (found {})",
                json_kind(&other)
            )))
        }
    };

    let mut entities = Vec::with_capacity(entries.len());
    for (key, raw) in entries {
        match decode_entity::<E>(&key, raw) {
            Ok(entity) => {
                if entity.meta().id != key {
                    tracing::debug!(
                        "Entity {}/{} carries diverging id '{}'",
                        collection,
                        key,
                        entity.meta().id
                    );
                }
                entities.push(entity);
            }
            Err(error) => {
                tracing::warn!("Skipping malformed entity {}/{}: {}", collection, key, error);
            }
        }
    }
    Ok(entities)
}

fn decode_entity<E: Entity>(key: &str, value: Value) -> serde_json::Result<E> {
    let mut entity = serde_json::from_value::<E>(value)?;
    if entity.meta().id.is_empty() {
        entity.meta_mut().id = key.to_string();
    }
    Ok(entity)
}

fn ensure_valid_id(id: &str) -> Result<()> {
    if is_valid_key(id) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "'{id}' is not a valid id (must be non-empty and must not contain / . # $ [ ])"
        )))
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
