//! Shared entity contract

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::Collection;
use crate::Result;

/// Fields every stored entity carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMeta {
    /// Unique within the collection; empty until allocated
    #[serde(default)]
    pub id: String,
    /// Set once when the entity is created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Set on every create and update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EntityMeta {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Anything carrying a collection-unique identifier.
pub trait Identified {
    fn id(&self) -> &str;
}

/// A record stored in one collection of the remote tree.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Default collection for this entity type
    const COLLECTION: Collection;
    /// Prefix used when an identifier has to be allocated
    const ID_PREFIX: &'static str;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Reject missing or out-of-range fields before any remote call.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

impl<E: Entity> Identified for E {
    fn id(&self) -> &str {
        &self.meta().id
    }
}

pub(crate) fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(crate::Error::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn require_positive(value: f64, field: &str) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(crate::Error::Validation(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(())
}

pub(crate) fn require_non_negative(value: f64, field: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(crate::Error::Validation(format!(
            "{field} must not be negative"
        )));
    }
    Ok(())
}
