//! Schema-less entity for collections without a typed model

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Collection, Entity, EntityMeta};

/// Any JSON object stored in a collection.
///
/// `id`, `createdAt` and `updatedAt` are lifted into [`EntityMeta`]; every
/// other key is kept verbatim in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Document {
    pub meta: EntityMeta,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            meta: EntityMeta::default(),
            fields,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

impl Entity for Document {
    const COLLECTION: Collection = Collection::Stats;
    const ID_PREFIX: &'static str = "DOC";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }
}

impl TryFrom<Map<String, Value>> for Document {
    type Error = String;

    fn try_from(mut fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = match fields.remove("id") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            Some(other) => return Err(format!("id must be a string, got {other}")),
        };
        let created_at = take_timestamp(&mut fields, "createdAt")?;
        let updated_at = take_timestamp(&mut fields, "updatedAt")?;

        Ok(Self {
            meta: EntityMeta {
                id,
                created_at,
                updated_at,
            },
            fields,
        })
    }
}

impl From<Document> for Map<String, Value> {
    fn from(document: Document) -> Self {
        let mut map = document.fields;
        if !document.meta.id.is_empty() {
            map.insert("id".to_string(), Value::String(document.meta.id));
        }
        if let Some(created_at) = document.meta.created_at {
            map.insert("createdAt".to_string(), Value::String(rfc3339(created_at)));
        }
        if let Some(updated_at) = document.meta.updated_at {
            map.insert("updatedAt".to_string(), Value::String(rfc3339(updated_at)));
        }
        map
    }
}

fn rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn take_timestamp(
    fields: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<DateTime<Utc>>, String> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| Some(parsed.with_timezone(&Utc)))
            .map_err(|error| format!("{key} is not an RFC 3339 timestamp: {error}")),
        Some(other) => Err(format!("{key} must be a string, got {other}")),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn lifts_meta_fields_out_of_the_map() {
        let document: Document = serde_json::from_value(json!({
            "id": "C1",
            "name": "Acme Logistics",
            "createdAt": "2024-05-01T10:00:00Z",
        }))
        .unwrap();

        assert_eq!(document.meta.id, "C1");
        assert!(document.meta.created_at.is_some());
        assert_eq!(document.get("name"), Some(&json!("Acme Logistics")));
        assert!(document.get("id").is_none());
    }

    #[test]
    fn serializes_meta_back_into_the_object() {
        let mut document = Document::new(json!({"total": 12}).as_object().cloned().unwrap());
        document.meta.id = "S1".to_string();

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value, json!({"id": "S1", "total": 12}));
    }

    #[test]
    fn rejects_malformed_timestamps() {
        let result = serde_json::from_value::<Document>(json!({"createdAt": "yesterday"}));
        assert!(result.is_err());
    }
}
