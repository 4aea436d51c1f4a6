//! Document Conventions
//!
//! Every backend stores the generic metadata of a model (identifier,
//! revision token, soft-delete flag) in its own native fields. A conventions
//! value owns that metadata for one document and knows how to move it in and
//! out of the backend-native JSON shape.
//!
//! `NativeConventions::instantiate_model` is the single point where untyped
//! backend data becomes a typed model: the collection is read from the
//! embedded identifier and the registered factory for it builds the model.

use std::fmt::Debug;

use serde_json::{Map, Value as JsonValue};

use crate::collection::Collection;
use crate::error::{ModelError, OrmResult};
use crate::identifier;
use crate::model::{AnyDocument, ModelRegistry};

/// Generic per-document metadata shared by every backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub id: String,
    pub collection: Collection,
    pub revision: Option<String>,
    pub deleted: bool,
}

impl Metadata {
    pub fn new(id: &str, collection: Collection) -> Self {
        Self {
            id: id.to_string(),
            collection,
            revision: None,
            deleted: false,
        }
    }

    /// Metadata for a stored document, validating the identifier's shape
    pub fn parse(id: String) -> OrmResult<Self> {
        let collection = identifier::collection_of(&id)?;
        Ok(Self {
            id,
            collection,
            revision: None,
            deleted: false,
        })
    }
}

/// Accessors over backend-native metadata for one document
pub trait DocumentConventions: Send + Sync + Debug {
    fn metadata(&self) -> &Metadata;

    fn metadata_mut(&mut self) -> &mut Metadata;

    /// Wrap a bare payload into the backend-native document shape
    fn to_native(&self, payload: JsonValue) -> OrmResult<JsonValue>;

    fn clone_box(&self) -> Box<dyn DocumentConventions>;

    fn id(&self) -> &str {
        &self.metadata().id
    }

    fn collection(&self) -> Collection {
        self.metadata().collection
    }

    /// Opaque revision token; `None` for new documents and for backends
    /// without optimistic concurrency
    fn revision(&self) -> Option<&str> {
        self.metadata().revision.as_deref()
    }

    fn set_revision(&mut self, revision: Option<String>) {
        self.metadata_mut().revision = revision;
    }

    fn is_deleted(&self) -> bool {
        self.metadata().deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.metadata_mut().deleted = deleted;
    }
}

impl Clone for Box<dyn DocumentConventions> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Construction side of a backend's conventions
pub trait NativeConventions: DocumentConventions + Clone + Sized + 'static {
    /// Native field carrying the identifier
    const ID_FIELD: &'static str;

    /// Metadata for a brand-new document
    fn build_metadata(id: &str, collection: Collection) -> Self;

    /// Split a raw native document into its conventions and bare payload
    fn from_native(raw: JsonValue) -> OrmResult<(Self, JsonValue)>;

    /// Map a generic property name to the native field name
    fn native_field(property: &str) -> &str {
        if property == "id" {
            Self::ID_FIELD
        } else {
            property
        }
    }

    /// Turn a raw native document into a registered, typed model
    fn instantiate_model(registry: &ModelRegistry, raw: JsonValue) -> OrmResult<Box<dyn AnyDocument>> {
        let (conventions, payload) = Self::from_native(raw)?;
        registry.instantiate(payload, Box::new(conventions))
    }
}

/// Borrow a raw document as a JSON object
pub(crate) fn into_object(raw: JsonValue) -> OrmResult<Map<String, JsonValue>> {
    match raw {
        JsonValue::Object(map) => Ok(map),
        other => Err(ModelError::Backend(format!(
            "expected a JSON object document, got {}",
            other
        ))),
    }
}

/// Remove a required string field from a native document
pub(crate) fn take_string(map: &mut Map<String, JsonValue>, field: &str) -> OrmResult<String> {
    match map.remove(field) {
        Some(JsonValue::String(value)) => Ok(value),
        Some(other) => Err(ModelError::Backend(format!(
            "field '{}' should be a string, got {}",
            field, other
        ))),
        None => Err(ModelError::Backend(format!(
            "document is missing the '{}' field",
            field
        ))),
    }
}

/// Insert generic metadata fields into a payload object
pub(crate) fn with_fields(
    payload: JsonValue,
    fields: impl IntoIterator<Item = (&'static str, JsonValue)>,
) -> OrmResult<JsonValue> {
    let mut map = into_object(payload)?;
    for (key, value) in fields {
        map.insert(key.to_string(), value);
    }
    Ok(JsonValue::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_parse_validates_identifier() {
        let meta = Metadata::parse("Tickets/g1/a1/c1".to_string()).unwrap();
        assert_eq!(meta.collection, Collection::Tickets);
        assert!(!meta.deleted);

        assert!(matches!(
            Metadata::parse("Widgets/1".to_string()),
            Err(ModelError::UnknownCollection { .. })
        ));
        assert!(matches!(
            Metadata::parse("Tickets/g1".to_string()),
            Err(ModelError::MalformedId { .. })
        ));
    }

    #[test]
    fn test_take_string() {
        let mut map = into_object(json!({"_id": "Users/1", "n": 3})).unwrap();
        assert_eq!(take_string(&mut map, "_id").unwrap(), "Users/1");
        assert!(take_string(&mut map, "_id").is_err());
        assert!(take_string(&mut map, "n").is_err());
        assert!(into_object(json!([1, 2])).is_err());
    }
}
