//! In-memory backend
//!
//! Keeps one map per collection from bare id to a JSON snapshot of the
//! native document. Every session opened from the same adapter shares the
//! data. Revisions are integer counters with compare-and-set semantics,
//! deletes are physical, and queries evaluate equality and regex
//! in-process with the `regex` crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::backends::core::{new_conventions, parse_revision, DatabaseAdapter};
use crate::backends::BackendKind;
use crate::collection::Collection;
use crate::conventions::{self, DocumentConventions, Metadata, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::identifier;
use crate::model::{AnyDocument, ModelRegistry};
use crate::query::{Predicate, Query};
use crate::session::DocumentSession;

/// Native shape: the payload object plus an `id` field
#[derive(Debug, Clone)]
pub struct MemoryConventions {
    meta: Metadata,
}

impl DocumentConventions for MemoryConventions {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    fn to_native(&self, payload: JsonValue) -> OrmResult<JsonValue> {
        conventions::with_fields(payload, [(Self::ID_FIELD, JsonValue::String(self.meta.id.clone()))])
    }

    fn clone_box(&self) -> Box<dyn DocumentConventions> {
        Box::new(self.clone())
    }
}

impl NativeConventions for MemoryConventions {
    const ID_FIELD: &'static str = "id";

    fn build_metadata(id: &str, collection: Collection) -> Self {
        Self {
            meta: Metadata::new(id, collection),
        }
    }

    fn from_native(raw: JsonValue) -> OrmResult<(Self, JsonValue)> {
        let mut map = conventions::into_object(raw)?;
        let id = conventions::take_string(&mut map, Self::ID_FIELD)?;
        let meta = Metadata::parse(id)?;
        Ok((Self { meta }, JsonValue::Object(map)))
    }
}

#[derive(Debug, Clone)]
struct StoredDocument {
    native: JsonValue,
    revision: i64,
}

type Collections = HashMap<Collection, BTreeMap<String, StoredDocument>>;

#[derive(Debug)]
pub struct MemoryAdapter {
    data: Arc<RwLock<Collections>>,
    query_limit: usize,
}

impl MemoryAdapter {
    pub fn new(query_limit: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            query_limit,
        }
    }

    /// Number of live documents in `collection`
    pub fn len(&self, collection: Collection) -> usize {
        self.data.read().get(&collection).map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl DatabaseAdapter for MemoryAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn conventions_for(&self, id: &str, collection: Collection) -> OrmResult<Box<dyn DocumentConventions>> {
        new_conventions::<MemoryConventions>(id, collection)
    }

    async fn open_session(&self, registry: Arc<ModelRegistry>) -> OrmResult<Box<dyn DocumentSession>> {
        Ok(Box::new(MemorySession {
            data: self.data.clone(),
            registry,
            query_limit: self.query_limit,
        }))
    }

    async fn close(&self) -> OrmResult<()> {
        self.data.write().clear();
        Ok(())
    }
}

pub struct MemorySession {
    data: Arc<RwLock<Collections>>,
    registry: Arc<ModelRegistry>,
    query_limit: usize,
}

impl MemorySession {
    fn instantiate(&self, stored: &StoredDocument) -> OrmResult<Box<dyn AnyDocument>> {
        let mut document = MemoryConventions::instantiate_model(&self.registry, stored.native.clone())?;
        document
            .conventions_mut()
            .set_revision(Some(stored.revision.to_string()));
        Ok(document)
    }

    fn get(&self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>> {
        let collection = identifier::collection_of(id)?;
        let data = self.data.read();
        data.get(&collection)
            .and_then(|documents| documents.get(identifier::bare_id(id)))
            .map(|stored| self.instantiate(stored))
            .transpose()
    }
}

/// A predicate with its regex compiled once per query
enum Matcher<'p> {
    Equals { field: &'p str, value: &'p JsonValue },
    Regex { field: &'p str, regex: Regex },
}

impl<'p> Matcher<'p> {
    fn compile(predicate: &'p Predicate) -> OrmResult<Self> {
        match predicate {
            Predicate::Equals { property, value } => Ok(Matcher::Equals {
                field: MemoryConventions::native_field(property),
                value,
            }),
            Predicate::Regex { property, pattern } => Ok(Matcher::Regex {
                field: MemoryConventions::native_field(property),
                regex: Regex::new(pattern)
                    .map_err(|e| ModelError::Query(format!("invalid regex '{}': {}", pattern, e)))?,
            }),
        }
    }

    fn matches(&self, native: &JsonValue) -> bool {
        match self {
            Matcher::Equals { field, value } => native.get(*field) == Some(*value),
            Matcher::Regex { field, regex } => native
                .get(*field)
                .and_then(JsonValue::as_str)
                .is_some_and(|text| regex.is_match(text)),
        }
    }
}

#[async_trait]
impl DocumentSession for MemorySession {
    async fn load(&mut self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>> {
        tracing::debug!(id, "memory load");
        self.get(id)
    }

    async fn load_many(&mut self, ids: &[String]) -> OrmResult<Vec<Option<Box<dyn AnyDocument>>>> {
        tracing::debug!(count = ids.len(), "memory load_many");
        ids.iter().map(|id| self.get(id)).collect()
    }

    async fn store(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let expected = parse_revision(&id, document.conventions().revision())?;
        let native = document.conventions().to_native(document.payload()?)?;

        let revision = {
            let mut data = self.data.write();
            let documents = data.entry(document.collection()).or_default();
            let bare = identifier::bare_id(&id).to_string();
            let current = documents.get(&bare).map(|stored| stored.revision);

            // A revision held for a document that is gone is stale as well.
            if let Some(expected) = expected {
                if current != Some(expected) {
                    tracing::warn!(id = %id, expected, ?current, "memory store revision conflict");
                    return Err(ModelError::Conflict {
                        id,
                        expected: Some(expected.to_string()),
                    });
                }
            }

            let revision = current.unwrap_or(0) + 1;
            documents.insert(bare, StoredDocument { native, revision });
            revision
        };

        tracing::debug!(id = %id, revision, "memory store");
        document.conventions_mut().set_revision(Some(revision.to_string()));
        Ok(())
    }

    async fn insert(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let native = document.conventions().to_native(document.payload()?)?;

        {
            let mut data = self.data.write();
            let documents = data.entry(document.collection()).or_default();
            match documents.entry(identifier::bare_id(&id).to_string()) {
                std::collections::btree_map::Entry::Occupied(_) => {
                    return Err(ModelError::AlreadyExists { id });
                }
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(StoredDocument { native, revision: 1 });
                }
            }
        }

        tracing::debug!(id = %id, "memory insert");
        document.conventions_mut().set_revision(Some("1".to_string()));
        Ok(())
    }

    async fn delete(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let expected = parse_revision(&id, document.conventions().revision())?;

        {
            let mut data = self.data.write();
            if let Some(documents) = data.get_mut(&document.collection()) {
                let bare = identifier::bare_id(&id);
                if let (Some(expected), Some(stored)) = (expected, documents.get(bare)) {
                    if stored.revision != expected {
                        return Err(ModelError::Conflict {
                            id,
                            expected: Some(expected.to_string()),
                        });
                    }
                }
                documents.remove(bare);
            }
        }

        tracing::debug!(id = %id, "memory delete");
        document.conventions_mut().set_deleted(true);
        Ok(())
    }

    async fn execute_query(
        &mut self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> OrmResult<Vec<Box<dyn AnyDocument>>> {
        let matchers = predicates
            .iter()
            .map(Matcher::compile)
            .collect::<OrmResult<Vec<_>>>()?;

        let data = self.data.read();
        let Some(documents) = data.get(&collection) else {
            return Ok(Vec::new());
        };

        documents
            .values()
            .filter(|stored| matchers.iter().all(|m| m.matches(&stored.native)))
            .take(self.query_limit)
            .map(|stored| self.instantiate(stored))
            .collect()
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }

    fn query(&mut self, collection: Collection) -> Query<'_> {
        Query::new(self, collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_shape_round_trip() {
        let conventions = MemoryConventions::build_metadata("Tickets/g1/a1/c1", Collection::Tickets);
        let native = conventions
            .to_native(json!({"guildId": "g1", "topic": "help"}))
            .unwrap();
        assert_eq!(native["id"], "Tickets/g1/a1/c1");

        let (parsed, payload) = MemoryConventions::from_native(native).unwrap();
        assert_eq!(parsed.id(), "Tickets/g1/a1/c1");
        assert_eq!(parsed.collection(), Collection::Tickets);
        assert_eq!(payload, json!({"guildId": "g1", "topic": "help"}));
    }

    #[test]
    fn test_native_field_rewrites_id() {
        assert_eq!(MemoryConventions::native_field("id"), "id");
        assert_eq!(MemoryConventions::native_field("guildId"), "guildId");
    }

    #[test]
    fn test_matcher_semantics() {
        let doc = json!({"id": "Tickets/g1/a1/c1", "guildId": "g1", "count": 3});

        let eq = Predicate::Equals {
            property: "guildId".to_string(),
            value: json!("g1"),
        };
        assert!(Matcher::compile(&eq).unwrap().matches(&doc));

        let number = Predicate::Equals {
            property: "count".to_string(),
            value: json!("3"),
        };
        assert!(!Matcher::compile(&number).unwrap().matches(&doc));

        let re = Predicate::Regex {
            property: "id".to_string(),
            pattern: "^Tickets/g1/".to_string(),
        };
        assert!(Matcher::compile(&re).unwrap().matches(&doc));

        let bad = Predicate::Regex {
            property: "id".to_string(),
            pattern: "(".to_string(),
        };
        assert!(matches!(Matcher::compile(&bad), Err(ModelError::Query(_))));
    }
}
