//! CouchDB backend
//!
//! All collections share one database; the collection is the `_id` prefix.
//! CouchDB issues `_rev` on every write and rejects stale ones with 409.
//! Deletes leave a native `_deleted` tombstone, which the server already
//! hides from reads. Queries go through Mango `_find` with `$eq` and
//! `$regex` (Erlang `re` dialect).

#[cfg(feature = "couchdb")]
mod session;

#[cfg(feature = "couchdb")]
pub use session::{CouchAdapter, CouchSession};

use serde_json::{json, Value as JsonValue};
use url::Url;

use crate::collection::Collection;
use crate::conventions::{self, DocumentConventions, Metadata, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::identifier::SEPARATOR;
use crate::query::Predicate;

pub const REVISION_FIELD: &str = "_rev";
pub const DELETED_FIELD: &str = "_deleted";

#[derive(Debug, Clone)]
pub struct CouchConventions {
    meta: Metadata,
}

impl DocumentConventions for CouchConventions {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    fn to_native(&self, payload: JsonValue) -> OrmResult<JsonValue> {
        let mut fields = vec![(Self::ID_FIELD, JsonValue::String(self.meta.id.clone()))];
        if let Some(revision) = &self.meta.revision {
            fields.push((REVISION_FIELD, JsonValue::String(revision.clone())));
        }
        if self.meta.deleted {
            fields.push((DELETED_FIELD, JsonValue::Bool(true)));
        }
        conventions::with_fields(payload, fields)
    }

    fn clone_box(&self) -> Box<dyn DocumentConventions> {
        Box::new(self.clone())
    }
}

impl NativeConventions for CouchConventions {
    const ID_FIELD: &'static str = "_id";

    fn build_metadata(id: &str, collection: Collection) -> Self {
        Self {
            meta: Metadata::new(id, collection),
        }
    }

    fn from_native(raw: JsonValue) -> OrmResult<(Self, JsonValue)> {
        let mut map = conventions::into_object(raw)?;
        let id = conventions::take_string(&mut map, Self::ID_FIELD)?;
        let mut meta = Metadata::parse(id)?;
        meta.revision = match map.remove(REVISION_FIELD) {
            Some(JsonValue::String(revision)) => Some(revision),
            _ => None,
        };
        meta.deleted = map
            .remove(DELETED_FIELD)
            .and_then(|deleted| deleted.as_bool())
            .unwrap_or(false);
        Ok((Self { meta }, JsonValue::Object(map)))
    }
}

/// URL and request-body construction for one CouchDB database
#[derive(Debug, Clone)]
pub struct CouchRequests {
    base: Url,
    database: String,
}

impl CouchRequests {
    pub fn new(base: &str, database: impl Into<String>) -> OrmResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| ModelError::Backend(format!("invalid CouchDB URL '{}': {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(ModelError::Backend(format!("CouchDB URL '{}' cannot be a base", base)));
        }
        Ok(Self {
            base,
            database: database.into(),
        })
    }

    /// URL made of the database followed by `segments`, each percent-encoded
    /// so identifiers containing `/` stay a single path segment
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.database).extend(segments);
        }
        url
    }

    pub fn database_url(&self) -> Url {
        self.url(&[])
    }

    pub fn document_url(&self, id: &str) -> Url {
        self.url(&[id])
    }

    pub fn all_docs_url(&self) -> Url {
        let mut url = self.url(&["_all_docs"]);
        url.query_pairs_mut().append_pair("include_docs", "true");
        url
    }

    pub fn find_url(&self) -> Url {
        self.url(&["_find"])
    }

    pub fn all_docs_body(ids: &[String]) -> JsonValue {
        json!({ "keys": ids })
    }

    /// Mango selector scoped to the collection's id prefix
    pub fn find_body(collection: Collection, predicates: &[Predicate], limit: usize) -> JsonValue {
        // Singleton collections have no separator after the tag.
        let scope = if collection.arity() > 0 {
            json!({ "$regex": format!("^{}{}", collection, SEPARATOR) })
        } else {
            json!({ "$eq": collection.as_str() })
        };
        let mut clauses = vec![json!({ (CouchConventions::ID_FIELD): scope })];
        for predicate in predicates {
            let field = CouchConventions::native_field(predicate.property());
            let condition = match predicate {
                Predicate::Equals { value, .. } => json!({ "$eq": value }),
                Predicate::Regex { pattern, .. } => json!({ "$regex": pattern }),
            };
            clauses.push(json!({ field: condition }));
        }
        json!({
            "selector": { "$and": clauses },
            "sort": [{ (CouchConventions::ID_FIELD): "asc" }],
            "limit": limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_shape() {
        let mut conventions = CouchConventions::build_metadata("Guilds/1", Collection::Guilds);
        let native = conventions.to_native(json!({"guildId": "1"})).unwrap();
        assert_eq!(native, json!({"guildId": "1", "_id": "Guilds/1"}));

        conventions.set_revision(Some("2-abc".to_string()));
        conventions.set_deleted(true);
        let native = conventions.to_native(json!({"guildId": "1"})).unwrap();
        assert_eq!(native["_rev"], "2-abc");
        assert_eq!(native["_deleted"], true);

        let (parsed, payload) = CouchConventions::from_native(native).unwrap();
        assert_eq!(parsed.revision(), Some("2-abc"));
        assert!(parsed.is_deleted());
        assert_eq!(payload, json!({"guildId": "1"}));
    }

    #[test]
    fn test_document_url_encodes_separator() {
        let requests = CouchRequests::new("http://localhost:5984/", "docket").unwrap();
        assert_eq!(
            requests.document_url("Tickets/g1/a1/c1").as_str(),
            "http://localhost:5984/docket/Tickets%2Fg1%2Fa1%2Fc1"
        );
        assert_eq!(
            requests.all_docs_url().as_str(),
            "http://localhost:5984/docket/_all_docs?include_docs=true"
        );
    }

    #[test]
    fn test_find_body() {
        let body = CouchRequests::find_body(
            Collection::Tickets,
            &[Predicate::Equals {
                property: "guildId".to_string(),
                value: json!("123"),
            }],
            100,
        );
        assert_eq!(
            body["selector"]["$and"],
            json!([
                {"_id": {"$regex": "^Tickets/"}},
                {"guildId": {"$eq": "123"}},
            ])
        );
        assert_eq!(body["limit"], 100);
    }

    #[test]
    fn test_find_body_for_singleton_collection() {
        let body = CouchRequests::find_body(Collection::DatabaseMetadata, &[], 1);
        assert_eq!(
            body["selector"]["$and"],
            json!([{"_id": {"$eq": "DatabaseMetadata"}}])
        );
    }
}
