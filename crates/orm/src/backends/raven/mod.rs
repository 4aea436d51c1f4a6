//! RavenDB backend
//!
//! Metadata lives in the document's `@metadata` object: `@id`,
//! `@collection` and `@change-vector`. Writes send the change vector in
//! `If-Match` for optimistic concurrency. Deletes are physical. Queries are
//! RQL with `=` and `regex()` (.NET dialect) and named parameters; the id
//! is addressed through `id()`.

#[cfg(feature = "ravendb")]
mod session;

#[cfg(feature = "ravendb")]
pub use session::{RavenAdapter, RavenSession};

use serde_json::{json, Map, Value as JsonValue};
use url::Url;

use crate::collection::Collection;
use crate::conventions::{self, DocumentConventions, Metadata, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::query::Predicate;

pub const METADATA_FIELD: &str = "@metadata";
pub const COLLECTION_FIELD: &str = "@collection";
pub const CHANGE_VECTOR_FIELD: &str = "@change-vector";

#[derive(Debug, Clone)]
pub struct RavenConventions {
    meta: Metadata,
}

impl DocumentConventions for RavenConventions {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    fn to_native(&self, payload: JsonValue) -> OrmResult<JsonValue> {
        let mut metadata = Map::new();
        metadata.insert(Self::ID_FIELD.to_string(), json!(self.meta.id));
        metadata.insert(COLLECTION_FIELD.to_string(), json!(self.meta.collection.as_str()));
        if let Some(change_vector) = &self.meta.revision {
            metadata.insert(CHANGE_VECTOR_FIELD.to_string(), json!(change_vector));
        }
        conventions::with_fields(payload, [(METADATA_FIELD, JsonValue::Object(metadata))])
    }

    fn clone_box(&self) -> Box<dyn DocumentConventions> {
        Box::new(self.clone())
    }
}

impl NativeConventions for RavenConventions {
    /// Key inside `@metadata`
    const ID_FIELD: &'static str = "@id";

    fn build_metadata(id: &str, collection: Collection) -> Self {
        Self {
            meta: Metadata::new(id, collection),
        }
    }

    fn from_native(raw: JsonValue) -> OrmResult<(Self, JsonValue)> {
        let mut map = conventions::into_object(raw)?;
        let mut metadata = match map.remove(METADATA_FIELD) {
            Some(JsonValue::Object(metadata)) => metadata,
            _ => {
                return Err(ModelError::Backend(format!(
                    "RavenDB document is missing '{}'",
                    METADATA_FIELD
                )))
            }
        };
        let id = conventions::take_string(&mut metadata, Self::ID_FIELD)?;
        let mut meta = Metadata::parse(id)?;
        meta.revision = match metadata.remove(CHANGE_VECTOR_FIELD) {
            Some(JsonValue::String(change_vector)) => Some(change_vector),
            _ => None,
        };
        Ok((Self { meta }, JsonValue::Object(map)))
    }

    /// RQL addresses the document id through `id()`
    fn native_field(property: &str) -> &str {
        if property == "id" {
            "id()"
        } else {
            property
        }
    }
}

/// Endpoint and RQL construction for one RavenDB database
#[derive(Debug, Clone)]
pub struct RavenRequests {
    base: Url,
    database: String,
}

impl RavenRequests {
    pub fn new(base: &str, database: impl Into<String>) -> OrmResult<Self> {
        let base = Url::parse(base)
            .map_err(|e| ModelError::Backend(format!("invalid RavenDB URL '{}': {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(ModelError::Backend(format!("RavenDB URL '{}' cannot be a base", base)));
        }
        Ok(Self {
            base,
            database: database.into(),
        })
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["databases", self.database.as_str(), name]);
        }
        url
    }

    /// `GET`/`PUT`/`DELETE` target for one or more ids
    pub fn docs_url<S: AsRef<str>>(&self, ids: &[S]) -> Url {
        let mut url = self.endpoint("docs");
        {
            let mut query = url.query_pairs_mut();
            for id in ids {
                query.append_pair("id", id.as_ref());
            }
        }
        url
    }

    pub fn queries_url(&self) -> Url {
        self.endpoint("queries")
    }

    /// `If-Match` value guarding a write. The empty change vector only
    /// matches a document that does not exist yet.
    pub fn if_match(change_vector: Option<&str>) -> String {
        format!("\"{}\"", change_vector.unwrap_or_default())
    }

    /// RQL query with every value passed as a named parameter
    pub fn query_body(collection: Collection, predicates: &[Predicate], limit: usize) -> JsonValue {
        let mut parameters = Map::new();
        let mut conditions = Vec::with_capacity(predicates.len());

        for (index, predicate) in predicates.iter().enumerate() {
            let name = format!("p{}", index);
            let field = RavenConventions::native_field(predicate.property());
            match predicate {
                Predicate::Equals { value, .. } => {
                    conditions.push(format!("{} = ${}", field, name));
                    parameters.insert(name, value.clone());
                }
                Predicate::Regex { pattern, .. } => {
                    conditions.push(format!("regex({}, ${})", field, name));
                    parameters.insert(name, json!(pattern));
                }
            }
        }

        let mut rql = format!("from '{}'", collection);
        if !conditions.is_empty() {
            rql.push_str(" where ");
            rql.push_str(&conditions.join(" and "));
        }
        rql.push_str(&format!(" order by id() limit {}", limit));

        json!({ "Query": rql, "QueryParameters": parameters })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_shape() {
        let mut conventions = RavenConventions::build_metadata("Warnings/1/2/3", Collection::Warnings);
        conventions.set_revision(Some("A:1-xyz".to_string()));
        let native = conventions.to_native(json!({"reason": "spam"})).unwrap();
        assert_eq!(
            native,
            json!({
                "reason": "spam",
                "@metadata": {
                    "@id": "Warnings/1/2/3",
                    "@collection": "Warnings",
                    "@change-vector": "A:1-xyz",
                }
            })
        );

        let (parsed, payload) = RavenConventions::from_native(native).unwrap();
        assert_eq!(parsed.revision(), Some("A:1-xyz"));
        assert_eq!(parsed.collection(), Collection::Warnings);
        assert_eq!(payload, json!({"reason": "spam"}));
    }

    #[test]
    fn test_missing_metadata_is_backend_error() {
        let err = RavenConventions::from_native(json!({"reason": "spam"})).unwrap_err();
        assert!(matches!(err, ModelError::Backend(_)));
    }

    #[test]
    fn test_query_body() {
        let body = RavenRequests::query_body(
            Collection::Tickets,
            &[
                Predicate::Equals {
                    property: "guildId".to_string(),
                    value: json!("123"),
                },
                Predicate::Regex {
                    property: "id".to_string(),
                    pattern: "^Tickets/123/".to_string(),
                },
            ],
            25,
        );
        assert_eq!(
            body["Query"],
            "from 'Tickets' where guildId = $p0 and regex(id(), $p1) order by id() limit 25"
        );
        assert_eq!(body["QueryParameters"], json!({"p0": "123", "p1": "^Tickets/123/"}));
    }

    #[test]
    fn test_docs_url() {
        let requests = RavenRequests::new("https://raven.local:8080", "docket").unwrap();
        assert_eq!(
            requests.docs_url(&["Guilds/1", "Guilds/2"]).as_str(),
            "https://raven.local:8080/databases/docket/docs?id=Guilds%2F1&id=Guilds%2F2"
        );
    }

    #[test]
    fn test_if_match() {
        assert_eq!(RavenRequests::if_match(Some("A:1-xyz")), "\"A:1-xyz\"");
        // Create-only writes carry an empty change vector.
        assert_eq!(RavenRequests::if_match(None), "\"\"");
    }
}
