//! MongoDB backend
//!
//! One native collection per `Collection`, named by its tag. The identifier
//! is stored in `_id`, soft deletes set `_deleted: true`, and there is no
//! revision field. Queries use `$eq` and `$regex` (PCRE).

#[cfg(feature = "mongodb")]
mod session;

#[cfg(feature = "mongodb")]
pub use session::{MongoAdapter, MongoSession};

use serde_json::{json, Value as JsonValue};

use crate::collection::Collection;
use crate::conventions::{self, DocumentConventions, Metadata, NativeConventions};
use crate::error::OrmResult;
use crate::query::Predicate;

pub const DELETED_FIELD: &str = "_deleted";

#[derive(Debug, Clone)]
pub struct MongoConventions {
    meta: Metadata,
}

impl DocumentConventions for MongoConventions {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    fn to_native(&self, payload: JsonValue) -> OrmResult<JsonValue> {
        conventions::with_fields(
            payload,
            [
                (Self::ID_FIELD, JsonValue::String(self.meta.id.clone())),
                (DELETED_FIELD, JsonValue::Bool(self.meta.deleted)),
            ],
        )
    }

    fn clone_box(&self) -> Box<dyn DocumentConventions> {
        Box::new(self.clone())
    }

    /// No optimistic concurrency; the revision stays absent
    fn set_revision(&mut self, _revision: Option<String>) {}
}

impl NativeConventions for MongoConventions {
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
        meta.deleted = map
            .remove(DELETED_FIELD)
            .and_then(|deleted| deleted.as_bool())
            .unwrap_or(false);
        Ok((Self { meta }, JsonValue::Object(map)))
    }
}

/// Excludes soft-deleted documents
pub fn live_clause() -> JsonValue {
    json!({ DELETED_FIELD: { "$ne": true } })
}

/// Filter for one live document by id
pub fn id_filter(id: &str) -> JsonValue {
    json!({ "$and": [ { (MongoConventions::ID_FIELD): id }, live_clause() ] })
}

/// Filter for live documents among `ids`
pub fn ids_filter(ids: &[String]) -> JsonValue {
    json!({ "$and": [ { (MongoConventions::ID_FIELD): { "$in": ids } }, live_clause() ] })
}

/// Conjunction of native `$eq`/`$regex` conditions over live documents
pub fn query_filter(predicates: &[Predicate]) -> JsonValue {
    let mut clauses = vec![live_clause()];
    for predicate in predicates {
        let field = MongoConventions::native_field(predicate.property());
        let condition = match predicate {
            Predicate::Equals { value, .. } => json!({ "$eq": value }),
            Predicate::Regex { pattern, .. } => json!({ "$regex": pattern }),
        };
        clauses.push(json!({ field: condition }));
    }
    json!({ "$and": clauses })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_shape() {
        let mut conventions = MongoConventions::build_metadata("Users/9", Collection::Users);
        conventions.set_revision(Some("5".to_string()));
        assert_eq!(conventions.revision(), None);

        conventions.set_deleted(true);
        let native = conventions.to_native(json!({"userId": "9"})).unwrap();
        assert_eq!(native, json!({"userId": "9", "_id": "Users/9", "_deleted": true}));

        let (parsed, payload) = MongoConventions::from_native(native).unwrap();
        assert!(parsed.is_deleted());
        assert_eq!(payload, json!({"userId": "9"}));
    }

    #[test]
    fn test_query_filter() {
        let filter = query_filter(&[
            Predicate::Equals {
                property: "guildId".to_string(),
                value: json!("123"),
            },
            Predicate::Regex {
                property: "id".to_string(),
                pattern: "^Tickets/".to_string(),
            },
        ]);
        assert_eq!(
            filter,
            json!({"$and": [
                {"_deleted": {"$ne": true}},
                {"guildId": {"$eq": "123"}},
                {"_id": {"$regex": "^Tickets/"}},
            ]})
        );
    }

    #[test]
    fn test_ids_filter() {
        let filter = ids_filter(&["Users/1".to_string(), "Users/2".to_string()]);
        assert_eq!(filter["$and"][0]["_id"]["$in"][1], "Users/2");
    }
}
