//! Query Builder - fluent filter chain bound to one session and collection

use serde_json::Value;

use crate::collection::Collection;
use crate::error::OrmResult;
use crate::model::{document::downcast_all, AnyDocument, Document, Model};
use crate::query::types::Predicate;
use crate::session::DocumentSession;

/// Conjunction of predicates over one collection, executed natively by the
/// session's backend. Results are always typed documents.
pub struct Query<'a> {
    session: &'a mut (dyn DocumentSession + 'a),
    collection: Collection,
    predicates: Vec<Predicate>,
}

impl<'a> Query<'a> {
    pub fn new(session: &'a mut (dyn DocumentSession + 'a), collection: Collection) -> Self {
        Self {
            session,
            collection,
            predicates: Vec::new(),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Add an equality condition. `"id"` addresses the native id field.
    pub fn where_equals(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Equals {
            property: property.into(),
            value: value.into(),
        });
        self
    }

    /// Add a regex condition in the backend engine's dialect
    pub fn where_regex(mut self, property: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Regex {
            property: property.into(),
            pattern: pattern.into(),
        });
        self
    }

    pub async fn execute(self) -> OrmResult<Vec<Box<dyn AnyDocument>>> {
        for predicate in &self.predicates {
            predicate.validate()?;
        }
        tracing::debug!(
            collection = %self.collection,
            predicates = self.predicates.len(),
            "executing document query"
        );
        self.session
            .execute_query(self.collection, &self.predicates)
            .await
    }

    /// Execute and downcast every result to `M`
    pub async fn execute_as<M: Model>(self) -> OrmResult<Vec<Document<M>>> {
        downcast_all(self.execute().await?)
    }
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("collection", &self.collection)
            .field("predicates", &self.predicates)
            .finish()
    }
}
