//! Document Session - unit of work against one backend connection
//!
//! A session loads, stores and queries documents. It is not shared between
//! unrelated call sites: open one per unit of work and close it when done.

use async_trait::async_trait;

use crate::collection::Collection;
use crate::error::OrmResult;
use crate::model::AnyDocument;
use crate::query::{Predicate, Query};

#[async_trait]
pub trait DocumentSession: Send {
    /// Point lookup; `None` when the document is absent or soft-deleted
    async fn load(&mut self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>>;

    /// Batched lookup; the result has one slot per input id, in input order
    async fn load_many(&mut self, ids: &[String]) -> OrmResult<Vec<Option<Box<dyn AnyDocument>>>>;

    /// Upsert the document's current state, checking its revision when the
    /// backend supports it. The document adopts the new revision.
    async fn store(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()>;

    /// Create-if-absent; `AlreadyExists` when the id is taken
    async fn insert(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()>;

    /// Remove the document, physically or by soft-delete flag
    async fn delete(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()>;

    /// Run the conjunction of `predicates` over one collection
    async fn execute_query(
        &mut self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> OrmResult<Vec<Box<dyn AnyDocument>>>;

    /// Release backend resources. Safe to call on an unused session.
    async fn close(&mut self) -> OrmResult<()>;

    /// Open a query builder scoped to `collection`
    fn query(&mut self, collection: Collection) -> Query<'_>;
}
