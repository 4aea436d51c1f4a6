//! Core Database Adapter Trait
//!
//! An adapter owns one backend connection (or pool) and is the only place a
//! backend client library is touched. Sessions opened from it share that
//! connection.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::BackendKind;
use crate::collection::Collection;
use crate::conventions::{DocumentConventions, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::identifier;
use crate::model::ModelRegistry;
use crate::session::DocumentSession;

/// Per-backend owner of connections, conventions and sessions
#[async_trait]
pub trait DatabaseAdapter: Send + Sync + Debug {
    fn backend(&self) -> BackendKind;

    /// Conventions for a brand-new document with identifier `id`
    fn conventions_for(&self, id: &str, collection: Collection) -> OrmResult<Box<dyn DocumentConventions>>;

    /// Open a unit of work; documents it loads are built through `registry`
    async fn open_session(&self, registry: Arc<ModelRegistry>) -> OrmResult<Box<dyn DocumentSession>>;

    /// Prepare backend-side structures (tables, indexes, databases)
    async fn setup(&self) -> OrmResult<()> {
        Ok(())
    }

    /// Release the shared connection
    async fn close(&self) -> OrmResult<()> {
        Ok(())
    }
}

/// `conventions_for` shared by every adapter: the identifier must belong to
/// `collection` and be well formed.
pub(crate) fn new_conventions<C: NativeConventions>(
    id: &str,
    collection: Collection,
) -> OrmResult<Box<dyn DocumentConventions>> {
    let embedded = identifier::collection_of(id)?;
    if embedded != collection {
        return Err(ModelError::malformed(
            id,
            format!("identifier belongs to {}, not {}", embedded, collection),
        ));
    }
    Ok(Box::new(C::build_metadata(id, collection)))
}

/// Parse a revision token issued by an integer-revision backend
pub(crate) fn parse_revision(id: &str, revision: Option<&str>) -> OrmResult<Option<i64>> {
    revision
        .map(|token| {
            token.parse::<i64>().map_err(|_| {
                ModelError::Backend(format!("invalid revision '{}' on document '{}'", token, id))
            })
        })
        .transpose()
}
