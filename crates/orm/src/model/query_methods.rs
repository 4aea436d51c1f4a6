//! Query Methods - lookups and get-or-create for every model
//!
//! `ModelQueries` is implemented for all `Model` types, so these read as
//! associated functions: `Ticket::find(session, &[..])`,
//! `Ticket::all(session, &[("guildId", "123")])`.

use crate::error::{ModelError, OrmResult};
use crate::identifier;
use crate::model::core_trait::Model;
use crate::model::document::{downcast_all, Document};
use crate::session::DocumentSession;
use crate::store::DatabaseStore;

/// Trait providing lookups for model collections
pub trait ModelQueries: Model {
    /// Load the document whose id is composed from `parts`
    async fn find<S: AsRef<str> + Sync>(
        session: &mut dyn DocumentSession,
        parts: &[S],
    ) -> OrmResult<Option<Document<Self>>> {
        let id = identifier::compose(Self::COLLECTION, parts)?;
        match session.load(&id).await? {
            Some(document) => Ok(Some(document.downcast::<Self>()?)),
            None => Ok(None),
        }
    }

    /// Like `find`, but absence is `NotFound`
    async fn find_or_fail<S: AsRef<str> + Sync>(
        session: &mut dyn DocumentSession,
        parts: &[S],
    ) -> OrmResult<Document<Self>> {
        let id = identifier::compose(Self::COLLECTION, parts)?;
        match session.load(&id).await? {
            Some(document) => document.downcast::<Self>(),
            None => Err(ModelError::NotFound(id)),
        }
    }

    /// Order-preserving batched lookup by full identifiers
    async fn find_many(
        session: &mut dyn DocumentSession,
        ids: &[String],
    ) -> OrmResult<Vec<Option<Document<Self>>>> {
        session
            .load_many(ids)
            .await?
            .into_iter()
            .map(|found| found.map(|document| document.downcast::<Self>()).transpose())
            .collect()
    }

    /// Every document of the collection whose named id parts equal the given
    /// values. Parts left out are unconstrained; names that are not id parts
    /// of the collection are rejected.
    async fn all(session: &mut dyn DocumentSession, filters: &[(&str, &str)]) -> OrmResult<Vec<Document<Self>>> {
        for (name, _) in filters {
            if !Self::COLLECTION.has_id_part(name) {
                return Err(ModelError::Query(format!(
                    "'{}' is not an id part of {} (expected one of {:?})",
                    name,
                    Self::COLLECTION,
                    Self::COLLECTION.id_parts()
                )));
            }
        }

        let mut query = session.query(Self::COLLECTION);
        for (name, value) in filters {
            query = query.where_equals(*name, *value);
        }
        let documents = query.execute().await?;
        downcast_all(documents)
    }

    /// Load the document for `data`'s id, creating it from `data` when
    /// absent. Callers on one id are serialised through the store's action
    /// lock, and a lost create-if-absent race resolves to the winner.
    async fn get_or_create(store: &DatabaseStore, data: Self) -> OrmResult<Document<Self>> {
        let id = data.id()?;
        let lock = store.locks().lock_for(&id);

        let outcome = lock
            .enqueue(move || async move {
                let mut session = store.open_session().await?;
                let result = load_or_insert(store, session.as_mut(), &id, data).await;
                session.close().await?;
                result
            })
            .await;
        drop(lock);
        store.locks().prune();
        outcome?
    }
}

impl<T: Model> ModelQueries for T {}

async fn load_or_insert<M: Model>(
    store: &DatabaseStore,
    session: &mut dyn DocumentSession,
    id: &str,
    data: M,
) -> OrmResult<Document<M>> {
    if let Some(existing) = session.load(id).await? {
        return existing.downcast::<M>();
    }

    let mut document = store.document(data)?;
    match document.create(session).await {
        Ok(()) => {
            tracing::debug!(id, "created document");
            Ok(document)
        }
        Err(err) if err.is_already_exists() => {
            tracing::debug!(id, "lost create race, loading the existing document");
            session
                .load(id)
                .await?
                .ok_or_else(|| ModelError::NotFound(id.to_string()))?
                .downcast::<M>()
        }
        Err(err) => Err(err),
    }
}
