//! Database Store - the facade application code talks to
//!
//! A `DatabaseStore` owns one adapter, the read-only model registry, the
//! process-wide action locks and a cached copy of the migration metadata.
//! Sessions are opened from it per unit of work.

use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::backends::{self, DatabaseAdapter};
use crate::config::{ConfigError, DatabaseConfig};
use crate::error::OrmResult;
use crate::lock::LockRegistry;
use crate::model::{DatabaseMetadata, Document, Model, ModelRegistry};
use crate::session::DocumentSession;

#[derive(Debug)]
pub struct DatabaseStore {
    adapter: Arc<dyn DatabaseAdapter>,
    registry: Arc<ModelRegistry>,
    locks: LockRegistry,
    metadata: RwLock<Option<DatabaseMetadata>>,
}

impl DatabaseStore {
    pub fn builder() -> DatabaseStoreBuilder {
        DatabaseStoreBuilder::default()
    }

    /// Connect the backend named by `config` with the models in `registry`
    pub fn connect(config: &DatabaseConfig, registry: ModelRegistry) -> OrmResult<Self> {
        let adapter = backends::connect(config)?;
        Self::builder().adapter(adapter).registry(registry).build()
    }

    /// Prepare backend structures and load the migration metadata
    pub async fn setup(&self) -> OrmResult<()> {
        tracing::info!(backend = %self.adapter.backend(), "setting up database store");
        self.adapter.setup().await?;
        self.refresh_metadata().await?;
        Ok(())
    }

    pub async fn teardown(&self) -> OrmResult<()> {
        tracing::info!(backend = %self.adapter.backend(), "tearing down database store");
        self.metadata.write().take();
        self.adapter.close().await
    }

    pub async fn open_session(&self) -> OrmResult<Box<dyn DocumentSession>> {
        self.adapter.open_session(Arc::clone(&self.registry)).await
    }

    /// Run `f` on a fresh session and close it afterwards, even when `f`
    /// fails. The first error wins.
    pub async fn with_session<T, F>(&self, f: F) -> OrmResult<T>
    where
        F: for<'s> FnOnce(&'s mut dyn DocumentSession) -> BoxFuture<'s, OrmResult<T>>,
    {
        let mut session = self.open_session().await?;
        let result = f(session.as_mut()).await;
        let closed = session.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Wrap `data` in a new, unsaved document for the active backend
    pub fn document<M: Model>(&self, data: M) -> OrmResult<Document<M>> {
        let id = data.id()?;
        let conventions = self.adapter.conventions_for(&id, M::COLLECTION)?;
        Ok(Document::from_parts(data, conventions))
    }

    /// Cached migration metadata; empty until `setup` or `refresh_metadata`
    pub fn metadata(&self) -> DatabaseMetadata {
        self.metadata.read().clone().unwrap_or_default()
    }

    /// Reload the metadata document from the backend
    pub async fn refresh_metadata(&self) -> OrmResult<DatabaseMetadata> {
        let metadata = self
            .with_session(|session| {
                Box::pin(async move {
                    let id = DatabaseMetadata::default().id()?;
                    match session.load(&id).await? {
                        Some(document) => Ok(document.downcast::<DatabaseMetadata>()?.into_inner()),
                        None => Ok(DatabaseMetadata::default()),
                    }
                })
            })
            .await?;
        tracing::debug!(applied = metadata.migrations.len(), "loaded database metadata");
        self.cache_metadata(metadata.clone());
        Ok(metadata)
    }

    /// Persist `metadata` as the metadata document, then cache it
    pub(crate) async fn save_metadata(&self, metadata: &DatabaseMetadata) -> OrmResult<()> {
        let mut session = self.open_session().await?;
        let result = self.write_metadata(session.as_mut(), metadata).await;
        let closed = session.close().await;
        result?;
        closed?;
        self.cache_metadata(metadata.clone());
        Ok(())
    }

    async fn write_metadata(
        &self,
        session: &mut dyn DocumentSession,
        metadata: &DatabaseMetadata,
    ) -> OrmResult<()> {
        let id = metadata.id()?;
        match session.load(&id).await? {
            Some(existing) => {
                let mut document = existing.downcast::<DatabaseMetadata>()?;
                *document.data_mut() = metadata.clone();
                document.update(session).await
            }
            None => self.document(metadata.clone())?.create(session).await,
        }
    }

    fn cache_metadata(&self, metadata: DatabaseMetadata) {
        *self.metadata.write() = Some(metadata);
    }

    pub fn adapter(&self) -> &Arc<dyn DatabaseAdapter> {
        &self.adapter
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }
}

#[derive(Debug, Default)]
pub struct DatabaseStoreBuilder {
    adapter: Option<Arc<dyn DatabaseAdapter>>,
    registry: ModelRegistry,
}

impl DatabaseStoreBuilder {
    pub fn adapter(mut self, adapter: Arc<dyn DatabaseAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Replace the registry collected so far
    pub fn registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn register<M: Model>(mut self) -> Self {
        self.registry.register::<M>();
        self
    }

    pub fn build(mut self) -> OrmResult<DatabaseStore> {
        let adapter = self.adapter.ok_or_else(|| ConfigError::ValidationFailed {
            field: "adapter".to_string(),
            reason: "a database adapter is required".to_string(),
        })?;
        self.registry.register::<DatabaseMetadata>();

        Ok(DatabaseStore {
            adapter,
            registry: Arc::new(self.registry),
            locks: LockRegistry::new(),
            metadata: RwLock::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryAdapter;
    use crate::collection::Collection;
    use crate::error::ModelError;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Resource {
        guild_id: String,
        links: Vec<String>,
    }

    impl Model for Resource {
        const COLLECTION: Collection = Collection::Resources;

        fn id_parts(&self) -> Vec<String> {
            vec![self.guild_id.clone()]
        }
    }

    fn store() -> DatabaseStore {
        DatabaseStore::builder()
            .adapter(Arc::new(MemoryAdapter::default()))
            .register::<Resource>()
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_adapter() {
        let err = DatabaseStore::builder().build().unwrap_err();
        assert!(matches!(err, ModelError::Config(_)));
    }

    #[test]
    fn test_metadata_is_always_registered() {
        let store = store();
        assert!(store.registry().is_registered(Collection::DatabaseMetadata));
        assert!(store.registry().is_registered(Collection::Resources));
    }

    #[tokio::test]
    async fn test_with_session_round_trip() {
        let store = store();
        let mut document = store
            .document(Resource {
                guild_id: "42".to_string(),
                links: vec!["https://example.com".to_string()],
            })
            .unwrap();

        store
            .with_session(|session| Box::pin(async move { document.create(session).await }))
            .await
            .unwrap();

        let loaded = store
            .with_session(|session| {
                Box::pin(async move {
                    let found = session.load("Resources/42").await?;
                    found.map(|document| document.downcast::<Resource>()).transpose()
                })
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.data().links, vec!["https://example.com".to_string()]);
    }

    #[tokio::test]
    async fn test_setup_loads_empty_metadata() {
        let store = store();
        store.setup().await.unwrap();
        assert!(store.metadata().migrations.is_empty());
        store.teardown().await.unwrap();
    }
}
