//! Redis adapter and session over a multiplexed connection

use std::sync::Arc;

use async_trait::async_trait;
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, Script};
use serde_json::Value as JsonValue;
use tokio::sync::OnceCell;

use super::{script_predicates, RedisConventions, RedisKeys, QUERY_SCRIPT};
use crate::backends::core::{new_conventions, DatabaseAdapter};
use crate::backends::BackendKind;
use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::conventions::{DocumentConventions, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::model::{AnyDocument, ModelRegistry};
use crate::query::{Predicate, Query};
use crate::session::DocumentSession;

pub struct RedisAdapter {
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
    keys: RedisKeys,
    query_limit: usize,
}

impl std::fmt::Debug for RedisAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisAdapter")
            .field("keys", &self.keys)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

impl RedisAdapter {
    /// Parse the URL now; the connection opens on first session
    pub fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            ModelError::Backend("a connection URL is required for redis".to_string())
        })?;
        Ok(Self {
            client: Client::open(url)?,
            connection: OnceCell::new(),
            keys: RedisKeys::new(config.key_prefix.clone()),
            query_limit: config.query_limit,
        })
    }

    async fn connection(&self) -> OrmResult<MultiplexedConnection> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                tracing::debug!("opening redis connection");
                self.client.get_multiplexed_tokio_connection().await
            })
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl DatabaseAdapter for RedisAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Redis
    }

    fn conventions_for(&self, id: &str, collection: Collection) -> OrmResult<Box<dyn DocumentConventions>> {
        new_conventions::<RedisConventions>(id, collection)
    }

    async fn open_session(&self, registry: Arc<ModelRegistry>) -> OrmResult<Box<dyn DocumentSession>> {
        Ok(Box::new(RedisSession {
            connection: self.connection().await?,
            keys: self.keys.clone(),
            registry,
            query_limit: self.query_limit,
        }))
    }
}

pub struct RedisSession {
    connection: MultiplexedConnection,
    keys: RedisKeys,
    registry: Arc<ModelRegistry>,
    query_limit: usize,
}

impl RedisSession {
    fn instantiate(&self, raw: &str) -> OrmResult<Box<dyn AnyDocument>> {
        let raw: JsonValue = serde_json::from_str(raw)?;
        RedisConventions::instantiate_model(&self.registry, raw)
    }

    fn encode(document: &dyn AnyDocument) -> OrmResult<String> {
        let native = document.conventions().to_native(document.payload()?)?;
        Ok(serde_json::to_string(&native)?)
    }
}

#[async_trait]
impl DocumentSession for RedisSession {
    async fn load(&mut self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>> {
        tracing::debug!(id, "redis get");
        let raw: Option<String> = self.connection.get(self.keys.key(id)).await?;
        raw.map(|raw| self.instantiate(&raw)).transpose()
    }

    async fn load_many(&mut self, ids: &[String]) -> OrmResult<Vec<Option<Box<dyn AnyDocument>>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| self.keys.key(id)).collect();
        tracing::debug!(count = keys.len(), "redis mget");
        let raws: Vec<Option<String>> = ::redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut self.connection)
            .await?;
        raws.iter()
            .map(|raw| raw.as_deref().map(|raw| self.instantiate(raw)).transpose())
            .collect()
    }

    async fn store(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let key = self.keys.key(document.id());
        let value = Self::encode(document)?;
        tracing::debug!(key = %key, "redis set");
        self.connection.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn insert(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let key = self.keys.key(document.id());
        let value = Self::encode(document)?;
        tracing::debug!(key = %key, "redis set nx");
        let created: bool = self.connection.set_nx(key, value).await?;
        if !created {
            return Err(ModelError::AlreadyExists {
                id: document.id().to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let key = self.keys.key(document.id());
        tracing::debug!(key = %key, "redis del");
        self.connection.del::<_, i64>(key).await?;
        document.conventions_mut().set_deleted(true);
        Ok(())
    }

    async fn execute_query(
        &mut self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> OrmResult<Vec<Box<dyn AnyDocument>>> {
        let pattern = self.keys.collection_pattern(collection);
        let arguments = serde_json::to_string(&script_predicates(predicates))?;
        tracing::debug!(pattern = %pattern, predicates = %arguments, "redis query script");

        let raws: Vec<String> = Script::new(QUERY_SCRIPT)
            .key(pattern)
            .arg(self.query_limit)
            .arg(arguments)
            .invoke_async(&mut self.connection)
            .await?;

        let mut documents = raws
            .iter()
            .map(|raw| self.instantiate(raw))
            .collect::<OrmResult<Vec<_>>>()?;
        // SCAN order is arbitrary.
        documents.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(documents)
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }

    fn query(&mut self, collection: Collection) -> Query<'_> {
        Query::new(self, collection)
    }
}
