//! MongoDB adapter and session

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, Credential, FindOptions, ReplaceOptions};
use mongodb::Client;
use serde_json::Value as JsonValue;
use tokio::sync::OnceCell;

use super::{id_filter, ids_filter, query_filter, MongoConventions, DELETED_FIELD};
use crate::backends::core::{new_conventions, DatabaseAdapter};
use crate::backends::BackendKind;
use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::conventions::{DocumentConventions, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::identifier;
use crate::model::{AnyDocument, ModelRegistry};
use crate::query::{Predicate, Query};
use crate::session::DocumentSession;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug)]
pub struct MongoAdapter {
    url: String,
    database: String,
    credentials: Option<(String, String)>,
    client: OnceCell<Client>,
    query_limit: usize,
}

impl MongoAdapter {
    /// Record connection parameters; the client is built on first session
    pub fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let url = config.url.clone().ok_or_else(|| {
            ModelError::Backend("a connection URL is required for mongodb".to_string())
        })?;
        Ok(Self {
            url,
            database: config.database.clone(),
            credentials: config.username.clone().zip(config.password.clone()),
            client: OnceCell::new(),
            query_limit: config.query_limit,
        })
    }

    async fn client(&self) -> OrmResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                let mut options = ClientOptions::parse(&self.url).await?;
                if let Some((username, password)) = &self.credentials {
                    options.credential = Some(
                        Credential::builder()
                            .username(username.clone())
                            .password(password.clone())
                            .build(),
                    );
                }
                tracing::debug!(database = %self.database, "creating mongodb client");
                Ok::<_, ModelError>(Client::with_options(options)?)
            })
            .await
    }
}

#[async_trait]
impl DatabaseAdapter for MongoAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Mongo
    }

    fn conventions_for(&self, id: &str, collection: Collection) -> OrmResult<Box<dyn DocumentConventions>> {
        new_conventions::<MongoConventions>(id, collection)
    }

    async fn open_session(&self, registry: Arc<ModelRegistry>) -> OrmResult<Box<dyn DocumentSession>> {
        let database = self.client().await?.database(&self.database);
        Ok(Box::new(MongoSession {
            database,
            registry,
            query_limit: self.query_limit,
        }))
    }

    async fn close(&self) -> OrmResult<()> {
        if let Some(client) = self.client.get() {
            client.clone().shutdown().await;
        }
        Ok(())
    }
}

pub struct MongoSession {
    database: mongodb::Database,
    registry: Arc<ModelRegistry>,
    query_limit: usize,
}

fn to_document(value: &JsonValue) -> OrmResult<Document> {
    bson::to_document(value).map_err(|e| ModelError::Backend(format!("cannot encode BSON: {}", e)))
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

impl MongoSession {
    fn collection(&self, collection: Collection) -> mongodb::Collection<Document> {
        self.database.collection(collection.as_str())
    }

    fn instantiate(&self, document: Document) -> OrmResult<Box<dyn AnyDocument>> {
        let raw = Bson::Document(document).into_relaxed_extjson();
        MongoConventions::instantiate_model(&self.registry, raw)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: JsonValue,
        limit: Option<usize>,
    ) -> OrmResult<Vec<Document>> {
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .limit(limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX)))
            .build();
        let cursor = self
            .collection(collection)
            .find(to_document(&filter)?, options)
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl DocumentSession for MongoSession {
    async fn load(&mut self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>> {
        let collection = identifier::collection_of(id)?;
        tracing::debug!(id, "mongodb find_one");
        let found = self
            .collection(collection)
            .find_one(to_document(&id_filter(id))?, None)
            .await?;
        found.map(|document| self.instantiate(document)).transpose()
    }

    async fn load_many(&mut self, ids: &[String]) -> OrmResult<Vec<Option<Box<dyn AnyDocument>>>> {
        let mut by_collection: BTreeMap<Collection, Vec<String>> = BTreeMap::new();
        for id in ids {
            by_collection
                .entry(identifier::collection_of(id)?)
                .or_default()
                .push(id.clone());
        }

        let lookups = by_collection
            .iter()
            .map(|(collection, ids)| self.find(*collection, ids_filter(ids), None))
            .collect::<Vec<_>>();
        let batches = futures::future::try_join_all(lookups).await?;

        let mut found: HashMap<String, Document> = HashMap::new();
        for document in batches.into_iter().flatten() {
            if let Ok(id) = document.get_str(MongoConventions::ID_FIELD) {
                found.insert(id.to_string(), document);
            }
        }

        ids.iter()
            .map(|id| found.get(id).map(|document| self.instantiate(document.clone())).transpose())
            .collect()
    }

    async fn store(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let native = document.conventions().to_native(document.payload()?)?;
        let options = ReplaceOptions::builder().upsert(true).build();
        tracing::debug!(id = %id, "mongodb replace_one");
        self.collection(document.collection())
            .replace_one(doc! { "_id": id.as_str() }, to_document(&native)?, options)
            .await?;
        Ok(())
    }

    async fn insert(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let native = to_document(&document.conventions().to_native(document.payload()?)?)?;
        let collection = self.collection(document.collection());

        tracing::debug!(id = %id, "mongodb insert_one");
        match collection.insert_one(&native, None).await {
            Ok(_) => Ok(()),
            Err(error) if is_duplicate_key(&error) => {
                // A soft-deleted document may be recreated in place.
                let revived = collection
                    .replace_one(doc! { "_id": id.as_str(), DELETED_FIELD: true }, &native, None)
                    .await?;
                if revived.matched_count == 1 {
                    Ok(())
                } else {
                    Err(ModelError::AlreadyExists { id })
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn delete(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        tracing::debug!(id = %id, "mongodb soft delete");
        self.collection(document.collection())
            .update_one(doc! { "_id": id.as_str() }, doc! { "$set": { DELETED_FIELD: true } }, None)
            .await?;
        document.conventions_mut().set_deleted(true);
        Ok(())
    }

    async fn execute_query(
        &mut self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> OrmResult<Vec<Box<dyn AnyDocument>>> {
        let filter = query_filter(predicates);
        tracing::debug!(%collection, filter = %filter, "mongodb find");
        self.find(collection, filter, Some(self.query_limit))
            .await?
            .into_iter()
            .map(|document| self.instantiate(document))
            .collect()
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }

    fn query(&mut self, collection: Collection) -> Query<'_> {
        Query::new(self, collection)
    }
}
