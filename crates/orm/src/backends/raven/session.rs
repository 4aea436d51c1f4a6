//! RavenDB adapter and session over the HTTP API

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::IF_MATCH;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{RavenConventions, RavenRequests};
use crate::backends::core::{new_conventions, DatabaseAdapter};
use crate::backends::BackendKind;
use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::conventions::{DocumentConventions, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::model::{AnyDocument, ModelRegistry};
use crate::query::{Predicate, Query};
use crate::session::DocumentSession;

#[derive(Debug)]
pub struct RavenAdapter {
    client: Client,
    requests: RavenRequests,
    query_limit: usize,
}

impl RavenAdapter {
    pub fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            ModelError::Backend("a connection URL is required for ravendb".to_string())
        })?;
        Ok(Self {
            client: Client::builder().build()?,
            requests: RavenRequests::new(url, config.database.clone())?,
            query_limit: config.query_limit,
        })
    }
}

#[async_trait]
impl DatabaseAdapter for RavenAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Raven
    }

    fn conventions_for(&self, id: &str, collection: Collection) -> OrmResult<Box<dyn DocumentConventions>> {
        new_conventions::<RavenConventions>(id, collection)
    }

    async fn open_session(&self, registry: Arc<ModelRegistry>) -> OrmResult<Box<dyn DocumentSession>> {
        Ok(Box::new(RavenSession {
            client: self.client.clone(),
            requests: self.requests.clone(),
            registry,
            query_limit: self.query_limit,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultsResponse {
    results: Vec<JsonValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PutResponse {
    change_vector: String,
}

pub struct RavenSession {
    client: Client,
    requests: RavenRequests,
    registry: Arc<ModelRegistry>,
    query_limit: usize,
}

impl RavenSession {
    fn instantiate(&self, raw: JsonValue) -> OrmResult<Box<dyn AnyDocument>> {
        RavenConventions::instantiate_model(&self.registry, raw)
    }

    /// Raw documents for `ids`, one slot per id; 404 means none exist
    async fn get<S: AsRef<str> + Sync>(&self, ids: &[S]) -> OrmResult<Vec<Option<JsonValue>>> {
        let response = self.client.get(self.requests.docs_url(ids)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(ids.iter().map(|_| None).collect());
        }
        let body: ResultsResponse = response.error_for_status()?.json().await?;
        if body.results.len() != ids.len() {
            return Err(ModelError::Backend(format!(
                "RavenDB returned {} results for {} ids",
                body.results.len(),
                ids.len()
            )));
        }
        Ok(body
            .results
            .into_iter()
            .map(|raw| if raw.is_null() { None } else { Some(raw) })
            .collect())
    }

    /// Write `document`; with `create` set the server rejects the write
    /// when the id is already taken.
    async fn put(&self, document: &mut dyn AnyDocument, create: bool) -> OrmResult<()> {
        let id = document.id().to_string();
        let expected = if create {
            None
        } else {
            document.conventions().revision().map(str::to_string)
        };
        document.conventions_mut().set_revision(expected.clone());
        let native = document.conventions().to_native(document.payload()?)?;

        let mut request = self.client.put(self.requests.docs_url(&[&id])).json(&native);
        if create || expected.is_some() {
            request = request.header(IF_MATCH, RavenRequests::if_match(expected.as_deref()));
        }

        tracing::debug!(id = %id, create, "ravendb put");
        let response = request.send().await?;
        if response.status() == StatusCode::CONFLICT {
            if create {
                return Err(ModelError::AlreadyExists { id });
            }
            tracing::warn!(id = %id, ?expected, "ravendb change vector conflict");
            return Err(ModelError::Conflict { id, expected });
        }
        let written: PutResponse = response.error_for_status()?.json().await?;
        document.conventions_mut().set_revision(Some(written.change_vector));
        Ok(())
    }
}

#[async_trait]
impl DocumentSession for RavenSession {
    async fn load(&mut self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>> {
        tracing::debug!(id, "ravendb get");
        let mut found = self.get(&[id]).await?;
        found
            .pop()
            .flatten()
            .map(|raw| self.instantiate(raw))
            .transpose()
    }

    async fn load_many(&mut self, ids: &[String]) -> OrmResult<Vec<Option<Box<dyn AnyDocument>>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(count = ids.len(), "ravendb get many");
        self.get(ids)
            .await?
            .into_iter()
            .map(|raw| raw.map(|raw| self.instantiate(raw)).transpose())
            .collect()
    }

    async fn store(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        self.put(document, false).await
    }

    async fn insert(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        self.put(document, true).await
    }

    async fn delete(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let expected = document.conventions().revision().map(str::to_string);

        let mut request = self.client.delete(self.requests.docs_url(&[&id]));
        if let Some(change_vector) = &expected {
            request = request.header(IF_MATCH, RavenRequests::if_match(Some(change_vector)));
        }

        tracing::debug!(id = %id, "ravendb delete");
        let response = request.send().await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(ModelError::Conflict { id, expected });
        }
        response.error_for_status()?;

        let conventions = document.conventions_mut();
        conventions.set_deleted(true);
        conventions.set_revision(None);
        Ok(())
    }

    async fn execute_query(
        &mut self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> OrmResult<Vec<Box<dyn AnyDocument>>> {
        let body = RavenRequests::query_body(collection, predicates, self.query_limit);
        tracing::debug!(%collection, rql = %body["Query"], "ravendb query");
        let response: ResultsResponse = self
            .client
            .post(self.requests.queries_url())
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .results
            .into_iter()
            .map(|raw| self.instantiate(raw))
            .collect()
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }

    fn query(&mut self, collection: Collection) -> Query<'_> {
        Query::new(self, collection)
    }
}
