//! CouchDB adapter and session over HTTP

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{CouchConventions, CouchRequests};
use crate::backends::core::{new_conventions, DatabaseAdapter};
use crate::backends::BackendKind;
use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::conventions::{DocumentConventions, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::model::{AnyDocument, ModelRegistry};
use crate::query::{Predicate, Query};
use crate::session::DocumentSession;

/// Shared HTTP client plus request construction
#[derive(Debug, Clone)]
struct CouchHttp {
    client: Client,
    requests: CouchRequests,
    credentials: Option<(String, String)>,
}

impl CouchHttp {
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> OrmResult<Response> {
        Ok(self.authorize(request).send().await?)
    }
}

#[derive(Debug)]
pub struct CouchAdapter {
    http: CouchHttp,
    query_limit: usize,
}

impl CouchAdapter {
    pub fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            ModelError::Backend("a connection URL is required for couchdb".to_string())
        })?;
        Ok(Self {
            http: CouchHttp {
                client: Client::builder().build()?,
                requests: CouchRequests::new(url, config.database.clone())?,
                credentials: config.username.clone().zip(config.password.clone()),
            },
            query_limit: config.query_limit,
        })
    }
}

#[async_trait]
impl DatabaseAdapter for CouchAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Couch
    }

    fn conventions_for(&self, id: &str, collection: Collection) -> OrmResult<Box<dyn DocumentConventions>> {
        new_conventions::<CouchConventions>(id, collection)
    }

    async fn open_session(&self, registry: Arc<ModelRegistry>) -> OrmResult<Box<dyn DocumentSession>> {
        Ok(Box::new(CouchSession {
            http: self.http.clone(),
            registry,
            query_limit: self.query_limit,
        }))
    }

    /// Create the database; an existing one (412) is fine
    async fn setup(&self) -> OrmResult<()> {
        let url = self.http.requests.database_url();
        let response = self.http.send(self.http.client.put(url)).await?;
        match response.status() {
            StatusCode::PRECONDITION_FAILED => Ok(()),
            _ => {
                response.error_for_status()?;
                Ok(())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    rev: String,
}

#[derive(Debug, Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
struct AllDocsRow {
    key: String,
    #[serde(default)]
    doc: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    docs: Vec<JsonValue>,
    #[serde(default)]
    warning: Option<String>,
}

pub struct CouchSession {
    http: CouchHttp,
    registry: Arc<ModelRegistry>,
    query_limit: usize,
}

impl CouchSession {
    fn instantiate(&self, raw: JsonValue) -> OrmResult<Box<dyn AnyDocument>> {
        CouchConventions::instantiate_model(&self.registry, raw)
    }

    /// PUT the native document; 409 means the revision did not match
    async fn put(&self, document: &mut dyn AnyDocument) -> OrmResult<Option<String>> {
        let id = document.id().to_string();
        let native = document.conventions().to_native(document.payload()?)?;
        let url = self.http.requests.document_url(&id);
        tracing::debug!(id = %id, "couchdb put");

        let response = self.http.send(self.http.client.put(url).json(&native)).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let written: WriteResponse = response.error_for_status()?.json().await?;
        Ok(Some(written.rev))
    }

    /// Current revision from the ETag of a HEAD request
    async fn current_revision(&self, id: &str) -> OrmResult<Option<String>> {
        let url = self.http.requests.document_url(id);
        let response = self.http.send(self.http.client.head(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|etag| etag.to_str().ok())
            .map(|etag| etag.trim_matches('"').to_string()))
    }
}

#[async_trait]
impl DocumentSession for CouchSession {
    async fn load(&mut self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>> {
        let url = self.http.requests.document_url(id);
        tracing::debug!(id, "couchdb get");
        let response = self.http.send(self.http.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let raw: JsonValue = response.error_for_status()?.json().await?;
        self.instantiate(raw).map(Some)
    }

    async fn load_many(&mut self, ids: &[String]) -> OrmResult<Vec<Option<Box<dyn AnyDocument>>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.http.requests.all_docs_url();
        let body = CouchRequests::all_docs_body(ids);
        tracing::debug!(count = ids.len(), "couchdb _all_docs");
        let response: AllDocsResponse = self
            .http
            .send(self.http.client.post(url).json(&body))
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Rows come back in key order; missing and deleted keys have no doc.
        let mut rows = response.rows.into_iter();
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            let doc = match rows.next() {
                Some(row) if &row.key == id => row.doc.filter(|doc| !doc.is_null()),
                _ => {
                    return Err(ModelError::Backend(format!(
                        "_all_docs returned rows out of key order at '{}'",
                        id
                    )))
                }
            };
            result.push(doc.map(|raw| self.instantiate(raw)).transpose()?);
        }
        Ok(result)
    }

    async fn store(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        match self.put(document).await? {
            Some(revision) => {
                document.conventions_mut().set_revision(Some(revision));
                Ok(())
            }
            None => {
                let expected = document.conventions().revision().map(str::to_string);
                tracing::warn!(id = %document.id(), ?expected, "couchdb store revision conflict");
                Err(ModelError::Conflict {
                    id: document.id().to_string(),
                    expected,
                })
            }
        }
    }

    /// PUT without `_rev` succeeds only when the id is free or tombstoned
    async fn insert(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        document.conventions_mut().set_revision(None);
        match self.put(document).await? {
            Some(revision) => {
                document.conventions_mut().set_revision(Some(revision));
                Ok(())
            }
            None => Err(ModelError::AlreadyExists {
                id: document.id().to_string(),
            }),
        }
    }

    async fn delete(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let revision = match document.conventions().revision() {
            Some(revision) => Some(revision.to_string()),
            None => self.current_revision(&id).await?,
        };

        let Some(revision) = revision else {
            document.conventions_mut().set_deleted(true);
            return Ok(());
        };

        let mut url = self.http.requests.document_url(&id);
        url.query_pairs_mut().append_pair("rev", &revision);
        tracing::debug!(id = %id, "couchdb delete");
        let response = self.http.send(self.http.client.delete(url)).await?;
        if response.status() == StatusCode::CONFLICT {
            return Err(ModelError::Conflict {
                id,
                expected: Some(revision),
            });
        }
        let written: WriteResponse = response.error_for_status()?.json().await?;

        let conventions = document.conventions_mut();
        conventions.set_deleted(true);
        conventions.set_revision(Some(written.rev));
        Ok(())
    }

    async fn execute_query(
        &mut self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> OrmResult<Vec<Box<dyn AnyDocument>>> {
        let body = CouchRequests::find_body(collection, predicates, self.query_limit);
        tracing::debug!(%collection, selector = %body["selector"], "couchdb _find");
        let response: FindResponse = self
            .http
            .send(self.http.client.post(self.http.requests.find_url()).json(&body))
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(warning) = &response.warning {
            tracing::debug!(%collection, warning = %warning, "couchdb _find warning");
        }
        response
            .docs
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
