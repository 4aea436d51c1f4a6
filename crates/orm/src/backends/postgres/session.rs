//! PostgreSQL adapter and session over a shared `sqlx` pool

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};

use super::{row_value, PostgresConventions, PostgresStatements, SqlStatement, SqlValue};
use crate::backends::core::{new_conventions, parse_revision, DatabaseAdapter};
use crate::backends::BackendKind;
use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::conventions::{DocumentConventions, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::model::{AnyDocument, ModelRegistry};
use crate::query::{Predicate, Query};
use crate::session::DocumentSession;

/// PostgreSQL adapter holding a lazily connected pool
#[derive(Debug)]
pub struct PostgresAdapter {
    pool: Pool<Postgres>,
    statements: PostgresStatements,
    query_limit: usize,
}

impl PostgresAdapter {
    /// Build the pool without connecting; the first statement connects
    pub fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            ModelError::Backend("a connection URL is required for postgres".to_string())
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_lazy(url)?;

        Ok(Self {
            pool,
            statements: PostgresStatements::new(config.table.clone()),
            query_limit: config.query_limit,
        })
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Postgres
    }

    fn conventions_for(&self, id: &str, collection: Collection) -> OrmResult<Box<dyn DocumentConventions>> {
        new_conventions::<PostgresConventions>(id, collection)
    }

    async fn open_session(&self, registry: Arc<ModelRegistry>) -> OrmResult<Box<dyn DocumentSession>> {
        Ok(Box::new(PostgresSession {
            pool: self.pool.clone(),
            statements: self.statements.clone(),
            registry,
            query_limit: self.query_limit,
        }))
    }

    async fn setup(&self) -> OrmResult<()> {
        for sql in self.statements.create_table() {
            tracing::debug!(sql = %sql, "postgres setup");
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn close(&self) -> OrmResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

pub struct PostgresSession {
    pool: Pool<Postgres>,
    statements: PostgresStatements,
    registry: Arc<ModelRegistry>,
    query_limit: usize,
}

impl PostgresSession {
    async fn fetch_all(&self, statement: SqlStatement) -> OrmResult<Vec<PgRow>> {
        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "postgres query");
        let query = bind_all(sqlx::query(&statement.sql), &statement.params);
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Run a `RETURNING revision` statement
    async fn fetch_revision(&self, statement: SqlStatement) -> OrmResult<Option<i64>> {
        tracing::debug!(sql = %statement.sql, "postgres write");
        let query = bind_all(sqlx::query(&statement.sql), &statement.params);
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|row| row.try_get::<i64, _>("revision"))
            .transpose()
            .map_err(ModelError::from)
    }

    fn instantiate(&self, row: &PgRow) -> OrmResult<Box<dyn AnyDocument>> {
        let id: String = row.try_get("id")?;
        let revision: i64 = row.try_get("revision")?;
        let deleted: bool = row.try_get("deleted")?;
        let Json(data): Json<JsonValue> = row.try_get("data")?;
        PostgresConventions::instantiate_model(&self.registry, row_value(id, revision, deleted, data))
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlValue::Text(text) => query.bind(text.clone()),
            SqlValue::Json(value) => query.bind(Json(value.clone())),
            SqlValue::Int(number) => query.bind(*number),
            SqlValue::TextArray(items) => query.bind(items.clone()),
        };
    }
    query
}

#[async_trait]
impl DocumentSession for PostgresSession {
    async fn load(&mut self, id: &str) -> OrmResult<Option<Box<dyn AnyDocument>>> {
        let rows = self.fetch_all(self.statements.load(id)).await?;
        rows.first().map(|row| self.instantiate(row)).transpose()
    }

    async fn load_many(&mut self, ids: &[String]) -> OrmResult<Vec<Option<Box<dyn AnyDocument>>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.fetch_all(self.statements.load_many(ids)).await?;
        let mut by_id: HashMap<String, &PgRow> = HashMap::with_capacity(rows.len());
        for row in &rows {
            by_id.insert(row.try_get("id")?, row);
        }

        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            result.push(by_id.get(id).map(|row| self.instantiate(row)).transpose()?);
        }
        Ok(result)
    }

    async fn store(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let expected = parse_revision(&id, document.conventions().revision())?;
        let data = document.conventions().to_native(document.payload()?)?;

        let statement = match expected {
            Some(revision) => self.statements.update(&id, revision, data),
            None => self.statements.upsert(&id, document.collection(), data),
        };

        match self.fetch_revision(statement).await? {
            Some(revision) => {
                document.conventions_mut().set_revision(Some(revision.to_string()));
                Ok(())
            }
            None => {
                tracing::warn!(id = %id, ?expected, "postgres store revision conflict");
                Err(ModelError::Conflict {
                    id,
                    expected: expected.map(|revision| revision.to_string()),
                })
            }
        }
    }

    async fn insert(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let data = document.conventions().to_native(document.payload()?)?;
        let statement = self.statements.insert(&id, document.collection(), data);

        match self.fetch_revision(statement).await? {
            Some(revision) => {
                document.conventions_mut().set_revision(Some(revision.to_string()));
                Ok(())
            }
            None => Err(ModelError::AlreadyExists { id }),
        }
    }

    async fn delete(&mut self, document: &mut dyn AnyDocument) -> OrmResult<()> {
        let id = document.id().to_string();
        let expected = parse_revision(&id, document.conventions().revision())?;
        let revision = self.fetch_revision(self.statements.soft_delete(&id, expected)).await?;

        if revision.is_none() && expected.is_some() {
            return Err(ModelError::Conflict {
                id,
                expected: expected.map(|revision| revision.to_string()),
            });
        }

        let conventions = document.conventions_mut();
        conventions.set_deleted(true);
        conventions.set_revision(revision.map(|revision| revision.to_string()));
        Ok(())
    }

    async fn execute_query(
        &mut self,
        collection: Collection,
        predicates: &[Predicate],
    ) -> OrmResult<Vec<Box<dyn AnyDocument>>> {
        let statement = self.statements.select(collection, predicates, self.query_limit)?;
        let rows = self.fetch_all(statement).await?;
        rows.iter().map(|row| self.instantiate(row)).collect()
    }

    async fn close(&mut self) -> OrmResult<()> {
        Ok(())
    }

    fn query(&mut self, collection: Collection) -> Query<'_> {
        Query::new(self, collection)
    }
}
