//! PostgreSQL backend
//!
//! Every collection lives in one table, one row per document:
//!
//! ```sql
//! id TEXT PRIMARY KEY, collection TEXT, revision BIGINT, deleted BOOLEAN, data JSONB
//! ```
//!
//! The row key is the generic identifier itself, so the payload stored in
//! `data` carries no id field. Revisions are compare-and-set counters and
//! deletes set the `deleted` flag. Equality compares JSONB values; regex
//! uses the POSIX `~` operator on the text value.

#[cfg(feature = "postgres")]
mod session;

#[cfg(feature = "postgres")]
pub use session::{PostgresAdapter, PostgresSession};

use serde_json::{json, Value as JsonValue};

use crate::collection::Collection;
use crate::conventions::{self, DocumentConventions, Metadata, NativeConventions};
use crate::error::{ModelError, OrmResult};
use crate::query::Predicate;

/// Conventions for table rows
#[derive(Debug, Clone)]
pub struct PostgresConventions {
    meta: Metadata,
}

impl DocumentConventions for PostgresConventions {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    /// The row's `id` column already is the generic id; the payload goes
    /// into `data` untouched.
    fn to_native(&self, payload: JsonValue) -> OrmResult<JsonValue> {
        conventions::into_object(payload).map(JsonValue::Object)
    }

    fn clone_box(&self) -> Box<dyn DocumentConventions> {
        Box::new(self.clone())
    }
}

impl NativeConventions for PostgresConventions {
    const ID_FIELD: &'static str = "id";

    fn build_metadata(id: &str, collection: Collection) -> Self {
        Self {
            meta: Metadata::new(id, collection),
        }
    }

    /// `raw` is a row rendered as `{"id", "revision", "deleted", "data"}`
    fn from_native(raw: JsonValue) -> OrmResult<(Self, JsonValue)> {
        let mut row = conventions::into_object(raw)?;
        let id = conventions::take_string(&mut row, Self::ID_FIELD)?;
        let mut meta = Metadata::parse(id)?;
        meta.revision = row
            .get("revision")
            .and_then(JsonValue::as_i64)
            .map(|revision| revision.to_string());
        meta.deleted = row.get("deleted").and_then(JsonValue::as_bool).unwrap_or(false);
        let data = row.remove("data").unwrap_or_else(|| json!({}));
        Ok((Self { meta }, data))
    }
}

/// Render a fetched row in the shape `from_native` expects
pub(crate) fn row_value(id: String, revision: i64, deleted: bool, data: JsonValue) -> JsonValue {
    json!({
        "id": id,
        "revision": revision,
        "deleted": deleted,
        "data": data,
    })
}

/// Parameter value bound into a generated statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Json(JsonValue),
    Int(i64),
    TextArray(Vec<String>),
}

/// Generated statement plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    /// Bind `value` and return its placeholder
    fn push(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }
}

/// SQL text generation for one document table
#[derive(Debug, Clone)]
pub struct PostgresStatements {
    table: String,
}

const COLUMNS: &str = "id, revision, deleted, data";

impl PostgresStatements {
    /// `table` must already be a validated identifier
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    pub fn create_table(&self) -> Vec<String> {
        vec![
            format!(
                "CREATE TABLE IF NOT EXISTS \"{t}\" (\
                 id TEXT PRIMARY KEY, \
                 collection TEXT NOT NULL, \
                 revision BIGINT NOT NULL DEFAULT 1, \
                 deleted BOOLEAN NOT NULL DEFAULT FALSE, \
                 data JSONB NOT NULL)",
                t = self.table
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS \"{t}_collection_idx\" ON \"{t}\" (collection)",
                t = self.table
            ),
        ]
    }

    pub fn load(&self, id: &str) -> SqlStatement {
        let mut statement = SqlStatement::new(String::new());
        let p = statement.push(SqlValue::Text(id.to_string()));
        statement.sql = format!(
            "SELECT {} FROM \"{}\" WHERE id = {} AND NOT deleted",
            COLUMNS, self.table, p
        );
        statement
    }

    pub fn load_many(&self, ids: &[String]) -> SqlStatement {
        let mut statement = SqlStatement::new(String::new());
        let p = statement.push(SqlValue::TextArray(ids.to_vec()));
        statement.sql = format!(
            "SELECT {} FROM \"{}\" WHERE id = ANY({}) AND NOT deleted",
            COLUMNS, self.table, p
        );
        statement
    }

    /// Create-if-absent. A soft-deleted row may be recreated; a live one
    /// yields no returned row.
    pub fn insert(&self, id: &str, collection: Collection, data: JsonValue) -> SqlStatement {
        let mut statement = SqlStatement::new(String::new());
        let id = statement.push(SqlValue::Text(id.to_string()));
        let collection = statement.push(SqlValue::Text(collection.to_string()));
        let data = statement.push(SqlValue::Json(data));
        statement.sql = format!(
            "INSERT INTO \"{t}\" (id, collection, revision, deleted, data) \
             VALUES ({id}, {collection}, 1, FALSE, {data}) \
             ON CONFLICT (id) DO UPDATE SET revision = \"{t}\".revision + 1, deleted = FALSE, data = EXCLUDED.data \
             WHERE \"{t}\".deleted \
             RETURNING revision",
            t = self.table,
        );
        statement
    }

    /// Unconditional upsert, used when the document carries no revision
    pub fn upsert(&self, id: &str, collection: Collection, data: JsonValue) -> SqlStatement {
        let mut statement = SqlStatement::new(String::new());
        let id = statement.push(SqlValue::Text(id.to_string()));
        let collection = statement.push(SqlValue::Text(collection.to_string()));
        let data = statement.push(SqlValue::Json(data));
        statement.sql = format!(
            "INSERT INTO \"{t}\" (id, collection, revision, deleted, data) \
             VALUES ({id}, {collection}, 1, FALSE, {data}) \
             ON CONFLICT (id) DO UPDATE SET revision = \"{t}\".revision + 1, deleted = FALSE, data = EXCLUDED.data \
             RETURNING revision",
            t = self.table,
        );
        statement
    }

    /// Compare-and-set update against `expected`
    pub fn update(&self, id: &str, expected: i64, data: JsonValue) -> SqlStatement {
        let mut statement = SqlStatement::new(String::new());
        let data = statement.push(SqlValue::Json(data));
        let id = statement.push(SqlValue::Text(id.to_string()));
        let expected = statement.push(SqlValue::Int(expected));
        statement.sql = format!(
            "UPDATE \"{t}\" SET data = {data}, revision = revision + 1, deleted = FALSE \
             WHERE id = {id} AND revision = {expected} \
             RETURNING revision",
            t = self.table,
        );
        statement
    }

    pub fn soft_delete(&self, id: &str, expected: Option<i64>) -> SqlStatement {
        let mut statement = SqlStatement::new(String::new());
        let id = statement.push(SqlValue::Text(id.to_string()));
        let guard = match expected {
            Some(revision) => format!(" AND revision = {}", statement.push(SqlValue::Int(revision))),
            None => String::new(),
        };
        statement.sql = format!(
            "UPDATE \"{t}\" SET deleted = TRUE, revision = revision + 1 \
             WHERE id = {id}{guard} \
             RETURNING revision",
            t = self.table,
        );
        statement
    }

    /// Filtered read over one collection. JSON keys are bound as
    /// parameters, never spliced into the SQL text.
    pub fn select(&self, collection: Collection, predicates: &[Predicate], limit: usize) -> OrmResult<SqlStatement> {
        let mut statement = SqlStatement::new(String::new());
        let mut clauses = vec![
            format!("collection = {}", statement.push(SqlValue::Text(collection.to_string()))),
            "NOT deleted".to_string(),
        ];

        for predicate in predicates {
            let field = PostgresConventions::native_field(predicate.property());
            let is_row_id = field == PostgresConventions::ID_FIELD;
            let clause = match predicate {
                Predicate::Equals { value, .. } if is_row_id => {
                    let id = value.as_str().ok_or_else(|| {
                        ModelError::Query(format!("id can only equal a string, got {}", value))
                    })?;
                    format!("id = {}", statement.push(SqlValue::Text(id.to_string())))
                }
                Predicate::Regex { pattern, .. } if is_row_id => {
                    format!("id ~ {}", statement.push(SqlValue::Text(pattern.clone())))
                }
                Predicate::Equals { value, .. } => {
                    let key = statement.push(SqlValue::Text(field.to_string()));
                    let value = statement.push(SqlValue::Json(value.clone()));
                    format!("data -> {} = {}", key, value)
                }
                Predicate::Regex { pattern, .. } => {
                    let key = statement.push(SqlValue::Text(field.to_string()));
                    let pattern = statement.push(SqlValue::Text(pattern.clone()));
                    format!("data ->> {} ~ {}", key, pattern)
                }
            };
            clauses.push(clause);
        }

        let limit = statement.push(SqlValue::Int(i64::try_from(limit).unwrap_or(i64::MAX)));
        statement.sql = format!(
            "SELECT {} FROM \"{}\" WHERE {} ORDER BY id LIMIT {}",
            COLUMNS,
            self.table,
            clauses.join(" AND "),
            limit
        );
        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_is_stored_without_id() {
        let conventions = PostgresConventions::build_metadata("Guilds/1", Collection::Guilds);
        let native = conventions.to_native(json!({"guildId": "1"})).unwrap();
        assert_eq!(native, json!({"guildId": "1"}));
    }

    #[test]
    fn test_from_row() {
        let raw = row_value("Guilds/1".to_string(), 4, false, json!({"guildId": "1"}));
        let (conventions, payload) = PostgresConventions::from_native(raw).unwrap();
        assert_eq!(conventions.id(), "Guilds/1");
        assert_eq!(conventions.revision(), Some("4"));
        assert!(!conventions.is_deleted());
        assert_eq!(payload, json!({"guildId": "1"}));
    }

    #[test]
    fn test_select_binds_keys_and_values() {
        let statements = PostgresStatements::new("documents");
        let predicates = vec![
            Predicate::Equals {
                property: "guildId".to_string(),
                value: json!("123"),
            },
            Predicate::Regex {
                property: "id".to_string(),
                pattern: "^Tickets/123/".to_string(),
            },
        ];
        let statement = statements.select(Collection::Tickets, &predicates, 50).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT id, revision, deleted, data FROM \"documents\" \
             WHERE collection = $1 AND NOT deleted AND data -> $2 = $3 AND id ~ $4 \
             ORDER BY id LIMIT $5"
        );
        assert_eq!(
            statement.params,
            vec![
                SqlValue::Text("Tickets".to_string()),
                SqlValue::Text("guildId".to_string()),
                SqlValue::Json(json!("123")),
                SqlValue::Text("^Tickets/123/".to_string()),
                SqlValue::Int(50),
            ]
        );
    }

    #[test]
    fn test_select_rejects_non_string_id() {
        let statements = PostgresStatements::new("documents");
        let predicates = vec![Predicate::Equals {
            property: "id".to_string(),
            value: json!(7),
        }];
        assert!(statements.select(Collection::Users, &predicates, 10).is_err());
    }

    #[test]
    fn test_soft_delete_guard() {
        let statements = PostgresStatements::new("documents");
        let unguarded = statements.soft_delete("Users/1", None);
        assert!(unguarded.sql.contains("SET deleted = TRUE, revision = revision + 1"));
        assert!(!unguarded.sql.contains("AND revision ="));
        assert_eq!(unguarded.params.len(), 1);
        let guarded = statements.soft_delete("Users/1", Some(3));
        assert!(guarded.sql.contains("AND revision = $2"));
        assert_eq!(guarded.params[1], SqlValue::Int(3));
    }
}
