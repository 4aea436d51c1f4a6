//! Redis backend
//!
//! Each document is one string key, `<prefix><id>`, holding the native JSON
//! with the identifier in `_id`. There is no revision and deletes are
//! physical. Queries run as a server-side Lua script that scans the
//! collection's key space and filters with `cjson`: equality compares
//! scalar values, and regex conditions are Lua patterns (`string.find`),
//! not PCRE.

#[cfg(feature = "redis-backend")]
mod session;

#[cfg(feature = "redis-backend")]
pub use session::{RedisAdapter, RedisSession};

use serde_json::{json, Value as JsonValue};

use crate::collection::Collection;
use crate::conventions::{self, DocumentConventions, Metadata, NativeConventions};
use crate::error::OrmResult;
use crate::identifier::SEPARATOR;
use crate::query::Predicate;

/// KEYS[1] = key pattern, ARGV[1] = limit, ARGV[2] = JSON predicate list
pub const QUERY_SCRIPT: &str = r#"
local pattern = KEYS[1]
local limit = tonumber(ARGV[1])
local predicates = cjson.decode(ARGV[2])
local results = {}
local cursor = "0"
repeat
  local page = redis.call("SCAN", cursor, "MATCH", pattern, "COUNT", 500)
  cursor = page[1]
  for _, key in ipairs(page[2]) do
    local raw = redis.call("GET", key)
    if raw then
      local doc = cjson.decode(raw)
      local matched = true
      for _, p in ipairs(predicates) do
        local value = doc[p.field]
        if p.op == "eq" then
          if type(value) ~= type(p.value) or value ~= p.value then
            matched = false
          end
        elseif type(value) ~= "string" or string.find(value, p.pattern) == nil then
          matched = false
        end
        if not matched then break end
      end
      if matched then
        results[#results + 1] = raw
        if #results >= limit then return results end
      end
    end
  end
until cursor == "0"
return results
"#;

#[derive(Debug, Clone)]
pub struct RedisConventions {
    meta: Metadata,
}

impl DocumentConventions for RedisConventions {
    fn metadata(&self) -> &Metadata {
        &self.meta
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.meta
    }

    fn to_native(&self, payload: JsonValue) -> OrmResult<JsonValue> {
        conventions::with_fields(payload, [(Self::ID_FIELD, JsonValue::String(self.meta.id.clone()))])
    }

    fn clone_box(&self) -> Box<dyn DocumentConventions> {
        Box::new(self.clone())
    }

    /// No optimistic concurrency; the revision stays absent
    fn set_revision(&mut self, _revision: Option<String>) {}
}

impl NativeConventions for RedisConventions {
    const ID_FIELD: &'static str = "_id";

    fn build_metadata(id: &str, collection: Collection) -> Self {
        Self {
            meta: Metadata::new(id, collection),
        }
    }

    fn from_native(raw: JsonValue) -> OrmResult<(Self, JsonValue)> {
        let mut map = conventions::into_object(raw)?;
        let id = conventions::take_string(&mut map, Self::ID_FIELD)?;
        let meta = Metadata::parse(id)?;
        Ok((Self { meta }, JsonValue::Object(map)))
    }
}

/// Key naming under one prefix
#[derive(Debug, Clone)]
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    /// SCAN pattern for every document of `collection`, with glob
    /// metacharacters in the prefix escaped
    pub fn collection_pattern(&self, collection: Collection) -> String {
        let mut pattern = String::with_capacity(self.prefix.len() + 24);
        for c in self.prefix.chars() {
            if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push_str(collection.as_str());
        // Singleton collections have no separator after the tag.
        if collection.arity() > 0 {
            pattern.push(SEPARATOR);
            pattern.push('*');
        }
        pattern
    }
}

/// Predicate list in the shape `QUERY_SCRIPT` reads
pub fn script_predicates(predicates: &[Predicate]) -> JsonValue {
    let items: Vec<JsonValue> = predicates
        .iter()
        .map(|predicate| {
            let field = RedisConventions::native_field(predicate.property());
            match predicate {
                Predicate::Equals { value, .. } => json!({ "field": field, "op": "eq", "value": value }),
                Predicate::Regex { pattern, .. } => {
                    json!({ "field": field, "op": "regex", "pattern": pattern })
                }
            }
        })
        .collect();
    JsonValue::Array(items)
}
