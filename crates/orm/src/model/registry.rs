//! Model registry
//!
//! Maps every collection to a factory that builds its typed document from a
//! bare JSON payload. Filled in once by `DatabaseStoreBuilder` and shared
//! read-only behind an `Arc` afterwards.

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::collection::Collection;
use crate::conventions::DocumentConventions;
use crate::error::{ModelError, OrmResult};
use crate::model::{AnyDocument, Document, Model};

type Factory = fn(JsonValue, Box<dyn DocumentConventions>) -> OrmResult<Box<dyn AnyDocument>>;

#[derive(Default)]
pub struct ModelRegistry {
    factories: HashMap<Collection, (&'static str, Factory)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M` as the model of `M::COLLECTION`, replacing any previous one
    pub fn register<M: Model>(&mut self) -> &mut Self {
        if let Some((previous, _)) = self
            .factories
            .insert(M::COLLECTION, (M::type_name(), build::<M> as Factory))
        {
            tracing::warn!(
                collection = %M::COLLECTION,
                previous,
                model = M::type_name(),
                "model registration replaced"
            );
        }
        self
    }

    pub fn is_registered(&self, collection: Collection) -> bool {
        self.factories.contains_key(&collection)
    }

    pub fn collections(&self) -> impl Iterator<Item = Collection> + '_ {
        self.factories.keys().copied()
    }

    /// Build the typed document for the collection named in `conventions`
    pub fn instantiate(
        &self,
        payload: JsonValue,
        conventions: Box<dyn DocumentConventions>,
    ) -> OrmResult<Box<dyn AnyDocument>> {
        match self.factories.get(&conventions.collection()) {
            Some((_, factory)) => factory(payload, conventions),
            None => Err(ModelError::UnknownCollection {
                id: conventions.id().to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut models: Vec<_> = self
            .factories
            .iter()
            .map(|(collection, (name, _))| (collection.as_str(), *name))
            .collect();
        models.sort();
        f.debug_struct("ModelRegistry").field("models", &models).finish()
    }
}

fn build<M: Model>(
    payload: JsonValue,
    conventions: Box<dyn DocumentConventions>,
) -> OrmResult<Box<dyn AnyDocument>> {
    let data: M = serde_json::from_value(payload)?;
    Ok(Box::new(Document::from_parts(data, conventions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryConventions;
    use crate::conventions::NativeConventions;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Guild {
        guild_id: String,
        prefix: String,
    }

    impl Model for Guild {
        const COLLECTION: Collection = Collection::Guilds;

        fn id_parts(&self) -> Vec<String> {
            vec![self.guild_id.clone()]
        }
    }

    #[test]
    fn test_instantiate_registered_model() {
        let mut registry = ModelRegistry::new();
        registry.register::<Guild>();

        let conventions = MemoryConventions::build_metadata("Guilds/42", Collection::Guilds);
        let document = registry
            .instantiate(json!({"guildId": "42", "prefix": "!"}), Box::new(conventions))
            .unwrap();

        let guild = document.downcast::<Guild>().unwrap();
        assert_eq!(guild.data().prefix, "!");
        assert_eq!(guild.id(), "Guilds/42");
    }

    #[test]
    fn test_unregistered_collection_is_unknown() {
        let registry = ModelRegistry::new();
        let conventions = MemoryConventions::build_metadata("Users/7", Collection::Users);
        let err = registry
            .instantiate(json!({"userId": "7"}), Box::new(conventions))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownCollection { id } if id == "Users/7"));
    }

    #[test]
    fn test_bad_payload_is_serialization_error() {
        let mut registry = ModelRegistry::new();
        registry.register::<Guild>();
        let conventions = MemoryConventions::build_metadata("Guilds/42", Collection::Guilds);
        let err = registry
            .instantiate(json!({"guildId": 42}), Box::new(conventions))
            .unwrap_err();
        assert!(matches!(err, ModelError::Serialization(_)));
    }
}
