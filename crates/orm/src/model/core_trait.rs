//! Core Model Trait - Base definition for persisted documents
//!
//! A model is a plain serde struct whose serialized fields are the document
//! payload. Its collection is fixed by the type and its identifier is
//! derived from its id parts.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::collection::Collection;
use crate::error::OrmResult;
use crate::identifier;

/// Core trait for persisted document types
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + Debug + 'static {
    /// Collection every instance of this type belongs to
    const COLLECTION: Collection;

    /// Values of the collection's id parts, in `Collection::id_parts` order
    fn id_parts(&self) -> Vec<String>;

    /// Identifier composed from the collection and id parts
    fn id(&self) -> OrmResult<String> {
        identifier::compose(Self::COLLECTION, &self.id_parts())
    }

    /// Short type name used in diagnostics
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("Model")
    }
}
