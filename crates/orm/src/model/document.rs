//! Documents - a typed model paired with its backend metadata
//!
//! `Document<M>` is what sessions hand out and accept. The type-erased
//! `AnyDocument` view lets a session return mixed collections and lets the
//! registry build documents without knowing their concrete type.

use std::any::Any;
use std::fmt::Debug;

use serde_json::Value as JsonValue;

use crate::collection::Collection;
use crate::conventions::DocumentConventions;
use crate::error::{ModelError, OrmResult};
use crate::model::Model;
use crate::session::DocumentSession;

/// A model instance owned by a session, plus its native metadata
#[derive(Debug, Clone)]
pub struct Document<M: Model> {
    data: M,
    conventions: Box<dyn DocumentConventions>,
}

impl<M: Model> Document<M> {
    pub fn from_parts(data: M, conventions: Box<dyn DocumentConventions>) -> Self {
        Self { data, conventions }
    }

    pub fn id(&self) -> &str {
        self.conventions.id()
    }

    pub fn data(&self) -> &M {
        &self.data
    }

    /// Mutable payload access. Id-part fields must not change; `update`
    /// rejects a payload whose id no longer matches the document.
    pub fn data_mut(&mut self) -> &mut M {
        &mut self.data
    }

    pub fn into_inner(self) -> M {
        self.data
    }

    pub fn revision(&self) -> Option<&str> {
        self.conventions.revision()
    }

    pub fn is_deleted(&self) -> bool {
        self.conventions.is_deleted()
    }

    /// Persist for the first time; fails with `AlreadyExists` on collision
    pub async fn create(&mut self, session: &mut dyn DocumentSession) -> OrmResult<()> {
        self.ensure_stable_id()?;
        session.insert(self).await
    }

    /// Re-persist the current payload, checking the revision where supported
    pub async fn update(&mut self, session: &mut dyn DocumentSession) -> OrmResult<()> {
        self.ensure_stable_id()?;
        session.store(self).await
    }

    pub async fn delete(&mut self, session: &mut dyn DocumentSession) -> OrmResult<()> {
        session.delete(self).await
    }

    fn ensure_stable_id(&self) -> OrmResult<()> {
        let id = self.data.id()?;
        if id != self.conventions.id() {
            return Err(ModelError::malformed(
                id,
                format!("id parts changed; document is bound to '{}'", self.conventions.id()),
            ));
        }
        Ok(())
    }
}

/// Type-erased document
pub trait AnyDocument: Any + Send + Sync + Debug {
    fn conventions(&self) -> &dyn DocumentConventions;

    fn conventions_mut(&mut self) -> &mut dyn DocumentConventions;

    /// Bare payload as JSON, without backend metadata
    fn payload(&self) -> OrmResult<JsonValue>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    fn id(&self) -> &str {
        self.conventions().id()
    }

    fn collection(&self) -> Collection {
        self.conventions().collection()
    }
}

impl<M: Model> AnyDocument for Document<M> {
    fn conventions(&self) -> &dyn DocumentConventions {
        self.conventions.as_ref()
    }

    fn conventions_mut(&mut self) -> &mut dyn DocumentConventions {
        self.conventions.as_mut()
    }

    fn payload(&self) -> OrmResult<JsonValue> {
        Ok(serde_json::to_value(&self.data)?)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl dyn AnyDocument {
    /// Recover the typed document, or `TypeMismatch` if it is another model
    pub fn downcast<M: Model>(self: Box<Self>) -> OrmResult<Document<M>> {
        let id = self.id().to_string();
        self.into_any()
            .downcast::<Document<M>>()
            .map(|document| *document)
            .map_err(|_| ModelError::TypeMismatch {
                id,
                expected: M::type_name(),
            })
    }

    pub fn downcast_ref<M: Model>(&self) -> Option<&Document<M>> {
        self.as_any().downcast_ref::<Document<M>>()
    }

    pub fn is<M: Model>(&self) -> bool {
        self.as_any().is::<Document<M>>()
    }
}

/// Downcast every document of a result set
pub(crate) fn downcast_all<M: Model>(documents: Vec<Box<dyn AnyDocument>>) -> OrmResult<Vec<Document<M>>> {
    documents.into_iter().map(|document| document.downcast::<M>()).collect()
}
