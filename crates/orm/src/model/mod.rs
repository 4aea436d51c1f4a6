//! Model System - typed documents and the collection registry
//!
//! - `core_trait`: the `Model` trait every persisted type implements
//! - `document`: `Document<M>` and its type-erased `AnyDocument` view
//! - `registry`: collection to model-type mapping used on load
//! - `metadata`: the `DatabaseMetadata` singleton
//! - `query_methods`: lookups and get-or-create for every model

pub mod core_trait;
pub mod document;
pub mod metadata;
pub mod query_methods;
pub mod registry;

pub use core_trait::Model;
pub use document::{AnyDocument, Document};
pub use metadata::DatabaseMetadata;
pub use query_methods::ModelQueries;
pub use registry::ModelRegistry;
