//! Document Query - filtered reads scoped to one collection
//!
//! Only equality and regex conditions exist. Each backend translates them to
//! its native filter language; there is no client-side re-filtering, so
//! regex semantics follow the backend engine.

pub mod builder;
pub mod types;

pub use builder::Query;
pub use types::{Predicate, QueryOperator};
