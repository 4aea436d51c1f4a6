//! The `DatabaseMetadata` singleton
//!
//! Records which migrations have been applied. It has no id parts, so its
//! identifier is the bare collection tag.

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::model::Model;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Applied migration names, in application order
    #[serde(default)]
    pub migrations: Vec<String>,
}

impl DatabaseMetadata {
    pub fn is_applied(&self, name: &str) -> bool {
        self.migrations.iter().any(|applied| applied == name)
    }

    pub(crate) fn record(&mut self, name: &str) {
        if !self.is_applied(name) {
            self.migrations.push(name.to_string());
        }
    }

    pub(crate) fn forget(&mut self, name: &str) {
        self.migrations.retain(|applied| applied != name);
    }
}

impl Model for DatabaseMetadata {
    const COLLECTION: Collection = Collection::DatabaseMetadata;

    fn id_parts(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singleton_id() {
        assert_eq!(DatabaseMetadata::default().id().unwrap(), "DatabaseMetadata");
    }

    #[test]
    fn test_record_and_forget() {
        let mut metadata = DatabaseMetadata::default();
        metadata.record("20240101000000_a");
        metadata.record("20240102000000_b");
        metadata.record("20240101000000_a");
        assert_eq!(metadata.migrations.len(), 2);

        metadata.forget("20240101000000_a");
        assert!(!metadata.is_applied("20240101000000_a"));
        assert!(metadata.is_applied("20240102000000_b"));
    }
}
