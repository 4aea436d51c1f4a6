//! Query Types - predicates understood by every backend

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{ModelError, OrmResult};

static PROPERTY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid property name pattern"));

/// Query operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equals,
    Regex,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equals => write!(f, "="),
            QueryOperator::Regex => write!(f, "=~"),
        }
    }
}

/// One filter condition on a top-level payload property
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals { property: String, value: Value },
    /// Pattern in the backend engine's own regex dialect
    Regex { property: String, pattern: String },
}

impl Predicate {
    pub fn property(&self) -> &str {
        match self {
            Predicate::Equals { property, .. } | Predicate::Regex { property, .. } => property,
        }
    }

    pub fn operator(&self) -> QueryOperator {
        match self {
            Predicate::Equals { .. } => QueryOperator::Equals,
            Predicate::Regex { .. } => QueryOperator::Regex,
        }
    }

    /// Reject property names that could not be addressed safely natively
    pub fn validate(&self) -> OrmResult<()> {
        let property = self.property();
        if !PROPERTY_NAME.is_match(property) {
            return Err(ModelError::Query(format!(
                "invalid property name '{}' in {} condition",
                property,
                self.operator()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals { property, value } => write!(f, "{} = {}", property, value),
            Predicate::Regex { property, pattern } => write!(f, "{} =~ /{}/", property, pattern),
        }
    }
}
