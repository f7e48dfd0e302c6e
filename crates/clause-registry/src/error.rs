use std::fmt;

use clause_common::{DefinitionKey, ScopeError};
use clause_typeck::TypeError;

/// Errors from registering, updating or looking up definitions.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("definition `{0}` is already registered")]
    Duplicate(DefinitionKey),
    #[error("no definition registered under `{0}`")]
    NotFound(DefinitionKey),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("invalid definition name `{0}`")]
    InvalidName(String),
    /// The definition changed after the caller read it.
    #[error("`{key}` is at version {actual}, expected {expected}")]
    VersionConflict {
        key: DefinitionKey,
        expected: u64,
        actual: u64,
    },
}

/// One definition that failed during a rebuild.
#[derive(Clone, Debug, PartialEq)]
pub struct DefinitionError {
    pub key: DefinitionKey,
    pub error: TypeError,
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.error)
    }
}

/// Every failure of one rebuild pass. Never empty.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("{} definition(s) failed to type-check: {}", .errors.len(), summary(.errors))]
pub struct RebuildError {
    pub errors: Vec<DefinitionError>,
}

fn summary(errors: &[DefinitionError]) -> String {
    errors
        .iter()
        .map(|e| e.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl RebuildError {
    pub fn keys(&self) -> impl Iterator<Item = &DefinitionKey> {
        self.errors.iter().map(|e| &e.key)
    }

    /// The error for `key`, if it failed.
    pub fn get(&self, key: &DefinitionKey) -> Option<&TypeError> {
        self.errors
            .iter()
            .find(|e| &e.key == key)
            .map(|e| &e.error)
    }
}
