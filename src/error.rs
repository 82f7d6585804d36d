//! Error types for quarry operations.

use thiserror::Error;

/// Result type alias using [`QuarryError`].
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Error types for criteria compilation and batch persistence.
#[derive(Debug, Error)]
pub enum QuarryError {
    // ==================== Compilation Errors ====================
    /// A directive received a value of the wrong shape, or a required key is missing.
    #[error("Malformed directive '{directive}': {message}")]
    MalformedDirective { directive: String, message: String },

    /// The criteria document itself is not a mapping of directives.
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// `reset` named a query part that does not exist.
    #[error("Unknown query part: {0}")]
    UnknownPart(String),

    /// Textual shorthand rejected by the criteria grammar.
    #[error("Parse error at column {col} in '{input}': {message}")]
    ParseError {
        input: String,
        col: usize,
        message: String,
    },

    /// `INDEX BY` applied to an alias that is not a from-alias.
    #[error("Invalid index by: {0}")]
    InvalidIndexBy(String),

    // ==================== Catalog Errors ====================
    /// Schema-related errors (unknown entity, duplicate entity, bad identifier).
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Catalog snapshot errors.
    #[error("Catalog error: {0}")]
    CatalogError(String),

    // ==================== Persistence Errors ====================
    /// Version conflict detected by an optimistic-lock check.
    #[error("Optimistic lock failed for '{entity}': expected version {expected}, found {actual}")]
    OptimisticLock {
        entity: String,
        expected: String,
        actual: String,
    },

    /// The persistence context does not manage the given object.
    #[error("Object is not tracked: {0}")]
    NotTracked(String),

    /// General persistence-context failure (stage, commit).
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Query backend failure.
    #[error("Backend error: {0}")]
    BackendError(String),
}

impl QuarryError {
    /// Builds a [`QuarryError::MalformedDirective`].
    pub(crate) fn malformed(directive: &str, message: impl Into<String>) -> Self {
        QuarryError::MalformedDirective {
            directive: directive.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if this error is an optimistic-lock conflict.
    #[must_use]
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, QuarryError::OptimisticLock { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = QuarryError::malformed("select", "expected a list");
        assert_eq!(
            err.to_string(),
            "Malformed directive 'select': expected a list"
        );
    }

    #[test]
    fn test_lock_conflict_detection() {
        let err = QuarryError::OptimisticLock {
            entity: "User#7".into(),
            expected: "3".into(),
            actual: "4".into(),
        };
        assert!(err.is_lock_conflict());
        assert!(err.to_string().contains("expected version 3"));
        assert!(!QuarryError::NotTracked("x".into()).is_lock_conflict());
    }
}
