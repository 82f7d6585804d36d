//! Batch options.

use std::num::NonZeroUsize;

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::Value;

/// Options for a batched create, update or delete.
///
/// Deserializes from option objects such as
/// `{"autocommit": true, "iterations": 100, "cleanup": true, "version": 3}`;
/// missing keys take their defaults and `iterations: 0` means no chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Count staged objects and commit (default: true).
    pub autocommit: bool,
    /// Commit every this many staged objects (default: only at the end).
    #[serde(deserialize_with = "zero_as_none")]
    pub iterations: Option<NonZeroUsize>,
    /// Clear the context after the final commit (default: false).
    ///
    /// Only takes effect together with `autocommit`.
    pub cleanup: bool,
    /// Expected version for optimistic-lock checks on update and delete.
    pub version: Option<Value>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            autocommit: true,
            iterations: None,
            cleanup: false,
            version: None,
        }
    }
}

impl BatchOptions {
    /// Creates options with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets autocommit.
    #[must_use]
    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    /// Sets the chunk size. Zero disables chunking.
    #[must_use]
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = NonZeroUsize::new(iterations);
        self
    }

    /// Sets cleanup.
    #[must_use]
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Sets the expected version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<Value>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Returns the version to check, if any. A null version disables the
    /// check.
    #[must_use]
    pub fn lock_version(&self) -> Option<&Value> {
        self.version.as_ref().filter(|v| !v.is_null())
    }
}

fn zero_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<NonZeroUsize>, D::Error>
where
    D: Deserializer<'de>,
{
    let iterations: Option<usize> = Option::deserialize(deserializer)?;
    Ok(iterations.and_then(NonZeroUsize::new))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = BatchOptions::default();
        assert!(options.autocommit);
        assert!(!options.cleanup);
        assert_eq!(options.iterations, None);
        assert_eq!(options.lock_version(), None);
    }

    #[test]
    fn test_deserialize_partial() {
        let options: BatchOptions =
            serde_json::from_str(r#"{"iterations": 100, "version": 3}"#).unwrap();
        assert!(options.autocommit);
        assert_eq!(options.iterations.map(NonZeroUsize::get), Some(100));
        assert_eq!(options.lock_version(), Some(&Value::Int(3)));

        let options: BatchOptions = serde_json::from_str(r#"{"iterations": 0}"#).unwrap();
        assert_eq!(options.iterations, None);
    }

    #[test]
    fn test_builders() {
        let options = BatchOptions::new()
            .with_autocommit(false)
            .with_iterations(0)
            .with_cleanup(true)
            .with_version(Value::Null);
        assert!(!options.autocommit);
        assert_eq!(options.iterations, None);
        assert!(options.cleanup);
        assert_eq!(options.lock_version(), None);
    }
}
