//! Persistence context seam.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Value;

/// Kind of change staged for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Returns the operation name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Unit-of-work style persistence backend.
///
/// Staged changes become durable on [`commit`](Self::commit). The batch
/// executor drives these calls; errors are propagated unchanged.
pub trait PersistenceContext {
    /// Domain object type managed by this context.
    type Object;

    /// Stages `object` for `operation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the context rejects the object.
    fn stage(&mut self, object: &Self::Object, operation: Operation) -> Result<()>;

    /// Makes every staged change durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the staged changes cannot be written.
    fn commit(&mut self) -> Result<()>;

    /// Returns true if the context manages `object`.
    fn contains(&self, object: &Self::Object) -> bool;

    /// Verifies that the durable version of `object` equals `expected`.
    ///
    /// # Errors
    ///
    /// Returns `OptimisticLock` on a version mismatch.
    fn lock_check(&mut self, object: &Self::Object, expected: &Value) -> Result<()>;

    /// Detaches every managed object and drops uncommitted changes.
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be cleared.
    fn clear(&mut self) -> Result<()>;
}
