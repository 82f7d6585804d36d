//! Batched persistence against a unit-of-work context.

pub mod batch;
pub mod context;
pub mod memory;
pub mod options;

pub use batch::{BatchExecutor, Objects};
pub use context::{Operation, PersistenceContext};
pub use memory::{CommitRecord, ContextStats, Entity, InMemoryContext, MemoryStore};
pub use options::BatchOptions;
