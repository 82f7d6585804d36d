//! In-memory persistence context.
//!
//! [`MemoryStore`] is the durable side: versioned rows keyed by identity plus
//! a journal of commits, shared behind `Arc<RwLock<_>>` so several contexts
//! observe the same committed data. [`InMemoryContext`] is the unit of work:
//! an identity map of managed objects and a list of staged changes that
//! [`commit`](PersistenceContext::commit) applies atomically.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{QuarryError, Result};
use crate::persistence::context::{Operation, PersistenceContext};
use crate::types::Value;

/// Domain object with a stable identity.
pub trait Entity: Clone {
    /// Returns the identity used as the row key.
    fn identity(&self) -> String;
}

/// One applied commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub commit_id: Uuid,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl CommitRecord {
    fn new() -> Self {
        CommitRecord {
            commit_id: Uuid::new_v4(),
            created: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
        }
    }

    /// Returns the number of changes in this commit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Returns true if the commit carried no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct VersionedRow<T> {
    object: T,
    version: u64,
}

#[derive(Debug)]
struct StoreInner<T> {
    rows: BTreeMap<String, VersionedRow<T>>,
    journal: Vec<CommitRecord>,
}

/// Shared durable store. Cloning shares the underlying rows.
#[derive(Debug)]
pub struct MemoryStore<T> {
    inner: Arc<RwLock<StoreInner<T>>>,
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        MemoryStore {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        MemoryStore {
            inner: Arc::new(RwLock::new(StoreInner {
                rows: BTreeMap::new(),
                journal: Vec::new(),
            })),
        }
    }
}

impl<T: Entity> MemoryStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the committed object with `identity`.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<T> {
        self.inner
            .read()
            .rows
            .get(identity)
            .map(|row| row.object.clone())
    }

    /// Returns the committed version of `identity`. New rows start at 1.
    #[must_use]
    pub fn version(&self, identity: &str) -> Option<u64> {
        self.inner.read().rows.get(identity).map(|row| row.version)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }

    /// Returns every commit applied so far, oldest first.
    #[must_use]
    pub fn journal(&self) -> Vec<CommitRecord> {
        self.inner.read().journal.clone()
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.inner.read().journal.len()
    }

    /// Applies `changes` in order as one commit.
    ///
    /// Creates insert at version 1, updates upsert and bump the version,
    /// deletes remove the row. Nothing is applied if any change is rejected.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if a create targets an identity that exists
    /// at that point of the commit.
    pub fn apply(&self, changes: &[(Operation, T)]) -> Result<CommitRecord> {
        let mut inner = self.inner.write();

        let mut overlay: HashMap<String, bool> = HashMap::new();
        for (operation, object) in changes {
            let identity = object.identity();
            let exists = overlay
                .get(&identity)
                .copied()
                .unwrap_or_else(|| inner.rows.contains_key(&identity));
            match operation {
                Operation::Create if exists => {
                    return Err(QuarryError::PersistenceError(format!(
                        "'{identity}' already exists"
                    )));
                }
                Operation::Create | Operation::Update => {
                    overlay.insert(identity, true);
                }
                Operation::Delete => {
                    overlay.insert(identity, false);
                }
            }
        }

        let mut record = CommitRecord::new();
        for (operation, object) in changes {
            let identity = object.identity();
            match operation {
                Operation::Create => {
                    inner.rows.insert(
                        identity.clone(),
                        VersionedRow {
                            object: object.clone(),
                            version: 1,
                        },
                    );
                    record.created.push(identity);
                }
                Operation::Update => {
                    let version = inner.rows.get(&identity).map_or(1, |row| row.version + 1);
                    inner.rows.insert(
                        identity.clone(),
                        VersionedRow {
                            object: object.clone(),
                            version,
                        },
                    );
                    record.updated.push(identity);
                }
                Operation::Delete => {
                    if inner.rows.remove(&identity).is_some() {
                        record.deleted.push(identity);
                    }
                }
            }
        }

        inner.journal.push(record.clone());
        Ok(record)
    }
}

/// Call counters for an [`InMemoryContext`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContextStats {
    pub staged: usize,
    pub commits: usize,
    pub clears: usize,
    pub lock_checks: usize,
}

/// Unit of work over a [`MemoryStore`].
#[derive(Debug)]
pub struct InMemoryContext<T> {
    store: MemoryStore<T>,
    identity_map: HashMap<String, T>,
    pending: Vec<(Operation, T)>,
    stats: ContextStats,
}

impl<T: Entity> InMemoryContext<T> {
    /// Creates a context with an empty identity map over `store`.
    #[must_use]
    pub fn new(store: MemoryStore<T>) -> Self {
        InMemoryContext {
            store,
            identity_map: HashMap::new(),
            pending: Vec::new(),
            stats: ContextStats::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &MemoryStore<T> {
        &self.store
    }

    /// Starts managing `object` without staging a change.
    pub fn attach(&mut self, object: T) {
        self.identity_map.insert(object.identity(), object);
    }

    /// Returns the managed object with `identity`, loading it from the store
    /// and attaching it when it is not managed yet.
    pub fn find(&mut self, identity: &str) -> Option<&T> {
        if !self.identity_map.contains_key(identity) {
            let object = self.store.get(identity)?;
            self.identity_map.insert(identity.to_string(), object);
        }
        self.identity_map.get(identity)
    }

    /// Number of staged, uncommitted changes.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of managed objects.
    #[must_use]
    pub fn managed_len(&self) -> usize {
        self.identity_map.len()
    }

    #[must_use]
    pub fn stats(&self) -> ContextStats {
        self.stats
    }
}

impl<T: Entity> PersistenceContext for InMemoryContext<T> {
    type Object = T;

    fn stage(&mut self, object: &T, operation: Operation) -> Result<()> {
        match operation {
            Operation::Create | Operation::Update => self.attach(object.clone()),
            Operation::Delete => {
                self.identity_map.remove(&object.identity());
            }
        }
        self.pending.push((operation, object.clone()));
        self.stats.staged += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let record = self.store.apply(&self.pending)?;
        self.pending.clear();
        self.stats.commits += 1;
        debug!(
            commit_id = %record.commit_id,
            created = record.created.len(),
            updated = record.updated.len(),
            deleted = record.deleted.len(),
            "changes committed"
        );
        Ok(())
    }

    fn contains(&self, object: &T) -> bool {
        self.identity_map.contains_key(&object.identity())
    }

    fn lock_check(&mut self, object: &T, expected: &Value) -> Result<()> {
        self.stats.lock_checks += 1;
        let identity = object.identity();
        let actual = self
            .store
            .version(&identity)
            .ok_or_else(|| QuarryError::NotTracked(identity.clone()))?;
        if expected.as_u64() == Some(actual) {
            Ok(())
        } else {
            Err(QuarryError::OptimisticLock {
                entity: identity,
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }

    fn clear(&mut self) -> Result<()> {
        self.identity_map.clear();
        self.pending.clear();
        self.stats.clears += 1;
        Ok(())
    }
}
