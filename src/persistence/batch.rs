//! Batched create, update and delete.

use std::num::NonZeroUsize;
use std::slice;

use tracing::{debug, debug_span, trace, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::persistence::context::{Operation, PersistenceContext};
use crate::persistence::options::BatchOptions;

/// One object or a slice of objects.
#[derive(Debug)]
pub enum Objects<'a, T> {
    One(&'a T),
    Many(&'a [T]),
}

impl<'a, T> Objects<'a, T> {
    /// Returns the objects as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &'a [T] {
        match *self {
            Objects::One(object) => slice::from_ref(object),
            Objects::Many(objects) => objects,
        }
    }

    /// Returns the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if there are no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T> Clone for Objects<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Objects<'_, T> {}

impl<'a, T> From<&'a [T]> for Objects<'a, T> {
    fn from(objects: &'a [T]) -> Self {
        Objects::Many(objects)
    }
}

impl<'a, T> From<&'a Vec<T>> for Objects<'a, T> {
    fn from(objects: &'a Vec<T>) -> Self {
        Objects::Many(objects)
    }
}

impl<'a, T, const N: usize> From<&'a [T; N]> for Objects<'a, T> {
    fn from(objects: &'a [T; N]) -> Self {
        Objects::Many(objects)
    }
}

/// Drives stage / lock-check / commit cycles against a persistence context.
///
/// For each object in order:
/// - deletes skip objects the context does not manage;
/// - with a lock version, updates and deletes are lock-checked first and a
///   conflict aborts the run;
/// - the object is staged, and with autocommit a commit happens every
///   `iterations` staged objects.
///
/// Remaining staged objects are committed at the end, then the context is
/// cleared if `cleanup` is set. Commits made before a failure stay durable.
pub struct BatchExecutor<'c, C: PersistenceContext> {
    context: &'c mut C,
}

impl<'c, C: PersistenceContext> BatchExecutor<'c, C> {
    /// Creates an executor over `context`.
    pub fn new(context: &'c mut C) -> Self {
        BatchExecutor { context }
    }

    /// Runs `operation` over `objects`.
    ///
    /// Returns the number of input objects, including skipped ones.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the context. An `OptimisticLock`
    /// error leaves the offending object and everything after it unstaged.
    pub fn run<'o>(
        &mut self,
        objects: impl Into<Objects<'o, C::Object>>,
        operation: Operation,
        options: &BatchOptions,
    ) -> Result<usize>
    where
        C::Object: 'o,
    {
        let objects: Objects<'o, C::Object> = objects.into();
        let objects = objects.as_slice();
        let run_id = Uuid::new_v4();
        let span = debug_span!("batch", %run_id, operation = operation.as_str(), objects = objects.len());
        let _guard = span.enter();

        let chunk = options.iterations.map(NonZeroUsize::get);
        let version = match operation {
            Operation::Update | Operation::Delete => options.lock_version(),
            Operation::Create => None,
        };

        let mut counter = 0usize;
        let mut staged = 0usize;
        let mut commits = 0usize;

        for object in objects {
            if operation == Operation::Delete && !self.context.contains(object) {
                trace!("skipping object not managed by the context");
                continue;
            }

            if let Some(expected) = version {
                if let Err(e) = self.context.lock_check(object, expected) {
                    if e.is_lock_conflict() {
                        warn!(error = %e, staged, "lock conflict aborted batch");
                    }
                    return Err(e);
                }
            }

            self.context.stage(object, operation)?;
            staged += 1;

            if options.autocommit {
                counter += 1;
                if chunk == Some(counter) {
                    self.commit(counter)?;
                    commits += 1;
                    counter = 0;
                }
            }
        }

        if counter > 0 {
            self.commit(counter)?;
            commits += 1;
        }

        if options.cleanup && options.autocommit {
            self.context.clear()?;
            debug!("context cleared");
        }

        debug!(staged, commits, "batch finished");
        Ok(objects.len())
    }

    fn commit(&mut self, size: usize) -> Result<()> {
        self.context.commit()?;
        debug!(size, "chunk committed");
        Ok(())
    }
}
