//! Repository façade over a criteria compiler, a persistence context and a
//! query backend.

use tracing::debug;

use crate::compiler::{CriteriaCompiler, PredicateNode, QueryBuilderState};
use crate::error::Result;
use crate::persistence::{BatchExecutor, BatchOptions, Objects, Operation, PersistenceContext};
use crate::types::{CriteriaSpec, Value};

/// Executes compiled query states.
pub trait QueryBackend {
    /// Row type produced by reads.
    type Row;

    /// Runs a SELECT and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query cannot be executed.
    fn fetch(&self, state: &QueryBuilderState) -> Result<Vec<Self::Row>>;

    /// Counts the rows a SELECT matches, ignoring its paging.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query cannot be executed.
    fn count(&self, state: &QueryBuilderState) -> Result<u64>;

    /// Runs an UPDATE or DELETE and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the statement cannot be executed.
    fn execute(&self, state: &QueryBuilderState) -> Result<u64>;
}

/// What [`Repository::count`] counts.
#[derive(Debug, Clone, PartialEq)]
pub enum CountCriteria {
    /// Rows whose identifier equals the value.
    Identifier(Value),
    /// Rows matching a read criteria.
    Criteria(CriteriaSpec),
    /// Rows matching a predicate.
    Predicate(PredicateNode),
}

impl From<Value> for CountCriteria {
    fn from(value: Value) -> Self {
        match value {
            Value::Predicate(node) => CountCriteria::Predicate(*node),
            other => CountCriteria::Identifier(other),
        }
    }
}

impl From<i64> for CountCriteria {
    fn from(id: i64) -> Self {
        CountCriteria::Identifier(Value::Int(id))
    }
}

impl From<&str> for CountCriteria {
    fn from(id: &str) -> Self {
        CountCriteria::Identifier(Value::from(id))
    }
}

impl From<CriteriaSpec> for CountCriteria {
    fn from(criteria: CriteriaSpec) -> Self {
        CountCriteria::Criteria(criteria)
    }
}

impl From<PredicateNode> for CountCriteria {
    fn from(node: PredicateNode) -> Self {
        CountCriteria::Predicate(node)
    }
}

/// One page of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// Rows matched without paging.
    pub total: u64,
    pub first_result: Option<u64>,
    pub max_results: Option<u64>,
}

/// Data access for one root entity.
#[derive(Debug)]
pub struct Repository<C, B> {
    compiler: CriteriaCompiler,
    context: C,
    backend: B,
}

impl<C, B> Repository<C, B>
where
    C: PersistenceContext,
    B: QueryBackend,
{
    pub fn new(compiler: CriteriaCompiler, context: C, backend: B) -> Self {
        Repository {
            compiler,
            context,
            backend,
        }
    }

    #[must_use]
    pub fn compiler(&self) -> &CriteriaCompiler {
        &self.compiler
    }

    #[must_use]
    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Counts rows by identifier, criteria or predicate.
    ///
    /// An identifier matches any of the root identifier fields.
    ///
    /// # Errors
    ///
    /// Returns compilation and backend errors.
    pub fn count(&self, criteria: impl Into<CountCriteria>) -> Result<u64> {
        let criteria = match criteria.into() {
            CountCriteria::Criteria(criteria) => criteria,
            CountCriteria::Predicate(node) => CriteriaSpec::new().with("where", node),
            CountCriteria::Identifier(id) => {
                let matches = self
                    .compiler
                    .root()
                    .identifier
                    .iter()
                    .map(|field| PredicateNode::eq(format!("%1$s.{field}"), id.clone()))
                    .collect();
                CriteriaSpec::new().with("where", PredicateNode::or(matches))
            }
        };
        let state = self.compiler.compile(&criteria, None)?;
        self.backend.count(&state)
    }

    /// Stages and commits new objects.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error.
    pub fn create<'o>(
        &mut self,
        objects: impl Into<Objects<'o, C::Object>>,
        options: &BatchOptions,
    ) -> Result<usize>
    where
        C::Object: 'o,
    {
        BatchExecutor::new(&mut self.context).run(objects, Operation::Create, options)
    }

    /// Stages and commits changed objects, lock-checking them when
    /// `options.version` is set.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error, including `OptimisticLock`.
    pub fn update<'o>(
        &mut self,
        objects: impl Into<Objects<'o, C::Object>>,
        options: &BatchOptions,
    ) -> Result<usize>
    where
        C::Object: 'o,
    {
        BatchExecutor::new(&mut self.context).run(objects, Operation::Update, options)
    }

    /// Stages and commits removals of managed objects. Unmanaged objects are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error, including `OptimisticLock`.
    pub fn delete<'o>(
        &mut self,
        objects: impl Into<Objects<'o, C::Object>>,
        options: &BatchOptions,
    ) -> Result<usize>
    where
        C::Object: 'o,
    {
        BatchExecutor::new(&mut self.context).run(objects, Operation::Delete, options)
    }

    /// Returns the first row matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns compilation and backend errors.
    pub fn read(&self, criteria: &CriteriaSpec) -> Result<Option<B::Row>> {
        let mut state = self.compiler.compile(criteria, None)?;
        state.max_results = Some(1);
        Ok(self.backend.fetch(&state)?.into_iter().next())
    }

    /// Returns every row matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns compilation and backend errors.
    pub fn search(&self, criteria: &CriteriaSpec) -> Result<Vec<B::Row>> {
        let state = self.compiler.compile(criteria, None)?;
        debug!(query = %state, "search");
        self.backend.fetch(&state)
    }

    /// Returns the rows of the page `criteria` selects, with the unpaged
    /// total.
    ///
    /// # Errors
    ///
    /// Returns compilation and backend errors.
    pub fn paginate(&self, criteria: &CriteriaSpec) -> Result<Page<B::Row>> {
        let state = self.compiler.compile(criteria, None)?;
        let items = self.backend.fetch(&state)?;
        let total = self.backend.count(&state)?;
        Ok(Page {
            items,
            total,
            first_result: state.first_result,
            max_results: state.max_results,
        })
    }

    /// Runs a bulk UPDATE.
    ///
    /// # Errors
    ///
    /// Returns compilation and backend errors.
    pub fn update_query(&self, criteria: &CriteriaSpec) -> Result<u64> {
        let state = self.update_query_builder(criteria)?;
        debug!(query = %state, "bulk update");
        self.backend.execute(&state)
    }

    /// Runs a bulk DELETE.
    ///
    /// # Errors
    ///
    /// Returns compilation and backend errors.
    pub fn delete_query(&self, criteria: &CriteriaSpec) -> Result<u64> {
        let state = self.delete_query_builder(criteria)?;
        debug!(query = %state, "bulk delete");
        self.backend.execute(&state)
    }

    /// Compiles a read criteria without running it.
    ///
    /// # Errors
    ///
    /// Returns compilation errors.
    pub fn query_builder(&self, criteria: &CriteriaSpec) -> Result<QueryBuilderState> {
        self.compiler.compile(criteria, None)
    }

    /// Compiles an update criteria without running it.
    ///
    /// # Errors
    ///
    /// Returns compilation errors.
    pub fn update_query_builder(&self, criteria: &CriteriaSpec) -> Result<QueryBuilderState> {
        self.compiler.compile_update(criteria, None)
    }

    /// Compiles a delete criteria without running it.
    ///
    /// # Errors
    ///
    /// Returns compilation errors.
    pub fn delete_query_builder(&self, criteria: &CriteriaSpec) -> Result<QueryBuilderState> {
        self.compiler.compile_delete(criteria, None)
    }

    /// Commits staged changes.
    ///
    /// # Errors
    ///
    /// Returns the context's commit error.
    pub fn flush(&mut self) -> Result<()> {
        self.context.commit()
    }

    /// Detaches every managed object.
    ///
    /// # Errors
    ///
    /// Returns the context's clear error.
    pub fn clear(&mut self) -> Result<()> {
        self.context.clear()
    }
}
