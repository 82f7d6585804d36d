//! quarry - declarative criteria compiler and batched persistence
//!
//! A [`CriteriaCompiler`] turns a [`CriteriaSpec`] (an ordered mapping of
//! directives such as `select`, `joins`, `where` and `orderBy`) into a
//! [`QueryBuilderState`] for a [`QueryBackend`]. A [`BatchExecutor`] drives
//! chunked stage / lock-check / commit cycles against a
//! [`PersistenceContext`]. [`Repository`] puts both behind one façade.
//!
//! ```
//! use std::sync::Arc;
//! use quarry::{Catalog, CriteriaCompiler, CriteriaSpec, EntitySchema, Map};
//!
//! let mut catalog = Catalog::new();
//! catalog.register(EntitySchema::new(
//!     "crm::User",
//!     vec!["Id".into(), "Name".into()],
//!     vec!["Id".into()],
//! )?)?;
//! let compiler = CriteriaCompiler::for_entity(Arc::new(catalog), "User")?;
//!
//! let criteria = CriteriaSpec::new()
//!     .with("where", Map::new().with("Name", ":name"))
//!     .with("orderBy", "Id DESC");
//! let state = compiler.compile(&criteria, None)?;
//! assert_eq!(
//!     state.to_string(),
//!     "SELECT User FROM crm::User User WHERE User.Name = :name ORDER BY User.Id DESC"
//! );
//! # Ok::<(), quarry::QuarryError>(())
//! ```

pub mod catalog;
pub mod compiler;
pub mod error;
pub mod parser;
pub mod persistence;
pub mod repository;
pub mod types;

pub use catalog::{Catalog, EntitySchema, MetadataProvider, NamespaceResolver};
pub use compiler::{
    CompilerConfig, CriteriaCompiler, Expr, PredicateNode, QueryBuilderState, StatementKind,
};
pub use error::{QuarryError, Result};
pub use persistence::{
    BatchExecutor, BatchOptions, Entity, InMemoryContext, MemoryStore, Objects, Operation,
    PersistenceContext,
};
pub use repository::{CountCriteria, Page, QueryBackend, Repository};
pub use types::{CriteriaSpec, Map, MapKey, Value};
