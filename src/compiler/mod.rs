//! Criteria compilation.
//!
//! A [`CriteriaCompiler`] is bound to one root entity. It walks a
//! [`CriteriaSpec`] in order, dispatching each directive to its handler, and
//! produces a [`QueryBuilderState`] for a query backend.

pub mod alias;
mod directive;
pub mod expr;
pub mod format;
pub mod predicate;
pub mod state;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use alias::{AliasList, AliasRegistry};
pub use expr::{ComparisonOp, Expr, LogicalOp};
pub use format::{substitute, Substitution};
pub use predicate::{PredicateNode, PredicateTranslator};
pub use state::{
    Assignment, CacheMode, CacheOptions, ConditionKind, FromClause, JoinClause, JoinKind,
    OrderClause, ParamKey, Parameters, QueryBuilderState, QueryPart, StatementKind,
};

use crate::catalog::{is_qualified, EntitySchema, MetadataProvider, NamespaceResolver};
use crate::error::{QuarryError, Result};
use crate::types::CriteriaSpec;
use directive::DirectiveTable;

/// Audit fields hidden from bare-name resolution by default.
pub const DEFAULT_HIDDEN_FIELDS: [&str; 4] = ["CreatedBy", "UpdatedBy", "DeletedBy", "AppKey"];

/// Compiler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Root fields that bare names never resolve to. They stay reachable in
    /// qualified form (`%1$s.AppKey`).
    pub hidden_fields: Vec<String>,
    /// Fill in a join condition when a join does not give one.
    pub guess_join_conditions: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            hidden_fields: DEFAULT_HIDDEN_FIELDS.iter().map(ToString::to_string).collect(),
            guess_join_conditions: true,
        }
    }
}

impl CompilerConfig {
    /// Creates a new compiler configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hidden fields.
    #[must_use]
    pub fn with_hidden_fields<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.hidden_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables join condition guessing.
    #[must_use]
    pub fn with_guess_join_conditions(mut self, guess: bool) -> Self {
        self.guess_join_conditions = guess;
        self
    }
}

/// Compiles criteria against one root entity.
pub struct CriteriaCompiler {
    root: Arc<EntitySchema>,
    namespaces: Arc<dyn NamespaceResolver + Send + Sync>,
    config: CompilerConfig,
    /// Root fields reachable by bare name.
    visible_fields: BTreeSet<String>,
    read: DirectiveTable,
    update: DirectiveTable,
    delete: DirectiveTable,
}

impl fmt::Debug for CriteriaCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CriteriaCompiler")
            .field("root", &self.root.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CriteriaCompiler {
    /// Creates a compiler for `root`, qualifying bare names with `namespaces`.
    #[must_use]
    pub fn new(root: Arc<EntitySchema>, namespaces: Arc<dyn NamespaceResolver + Send + Sync>) -> Self {
        let config = CompilerConfig::default();
        CriteriaCompiler {
            visible_fields: visible_fields(&root, &config),
            root,
            namespaces,
            config,
            read: DirectiveTable::read(),
            update: DirectiveTable::update(),
            delete: DirectiveTable::delete(),
        }
    }

    /// Creates a compiler for the entity named `entity` in `catalog`.
    ///
    /// `entity` may be qualified or a bare short name.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if the catalog does not know the entity.
    pub fn for_entity<P>(catalog: Arc<P>, entity: &str) -> Result<Self>
    where
        P: MetadataProvider + NamespaceResolver + Send + Sync + 'static,
    {
        let root = catalog
            .schema(entity)
            .or_else(|| catalog.schema(&catalog.qualify(entity, "")))
            .ok_or_else(|| QuarryError::SchemaError(format!("Unknown entity '{entity}'")))?;
        Ok(Self::new(root, catalog))
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.visible_fields = visible_fields(&self.root, &config);
        self.config = config;
        self
    }

    /// Returns the root entity schema.
    #[must_use]
    pub fn root(&self) -> &Arc<EntitySchema> {
        &self.root
    }

    /// Returns the default alias of the root entity.
    #[must_use]
    pub fn root_alias(&self) -> &str {
        self.root.short_name()
    }

    /// Returns the compiler configuration.
    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Returns a fresh SELECT over the root entity.
    #[must_use]
    pub fn select_state(&self) -> QueryBuilderState {
        QueryBuilderState::select_from(self.root.name.clone(), self.root_alias())
    }

    /// Compiles a read criteria.
    ///
    /// Without `state`, compilation starts from a SELECT of the root entity
    /// aliased by its short name. An empty criteria returns the state as is.
    ///
    /// # Errors
    ///
    /// Returns `MalformedDirective` for a directive value of the wrong shape,
    /// and `UnknownPart` for a bad `reset`.
    pub fn compile(
        &self,
        criteria: &CriteriaSpec,
        state: Option<QueryBuilderState>,
    ) -> Result<QueryBuilderState> {
        let mut state = state.unwrap_or_else(|| self.select_state());
        if criteria.is_empty() {
            return Ok(state);
        }
        let mut aliases = AliasList::from(state.all_aliases());
        self.apply(&self.read, criteria, &mut state, &mut aliases)?;
        Ok(state)
    }

    /// Compiles an update criteria.
    ///
    /// # Errors
    ///
    /// Returns `MalformedDirective` if `criteria` is empty or a directive
    /// value has the wrong shape.
    pub fn compile_update(
        &self,
        criteria: &CriteriaSpec,
        state: Option<QueryBuilderState>,
    ) -> Result<QueryBuilderState> {
        if criteria.is_empty() {
            return Err(QuarryError::malformed("update", "criteria must not be empty"));
        }
        let mut state = state.unwrap_or_else(|| {
            QueryBuilderState::new_update(self.root.name.clone(), self.root_alias())
        });
        let mut aliases = AliasList::from(state.root_aliases());
        self.apply(&self.update, criteria, &mut state, &mut aliases)?;
        Ok(state)
    }

    /// Compiles a delete criteria.
    ///
    /// # Errors
    ///
    /// Returns `MalformedDirective` if `criteria` is empty or a directive
    /// value has the wrong shape.
    pub fn compile_delete(
        &self,
        criteria: &CriteriaSpec,
        state: Option<QueryBuilderState>,
    ) -> Result<QueryBuilderState> {
        if criteria.is_empty() {
            return Err(QuarryError::malformed("delete", "criteria must not be empty"));
        }
        let mut state = state.unwrap_or_else(|| {
            QueryBuilderState::new_delete(self.root.name.clone(), self.root_alias())
        });
        let mut aliases = AliasList::from(state.root_aliases());
        self.apply(&self.delete, criteria, &mut state, &mut aliases)?;
        Ok(state)
    }

    fn apply(
        &self,
        table: &DirectiveTable,
        criteria: &CriteriaSpec,
        state: &mut QueryBuilderState,
        aliases: &mut AliasList,
    ) -> Result<()> {
        for (name, value) in criteria.iter() {
            match table.get(name) {
                Some(handler) => {
                    debug!(directive = name, entity = %self.root.name, "applying directive");
                    handler(self, value, state, aliases)?;
                }
                None => trace!(directive = name, "ignoring unknown directive"),
            }
        }
        Ok(())
    }

    /// Qualifies a bare entity name against the root entity's namespace.
    pub(crate) fn qualify_source(&self, name: &str) -> String {
        if is_qualified(name) {
            return name.to_string();
        }
        self.namespaces.qualify(name, self.root.namespace())
    }

    pub(crate) fn registry<'a>(&'a self, aliases: &'a AliasList) -> AliasRegistry<'a> {
        AliasRegistry::new(aliases, &self.visible_fields)
    }

    pub(crate) fn translator<'a>(&'a self, aliases: &'a AliasList) -> PredicateTranslator<'a> {
        PredicateTranslator::new(self.registry(aliases))
    }

    /// Join condition used when a join gives none: the root identifier on
    /// both sides, or the root alias against `%<position>$s.<root alias>`
    /// when the root has no identifier.
    pub(crate) fn guess_join_condition(&self, position: usize) -> String {
        match self.root.primary_identifier() {
            Some(id) => format!("%1$s.{id} = %{position}$s.{id}"),
            None => format!("%1$s = %{position}$s.%1$s"),
        }
    }
}

fn visible_fields(root: &EntitySchema, config: &CompilerConfig) -> BTreeSet<String> {
    root.fields
        .iter()
        .filter(|field| !config.hidden_fields.contains(field))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::types::Map;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    fn compiler() -> CriteriaCompiler {
        let mut catalog = Catalog::new();
        catalog
            .register(
                EntitySchema::new(
                    "app::User",
                    names(&["Id", "Name", "AppKey"]),
                    names(&["Id"]),
                )
                .unwrap(),
            )
            .unwrap();
        catalog
            .register(EntitySchema::new("app::Role", names(&["Id", "Name"]), names(&["Id"])).unwrap())
            .unwrap();
        CriteriaCompiler::for_entity(Arc::new(catalog), "User").unwrap()
    }

    #[test]
    fn test_config_builders() {
        let config = CompilerConfig::new()
            .with_hidden_fields(["Secret"])
            .with_guess_join_conditions(false);
        assert_eq!(config.hidden_fields, vec!["Secret"]);
        assert!(!config.guess_join_conditions);

        let parsed: CompilerConfig = serde_json::from_str(r#"{"guess_join_conditions": false}"#).unwrap();
        assert_eq!(parsed.hidden_fields.len(), 4);
    }

    #[test]
    fn test_empty_criteria_returns_fresh_select() {
        let compiler = compiler();
        let state = compiler.compile(&CriteriaSpec::new(), None).unwrap();
        assert_eq!(state.to_string(), "SELECT User FROM app::User User");
    }

    #[test]
    fn test_hidden_fields_need_qualified_names() {
        let compiler = compiler();
        let criteria = CriteriaSpec::new().with(
            "where",
            Map::new().with("AppKey", "?1").with("%1$s.AppKey", "?2"),
        );
        let state = compiler.compile(&criteria, None).unwrap();
        assert_eq!(
            state.where_clause.unwrap().to_string(),
            "User.AppKey = ?2"
        );

        let open = compiler.with_config(CompilerConfig::new().with_hidden_fields(Vec::<String>::new()));
        let state = open.compile(&criteria, None).unwrap();
        assert_eq!(
            state.where_clause.unwrap().to_string(),
            "User.AppKey = ?1 AND User.AppKey = ?2"
        );
    }

    #[test]
    fn test_guessed_join_condition() {
        let compiler = compiler();
        assert_eq!(compiler.guess_join_condition(2), "%1$s.Id = %2$s.Id");
    }

    #[test]
    fn test_mutations_reject_empty_criteria() {
        let compiler = compiler();
        assert!(compiler.compile_update(&CriteriaSpec::new(), None).is_err());
        assert!(compiler.compile_delete(&CriteriaSpec::new(), None).is_err());
    }

    #[test]
    fn test_qualify_source() {
        let compiler = compiler();
        assert_eq!(compiler.qualify_source("Role"), "app::Role");
        assert_eq!(compiler.qualify_source("Audit"), "app::Audit");
        assert_eq!(compiler.qualify_source("other::Role"), "other::Role");
        assert_eq!(compiler.root_alias(), "User");
    }
}
