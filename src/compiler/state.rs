//! Accumulated query parts.
//!
//! [`QueryBuilderState`] is what compilation produces and what a query backend
//! consumes. It renders to DQL-style text through `Display`, which is also the
//! easiest way to eyeball a compiled criteria in logs and tests.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::compiler::expr::Expr;
use crate::error::{QuarryError, Result};
use crate::parser::{NullsOrder, SortDirection};
use crate::types::Value;

/// Statement kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    #[default]
    Select,
    Update,
    Delete,
}

/// A root source: `source alias [INDEX BY index_by]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FromClause {
    pub source: String,
    pub alias: String,
    pub index_by: Option<String>,
}

impl fmt::Display for FromClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.alias)?;
        if let Some(index_by) = &self.index_by {
            write!(f, " INDEX BY {index_by}")?;
        }
        Ok(())
    }
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    /// Maps a criteria key (`join`, `innerJoin`, `leftJoin`) to a join kind.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "join" | "innerJoin" => Some(JoinKind::Inner),
            "leftJoin" => Some(JoinKind::Left),
            _ => None,
        }
    }

    /// Returns the keyword for this join.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// How a join condition attaches to the join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConditionKind {
    #[default]
    With,
    On,
}

impl ConditionKind {
    /// `ON` (any case) is `On`; everything else is `With`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("on") {
            ConditionKind::On
        } else {
            ConditionKind::With
        }
    }

    /// Returns the keyword for this condition kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::With => "WITH",
            ConditionKind::On => "ON",
        }
    }
}

/// A join against a related source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub target: String,
    pub alias: String,
    pub condition_kind: ConditionKind,
    pub condition: Option<String>,
    pub index_by: Option<String>,
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind.as_str(), self.target, self.alias)?;
        if let Some(index_by) = &self.index_by {
            write!(f, " INDEX BY {index_by}")?;
        }
        if let Some(condition) = &self.condition {
            write!(f, " {} {condition}", self.condition_kind.as_str())?;
        }
        Ok(())
    }
}

/// An ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderClause {
    pub field: String,
    pub direction: SortDirection,
    pub nulls: Option<NullsOrder>,
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction.as_str())?;
        if let Some(nulls) = self.nulls {
            write!(f, " {nulls}")?;
        }
        Ok(())
    }
}

/// An UPDATE assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub field: String,
    pub value: Value,
}

/// Key of a query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ParamKey {
    /// `?n`
    Position(u32),
    /// `:name`
    Named(String),
}

impl From<&str> for ParamKey {
    /// Digit-only keys are positional; a leading `:` is dropped from names.
    fn from(key: &str) -> Self {
        let key = key.trim();
        match key.parse::<u32>() {
            Ok(position) if !key.starts_with('+') => ParamKey::Position(position),
            _ => ParamKey::Named(key.strip_prefix(':').unwrap_or(key).to_string()),
        }
    }
}

impl From<u32> for ParamKey {
    fn from(position: u32) -> Self {
        ParamKey::Position(position)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Position(n) => write!(f, "?{n}"),
            ParamKey::Named(name) => write!(f, ":{name}"),
        }
    }
}

/// Ordered parameter bindings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parameters {
    entries: Vec<(ParamKey, Value)>,
}

impl Parameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Parameters {
            entries: Vec::new(),
        }
    }

    /// Binds a parameter, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<ParamKey>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Binds a parameter, replacing an existing binding in place.
    pub fn set(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Binds every parameter of `other`.
    pub fn merge(&mut self, other: &Parameters) {
        for (key, value) in &other.entries {
            self.set(key.clone(), value.clone());
        }
    }

    /// Looks up a binding.
    #[must_use]
    pub fn get(&self, key: impl Into<ParamKey>) -> Option<&Value> {
        let key = key.into();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Iterates bindings in order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParamKey, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Second-level cache mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheMode {
    Get,
    Put,
    Normal,
    Refresh,
}

impl CacheMode {
    /// Accepts the numeric codes 1 to 4 or the mode names (any case).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if let Some(code) = value.as_i64() {
            return match code {
                1 => Some(CacheMode::Get),
                2 => Some(CacheMode::Put),
                3 => Some(CacheMode::Normal),
                4 => Some(CacheMode::Refresh),
                _ => None,
            };
        }
        match value.as_str()?.to_ascii_lowercase().as_str() {
            "get" => Some(CacheMode::Get),
            "put" => Some(CacheMode::Put),
            "normal" => Some(CacheMode::Normal),
            "refresh" => Some(CacheMode::Refresh),
            _ => None,
        }
    }
}

/// Result cache settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheOptions {
    pub cacheable: bool,
    pub region: Option<String>,
    pub mode: Option<CacheMode>,
    /// Lifetime in seconds.
    pub lifetime: Option<u64>,
}

/// Names of the resettable query parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QueryPart {
    Distinct,
    Select,
    From,
    Join,
    Set,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

impl QueryPart {
    /// All parts, in rendering order.
    pub const ALL: [QueryPart; 9] = [
        QueryPart::Distinct,
        QueryPart::Select,
        QueryPart::From,
        QueryPart::Join,
        QueryPart::Set,
        QueryPart::Where,
        QueryPart::GroupBy,
        QueryPart::Having,
        QueryPart::OrderBy,
    ];
}

impl FromStr for QueryPart {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distinct" => Ok(QueryPart::Distinct),
            "select" => Ok(QueryPart::Select),
            "from" => Ok(QueryPart::From),
            "join" => Ok(QueryPart::Join),
            "set" => Ok(QueryPart::Set),
            "where" => Ok(QueryPart::Where),
            "groupby" => Ok(QueryPart::GroupBy),
            "having" => Ok(QueryPart::Having),
            "orderby" => Ok(QueryPart::OrderBy),
            _ => Err(QuarryError::UnknownPart(s.to_string())),
        }
    }
}

/// The query under construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryBuilderState {
    pub kind: StatementKind,
    pub distinct: bool,
    pub select: Vec<String>,
    pub from: Vec<FromClause>,
    pub joins: Vec<JoinClause>,
    pub set: Vec<Assignment>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<String>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderClause>,
    pub first_result: Option<u64>,
    pub max_results: Option<u64>,
    pub parameters: Parameters,
    pub cache: CacheOptions,
}

impl QueryBuilderState {
    /// Starts a SELECT over `source`, selecting `alias`.
    #[must_use]
    pub fn select_from(source: impl Into<String>, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        let mut state = QueryBuilderState {
            select: vec![alias.clone()],
            ..QueryBuilderState::default()
        };
        state.add_from(source, alias, None);
        state
    }

    /// Starts an UPDATE of `source`.
    #[must_use]
    pub fn new_update(source: impl Into<String>, alias: impl Into<String>) -> Self {
        let mut state = QueryBuilderState {
            kind: StatementKind::Update,
            ..QueryBuilderState::default()
        };
        state.add_from(source, alias, None);
        state
    }

    /// Starts a DELETE from `source`.
    #[must_use]
    pub fn new_delete(source: impl Into<String>, alias: impl Into<String>) -> Self {
        let mut state = QueryBuilderState {
            kind: StatementKind::Delete,
            ..QueryBuilderState::default()
        };
        state.add_from(source, alias, None);
        state
    }

    /// Adds a root source.
    pub fn add_from(
        &mut self,
        source: impl Into<String>,
        alias: impl Into<String>,
        index_by: Option<String>,
    ) {
        self.from.push(FromClause {
            source: source.into(),
            alias: alias.into(),
            index_by,
        });
    }

    /// Adds a join.
    pub fn add_join(&mut self, join: JoinClause) {
        self.joins.push(join);
    }

    /// ANDs `expr` onto the existing WHERE condition.
    pub fn and_where(&mut self, expr: Expr) {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
    }

    /// Clears the named parts, or every part when `parts` is `None`.
    ///
    /// Parameters, paging and cache settings are not query parts and survive.
    pub fn reset_parts(&mut self, parts: Option<&[QueryPart]>) {
        for part in parts.unwrap_or(&QueryPart::ALL) {
            match part {
                QueryPart::Distinct => self.distinct = false,
                QueryPart::Select => self.select.clear(),
                QueryPart::From => self.from.clear(),
                QueryPart::Join => self.joins.clear(),
                QueryPart::Set => self.set.clear(),
                QueryPart::Where => self.where_clause = None,
                QueryPart::GroupBy => self.group_by.clear(),
                QueryPart::Having => self.having = None,
                QueryPart::OrderBy => self.order_by.clear(),
            }
        }
    }

    /// Aliases of the root sources.
    #[must_use]
    pub fn root_aliases(&self) -> Vec<String> {
        self.from.iter().map(|f| f.alias.clone()).collect()
    }

    /// Aliases of the root sources followed by join aliases.
    #[must_use]
    pub fn all_aliases(&self) -> Vec<String> {
        let mut aliases = self.root_aliases();
        for join in &self.joins {
            if !aliases.contains(&join.alias) {
                aliases.push(join.alias.clone());
            }
        }
        aliases
    }

    /// Sets the `INDEX BY` of the root source aliased `alias`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndexBy` if `alias` is not a root alias.
    pub fn index_by(&mut self, alias: &str, index_by: Option<String>) -> Result<()> {
        let from = self
            .from
            .iter_mut()
            .find(|f| f.alias == alias)
            .ok_or_else(|| {
                QuarryError::InvalidIndexBy(format!("'{alias}' is not a root alias"))
            })?;
        from.index_by = index_by;
        Ok(())
    }

    fn write_where(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(condition) = &self.where_clause {
            write!(f, " WHERE {condition}")?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for QueryBuilderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StatementKind::Select => {
                f.write_str("SELECT ")?;
                if self.distinct {
                    f.write_str("DISTINCT ")?;
                }
                write_list(f, &self.select)?;
                f.write_str(" FROM ")?;
                write_list(f, &self.from)?;
                for join in &self.joins {
                    write!(f, " {join}")?;
                }
                self.write_where(f)?;
                if !self.group_by.is_empty() {
                    f.write_str(" GROUP BY ")?;
                    write_list(f, &self.group_by)?;
                }
                if let Some(having) = &self.having {
                    write!(f, " HAVING {having}")?;
                }
                if !self.order_by.is_empty() {
                    f.write_str(" ORDER BY ")?;
                    write_list(f, &self.order_by)?;
                }
                Ok(())
            }
            StatementKind::Update => {
                f.write_str("UPDATE ")?;
                write_list(f, &self.from)?;
                if !self.set.is_empty() {
                    f.write_str(" SET ")?;
                    for (i, assignment) in self.set.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{} = {}", assignment.field, assignment.value)?;
                    }
                }
                self.write_where(f)
            }
            StatementKind::Delete => {
                f.write_str("DELETE ")?;
                write_list(f, &self.from)?;
                self.write_where(f)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_keys() {
        assert_eq!(ParamKey::from("3"), ParamKey::Position(3));
        assert_eq!(ParamKey::from(":name"), ParamKey::Named("name".into()));
        assert_eq!(ParamKey::from("id"), ParamKey::Named("id".into()));
        assert_eq!(ParamKey::Position(2).to_string(), "?2");
    }

    #[test]
    fn test_parameters_replace_in_place() {
        let mut params = Parameters::new().with("id", 1).with(1u32, "a");
        params.set(":id", 2);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("id"), Some(&Value::Int(2)));
        assert_eq!(params.get(1u32), Some(&Value::from("a")));
    }

    #[test]
    fn test_select_rendering() {
        let mut state = QueryBuilderState::select_from("app::User", "User");
        state.add_join(JoinClause {
            kind: JoinKind::Left,
            target: "app::Role".into(),
            alias: "Role".into(),
            condition_kind: ConditionKind::With,
            condition: Some("User.Id = Role.Id".into()),
            index_by: None,
        });
        state.and_where(Expr::eq("User.Id", ":id"));
        state.order_by.push(OrderClause {
            field: "User.Name".into(),
            direction: SortDirection::Desc,
            nulls: Some(NullsOrder::Last),
        });
        assert_eq!(
            state.to_string(),
            "SELECT User FROM app::User User LEFT JOIN app::Role Role WITH User.Id = Role.Id \
             WHERE User.Id = :id ORDER BY User.Name DESC NULLS LAST"
        );
        assert_eq!(state.all_aliases(), vec!["User", "Role"]);
        assert_eq!(state.root_aliases(), vec!["User"]);
    }

    #[test]
    fn test_update_and_delete_rendering() {
        let mut state = QueryBuilderState::new_update("app::User", "u");
        state.set.push(Assignment {
            field: "u.Name".into(),
            value: Value::from(":name"),
        });
        assert_eq!(state.to_string(), "UPDATE app::User u SET u.Name = :name");

        let state = QueryBuilderState::new_delete("app::User", "u");
        assert_eq!(state.to_string(), "DELETE app::User u");
    }

    #[test]
    fn test_reset_parts_keeps_parameters() {
        let mut state = QueryBuilderState::select_from("app::User", "User");
        state.distinct = true;
        state.parameters.set("id", 1);
        state.max_results = Some(5);
        state.reset_parts(Some(&[QueryPart::Distinct]));
        assert!(!state.distinct);
        assert_eq!(state.from.len(), 1);

        state.reset_parts(None);
        assert!(state.from.is_empty());
        assert!(state.select.is_empty());
        assert_eq!(state.parameters.len(), 1);
        assert_eq!(state.max_results, Some(5));
    }

    #[test]
    fn test_index_by_requires_root_alias() {
        let mut state = QueryBuilderState::select_from("app::User", "User");
        assert!(state.index_by("User", Some("User.Id".into())).is_ok());
        assert_eq!(state.from[0].index_by.as_deref(), Some("User.Id"));
        assert!(matches!(
            state.index_by("Role", None),
            Err(QuarryError::InvalidIndexBy(_))
        ));
    }

    #[test]
    fn test_query_part_names() {
        assert_eq!("groupBy".parse::<QueryPart>().unwrap(), QueryPart::GroupBy);
        assert!(matches!(
            "limit".parse::<QueryPart>(),
            Err(QuarryError::UnknownPart(_))
        ));
    }

    #[test]
    fn test_cache_mode() {
        assert_eq!(CacheMode::from_value(&Value::Int(4)), Some(CacheMode::Refresh));
        assert_eq!(CacheMode::from_value(&"PUT".into()), Some(CacheMode::Put));
        assert_eq!(CacheMode::from_value(&Value::Int(9)), None);
    }
}
