//! Parsed forms of the criteria shorthands.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A source descriptor such as `User u INDEX BY u.Id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceItem {
    /// Entity name, bare or qualified.
    pub source: String,
    /// Explicit alias.
    pub alias: Option<String>,
    /// `INDEX BY` target.
    pub index_by: Option<String>,
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Returns the keyword for this direction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Placement of nulls in ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    /// Returns the clause text.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

impl fmt::Display for NullsOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ORDER BY item such as `Id DESC NULLS FIRST`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    /// Sort expression, not yet resolved.
    pub field: String,
    /// Explicit direction, if given.
    pub direction: Option<SortDirection>,
    /// Explicit nulls placement, if given.
    pub nulls: Option<NullsOrder>,
}

/// A SET item such as `Name = :name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetItem {
    /// Assignment target, not yet resolved.
    pub field: String,
    /// Right-hand side, kept as query text.
    pub value: String,
}
