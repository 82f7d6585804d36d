//! Directive handlers.
//!
//! Each criteria key is looked up in a [`DirectiveTable`] built once per
//! compiler. Keys without a handler are ignored.

mod filter;
mod mutation;
mod read;

use std::collections::HashMap;
use std::fmt;

use crate::catalog::short_name;
use crate::compiler::alias::AliasList;
use crate::compiler::state::QueryBuilderState;
use crate::compiler::CriteriaCompiler;
use crate::error::{QuarryError, Result};
use crate::parser::{parse_source_item, split_list, SourceItem};
use crate::types::Value;

/// Applies one directive value to the state under construction.
pub(crate) type Handler =
    fn(&CriteriaCompiler, &Value, &mut QueryBuilderState, &mut AliasList) -> Result<()>;

/// Directive name to handler mapping.
#[derive(Clone)]
pub(crate) struct DirectiveTable {
    handlers: HashMap<&'static str, Handler>,
}

impl fmt::Debug for DirectiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("DirectiveTable")
            .field("directives", &names)
            .finish()
    }
}

impl DirectiveTable {
    fn new() -> Self {
        DirectiveTable {
            handlers: HashMap::new(),
        }
    }

    fn with(mut self, name: &'static str, handler: Handler) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    /// Directives of a SELECT compilation.
    pub(crate) fn read() -> Self {
        Self::new()
            .with("select", read::select)
            .with("joins", read::joins)
            .with("where", filter::where_clause)
            .with("groupBy", read::group_by)
            .with("group", read::group_by)
            .with("having", read::having)
            .with("orderBy", read::order_by)
            .with("order", read::order_by)
            .with("limit", read::max_results)
            .with("maxResults", read::max_results)
            .with("offset", read::first_result)
            .with("firstResult", read::first_result)
            .with("distinct", read::distinct)
            .with("quantifier", read::distinct)
            .with("indexBy", read::index_by)
            .with("reset", read::reset)
            .with("parameters", filter::parameters)
            .with("cacheable", read::cacheable)
            .with("cacheRegion", read::cache_region)
            .with("cacheMode", read::cache_mode)
            .with("lifetime", read::lifetime)
    }

    /// Directives of an UPDATE compilation.
    pub(crate) fn update() -> Self {
        Self::new()
            .with("update", mutation::update)
            .with("set", mutation::set)
            .with("where", filter::where_clause)
            .with("parameters", filter::parameters)
    }

    /// Directives of a DELETE compilation.
    pub(crate) fn delete() -> Self {
        Self::new()
            .with("delete", mutation::delete)
            .with("where", filter::where_clause)
            .with("parameters", filter::parameters)
    }

    pub(crate) fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied()
    }
}

/// A source descriptor with the entity name qualified and the alias filled in.
struct ResolvedSource {
    source: String,
    alias: String,
    index_by: Option<String>,
}

/// Reads a `{from, alias?, indexBy?}` map or a `"Name alias INDEX BY x"`
/// string.
fn source_descriptor(
    compiler: &CriteriaCompiler,
    directive: &str,
    value: &Value,
) -> Result<ResolvedSource> {
    let item = match value {
        Value::String(text) => {
            parse_source_item(text).map_err(|e| QuarryError::malformed(directive, e.to_string()))?
        }
        Value::Map(map) => SourceItem {
            source: map
                .get_str("from")
                .ok_or_else(|| {
                    QuarryError::malformed(directive, "expects a map with the required key 'from'")
                })?
                .to_string(),
            alias: map.get_str("alias").map(String::from),
            index_by: map.get_str("indexBy").map(String::from),
        },
        other => {
            return Err(QuarryError::malformed(
                directive,
                format!("expects a source descriptor, got {}", other.type_name()),
            ))
        }
    };

    let source = compiler.qualify_source(&item.source);
    let alias = item
        .alias
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| short_name(&source).to_string());
    Ok(ResolvedSource {
        source,
        alias,
        index_by: item.index_by,
    })
}

/// Splits a comma string into items; lists pass through.
fn list_items(directive: &str, value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::String(text) => Ok(split_list(text)
            .map_err(|e| QuarryError::malformed(directive, e.to_string()))?
            .into_iter()
            .map(Value::String)
            .collect()),
        Value::List(items) => Ok(items.clone()),
        other => Err(QuarryError::malformed(
            directive,
            format!("expects a string or a list, got {}", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_cover_aliases() {
        let read = DirectiveTable::read();
        for name in ["group", "groupBy", "order", "orderBy", "limit", "maxResults"] {
            assert!(read.get(name).is_some(), "{name}");
        }
        assert!(read.get("set").is_none());
        assert!(DirectiveTable::update().get("set").is_some());
        assert!(DirectiveTable::delete().get("set").is_none());
    }

    #[test]
    fn test_list_items() {
        let items = list_items("group", &Value::from("Id, Name")).unwrap();
        assert_eq!(items, vec![Value::from("Id"), Value::from("Name")]);
        assert!(list_items("group", &Value::Int(3)).is_err());
    }
}
