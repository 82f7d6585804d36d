//! SELECT directives.

use tracing::trace;

use super::{list_items, source_descriptor};
use crate::catalog::short_name;
use crate::compiler::alias::AliasList;
use crate::compiler::expr::Expr;
use crate::compiler::state::{
    CacheMode, ConditionKind, JoinClause, JoinKind, OrderClause, QueryBuilderState, QueryPart,
};
use crate::compiler::CriteriaCompiler;
use crate::error::{QuarryError, Result};
use crate::parser::{parse_order_item, OrderItem};
use crate::types::{Map, MapKey, Value};

/// `select`: replaces the root sources and selects every alias.
pub(super) fn select(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    let items = list_items("select", value)?;

    state.reset_parts(Some(&[QueryPart::Select, QueryPart::From]));
    for item in &items {
        let source = source_descriptor(compiler, "select", item)?;
        state.add_from(source.source, source.alias, source.index_by);
    }

    state.select = state.all_aliases();
    *aliases = AliasList::from(state.all_aliases());
    Ok(())
}

/// `joins`: one join descriptor or a list of them.
pub(super) fn joins(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    let descriptors = match value {
        Value::Map(_) => std::slice::from_ref(value),
        Value::List(items) => items.as_slice(),
        other => {
            return Err(QuarryError::malformed(
                "joins",
                format!("expects a join descriptor or a list, got {}", other.type_name()),
            ))
        }
    };

    for descriptor in descriptors {
        let Some(map) = descriptor.as_map() else {
            return Err(QuarryError::malformed("joins", "each join must be a mapping"));
        };
        join(compiler, map, state, aliases)?;
    }
    Ok(())
}

fn join(
    compiler: &CriteriaCompiler,
    map: &Map,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    let (kind, target) = match map.first() {
        Some((MapKey::Name(key), target)) => match JoinKind::from_key(key) {
            Some(kind) => (kind, target),
            None => return Err(join_key_error()),
        },
        _ => return Err(join_key_error()),
    };
    let target = target
        .as_str()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| QuarryError::malformed("joins", "the join target must be a name"))?;

    let alias = map
        .get_str("alias")
        .map_or_else(|| short_name(target).to_string(), String::from);
    aliases.push(alias.clone());

    let template = match map.get_str("condition") {
        Some(condition) => Some(condition.to_string()),
        None if compiler.config().guess_join_conditions => {
            let position = aliases.position(&alias).map_or(aliases.len(), |p| p + 1);
            Some(compiler.guess_join_condition(position))
        }
        None => None,
    };

    let condition = match template {
        Some(template) => match compiler.registry(aliases).substitute(&template).resolved() {
            Some(condition) => Some(condition),
            None => {
                trace!(
                    join = target,
                    alias = %alias,
                    template = %template,
                    "skipping join with unresolvable condition"
                );
                return Ok(());
            }
        },
        None => None,
    };

    state.add_join(JoinClause {
        kind,
        target: target.to_string(),
        alias,
        condition_kind: map
            .get_str("conditionType")
            .map_or(ConditionKind::With, ConditionKind::parse),
        condition,
        index_by: map.get_str("indexBy").map(String::from),
    });
    Ok(())
}

fn join_key_error() -> QuarryError {
    QuarryError::malformed(
        "joins",
        "expects the first key of a join to be 'join', 'innerJoin' or 'leftJoin'",
    )
}

/// `groupBy` / `group`: appends resolvable items.
pub(super) fn group_by(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    let registry = compiler.registry(aliases);
    for item in list_items("groupBy", value)? {
        let Some(name) = item.as_str() else {
            return Err(QuarryError::malformed("groupBy", "items must be strings"));
        };
        match registry.resolve(name) {
            Some(field) => state.group_by.push(field),
            None => trace!(field = name, "skipping unresolved group by"),
        }
    }
    Ok(())
}

/// `having`: a template string or a predicate tree. Replaces the condition.
///
/// A predicate that translates to nothing leaves the current condition alone.
pub(super) fn having(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    match value {
        Value::Null => {}
        Value::String(template) => {
            let text = compiler.registry(aliases).substitute(template).into_string();
            state.having = Some(Expr::Raw(text));
        }
        Value::Predicate(node) => {
            if let Some(expr) = compiler
                .translator(aliases)
                .translate(node, &mut state.parameters)
            {
                state.having = Some(expr);
            }
        }
        other => {
            return Err(QuarryError::malformed(
                "having",
                format!("expects a string or a predicate, got {}", other.type_name()),
            ))
        }
    }
    Ok(())
}

/// `orderBy` / `order`: appends resolvable sort items, ascending by default.
pub(super) fn order_by(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    let texts: Vec<String> = match value {
        Value::Map(map) => map
            .iter()
            .filter_map(|(key, value)| match (key, value) {
                (MapKey::Name(field), Value::Null) => Some(field.clone()),
                (MapKey::Name(field), Value::String(order)) => Some(format!("{field} {order}")),
                (MapKey::Position(_), Value::String(item)) => Some(item.clone()),
                _ => None,
            })
            .collect(),
        other => list_items("orderBy", other)?
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
    };

    let registry = compiler.registry(aliases);
    for text in texts {
        let item: OrderItem = match parse_order_item(&text) {
            Ok(item) => item,
            Err(e) => {
                trace!(item = %text, error = %e, "skipping malformed order item");
                continue;
            }
        };
        let Some(field) = registry.resolve(&item.field) else {
            trace!(field = %item.field, "skipping unresolved order by");
            continue;
        };
        state.order_by.push(OrderClause {
            field,
            direction: item.direction.unwrap_or_default(),
            nulls: item.nulls,
        });
    }
    Ok(())
}

fn optional_count(directive: &str, value: &Value) -> Result<Option<u64>> {
    if value.is_null() {
        return Ok(None);
    }
    value.as_u64().map(Some).ok_or_else(|| {
        QuarryError::malformed(directive, format!("expects a non-negative integer, got {value}"))
    })
}

/// `limit` / `maxResults`.
pub(super) fn max_results(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    state.max_results = optional_count("maxResults", value)?;
    Ok(())
}

/// `offset` / `firstResult`.
pub(super) fn first_result(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    state.first_result = optional_count("firstResult", value)?;
    Ok(())
}

/// `distinct` / `quantifier`: `true`, `1` or `"distinct"` turn it on.
pub(super) fn distinct(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    state.distinct = value.as_bool() == Some(true)
        || value.as_i64() == Some(1)
        || value
            .as_str()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("distinct"));
    Ok(())
}

/// `indexBy`: `[{alias, indexBy}]`. Aliases that are not root aliases are
/// ignored.
pub(super) fn index_by(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    let Some(items) = value.as_list() else {
        return Err(QuarryError::malformed("indexBy", "expects a list"));
    };

    for item in items {
        let alias = item
            .as_map()
            .and_then(|map| map.get_str("alias"))
            .ok_or_else(|| {
                QuarryError::malformed("indexBy", "expects mappings with the required key 'alias'")
            })?;
        let target = item
            .as_map()
            .and_then(|map| map.get_str("indexBy"))
            .map(String::from);
        if let Err(e) = state.index_by(alias, target) {
            trace!(alias, error = %e, "ignoring index by");
        }
    }
    Ok(())
}

/// `reset`: null clears every part, otherwise the named parts.
pub(super) fn reset(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    if value.is_null() {
        state.reset_parts(None);
        return Ok(());
    }

    let mut parts = Vec::new();
    for item in list_items("reset", value)? {
        let Some(name) = item.as_str() else {
            return Err(QuarryError::malformed("reset", "part names must be strings"));
        };
        parts.push(name.parse::<QueryPart>()?);
    }
    state.reset_parts(Some(&parts));
    Ok(())
}

pub(super) fn cacheable(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    state.cache.cacheable = !value.is_empty();
    Ok(())
}

pub(super) fn cache_region(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    state.cache.region = match value {
        Value::Null => None,
        Value::String(region) => Some(region.clone()),
        other => {
            return Err(QuarryError::malformed(
                "cacheRegion",
                format!("expects a string, got {}", other.type_name()),
            ))
        }
    };
    Ok(())
}

pub(super) fn cache_mode(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    state.cache.mode = if value.is_null() {
        None
    } else {
        Some(CacheMode::from_value(value).ok_or_else(|| {
            QuarryError::malformed("cacheMode", format!("unknown cache mode {value}"))
        })?)
    };
    Ok(())
}

pub(super) fn lifetime(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    state.cache.lifetime = optional_count("lifetime", value)?;
    Ok(())
}
