//! `where` and `parameters`, shared by every statement kind.

use tracing::trace;

use crate::compiler::alias::AliasList;
use crate::compiler::expr::{Expr, LogicalOp};
use crate::compiler::state::{ParamKey, Parameters, QueryBuilderState};
use crate::compiler::CriteriaCompiler;
use crate::error::{QuarryError, Result};
use crate::types::{Map, MapKey, Value};

/// `where`: a predicate tree, a template string, or a mapping of conditions.
///
/// A predicate is ANDed onto the existing condition; strings and mappings
/// replace it. A mapping that yields no conditions leaves the state alone.
pub(super) fn where_clause(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Predicate(node) => {
            let translated = compiler
                .translator(aliases)
                .translate(node, &mut state.parameters);
            if let Some(expr) = translated {
                state.and_where(expr);
            }
            Ok(())
        }
        Value::String(template) => {
            if !template.trim().is_empty() {
                let text = compiler.registry(aliases).substitute(template).into_string();
                state.where_clause = Some(Expr::Raw(text));
            }
            Ok(())
        }
        Value::Map(map) => {
            let parts = conditions(compiler, map.iter(), state, aliases)?;
            if let Some(expr) = Expr::group(LogicalOp::And, parts) {
                state.where_clause = Some(expr);
            }
            Ok(())
        }
        Value::List(items) => {
            let entries: Vec<_> = items
                .iter()
                .enumerate()
                .map(|(i, v)| (MapKey::Position(i), v))
                .collect();
            let parts = conditions(compiler, entries.iter().map(|(k, v)| (k, *v)), state, aliases)?;
            if let Some(expr) = Expr::group(LogicalOp::And, parts) {
                state.where_clause = Some(expr);
            }
            Ok(())
        }
        other => Err(QuarryError::malformed(
            "where",
            format!("expects a predicate, a string or a mapping, got {}", other.type_name()),
        )),
    }
}

fn conditions<'v>(
    compiler: &CriteriaCompiler,
    entries: impl Iterator<Item = (&'v MapKey, &'v Value)>,
    state: &mut QueryBuilderState,
    aliases: &AliasList,
) -> Result<Vec<Expr>> {
    let registry = compiler.registry(aliases);
    let mut parts = Vec::new();

    for (key, value) in entries {
        match key {
            MapKey::Name(name) => {
                let Some(field) = registry.resolve(name) else {
                    trace!(field = %name, "skipping condition on unresolved field");
                    continue;
                };
                parts.push(match value {
                    Value::List(items) => Expr::in_list(field, items.clone()),
                    Value::Map(map) => Expr::in_list(field, column_or_values(map)),
                    scalar => Expr::eq(field, scalar.clone()),
                });
            }
            MapKey::Position(_) => match value {
                Value::Null => {}
                Value::Predicate(node) => {
                    let translated = compiler
                        .translator(aliases)
                        .translate(node, &mut state.parameters);
                    parts.extend(translated);
                }
                Value::String(text) => {
                    parts.push(Expr::Raw(registry.substitute(text).into_string()));
                }
                other => {
                    return Err(QuarryError::malformed(
                        "where",
                        format!("positional conditions must be predicates or strings, got {}", other.type_name()),
                    ))
                }
            },
        }
    }

    Ok(parts)
}

/// `{array: [...], column_key: "Id"}` picks `Id` out of each record;
/// any other mapping contributes its values.
fn column_or_values(map: &Map) -> Vec<Value> {
    let records = map.get("array").filter(|v| !v.is_empty());
    let column = map.get_str("column_key");

    match (records, column) {
        (Some(records), Some(column)) => {
            let records = match records {
                Value::List(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            records
                .iter()
                .filter_map(|record| record.as_map()?.get(column).cloned())
                .collect()
        }
        _ => map.values().cloned().collect(),
    }
}

/// `parameters`: replaces every binding.
///
/// Mapping keys made of digits are positional, other keys are names. A list
/// binds positions `1..=n`.
pub(super) fn parameters(
    _compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    _aliases: &mut AliasList,
) -> Result<()> {
    let mut params = Parameters::new();
    match value {
        Value::Null => {}
        Value::Map(map) => {
            for (key, value) in map.iter() {
                let key = match key {
                    MapKey::Name(name) => ParamKey::from(name.as_str()),
                    MapKey::Position(i) => ParamKey::Position(position(*i)?),
                };
                params.set(key, value.clone());
            }
        }
        Value::List(items) => {
            for (i, value) in items.iter().enumerate() {
                params.set(ParamKey::Position(position(i + 1)?), value.clone());
            }
        }
        other => {
            return Err(QuarryError::malformed(
                "parameters",
                format!("expects a mapping or a list, got {}", other.type_name()),
            ))
        }
    }
    state.parameters = params;
    Ok(())
}

fn position(index: usize) -> Result<u32> {
    u32::try_from(index)
        .map_err(|_| QuarryError::malformed("parameters", format!("position {index} is out of range")))
}
