//! UPDATE and DELETE directives.

use tracing::trace;

use super::{list_items, source_descriptor};
use crate::compiler::alias::AliasList;
use crate::compiler::expr::ComparisonOp;
use crate::compiler::predicate::PredicateNode;
use crate::compiler::state::{Assignment, QueryBuilderState, QueryPart, StatementKind};
use crate::compiler::CriteriaCompiler;
use crate::error::{QuarryError, Result};
use crate::parser::parse_assignment;
use crate::types::{MapKey, Value};

fn retarget(
    compiler: &CriteriaCompiler,
    directive: &str,
    kind: StatementKind,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    let source = source_descriptor(compiler, directive, value)?;
    state.reset_parts(Some(&[QueryPart::From]));
    state.kind = kind;
    state.add_from(source.source, source.alias, None);
    *aliases = AliasList::from(state.root_aliases());
    Ok(())
}

/// `update`: `"User u"` or `{from, alias?}`.
pub(super) fn update(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    retarget(compiler, "update", StatementKind::Update, value, state, aliases)
}

/// `delete`: `"User u"` or `{from, alias?}`.
pub(super) fn delete(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    retarget(compiler, "delete", StatementKind::Delete, value, state, aliases)
}

/// Unpacks an equality leaf used as an assignment.
fn leaf_assignment(value: &Value) -> Result<(String, Value)> {
    match value.as_predicate() {
        Some(PredicateNode::Leaf {
            field,
            op: ComparisonOp::Eq,
            value,
        }) => Ok((field.clone(), value.clone())),
        _ => Err(QuarryError::malformed(
            "set",
            "positional assignments must be equality predicates",
        )),
    }
}

/// `set`: `"Id = ?1, %1$s.Name = ?2"`, `{field: value}` or a list of
/// equality predicates. Unresolved fields are skipped.
pub(super) fn set(
    compiler: &CriteriaCompiler,
    value: &Value,
    state: &mut QueryBuilderState,
    aliases: &mut AliasList,
) -> Result<()> {
    let mut pairs = Vec::new();
    match value {
        Value::String(_) => {
            for item in list_items("set", value)? {
                let text = item.as_str().unwrap_or_default();
                match parse_assignment(text) {
                    Ok(parsed) => pairs.push((parsed.field, Value::String(parsed.value))),
                    Err(e) => trace!(item = text, error = %e, "skipping malformed assignment"),
                }
            }
        }
        Value::Map(map) => {
            for (key, value) in map.iter() {
                match key {
                    MapKey::Name(field) => pairs.push((field.clone(), value.clone())),
                    MapKey::Position(_) => pairs.push(leaf_assignment(value)?),
                }
            }
        }
        Value::List(items) => {
            for item in items {
                pairs.push(leaf_assignment(item)?);
            }
        }
        other => {
            return Err(QuarryError::malformed(
                "set",
                format!("expects a string, a mapping or a list, got {}", other.type_name()),
            ))
        }
    }

    let registry = compiler.registry(aliases);
    for (field, value) in pairs {
        match registry.resolve(&field) {
            Some(field) => state.set.push(Assignment { field, value }),
            None => trace!(field = %field, "skipping assignment to unresolved field"),
        }
    }
    Ok(())
}
