//! Predicate trees and their translation into [`Expr`].
//!
//! Callers build conditions with unresolved field names (`Name`,
//! `%2$s.Title`). Translation resolves each name against the aliases known
//! at the time the directive runs. A leaf whose field cannot be resolved is
//! dropped on its own; its siblings are kept.

use std::fmt;

use tracing::trace;

use crate::compiler::alias::AliasRegistry;
use crate::compiler::expr::{ComparisonOp, Expr, LogicalOp};
use crate::compiler::state::Parameters;
use crate::types::Value;

/// A condition tree over unresolved field names.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateNode {
    /// `field op value`.
    Leaf {
        field: String,
        op: ComparisonOp,
        value: Value,
    },

    /// `field [NOT] IN(values)`.
    Membership {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// `field [NOT] LIKE pattern`.
    Pattern {
        field: String,
        pattern: Value,
        negated: bool,
    },

    /// `field IS [NOT] NULL`.
    NullCheck { field: String, negated: bool },

    /// `field [NOT] BETWEEN min AND max`.
    Range {
        field: String,
        min: Value,
        max: Value,
        negated: bool,
    },

    /// Query text with its own parameter bindings.
    RawExpression {
        template: String,
        parameters: Parameters,
    },

    /// Query text without parameters.
    RawLiteral { template: String },

    /// AND / OR over child predicates.
    Combinator {
        op: LogicalOp,
        children: Vec<PredicateNode>,
    },
}

fn leaf(field: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> PredicateNode {
    PredicateNode::Leaf {
        field: field.into(),
        op,
        value: value.into(),
    }
}

impl PredicateNode {
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        leaf(field, ComparisonOp::Eq, value)
    }

    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        leaf(field, ComparisonOp::Ne, value)
    }

    #[must_use]
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        leaf(field, ComparisonOp::Gt, value)
    }

    #[must_use]
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        leaf(field, ComparisonOp::Gte, value)
    }

    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        leaf(field, ComparisonOp::Lt, value)
    }

    #[must_use]
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        leaf(field, ComparisonOp::Lte, value)
    }

    /// `field IN(values)`.
    #[must_use]
    pub fn in_list<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        PredicateNode::Membership {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// `field NOT IN(values)`.
    #[must_use]
    pub fn not_in<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        PredicateNode::Membership {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    #[must_use]
    pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        PredicateNode::Pattern {
            field: field.into(),
            pattern: pattern.into(),
            negated: false,
        }
    }

    #[must_use]
    pub fn not_like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        PredicateNode::Pattern {
            field: field.into(),
            pattern: pattern.into(),
            negated: true,
        }
    }

    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        PredicateNode::NullCheck {
            field: field.into(),
            negated: false,
        }
    }

    #[must_use]
    pub fn is_not_null(field: impl Into<String>) -> Self {
        PredicateNode::NullCheck {
            field: field.into(),
            negated: true,
        }
    }

    #[must_use]
    pub fn between(
        field: impl Into<String>,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Self {
        PredicateNode::Range {
            field: field.into(),
            min: min.into(),
            max: max.into(),
            negated: false,
        }
    }

    #[must_use]
    pub fn not_between(
        field: impl Into<String>,
        min: impl Into<Value>,
        max: impl Into<Value>,
    ) -> Self {
        PredicateNode::Range {
            field: field.into(),
            min: min.into(),
            max: max.into(),
            negated: true,
        }
    }

    /// Raw query text whose parameters are bound when the node is translated.
    #[must_use]
    pub fn expression(template: impl Into<String>, parameters: Parameters) -> Self {
        PredicateNode::RawExpression {
            template: template.into(),
            parameters,
        }
    }

    /// Raw query text.
    #[must_use]
    pub fn literal(template: impl Into<String>) -> Self {
        PredicateNode::RawLiteral {
            template: template.into(),
        }
    }

    #[must_use]
    pub fn and(children: Vec<PredicateNode>) -> Self {
        PredicateNode::Combinator {
            op: LogicalOp::And,
            children,
        }
    }

    #[must_use]
    pub fn or(children: Vec<PredicateNode>) -> Self {
        PredicateNode::Combinator {
            op: LogicalOp::Or,
            children,
        }
    }

    /// Returns the field this node constrains, if it has one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            PredicateNode::Leaf { field, .. }
            | PredicateNode::Membership { field, .. }
            | PredicateNode::Pattern { field, .. }
            | PredicateNode::NullCheck { field, .. }
            | PredicateNode::Range { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Converts to an [`Expr`] with `field` in place of the node's own field.
    fn to_expr(&self, field: String) -> Option<Expr> {
        let expr = match self {
            PredicateNode::Leaf { op, value, .. } => Expr::Comparison {
                left: field,
                op: *op,
                right: value.clone(),
            },
            PredicateNode::Membership {
                values, negated, ..
            } => Expr::In {
                field,
                values: values.clone(),
                negated: *negated,
            },
            PredicateNode::Pattern {
                pattern, negated, ..
            } => Expr::Like {
                field,
                pattern: pattern.clone(),
                negated: *negated,
            },
            PredicateNode::NullCheck { negated, .. } => Expr::IsNull {
                field,
                negated: *negated,
            },
            PredicateNode::Range {
                min, max, negated, ..
            } => Expr::Between {
                field,
                min: min.clone(),
                max: max.clone(),
                negated: *negated,
            },
            _ => return None,
        };
        Some(expr)
    }
}

impl fmt::Display for PredicateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateNode::RawExpression { template, .. }
            | PredicateNode::RawLiteral { template } => f.write_str(template),
            PredicateNode::Combinator { op, children } => {
                f.write_str("(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.as_str())?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            node => match node.field().and_then(|field| node.to_expr(field.to_string())) {
                Some(expr) => write!(f, "{expr}"),
                None => Ok(()),
            },
        }
    }
}

/// Resolves predicate trees against the aliases of one compilation.
#[derive(Debug, Clone, Copy)]
pub struct PredicateTranslator<'a> {
    registry: AliasRegistry<'a>,
}

impl<'a> PredicateTranslator<'a> {
    /// Creates a translator over `registry`.
    #[must_use]
    pub fn new(registry: AliasRegistry<'a>) -> Self {
        PredicateTranslator { registry }
    }

    /// Translates `node`, binding raw-expression parameters into `parameters`.
    ///
    /// Returns `None` when nothing survives (an unresolved leaf, or a
    /// combinator whose children were all dropped).
    pub fn translate(&self, node: &PredicateNode, parameters: &mut Parameters) -> Option<Expr> {
        match node {
            PredicateNode::RawExpression {
                template,
                parameters: bound,
            } => {
                parameters.merge(bound);
                Some(Expr::Raw(self.registry.substitute(template).into_string()))
            }
            PredicateNode::RawLiteral { template } => {
                Some(Expr::Raw(self.registry.substitute(template).into_string()))
            }
            PredicateNode::Combinator { op, children } => {
                let parts = children
                    .iter()
                    .filter_map(|child| self.translate(child, parameters))
                    .collect();
                Expr::group(*op, parts)
            }
            _ => {
                let field = node.field()?;
                match self.registry.resolve(field) {
                    Some(resolved) => node.to_expr(resolved),
                    None => {
                        trace!(field, "dropping predicate on unresolved field");
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::compiler::alias::AliasList;

    fn fixture() -> (AliasList, BTreeSet<String>) {
        let aliases = AliasList::from(vec!["User".to_string(), "Role".to_string()]);
        let fields = ["Id", "Name", "Age"].iter().map(ToString::to_string).collect();
        (aliases, fields)
    }

    #[test]
    fn test_translate_leaves() {
        let (aliases, fields) = fixture();
        let translator = PredicateTranslator::new(AliasRegistry::new(&aliases, &fields));
        let mut params = Parameters::new();

        let expr = translator
            .translate(&PredicateNode::in_list("Id", [1, 2]), &mut params)
            .unwrap();
        assert_eq!(expr.to_string(), "User.Id IN(1, 2)");

        let expr = translator
            .translate(&PredicateNode::not_like("%2$s.Name", ":name"), &mut params)
            .unwrap();
        assert_eq!(expr.to_string(), "Role.Name NOT LIKE :name");

        assert!(translator
            .translate(&PredicateNode::eq("Missing", 1), &mut params)
            .is_none());
    }

    #[test]
    fn test_unresolved_child_is_dropped() {
        let (aliases, fields) = fixture();
        let translator = PredicateTranslator::new(AliasRegistry::new(&aliases, &fields));
        let mut params = Parameters::new();

        let a = PredicateNode::gt("Age", 18);
        let tree = PredicateNode::and(vec![a.clone(), PredicateNode::eq("Missing", 1)]);
        assert_eq!(
            translator.translate(&tree, &mut params),
            translator.translate(&a, &mut params)
        );
    }

    #[test]
    fn test_nested_order_is_preserved() {
        let (aliases, fields) = fixture();
        let translator = PredicateTranslator::new(AliasRegistry::new(&aliases, &fields));
        let mut params = Parameters::new();

        let tree = PredicateNode::or(vec![
            PredicateNode::is_null("Name"),
            PredicateNode::and(vec![
                PredicateNode::between("Age", 18, 65),
                PredicateNode::ne("%2$s.Id", "?1"),
            ]),
        ]);
        let expr = translator.translate(&tree, &mut params).unwrap();
        assert_eq!(
            expr.to_string(),
            "User.Name IS NULL OR (User.Age BETWEEN 18 AND 65 AND Role.Id <> ?1)"
        );
    }

    #[test]
    fn test_raw_expression_binds_parameters() {
        let (aliases, fields) = fixture();
        let translator = PredicateTranslator::new(AliasRegistry::new(&aliases, &fields));
        let mut params = Parameters::new().with("keep", 1);

        let node = PredicateNode::expression(
            "%1$s.Age > :age",
            Parameters::new().with("age", 21),
        );
        let expr = translator.translate(&node, &mut params).unwrap();
        assert_eq!(expr, Expr::Raw("User.Age > :age".into()));
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("age"), Some(&Value::Int(21)));
    }

    #[test]
    fn test_raw_literal_falls_back_to_template() {
        let (aliases, fields) = fixture();
        let translator = PredicateTranslator::new(AliasRegistry::new(&aliases, &fields));
        let mut params = Parameters::new();

        let expr = translator
            .translate(&PredicateNode::literal("%5$s.Id = 1"), &mut params)
            .unwrap();
        assert_eq!(expr, Expr::Raw("%5$s.Id = 1".into()));
    }

    #[test]
    fn test_empty_combinator_contributes_nothing() {
        let (aliases, fields) = fixture();
        let translator = PredicateTranslator::new(AliasRegistry::new(&aliases, &fields));
        let mut params = Parameters::new();
        assert!(translator
            .translate(&PredicateNode::and(vec![]), &mut params)
            .is_none());
    }

    #[test]
    fn test_display() {
        let tree = PredicateNode::and(vec![
            PredicateNode::eq("Id", 1),
            PredicateNode::literal("x > 2"),
        ]);
        assert_eq!(tree.to_string(), "(Id = 1 AND x > 2)");
    }
}
