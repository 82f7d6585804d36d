//! Backend expression nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Equal (=).
    Eq,
    /// Not equal (<>).
    Ne,
    /// Less than (<).
    Lt,
    /// Less than or equal (<=).
    Lte,
    /// Greater than (>).
    Gt,
    /// Greater than or equal (>=).
    Gte,
}

impl ComparisonOp {
    /// Returns the string representation of this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
        }
    }
}

/// Logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    /// Returns the keyword for this operator.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// A resolved condition, ready for a query backend.
///
/// Field references are fully qualified (`u.Name`). Right-hand values are
/// query fragments: strings render verbatim, so `:name` and `?1` stay
/// parameter references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// `left op right`.
    Comparison {
        left: String,
        op: ComparisonOp,
        right: Value,
    },

    /// `field [NOT] IN(values)`.
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },

    /// `field [NOT] LIKE pattern`.
    Like {
        field: String,
        pattern: Value,
        negated: bool,
    },

    /// `field IS [NOT] NULL`.
    IsNull { field: String, negated: bool },

    /// `field [NOT] BETWEEN min AND max`.
    Between {
        field: String,
        min: Value,
        max: Value,
        negated: bool,
    },

    /// Query text passed through as written.
    Raw(String),

    /// Conjunction or disjunction, parts kept in order.
    Group { op: LogicalOp, parts: Vec<Expr> },
}

impl Expr {
    /// Creates an equality comparison.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Expr::Comparison {
            left: field.into(),
            op: ComparisonOp::Eq,
            right: value.into(),
        }
    }

    /// Creates an IN expression.
    #[must_use]
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Expr::In {
            field: field.into(),
            values,
            negated: false,
        }
    }

    /// Combines `parts` under `op`.
    ///
    /// No parts gives `None`; a single part is returned as is.
    #[must_use]
    pub fn group(op: LogicalOp, mut parts: Vec<Expr>) -> Option<Self> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Expr::Group { op, parts }),
        }
    }

    /// Joins `self` and `other` with AND.
    #[must_use]
    pub fn and(self, other: Expr) -> Self {
        Expr::Group {
            op: LogicalOp::And,
            parts: vec![self, other],
        }
    }

    fn needs_parens(&self) -> bool {
        match self {
            Expr::Group { parts, .. } => parts.len() > 1,
            Expr::Raw(text) => {
                let upper = text.to_ascii_uppercase();
                upper.contains(" AND ") || upper.contains(" OR ")
            }
            _ => false,
        }
    }
}

fn not(negated: bool) -> &'static str {
    if negated {
        "NOT "
    } else {
        ""
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Comparison { left, op, right } => {
                write!(f, "{left} {} {right}", op.as_str())
            }
            Expr::In {
                field,
                values,
                negated,
            } => {
                write!(f, "{field} {}IN(", not(*negated))?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
            Expr::Like {
                field,
                pattern,
                negated,
            } => write!(f, "{field} {}LIKE {pattern}", not(*negated)),
            Expr::IsNull { field, negated } => {
                write!(f, "{field} IS {}NULL", not(*negated))
            }
            Expr::Between {
                field,
                min,
                max,
                negated,
            } => write!(f, "{field} {}BETWEEN {min} AND {max}", not(*negated)),
            Expr::Raw(text) => f.write_str(text),
            Expr::Group { op, parts } => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.as_str())?;
                    }
                    if parts.len() > 1 && part.needs_parens() {
                        write!(f, "({part})")?;
                    } else {
                        write!(f, "{part}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_rendering() {
        assert_eq!(Expr::eq("u.Id", ":id").to_string(), "u.Id = :id");
        assert_eq!(
            Expr::in_list("u.Id", vec![Value::Int(1), Value::Int(2)]).to_string(),
            "u.Id IN(1, 2)"
        );
        let between = Expr::Between {
            field: "u.Age".into(),
            min: Value::Int(18),
            max: Value::Int(65),
            negated: true,
        };
        assert_eq!(between.to_string(), "u.Age NOT BETWEEN 18 AND 65");
        let null = Expr::IsNull {
            field: "u.DeletedAt".into(),
            negated: true,
        };
        assert_eq!(null.to_string(), "u.DeletedAt IS NOT NULL");
    }

    #[test]
    fn test_group_collapses() {
        assert_eq!(Expr::group(LogicalOp::And, vec![]), None);
        let single = Expr::group(LogicalOp::Or, vec![Expr::eq("u.Id", 1)]).unwrap();
        assert_eq!(single, Expr::eq("u.Id", 1));
    }

    #[test]
    fn test_nested_groups_are_parenthesized() {
        let inner = Expr::group(
            LogicalOp::Or,
            vec![Expr::eq("u.Id", 1), Expr::eq("u.Id", 2)],
        )
        .unwrap();
        let outer = Expr::group(
            LogicalOp::And,
            vec![
                Expr::eq("u.Name", "'x'"),
                inner,
                Expr::Raw("u.Age > 1 or u.Age < 0".into()),
            ],
        )
        .unwrap();
        assert_eq!(
            outer.to_string(),
            "u.Name = 'x' AND (u.Id = 1 OR u.Id = 2) AND (u.Age > 1 or u.Age < 0)"
        );
    }
}
