//! Pest parser integration for the criteria shorthand grammar.

use pest::iterators::Pairs;
use pest::Parser;
use pest_derive::Parser;

use crate::error::{QuarryError, Result};
use crate::parser::ast::{NullsOrder, OrderItem, SetItem, SortDirection, SourceItem};

#[derive(Parser)]
#[grammar = "parser/criteria.pest"]
struct CriteriaParser;

fn parse_rule(rule: Rule, input: &str) -> Result<Pairs<'_, Rule>> {
    CriteriaParser::parse(rule, input).map_err(|e| {
        let col = match e.line_col {
            pest::error::LineColLocation::Pos((_, c))
            | pest::error::LineColLocation::Span((_, c), _) => c,
        };
        QuarryError::ParseError {
            input: input.to_string(),
            col,
            message: e.variant.message().to_string(),
        }
    })
}

/// Splits a comma separated list, dropping empty items.
///
/// # Errors
///
/// Returns a `ParseError` on unbalanced parentheses or quotes.
pub fn split_list(input: &str) -> Result<Vec<String>> {
    let items = parse_rule(Rule::list, input)?
        .flatten()
        .filter(|pair| pair.as_rule() == Rule::list_item)
        .map(|pair| pair.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();
    Ok(items)
}

/// Parses a source descriptor: `name [alias] [INDEX BY target]`.
///
/// # Errors
///
/// Returns a `ParseError` if the text is not a source descriptor.
pub fn parse_source_item(input: &str) -> Result<SourceItem> {
    let mut item = SourceItem::default();
    for pair in parse_rule(Rule::source_item, input.trim())?.flatten() {
        match pair.as_rule() {
            Rule::source_name => item.source = pair.as_str().to_string(),
            Rule::identifier => item.alias = Some(pair.as_str().to_string()),
            Rule::index_target => item.index_by = Some(pair.as_str().to_string()),
            _ => {}
        }
    }
    Ok(item)
}

/// Parses an order item: `expr [ASC|DESC] [NULLS FIRST|NULLS LAST]`.
///
/// # Errors
///
/// Returns a `ParseError` if the text is not an order item.
pub fn parse_order_item(input: &str) -> Result<OrderItem> {
    let mut item = OrderItem {
        field: String::new(),
        direction: None,
        nulls: None,
    };
    for pair in parse_rule(Rule::order_item, input.trim())?.flatten() {
        match pair.as_rule() {
            Rule::sort_expr => item.field = pair.as_str().to_string(),
            Rule::direction => {
                item.direction = Some(if pair.as_str().eq_ignore_ascii_case("desc") {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                });
            }
            Rule::nulls_position => {
                item.nulls = Some(if pair.as_str().eq_ignore_ascii_case("first") {
                    NullsOrder::First
                } else {
                    NullsOrder::Last
                });
            }
            _ => {}
        }
    }
    Ok(item)
}

/// Parses an assignment: `target = value`.
///
/// # Errors
///
/// Returns a `ParseError` if there is no `=` or the value is missing.
pub fn parse_assignment(input: &str) -> Result<SetItem> {
    let mut field = String::new();
    let mut value = String::new();
    for pair in parse_rule(Rule::assignment, input.trim())?.flatten() {
        match pair.as_rule() {
            Rule::assign_target => field = pair.as_str().to_string(),
            Rule::assign_value => value = pair.as_str().trim().to_string(),
            _ => {}
        }
    }
    Ok(SetItem { field, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("Id, %2$s.Name").unwrap(), vec!["Id", "%2$s.Name"]);
        assert_eq!(split_list(" a ,, b ,").unwrap(), vec!["a", "b"]);
        assert!(split_list("").unwrap().is_empty());
    }

    #[test]
    fn test_split_list_respects_parentheses_and_quotes() {
        assert_eq!(
            split_list("COALESCE(u.Nick, u.Name) DESC, 'a,b'").unwrap(),
            vec!["COALESCE(u.Nick, u.Name) DESC", "'a,b'"]
        );
        assert!(split_list("MAX(u.Id").is_err());
    }

    #[test]
    fn test_parse_source_item() {
        let item = parse_source_item("User u INDEX BY u.Id").unwrap();
        assert_eq!(item.source, "User");
        assert_eq!(item.alias.as_deref(), Some("u"));
        assert_eq!(item.index_by.as_deref(), Some("u.Id"));

        let item = parse_source_item("app::entity::Role").unwrap();
        assert_eq!(item.source, "app::entity::Role");
        assert_eq!(item.alias, None);

        let item = parse_source_item("User index by User.Id").unwrap();
        assert_eq!(item.alias, None);
        assert_eq!(item.index_by.as_deref(), Some("User.Id"));
    }

    #[test]
    fn test_parse_order_item() {
        let item = parse_order_item("Id desc nulls first").unwrap();
        assert_eq!(item.field, "Id");
        assert_eq!(item.direction, Some(SortDirection::Desc));
        assert_eq!(item.nulls, Some(NullsOrder::First));

        let item = parse_order_item("MAX(u.Age)").unwrap();
        assert_eq!(item.field, "MAX(u.Age)");
        assert_eq!(item.direction, None);

        let item = parse_order_item("%2$s.Name NULLS LAST").unwrap();
        assert_eq!(item.nulls, Some(NullsOrder::Last));

        assert!(parse_order_item("Id sideways").is_err());
        assert!(parse_order_item("Id ascending").is_err());
    }

    #[test]
    fn test_parse_assignment() {
        let item = parse_assignment("%1$s.Name = :name").unwrap();
        assert_eq!(item.field, "%1$s.Name");
        assert_eq!(item.value, ":name");

        assert!(parse_assignment("Name =").is_err());
        assert!(parse_assignment("Name").is_err());
    }
}
