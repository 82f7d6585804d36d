//! Parser for the textual shorthands used inside criteria.
//!
//! Criteria authors may write lists and descriptors as plain text
//! (`"User u INDEX BY u.Id, Role"`, `"Id DESC NULLS FIRST"`,
//! `"Name = :name"`). The grammar lives in `criteria.pest`.

pub mod ast;
mod grammar;

pub use ast::{NullsOrder, OrderItem, SetItem, SortDirection, SourceItem};
pub use grammar::{parse_assignment, parse_order_item, parse_source_item, split_list};
