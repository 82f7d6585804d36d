//! Catalog of entity metadata.
//!
//! The compiler consults two narrow capabilities: a [`MetadataProvider`] for
//! field sets and identifier fields, and a [`NamespaceResolver`] for turning
//! bare names in criteria into qualified entity names. [`Catalog`] implements
//! both.

mod schema;

use std::sync::Arc;

pub use schema::{Catalog, EntitySchema};

/// Separator between namespace segments in qualified entity names.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Supplies field names and identifier fields for a query source.
pub trait MetadataProvider {
    /// Returns the schema of `source` (a qualified entity name).
    fn schema(&self, source: &str) -> Option<Arc<EntitySchema>>;
}

/// Resolves bare type names to qualified names.
pub trait NamespaceResolver {
    /// Qualifies `bare`, using `namespace` as the fallback prefix.
    fn qualify(&self, bare: &str, namespace: &str) -> String;
}

/// Returns the segment after the last namespace separator.
#[must_use]
pub fn short_name(name: &str) -> &str {
    name.rfind(NAMESPACE_SEPARATOR)
        .map_or(name, |pos| &name[pos + NAMESPACE_SEPARATOR.len()..])
}

/// Returns true if `name` carries a namespace.
#[must_use]
pub fn is_qualified(name: &str) -> bool {
    name.contains(NAMESPACE_SEPARATOR)
}
