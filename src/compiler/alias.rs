//! Alias tracking and field-name resolution.

use std::collections::BTreeSet;

use crate::compiler::format::{substitute, Substitution};

/// Ordered list of aliases bound to query sources.
///
/// Index 0 is the root alias. Aliases are unique and keep their position
/// once added, so `%k$s` placeholders stay stable within a compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasList {
    aliases: Vec<String>,
}

impl AliasList {
    /// Creates an empty alias list.
    #[must_use]
    pub fn new() -> Self {
        AliasList {
            aliases: Vec::new(),
        }
    }

    /// Appends an alias. Returns false if it was already present.
    pub fn push(&mut self, alias: impl Into<String>) -> bool {
        let alias = alias.into();
        if self.contains(&alias) {
            return false;
        }
        self.aliases.push(alias);
        true
    }

    /// Returns the root alias.
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        self.aliases.first().map(String::as_str)
    }

    /// Returns true if `alias` is in the list.
    #[must_use]
    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    /// Returns the zero-based position of `alias`.
    #[must_use]
    pub fn position(&self, alias: &str) -> Option<usize> {
        self.aliases.iter().position(|a| a == alias)
    }

    /// Returns the aliases as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.aliases
    }

    /// Returns the number of aliases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Returns true if there are no aliases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl From<Vec<String>> for AliasList {
    fn from(aliases: Vec<String>) -> Self {
        let mut list = AliasList::new();
        for alias in aliases {
            list.push(alias);
        }
        list
    }
}

/// Resolves field references against the current aliases.
///
/// Bare names are qualified with the root alias when the root source declares
/// them; names containing a `.` are treated as templates and go through
/// placeholder substitution.
#[derive(Debug, Clone, Copy)]
pub struct AliasRegistry<'a> {
    aliases: &'a AliasList,
    root_fields: &'a BTreeSet<String>,
}

impl<'a> AliasRegistry<'a> {
    /// Creates a registry over `aliases`, checking bare names against
    /// `root_fields`.
    #[must_use]
    pub fn new(aliases: &'a AliasList, root_fields: &'a BTreeSet<String>) -> Self {
        AliasRegistry {
            aliases,
            root_fields,
        }
    }

    /// Resolves `name`, requiring bare names to exist on the root source.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.resolve_with(name, true)
    }

    /// Resolves `name` to a qualified reference, or `None` if it cannot be.
    #[must_use]
    pub fn resolve_with(&self, name: &str, check_exists: bool) -> Option<String> {
        if !name.contains('.') {
            if self.aliases.contains(name) {
                return Some(name.to_string());
            }
            if !check_exists || self.root_fields.contains(name) {
                return self.aliases.root().map(|root| format!("{root}.{name}"));
            }
            return None;
        }
        self.substitute(name).resolved()
    }

    /// Expands alias placeholders in `template`.
    #[must_use]
    pub fn substitute(&self, template: &str) -> Substitution {
        substitute(template, self.aliases.as_slice())
    }

    /// Returns the underlying alias list.
    #[must_use]
    pub fn aliases(&self) -> &AliasList {
        self.aliases
    }
}
