//! Entity schema registry.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{short_name, MetadataProvider, NamespaceResolver, NAMESPACE_SEPARATOR};
use crate::error::{QuarryError, Result};

/// Central registry of all entity schemas known to the repositories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// Entity schemas by qualified name.
    entities: HashMap<String, EntitySchema>,
    /// Next entity ID for auto-increment.
    #[serde(default)]
    next_entity_id: u32,
}

impl Catalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Catalog {
            entities: HashMap::new(),
            next_entity_id: 0,
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Registers an entity schema.
    ///
    /// # Errors
    ///
    /// Returns an error if an entity with the same qualified name exists.
    pub fn register(&mut self, mut schema: EntitySchema) -> Result<u32> {
        if self.entities.contains_key(&schema.name) {
            return Err(QuarryError::SchemaError(format!(
                "Entity '{}' already exists",
                schema.name
            )));
        }
        let entity_id = self.next_id();
        schema.entity_id = entity_id;
        self.entities.insert(schema.name.clone(), schema);
        Ok(entity_id)
    }

    /// Retrieves an entity schema by qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<EntitySchema>> {
        self.entities.get(name).map(|s| Arc::new(s.clone()))
    }

    /// Checks if an entity is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Serializes the catalog to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| QuarryError::CatalogError(format!("Failed to serialize catalog: {e}")))
    }

    /// Deserializes a catalog from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| QuarryError::CatalogError(format!("Failed to deserialize catalog: {e}")))
    }
}

impl MetadataProvider for Catalog {
    fn schema(&self, source: &str) -> Option<Arc<EntitySchema>> {
        self.get(source)
    }
}

impl NamespaceResolver for Catalog {
    /// Exact names win; otherwise the most recently registered entity with a
    /// matching short name; otherwise the name is placed in `namespace`.
    fn qualify(&self, bare: &str, namespace: &str) -> String {
        if self.entities.contains_key(bare) {
            return bare.to_string();
        }

        let guessed = self
            .entities
            .values()
            .filter(|schema| schema.short_name() == bare)
            .max_by_key(|schema| schema.entity_id);

        match guessed {
            Some(schema) => schema.name.clone(),
            None if namespace.is_empty() => bare.to_string(),
            None => format!("{namespace}{NAMESPACE_SEPARATOR}{bare}"),
        }
    }
}

/// Schema definition for an entity (a query source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Internal entity ID.
    pub entity_id: u32,
    /// Qualified entity name, e.g. `app::entity::User`.
    pub name: String,
    /// Ordered field names.
    pub fields: Vec<String>,
    /// Field names forming the identifier.
    pub identifier: Vec<String>,
}

impl EntitySchema {
    /// Creates a new entity schema with validation.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails (empty fields, duplicate names,
    /// identifier not among the fields).
    pub fn new(name: impl Into<String>, fields: Vec<String>, identifier: Vec<String>) -> Result<Self> {
        let schema = EntitySchema {
            entity_id: 0, // Will be set by catalog
            name: name.into(),
            fields,
            identifier,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(QuarryError::SchemaError("Entity name cannot be empty".into()));
        }

        if self.fields.is_empty() {
            return Err(QuarryError::SchemaError(format!(
                "Entity '{}' must have at least one field",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field) {
                return Err(QuarryError::SchemaError(format!(
                    "Duplicate field name '{field}'"
                )));
            }
        }

        for id in &self.identifier {
            if !seen.contains(id) {
                return Err(QuarryError::SchemaError(format!(
                    "Identifier field '{id}' not found in entity '{}'",
                    self.name
                )));
            }
        }

        Ok(())
    }

    /// Returns the unqualified name, which is also the default alias.
    #[must_use]
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    /// Returns the namespace part of the qualified name (empty if none).
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.name
            .rfind(NAMESPACE_SEPARATOR)
            .map_or("", |pos| &self.name[..pos])
    }

    /// Returns the first identifier field.
    #[must_use]
    pub fn primary_identifier(&self) -> Option<&str> {
        self.identifier.first().map(String::as_str)
    }
}
