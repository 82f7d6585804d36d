//! Criteria specifications.

use serde::de::{Deserialize, Deserializer, Error as _};

use crate::error::{QuarryError, Result};
use crate::types::{MapKey, Value};

/// An ordered mapping from directive name to directive value.
///
/// The compiler walks directives in the order they were added. Names it does
/// not recognize are ignored.
///
/// ```
/// use quarry::{CriteriaSpec, Map, Value};
///
/// let criteria = CriteriaSpec::new()
///     .with("select", "User u, Role")
///     .with("where", Map::new().with("Id", vec![Value::Int(1), Value::Int(2)]))
///     .with("order", "u.Name DESC NULLS LAST")
///     .with("limit", 10);
///
/// assert_eq!(criteria.len(), 4);
/// assert_eq!(criteria.get("limit"), Some(&Value::Int(10)));
/// let names: Vec<&str> = criteria.iter().map(|(name, _)| name).collect();
/// assert_eq!(names, ["select", "where", "order", "limit"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CriteriaSpec {
    directives: Vec<(String, Value)>,
}

impl CriteriaSpec {
    /// Creates an empty specification.
    #[must_use]
    pub fn new() -> Self {
        CriteriaSpec {
            directives: Vec::new(),
        }
    }

    /// Adds a directive, builder style. A repeated name replaces the earlier
    /// value in place.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a directive, replacing any earlier value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.directives.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.directives.push((name, value)),
        }
    }

    /// Looks up a directive value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.directives
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterates directives in specification order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.directives.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the number of directives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Returns true if there are no directives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Parses a specification from a JSON object, keeping document order.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid JSON or not a JSON object.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| QuarryError::InvalidCriteria(format!("invalid JSON: {e}")))?;
        Self::try_from(Value::from(json))
    }
}

impl TryFrom<Value> for CriteriaSpec {
    type Error = QuarryError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Map(map) => {
                let mut spec = CriteriaSpec::new();
                for (key, value) in map.iter() {
                    match key {
                        MapKey::Name(name) => spec.set(name.clone(), value.clone()),
                        MapKey::Position(i) => {
                            return Err(QuarryError::InvalidCriteria(format!(
                                "directive at position {i} has no name"
                            )))
                        }
                    }
                }
                Ok(spec)
            }
            other => Err(QuarryError::InvalidCriteria(format!(
                "expected a mapping of directives, got {}",
                other.type_name()
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for CriteriaSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        CriteriaSpec::try_from(value).map_err(D::Error::custom)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CriteriaSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut spec = CriteriaSpec::new();
        for (k, v) in iter {
            spec.set(k, v);
        }
        spec
    }
}
