//! Schemaless entity type.

use crate::error::{Error, Result};
use crate::value::{self, Fields, Value};

/// A single schemaless entity: an id paired with an ordered field map.
///
/// Construction writes the id into the field map under the `id` key, so
/// `fields["id"] == id` holds for every entity the store hands out — after
/// updates as well as inserts.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: String,
    fields: Fields,
}

impl Entity {
    /// Creates an entity, stamping `id` into the field map.
    pub fn new(id: impl Into<String>, mut fields: Fields) -> Self {
        let id = id.into();
        fields.insert("id".to_string(), Value::String(id.clone()));
        Self { id, fields }
    }

    /// Creates an entity from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is not a JSON object.
    pub fn from_value(id: impl Into<String>, value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Self::new(id, fields)),
            other => Err(Error::invalid_argument(format!(
                "entity fields must be an object, got {other}"
            ))),
        }
    }

    /// Returns the entity id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the field map.
    #[must_use]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Returns a top-level field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Resolves a dotted path against the fields.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        value::resolve_path(&self.fields, path)
    }

    /// Consumes the entity, returning its field map.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        self.fields
    }
}
