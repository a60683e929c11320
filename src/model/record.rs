//! The shared model record behind every entity.

use std::fmt;

use crate::error::ValidationError;
use crate::time::{self, Timestamp};
use crate::value::{fmt_attributes, Attributes, Value};

use super::{
    ModelId, CREATED_AT_KEY, ID_KEY, LEGACY_TYPE_TAG_KEY, RESERVED_KEYS, TYPE_TAG_KEY,
    UPDATED_AT_KEY,
};

/// Identity, timestamps and the open set of dynamic attributes.
///
/// # Examples
///
/// ```
/// use modelstore::{Model, Value};
///
/// let mut model = Model::new();
/// model.set("name", "Holberton").unwrap();
/// assert_eq!(model.get("name"), Some(&Value::from("Holberton")));
/// assert_eq!(model.created_at(), model.updated_at());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    id: ModelId,
    created_at: Timestamp,
    updated_at: Timestamp,
    attributes: Attributes,
}

impl Model {
    /// Creates a model with a fresh id and both timestamps set to now.
    #[must_use]
    pub fn new() -> Self {
        let now = time::now();
        Self {
            id: ModelId::new(),
            created_at: now,
            updated_at: now,
            attributes: Attributes::new(),
        }
    }

    /// Rebuilds a model from an attribute map, typically one produced by
    /// [`Entity::to_dict`](super::Entity::to_dict).
    ///
    /// An empty map behaves like [`Model::new`]. Type tag keys are dropped.
    /// `id` is kept verbatim and generated if absent. Timestamps are parsed
    /// from ISO-8601 strings and default to now if absent. Every other key
    /// becomes a dynamic attribute.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidAttribute` if `id` is not a string
    /// or an attribute holds a non-finite float, and
    /// `ValidationError::InvalidTimestamp` if a timestamp is not a
    /// valid ISO-8601 string.
    pub fn from_attributes(mut attrs: Attributes) -> Result<Self, ValidationError> {
        attrs.remove(TYPE_TAG_KEY);
        attrs.remove(LEGACY_TYPE_TAG_KEY);
        if attrs.is_empty() {
            return Ok(Self::new());
        }

        let id = match attrs.remove(ID_KEY) {
            None => ModelId::new(),
            Some(Value::String(id)) => ModelId::from(id),
            Some(_) => {
                return Err(ValidationError::InvalidAttribute {
                    field: ID_KEY.to_string(),
                    expected: "string",
                })
            }
        };

        if let Some((field, _)) = attrs.iter().find(|(_, value)| !value.is_finite()) {
            return Err(ValidationError::InvalidAttribute {
                field: field.clone(),
                expected: "finite number",
            });
        }

        let now = time::now();
        let created_at = take_timestamp(&mut attrs, CREATED_AT_KEY)?.unwrap_or(now);
        let updated_at = take_timestamp(&mut attrs, UPDATED_AT_KEY)?.unwrap_or(now);

        Ok(Self {
            id,
            created_at,
            updated_at,
            attributes: attrs,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ModelId {
        &self.id
    }

    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Dynamic attributes, without id or timestamps.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Sets a dynamic attribute, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::ReservedAttribute` for `id`, the
    /// timestamps and the type tag keys. Returns
    /// `ValidationError::InvalidAttribute` if `value` holds `NaN` or an
    /// infinity anywhere, since the backing file cannot store them.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, ValidationError> {
        let name = name.into();
        if RESERVED_KEYS.contains(&name.as_str()) {
            return Err(ValidationError::ReservedAttribute { name });
        }
        let value = value.into();
        if !value.is_finite() {
            return Err(ValidationError::InvalidAttribute {
                field: name,
                expected: "finite number",
            });
        }
        Ok(self.attributes.insert(name, value))
    }

    /// Inserts without the reserved-name check; callers pass fixed names.
    pub(crate) fn insert_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Advances `updated_at`; it always ends up strictly later than before.
    pub fn touch(&mut self) {
        self.updated_at = time::advance(self.updated_at);
    }

    /// Dynamic attributes plus id and ISO-8601 timestamps.
    #[must_use]
    pub fn snapshot(&self) -> Attributes {
        let mut out = self.attributes.clone();
        out.insert(ID_KEY.to_string(), Value::String(self.id.to_string()));
        out.insert(
            CREATED_AT_KEY.to_string(),
            Value::String(time::format_iso(&self.created_at)),
        );
        out.insert(
            UPDATED_AT_KEY.to_string(),
            Value::String(time::format_iso(&self.updated_at)),
        );
        out
    }

    /// [`Model::snapshot`] with the type tag added.
    #[must_use]
    pub fn to_dict(&self, type_tag: &str) -> Attributes {
        let mut out = self.snapshot();
        out.insert(TYPE_TAG_KEY.to_string(), Value::String(type_tag.to_string()));
        out
    }

    /// Writes `[<TypeTag>] (<id>) <attributes>`.
    pub(crate) fn fmt_tagged(&self, type_tag: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{type_tag}] ({}) ", self.id)?;
        fmt_attributes(&self.snapshot(), f)
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

fn take_timestamp(attrs: &mut Attributes, field: &str) -> Result<Option<Timestamp>, ValidationError> {
    match attrs.remove(field) {
        None => Ok(None),
        Some(Value::String(raw)) => time::parse_iso(&raw)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                field: field.to_string(),
                value: raw,
            }),
        Some(other) => Err(ValidationError::InvalidTimestamp {
            field: field.to_string(),
            value: other.to_string(),
        }),
    }
}
