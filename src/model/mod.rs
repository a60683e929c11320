//! Model layer: identity, timestamps and the entity contract.
//!
//! Every persistable type implements [`Entity`] on top of a shared
//! [`Model`] record. The storage engine only sees `dyn Entity`, so new
//! kinds of model plug in by implementing the trait and registering a
//! factory with the [`TypeRegistry`](crate::storage::TypeRegistry).

mod kinds;
mod record;

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Attributes;

pub use kinds::{BaseModel, User};
pub use record::Model;

/// Attribute key holding the model id.
pub const ID_KEY: &str = "id";
/// Attribute key holding the creation timestamp.
pub const CREATED_AT_KEY: &str = "created_at";
/// Attribute key holding the last-save timestamp.
pub const UPDATED_AT_KEY: &str = "updated_at";
/// Attribute key `to_dict` adds with the model's type tag.
pub const TYPE_TAG_KEY: &str = "typeTag";
/// Type tag key written by older data files; accepted on input only.
pub const LEGACY_TYPE_TAG_KEY: &str = "__class__";

/// Names that cannot be used for dynamic attributes.
pub const RESERVED_KEYS: [&str; 5] = [
    ID_KEY,
    CREATED_AT_KEY,
    UPDATED_AT_KEY,
    TYPE_TAG_KEY,
    LEGACY_TYPE_TAG_KEY,
];

/// Opaque, stable model identifier.
///
/// Fresh ids are random UUIDv4 values in hyphenated form. Ids read back
/// from a data file are kept verbatim, whatever their shape.
///
/// # Examples
///
/// ```
/// use modelstore::ModelId;
///
/// let id = ModelId::new();
/// assert_eq!(id.as_uuid().unwrap().get_version_num(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Creates a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the id as a UUID, if it is one.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.0).ok()
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<Uuid> for ModelId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Builds the registry key `"<TypeTag>.<id>"`.
#[must_use]
pub fn composite_key(type_tag: &str, id: &ModelId) -> String {
    format!("{type_tag}.{id}")
}

/// A persistable model instance.
///
/// Implementors provide their type tag and access to the backing
/// [`Model`]; everything else has a default built on those.
pub trait Entity: fmt::Debug + Send + Sync {
    /// Declared type name, used for reconstruction and for the registry key.
    fn type_tag(&self) -> &'static str;

    fn model(&self) -> &Model;

    fn model_mut(&mut self) -> &mut Model;

    /// Downcasting hook for callers that need the concrete type back.
    fn as_any(&self) -> &dyn Any;

    fn id(&self) -> &ModelId {
        self.model().id()
    }

    /// Registry key of this entity.
    fn key(&self) -> String {
        composite_key(self.type_tag(), self.id())
    }

    /// Marks the entity as updated. Does not write anything to disk.
    fn save(&mut self) {
        self.model_mut().touch();
    }

    /// Serializable attribute map including `typeTag`.
    fn to_dict(&self) -> Attributes {
        self.model().to_dict(self.type_tag())
    }
}

impl fmt::Display for dyn Entity + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.model().fmt_tagged(self.type_tag(), f)
    }
}
