//! Closed dispatch table from type tag to constructor.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{StoreError, ValidationError};
use crate::model::{BaseModel, Entity, User};
use crate::value::Attributes;

/// Builds an entity of one concrete type from its serialized attributes.
pub type EntityFactory = fn(Attributes) -> Result<Box<dyn Entity>, ValidationError>;

/// The set of entity types a storage engine can reconstruct.
///
/// Types must be registered before a reload; nothing is discovered at
/// runtime.
///
/// # Examples
///
/// ```
/// use modelstore::{Attributes, Entity, TypeRegistry};
///
/// let types = TypeRegistry::with_defaults();
/// let user = types.construct("User", Attributes::new()).unwrap();
/// assert_eq!(user.type_tag(), "User");
/// ```
#[derive(Clone, Default)]
pub struct TypeRegistry {
    factories: BTreeMap<&'static str, EntityFactory>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding `BaseModel` and `User`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut types = Self::new();
        types.register_type(BaseModel::TYPE_TAG, BaseModel::factory);
        types.register_type(User::TYPE_TAG, User::factory);
        types
    }

    /// Adds or replaces the factory for `tag`.
    pub fn register_type(&mut self, tag: &'static str, factory: EntityFactory) -> &mut Self {
        self.factories.insert(tag, factory);
        self
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Builds an entity of type `tag` from `attrs`.
    ///
    /// # Errors
    ///
    /// - `StoreError::UnknownType` if `tag` is not registered
    /// - `StoreError::Malformed` if the factory rejects the attributes
    pub fn construct(&self, tag: &str, attrs: Attributes) -> Result<Box<dyn Entity>, StoreError> {
        let factory = self.factories.get(tag).ok_or_else(|| StoreError::UnknownType {
            key: tag.to_string(),
            type_tag: tag.to_string(),
        })?;
        Ok(factory(attrs)?)
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}
