//! Stock entity types.

use std::any::Any;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::ValidationError;
use crate::value::{Attributes, Value};

use super::{Entity, Model};

macro_rules! model_kind {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        pub struct $name {
            model: Model,
        }

        impl $name {
            /// Type tag under which this kind is stored.
            pub const TYPE_TAG: &'static str = $tag;

            #[must_use]
            pub fn new() -> Self {
                Self { model: Model::new() }
            }

            /// Rebuilds an instance from a serialized attribute map.
            ///
            /// # Errors
            ///
            /// See [`Model::from_attributes`].
            pub fn from_attributes(attrs: Attributes) -> Result<Self, ValidationError> {
                Ok(Self {
                    model: Model::from_attributes(attrs)?,
                })
            }

            /// Factory suitable for a [`TypeRegistry`](crate::storage::TypeRegistry).
            ///
            /// # Errors
            ///
            /// See [`Model::from_attributes`].
            pub fn factory(attrs: Attributes) -> Result<Box<dyn Entity>, ValidationError> {
                Ok(Box::new(Self::from_attributes(attrs)?))
            }
        }

        impl Entity for $name {
            fn type_tag(&self) -> &'static str {
                Self::TYPE_TAG
            }

            fn model(&self) -> &Model {
                &self.model
            }

            fn model_mut(&mut self) -> &mut Model {
                &mut self.model
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        impl Deref for $name {
            type Target = Model;

            fn deref(&self) -> &Model {
                &self.model
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Model {
                &mut self.model
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.model.fmt_tagged(Self::TYPE_TAG, f)
            }
        }
    };
}

model_kind!(
    /// The plain model: identity, timestamps and dynamic attributes only.
    BaseModel,
    "BaseModel"
);

model_kind!(
    /// An application user.
    ///
    /// The profile fields are ordinary string attributes; they are absent
    /// until set.
    User,
    "User"
);

macro_rules! string_field {
    ($get:ident, $set:ident, $key:literal) => {
        #[must_use]
        pub fn $get(&self) -> Option<&str> {
            self.model.get($key).and_then(Value::as_str)
        }

        pub fn $set(&mut self, value: impl Into<String>) {
            self.model.insert_attribute($key, Value::String(value.into()));
        }
    };
}

impl User {
    string_field!(email, set_email, "email");
    string_field!(password, set_password, "password");
    string_field!(first_name, set_first_name, "first_name");
    string_field!(last_name, set_last_name, "last_name");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_has_no_profile_fields_by_default() {
        let user = User::new();
        assert!(user.email().is_none());
        assert!(user.first_name().is_none());
        assert!(user.attributes().is_empty());
    }

    #[test]
    fn test_user_profile_fields() {
        let mut user = User::new();
        user.set_first_name("Betty");
        user.set_last_name("Holberton");
        user.set_email("betty@example.com");
        user.set_password("980336");

        assert_eq!(user.first_name(), Some("Betty"));
        assert_eq!(user.last_name(), Some("Holberton"));
        assert_eq!(user.get("email"), Some(&Value::from("betty@example.com")));
        assert_eq!(user.password(), Some("980336"));
    }

    #[test]
    fn test_distinct_instances() {
        let a = User::new();
        let b = User::new();
        assert_ne!(a.id(), b.id());
        assert!(a.created_at() <= b.created_at());
    }

    #[test]
    fn test_save_keeps_created_at() {
        let mut user = User::new();
        let created = user.created_at();
        user.set("name", "Betty").unwrap();
        user.save();
        assert!(user.updated_at() > created);
        assert_eq!(user.created_at(), created);
    }

    #[test]
    fn test_to_dict_carries_type_tag() {
        let base = BaseModel::new();
        let user = User::new();
        assert_eq!(base.to_dict()["typeTag"], Value::from("BaseModel"));
        assert_eq!(user.to_dict()["typeTag"], Value::from("User"));
    }

    #[test]
    fn test_from_dict_discards_type_tag() {
        let mut user = User::new();
        user.set("name", "Holberton").unwrap();
        user.set("my_number", 89).unwrap();

        let rebuilt = User::from_attributes(user.to_dict()).unwrap();
        assert_eq!(rebuilt, user);
        assert!(rebuilt.get("typeTag").is_none());
    }

    #[test]
    fn test_display_format() {
        let mut user = User::new();
        user.set("name", "Holberton").unwrap();
        let text = user.to_string();
        assert!(text.starts_with(&format!("[User] ({}) {{", user.id())));
        assert!(text.contains("\"name\": \"Holberton\""));
        assert!(!text.contains("typeTag"));
    }

    #[test]
    fn test_factory_produces_boxed_entity() {
        let entity = BaseModel::factory(Attributes::new()).unwrap();
        assert_eq!(entity.type_tag(), "BaseModel");
        assert!(entity.as_any().downcast_ref::<BaseModel>().is_some());
    }
}
