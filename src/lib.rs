//! # modelstore - model instances persisted to a single JSON file
//!
//! modelstore keeps model instances in memory and moves the whole set to and
//! from one JSON file. Every instance has a stable id, creation and update
//! timestamps, and an open set of named attributes.
//!
//! ## Core Concepts
//!
//! - **Entity**: a model instance with identity, timestamps and attributes
//! - **Registry**: live entities keyed by `"<TypeTag>.<id>"`, owned by the engine
//! - **Persist**: write the whole registry to the backing file, atomically
//! - **Reload**: read the backing file back into typed entities
//!
//! ## Usage
//!
//! ```rust,no_run
//! use modelstore::{Entity, FileStorage, StorageConfig, TypeRegistry, User};
//!
//! let mut storage = FileStorage::open(StorageConfig::from_env(), TypeRegistry::with_defaults())?;
//!
//! let mut user = User::new();
//! user.set("name", "Holberton")?;
//! user.save();
//! let key = storage.register(user);
//! storage.persist()?;
//!
//! assert!(storage.get(&key).is_some());
//! # Ok::<(), modelstore::StoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod model;
pub mod storage;
pub mod time;
pub mod value;

// Re-export primary types at crate root for convenience
pub use error::{StoreError, StoreResult, ValidationError};
pub use model::{composite_key, BaseModel, Entity, Model, ModelId, User};
pub use storage::{EntityFactory, FileStorage, Registry, SharedStorage, StorageConfig, TypeRegistry};
pub use time::Timestamp;
pub use value::{Attributes, Value};
