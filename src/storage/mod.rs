//! Storage engine for modelstore.
//!
//! - [`FileStorage`]: the registry of live entities and the JSON file behind it
//! - [`TypeRegistry`]: which entity types a reload can reconstruct
//! - [`SharedStorage`]: the engine behind a single lock for multi-threaded use
//! - [`StorageConfig`]: backing file path and write options

mod config;
mod engine;
mod registry;
mod shared;

pub use config::{StorageConfig, FILE_ENV_VAR};
pub use engine::{FileStorage, Registry};
pub use registry::{EntityFactory, TypeRegistry};
pub use shared::SharedStorage;
