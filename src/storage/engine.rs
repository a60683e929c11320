//! The file-backed storage engine.
//!
//! `FileStorage` owns every live entity, keyed by `"<TypeTag>.<id>"`, and
//! moves the whole set to and from one JSON file:
//!
//! ```text
//! register ──► registry ──persist──► file.json (temp file + rename)
//!                  ▲                      │
//!                  └────────reload────────┘ (TypeRegistry dispatch)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::model::{Entity, LEGACY_TYPE_TAG_KEY, TYPE_TAG_KEY};
use crate::value::{Attributes, Value};

use super::config::StorageConfig;
use super::registry::TypeRegistry;

/// Live entities keyed by composite key.
pub type Registry = BTreeMap<String, Box<dyn Entity>>;

/// Single-file object store.
///
/// All operations are synchronous. Mutation takes `&mut self`; wrap the
/// engine in a [`SharedStorage`](super::SharedStorage) to use it from
/// several threads.
///
/// # Examples
///
/// ```no_run
/// use modelstore::{FileStorage, StorageConfig, TypeRegistry, User};
///
/// let mut storage = FileStorage::open(StorageConfig::default(), TypeRegistry::with_defaults())?;
///
/// let mut user = User::new();
/// user.set("name", "Holberton")?;
/// storage.register(user);
/// storage.persist()?;
/// # Ok::<(), modelstore::StoreError>(())
/// ```
#[derive(Debug)]
pub struct FileStorage {
    config: StorageConfig,
    types: TypeRegistry,
    objects: Registry,
}

impl FileStorage {
    /// Creates an engine with an empty registry. Does not touch the file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: StorageConfig, types: TypeRegistry) -> StoreResult<Self> {
        Ok(Self {
            config: config.validate()?,
            types,
            objects: Registry::new(),
        })
    }

    /// Creates an engine and reloads the backing file into it.
    ///
    /// # Errors
    ///
    /// Any error from [`FileStorage::new`] or [`FileStorage::reload`].
    pub fn open(config: StorageConfig, types: TypeRegistry) -> StoreResult<Self> {
        let mut storage = Self::new(config, types)?;
        storage.reload()?;
        Ok(storage)
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.config.path()
    }

    /// The validated configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Types this engine can reconstruct on reload.
    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Inserts `entity` under its composite key, replacing any entry with
    /// the same key. Returns the key.
    pub fn register<E: Entity + 'static>(&mut self, entity: E) -> String {
        self.register_boxed(Box::new(entity))
    }

    /// [`FileStorage::register`] for an already boxed entity.
    pub fn register_boxed(&mut self, entity: Box<dyn Entity>) -> String {
        let key = entity.key();
        debug!(key = %key, "registered entity");
        self.objects.insert(key.clone(), entity);
        key
    }

    /// The whole registry, read-only.
    #[must_use]
    pub fn all(&self) -> &Registry {
        &self.objects
    }

    /// Entries whose type tag is `tag`, in key order.
    pub fn all_of_type<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = (&'a str, &'a dyn Entity)> + 'a {
        self.objects
            .iter()
            .filter(move |(_, entity)| entity.type_tag() == tag)
            .map(|(key, entity)| -> (&'a str, &'a dyn Entity) { (key.as_str(), &**entity) })
    }

    /// Looks up an entry by composite key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&dyn Entity> {
        self.objects.get(key).map(|entity| &**entity)
    }

    /// Mutable lookup. Call [`Entity::save`] after changing attributes.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut dyn Entity> {
        match self.objects.get_mut(key) {
            Some(entity) => Some(&mut **entity),
            None => None,
        }
    }

    /// Removes an entry from the registry. The file changes on the next
    /// persist.
    pub fn remove(&mut self, key: &str) -> Option<Box<dyn Entity>> {
        let removed = self.objects.remove(key);
        if removed.is_some() {
            debug!(key = %key, "removed entity");
        }
        removed
    }

    /// Empties the registry. The file is left alone.
    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the registry holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Writes every entity's `to_dict` form to the backing file, replacing
    /// its previous content.
    ///
    /// The document is written to a temporary file in the same directory
    /// and renamed over the target, so a failure leaves the old file intact.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be written. The registry
    /// is unchanged either way.
    pub fn persist(&self) -> StoreResult<()> {
        let path = self.config.path();
        let document: BTreeMap<&str, Attributes> = self
            .objects
            .iter()
            .map(|(key, entity)| (key.as_str(), entity.to_dict()))
            .collect();

        let encoded = if self.config.pretty {
            serde_json::to_vec_pretty(&document)
        } else {
            serde_json::to_vec(&document)
        }
        .map_err(|e| StoreError::io(path, io::Error::new(ErrorKind::InvalidData, e)))?;

        write_atomic(path, &encoded, self.config.sync_on_write)
            .map_err(|e| StoreError::io(path, e))?;

        info!(path = %path.display(), count = document.len(), "persisted registry");
        Ok(())
    }

    /// Loads every entry of the backing file into the registry.
    ///
    /// A missing file is not an error: nothing is loaded and `Ok(0)` is
    /// returned. Entries are merged into the current registry; existing
    /// entries with other keys stay.
    ///
    /// Each entry's type comes from its `typeTag` attribute, the legacy
    /// `__class__` attribute, or the key prefix before the first `.`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Io` if the file exists but cannot be read
    /// - `StoreError::Deserialization` if it is not a JSON object of objects
    /// - `StoreError::UnknownType` if an entry's type is not registered
    /// - `StoreError::Malformed` if an entry's attributes are rejected
    ///
    /// On error the registry is exactly as it was before the call.
    pub fn reload(&mut self) -> StoreResult<usize> {
        let path = self.config.path();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no backing file; nothing to reload");
                return Ok(0);
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let document: BTreeMap<String, Value> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::deserialization(path, e.to_string()))?;

        let mut staged = Registry::new();
        for (stored_key, value) in document {
            let attrs = match value {
                Value::Map(attrs) => attrs,
                other => {
                    return Err(StoreError::deserialization(
                        path,
                        format!("entry '{stored_key}' is a {}, expected an object", other.type_name()),
                    ))
                }
            };

            let tag = resolve_type_tag(&stored_key, &attrs);
            if !self.types.contains(&tag) {
                return Err(StoreError::UnknownType {
                    key: stored_key,
                    type_tag: tag,
                });
            }

            let entity = self.types.construct(&tag, attrs)?;
            let key = entity.key();
            if key != stored_key {
                warn!(stored_key = %stored_key, key = %key, "stored key does not match entity; using entity key");
            }
            if staged.insert(key.clone(), entity).is_some() {
                warn!(stored_key = %stored_key, key = %key, "two file entries share a key; keeping the later one");
            }
        }

        let count = staged.len();
        self.objects.extend(staged);
        info!(path = %path.display(), count, "reloaded registry");
        Ok(count)
    }
}

fn resolve_type_tag(key: &str, attrs: &Attributes) -> String {
    attrs
        .get(TYPE_TAG_KEY)
        .or_else(|| attrs.get(LEGACY_TYPE_TAG_KEY))
        .and_then(Value::as_str)
        .or_else(|| key.split_once('.').map(|(tag, _)| tag))
        .unwrap_or(key)
        .to_string()
}

fn write_atomic(path: &Path, contents: &[u8], sync: bool) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    if sync {
        tmp.as_file().sync_all()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BaseModel, User};
    use tempfile::{tempdir, TempDir};

    fn storage_in(dir: &TempDir) -> FileStorage {
        let config = StorageConfig::new(dir.path().join("file.json")).with_sync_on_write(false);
        FileStorage::new(config, TypeRegistry::with_defaults()).unwrap()
    }

    #[test]
    fn test_register_uses_composite_key() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let user = User::new();
        let expected = format!("User.{}", user.id());

        let key = storage.register(user);
        assert_eq!(key, expected);
        assert!(storage.all().contains_key(&expected));
    }

    #[test]
    fn test_register_same_entity_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let mut model = BaseModel::new();
        model.set("n", 1).unwrap();

        storage.register(model.clone());
        model.set("n", 2).unwrap();
        let key = storage.register(model);

        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get(&key).unwrap().model().get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_get_mut_then_save() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let key = storage.register(User::new());

        let entity = storage.get_mut(&key).unwrap();
        let before = entity.model().updated_at();
        entity.model_mut().set("name", "Betty").unwrap();
        entity.save();

        let entity = storage.get(&key).unwrap();
        assert!(entity.model().updated_at() > before);
        assert_eq!(entity.model().get("name"), Some(&Value::from("Betty")));
    }

    #[test]
    fn test_all_of_type_filters() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        storage.register(User::new());
        storage.register(User::new());
        storage.register(BaseModel::new());

        assert_eq!(storage.all_of_type("User").count(), 2);
        assert_eq!(storage.all_of_type("BaseModel").count(), 1);
        assert_eq!(storage.all_of_type("Place").count(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let key = storage.register(User::new());
        storage.register(BaseModel::new());

        assert!(storage.remove(&key).is_some());
        assert!(storage.remove(&key).is_none());
        assert_eq!(storage.len(), 1);

        storage.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_reload_missing_file_is_noop() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let key = storage.register(User::new());

        assert_eq!(storage.reload().unwrap(), 0);
        assert_eq!(storage.len(), 1);
        assert!(storage.get(&key).is_some());
    }

    #[test]
    fn test_persist_then_reload_roundtrip() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let mut user = User::new();
        user.set("name", "Holberton").unwrap();
        user.set("my_list", vec![Value::from("Hello"), Value::from(100)]).unwrap();
        user.save();
        storage.register(user);
        storage.register(BaseModel::new());
        storage.persist().unwrap();

        let mut fresh = storage_in(&dir);
        assert_eq!(fresh.reload().unwrap(), 2);
        assert_eq!(fresh.all().len(), 2);
        for (key, entity) in storage.all() {
            let reloaded = fresh.get(key).unwrap();
            assert_eq!(reloaded.type_tag(), entity.type_tag());
            assert_eq!(reloaded.to_dict(), entity.to_dict());
        }
    }

    #[test]
    fn test_reload_legacy_class_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file.json");
        fs::write(
            &path,
            r#"{"BaseModel.56d43177-cc5f-4d6c-a0c1-e167f8c27337": {
                "id": "56d43177-cc5f-4d6c-a0c1-e167f8c27337",
                "created_at": "2017-09-28T21:03:54.052298",
                "__class__": "BaseModel",
                "my_number": 89,
                "updated_at": "2017-09-28T21:03:54.052302",
                "name": "Holberton"}}"#,
        )
        .unwrap();

        let mut storage = storage_in(&dir);
        assert_eq!(storage.reload().unwrap(), 1);
        let entity = storage
            .get("BaseModel.56d43177-cc5f-4d6c-a0c1-e167f8c27337")
            .unwrap();
        assert_eq!(entity.model().get("my_number"), Some(&Value::Int(89)));
        assert!(entity.model().get("__class__").is_none());
    }

    #[test]
    fn test_reload_falls_back_to_key_prefix() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("file.json"), r#"{"User.abc": {"id": "abc", "name": "x"}}"#).unwrap();

        let mut storage = storage_in(&dir);
        storage.reload().unwrap();
        let entity = storage.get("User.abc").unwrap();
        assert!(entity.as_any().downcast_ref::<User>().is_some());
    }

    #[test]
    fn test_reload_malformed_json() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("file.json"), "{not json").unwrap();

        let mut storage = storage_in(&dir);
        let err = storage.reload().unwrap_err();
        assert!(err.is_deserialization());
    }

    #[test]
    fn test_reload_rejects_non_object_entry() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("file.json"), r#"{"User.1": [1, 2]}"#).unwrap();

        let mut storage = storage_in(&dir);
        let err = storage.reload().unwrap_err();
        assert!(err.is_deserialization());
        assert!(err.to_string().contains("User.1"));
    }

    #[test]
    fn test_reload_unknown_type_leaves_registry() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("file.json"),
            r#"{"BaseModel.a": {"id": "a", "typeTag": "BaseModel"},
                "Place.b": {"id": "b", "typeTag": "Place"}}"#,
        )
        .unwrap();

        let mut storage = storage_in(&dir);
        let user_key = storage.register(User::new());

        let err = storage.reload().unwrap_err();
        match err {
            StoreError::UnknownType { key, type_tag } => {
                assert_eq!(key, "Place.b");
                assert_eq!(type_tag, "Place");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(storage.len(), 1);
        assert!(storage.get(&user_key).is_some());
        assert!(storage.get("BaseModel.a").is_none());
    }

    #[test]
    fn test_reload_bad_timestamp_is_malformed() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("file.json"),
            r#"{"User.a": {"id": "a", "created_at": "soon", "typeTag": "User"}}"#,
        )
        .unwrap();

        let mut storage = storage_in(&dir);
        assert!(storage.reload().unwrap_err().is_malformed());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_reload_mismatched_key_uses_entity_key() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("file.json"),
            r#"{"User.wrong": {"id": "right", "typeTag": "User"}}"#,
        )
        .unwrap();

        let mut storage = storage_in(&dir);
        storage.reload().unwrap();
        assert!(storage.get("User.right").is_some());
        assert!(storage.get("User.wrong").is_none());
    }

    #[test]
    fn test_persist_writes_composite_keys() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let mut user = User::new();
        user.set("name", "Holberton").unwrap();
        let id = user.id().clone();
        storage.register(user);
        storage.persist().unwrap();

        let raw = fs::read_to_string(storage.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &json[format!("User.{id}")];
        assert_eq!(entry["name"], "Holberton");
        assert_eq!(entry["typeTag"], "User");
        assert_eq!(entry["id"], id.as_str());
    }

    #[test]
    fn test_persist_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let key = storage.register(User::new());
        storage.persist().unwrap();

        storage.remove(&key);
        storage.persist().unwrap();

        let raw = fs::read_to_string(storage.path()).unwrap();
        assert_eq!(raw, "{}");
    }

    #[test]
    fn test_persist_pretty() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path().join("file.json")).with_pretty(true);
        let mut storage = FileStorage::new(config, TypeRegistry::with_defaults()).unwrap();
        storage.register(BaseModel::new());
        storage.persist().unwrap();

        let raw = fs::read_to_string(storage.path()).unwrap();
        assert!(raw.contains('\n'));
    }

    #[test]
    fn test_persist_into_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path().join("missing").join("file.json"));
        let mut storage = FileStorage::new(config, TypeRegistry::with_defaults()).unwrap();
        storage.register(User::new());

        let err = storage.persist().unwrap_err();
        assert!(err.is_io());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_open_reloads() {
        let dir = tempdir().unwrap();
        let mut storage = storage_in(&dir);
        let key = storage.register(User::new());
        storage.persist().unwrap();

        let reopened = FileStorage::open(storage.config().clone(), TypeRegistry::with_defaults()).unwrap();
        assert!(reopened.get(&key).is_some());
    }

    #[test]
    fn test_reload_colliding_entries_keep_one() {
        let dir = tempdir().unwrap();
        let storage_path = dir.path().join("file.json");
        let raw = r#"{
            "User.right": {"id": "right", "typeTag": "User", "n": 2},
            "User.wrong": {"id": "right", "typeTag": "User", "n": 1}
        }"#;
        fs::write(&storage_path, raw).unwrap();

        let mut storage = storage_in(&dir);
        assert_eq!(storage.reload().unwrap(), 1);
        assert_eq!(storage.len(), 1);
        let kept = storage.get("User.right").unwrap();
        assert_eq!(kept.model().get("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_reload_rejects_integer_beyond_i64() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("file.json"),
            r#"{"User.a": {"id": "a", "typeTag": "User", "big": 18446744073709551615}}"#,
        )
        .unwrap();

        let mut storage = storage_in(&dir);
        let kept = storage.register(BaseModel::new());
        let err = storage.reload().unwrap_err();
        assert!(err.is_deserialization());
        assert_eq!(storage.len(), 1);
        assert!(storage.get(&kept).is_some());
    }
}
