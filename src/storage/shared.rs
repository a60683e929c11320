//! Thread-safe wrapper around a [`FileStorage`].

use std::sync::{Mutex, MutexGuard};

use crate::error::{StoreError, StoreResult};
use crate::model::Entity;

use super::engine::{FileStorage, Registry};

/// A `FileStorage` behind one mutex.
///
/// Every registry access and every persist/reload runs under the same
/// lock, so persist never observes a half-applied reload. Reads go
/// through closures; no reference outlives the lock.
#[derive(Debug)]
pub struct SharedStorage {
    inner: Mutex<FileStorage>,
}

impl SharedStorage {
    #[must_use]
    pub fn new(storage: FileStorage) -> Self {
        Self {
            inner: Mutex::new(storage),
        }
    }

    fn lock(&self, context: &'static str) -> StoreResult<MutexGuard<'_, FileStorage>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::LockPoisoned { context })
    }

    /// See [`FileStorage::register`].
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn register<E: Entity + 'static>(&self, entity: E) -> StoreResult<String> {
        Ok(self.lock("register")?.register(entity))
    }

    /// See [`FileStorage::persist`].
    ///
    /// # Errors
    ///
    /// `StoreError::LockPoisoned` or any persist error.
    pub fn persist(&self) -> StoreResult<()> {
        self.lock("persist")?.persist()
    }

    /// See [`FileStorage::reload`].
    ///
    /// # Errors
    ///
    /// `StoreError::LockPoisoned` or any reload error.
    pub fn reload(&self) -> StoreResult<usize> {
        self.lock("reload")?.reload()
    }

    /// Runs `f` against the whole registry.
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn with_all<R>(&self, f: impl FnOnce(&Registry) -> R) -> StoreResult<R> {
        Ok(f(self.lock("with_all")?.all()))
    }

    /// Runs `f` against one entity, if present.
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn with_entity<R>(&self, key: &str, f: impl FnOnce(&dyn Entity) -> R) -> StoreResult<Option<R>> {
        Ok(self.lock("with_entity")?.get(key).map(f))
    }

    /// Runs `f` against one entity mutably, if present.
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn with_entity_mut<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut dyn Entity) -> R,
    ) -> StoreResult<Option<R>> {
        Ok(self.lock("with_entity_mut")?.get_mut(key).map(f))
    }

    /// See [`FileStorage::remove`].
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn remove(&self, key: &str) -> StoreResult<Option<Box<dyn Entity>>> {
        Ok(self.lock("remove")?.remove(key))
    }

    /// See [`FileStorage::clear`].
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn clear(&self) -> StoreResult<()> {
        self.lock("clear")?.clear();
        Ok(())
    }

    /// Number of registered entities.
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock("len")?.len())
    }

    /// Unwraps the engine.
    ///
    /// # Errors
    ///
    /// Only `StoreError::LockPoisoned`.
    pub fn into_inner(self) -> StoreResult<FileStorage> {
        self.inner
            .into_inner()
            .map_err(|_| StoreError::LockPoisoned { context: "into_inner" })
    }
}

impl From<FileStorage> for SharedStorage {
    fn from(storage: FileStorage) -> Self {
        Self::new(storage)
    }
}
