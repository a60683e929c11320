//! Backing-file configuration.

use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Environment variable that overrides the backing file path.
pub const FILE_ENV_VAR: &str = "MODELSTORE_FILE";

/// Configuration for a [`FileStorage`](super::FileStorage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Path of the JSON backing file.
    pub path: PathBuf,
    /// Whether to fsync the temp file before it replaces the backing file.
    pub sync_on_write: bool,
    /// Whether to pretty-print the JSON document.
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(Self::DEFAULT_FILE),
            sync_on_write: true,
            pretty: false,
        }
    }
}

impl StorageConfig {
    /// Backing file used when no path is configured.
    pub const DEFAULT_FILE: &'static str = "file.json";

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Reads the path from `MODELSTORE_FILE`, falling back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var_os(FILE_ENV_VAR) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn with_sync_on_write(mut self, sync_on_write: bool) -> Self {
        self.sync_on_write = sync_on_write;
        self
    }

    #[must_use]
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks that the path can name a regular file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidConfig` for an empty path or one that
    /// names an existing directory.
    pub fn validate(self) -> Result<Self, StoreError> {
        if self.path.as_os_str().is_empty() {
            return Err(StoreError::InvalidConfig {
                reason: "backing file path is empty".to_string(),
            });
        }

        if self.path.is_dir() {
            return Err(StoreError::InvalidConfig {
                reason: format!("backing file path {} is a directory", self.path.display()),
            });
        }

        Ok(self)
    }
}
