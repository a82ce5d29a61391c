//! Directory-backed key-value store.
//!
//! Each key maps to `<key>.json` inside a capability-scoped directory.
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never observes a partially written value.

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io;

use crate::release::ports::{KeyValueStore, KeyValueStoreError, KeyValueStoreResult};

/// Key-value store persisting one JSON file per key.
#[derive(Debug)]
pub struct FileKeyValueStore {
    root: Utf8PathBuf,
    dir: Dir,
}

impl FileKeyValueStore {
    /// Opens (creating if needed) the store directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError::Persistence`] when the directory cannot
    /// be created or opened.
    pub fn open(path: impl AsRef<Utf8Path>) -> KeyValueStoreResult<Self> {
        let root = path.as_ref().to_path_buf();
        Dir::create_ambient_dir_all(&root, ambient_authority())
            .map_err(KeyValueStoreError::persistence)?;
        let dir = Dir::open_ambient_dir(&root, ambient_authority())
            .map_err(KeyValueStoreError::persistence)?;
        Ok(Self { root, dir })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn file_name(key: &str) -> KeyValueStoreResult<String> {
        let is_valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
        if !is_valid {
            return Err(KeyValueStoreError::InvalidKey(key.to_owned()));
        }
        Ok(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn read(&self, key: &str) -> KeyValueStoreResult<Option<String>> {
        let file_name = Self::file_name(key)?;
        match self.dir.read_to_string(&file_name) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(KeyValueStoreError::persistence(err)),
        }
    }

    async fn write(&self, key: &str, value: &str) -> KeyValueStoreResult<()> {
        let file_name = Self::file_name(key)?;
        let temp_name = format!("{file_name}.tmp");
        self.dir
            .write(&temp_name, value)
            .map_err(KeyValueStoreError::persistence)?;
        self.dir
            .rename(&temp_name, &self.dir, &file_name)
            .map_err(KeyValueStoreError::persistence)?;
        Ok(())
    }
}
