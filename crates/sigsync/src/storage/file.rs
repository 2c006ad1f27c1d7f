use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::LocalStoreError;

use super::KeyValueStore;

/// File-based key/value storage
///
/// Directory structure:
/// ```text
/// base_path/
/// ├── emailTemplates.json
/// ├── emailTemplatesOutbox.json
/// └── emailTemplatesRejected.json
/// ```
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    base_path: PathBuf,
}

impl FileKeyValueStore {
    /// Open (and create if needed) a store rooted at `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| LocalStoreError::io("<root>", e))?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_file(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        match fs::read_to_string(self.key_file(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Err(LocalStoreError::corrupt(key, "payload is not valid UTF-8"))
            }
            Err(e) => Err(LocalStoreError::io(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        // Write next to the target and rename so readers never observe a torn file
        let target = self.key_file(key);
        let staging = self.base_path.join(format!(".{}.json.tmp", key));

        let mut file = fs::File::create(&staging).map_err(|e| LocalStoreError::io(key, e))?;
        file.write_all(value.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| LocalStoreError::io(key, e))?;
        fs::rename(&staging, &target).map_err(|e| LocalStoreError::io(key, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        match fs::remove_file(self.key_file(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LocalStoreError::io(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();

        let store = FileKeyValueStore::new(dir.path()).unwrap();
        store.set("emailTemplates", "{\"sig1\":{}}").unwrap();
        drop(store);

        let reopened = FileKeyValueStore::new(dir.path()).unwrap();
        assert_eq!(
            reopened.get("emailTemplates").unwrap().as_deref(),
            Some("{\"sig1\":{}}")
        );
    }

    #[test]
    fn test_file_store_missing_key_and_remove() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("nested")).unwrap();

        assert_eq!(store.get("absent").unwrap(), None);
        store.remove("absent").unwrap();

        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        assert!(!dir.path().join("nested").join(".k.json.tmp").exists());
    }

    #[test]
    fn test_file_store_reports_invalid_utf8_as_corrupt() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(
            store.get("bad"),
            Err(LocalStoreError::Corrupt { .. })
        ));
    }
}
