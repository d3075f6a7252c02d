//! Filesystem-based storage
//!
//! Each key maps to a file below the base directory.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::{Key, Storage, StorageError};

/// Storage keeping values as files
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    /// Create a storage rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Returns the base path
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    fn key_to_path(&self, key: &Key) -> PathBuf {
        key.as_str()
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.base_path.clone(), |path, part| path.join(part))
    }

    fn not_found(key: &Key, err: std::io::Error) -> StorageError {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(err)
        }
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn exists(&self, key: &Key) -> Result<bool, StorageError> {
        match fs::metadata(self.key_to_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn value(&self, key: &Key) -> Result<Bytes, StorageError> {
        let path = self.key_to_path(key);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::NotFound(key.to_string())),
            Err(e) => return Err(Self::not_found(key, e)),
        }
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::not_found(key, e))?;
        Ok(Bytes::from(data))
    }

    async fn save(&self, key: &Key, content: Bytes) -> Result<(), StorageError> {
        if key.is_root() {
            return Err(StorageError::InvalidKey("root key has no value".to_string()));
        }
        let path = self.key_to_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Readers never observe a partially written file
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = path.with_file_name(format!("{}.part", file_name));
        fs::write(&tmp, &content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<(), StorageError> {
        fs::remove_file(self.key_to_path(key))
            .await
            .map_err(|e| Self::not_found(key, e))
    }

    async fn list(&self, prefix: &Key) -> Result<Vec<Key>, StorageError> {
        let root = self.key_to_path(prefix);
        let mut keys = Vec::new();
        let mut pending = vec![(root, prefix.clone())];

        while let Some((dir, dir_key)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let key = dir_key.join(&Key::new(&name)?);
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else if file_type.is_file() && !name.ends_with(".part") {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, FileSystemStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FileSystemStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn test_save_and_read() {
        let (_dir, storage) = storage();
        let key = Key::new("com/acme/lib/1.0/lib-1.0.jar").unwrap();

        storage.save(&key, Bytes::from("jar")).await.unwrap();

        assert!(storage.exists(&key).await.unwrap());
        assert_eq!(storage.value(&key).await.unwrap(), Bytes::from("jar"));
    }

    #[tokio::test]
    async fn test_missing_value_is_not_found() {
        let (_dir, storage) = storage();
        let key = Key::new("nothing/here").unwrap();

        assert!(!storage.exists(&key).await.unwrap());
        assert!(matches!(
            storage.value(&key).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_is_not_a_value() {
        let (_dir, storage) = storage();
        storage
            .save(&Key::new("dir/file").unwrap(), Bytes::from("x"))
            .await
            .unwrap();

        let dir = Key::new("dir").unwrap();
        assert!(!storage.exists(&dir).await.unwrap());
        assert!(matches!(
            storage.value(&dir).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, storage) = storage();
        let key = Key::new("a.txt").unwrap();
        storage.save(&key, Bytes::from("a")).await.unwrap();

        storage.delete(&key).await.unwrap();

        assert!(!storage.exists(&key).await.unwrap());
        assert!(matches!(
            storage.delete(&key).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_recurses_and_sorts() {
        let (_dir, storage) = storage();
        for name in ["b.yaml", "a.yaml", "nested/c.yaml"] {
            storage
                .save(&Key::new(name).unwrap(), Bytes::from("x"))
                .await
                .unwrap();
        }

        let keys: Vec<String> = storage
            .list(&Key::root())
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["a.yaml", "b.yaml", "nested/c.yaml"]);

        let nested = storage.list(&Key::new("nested").unwrap()).await.unwrap();
        assert_eq!(nested, vec![Key::new("nested/c.yaml").unwrap()]);

        assert!(storage
            .list(&Key::new("absent").unwrap())
            .await
            .unwrap()
            .is_empty());
    }
}
