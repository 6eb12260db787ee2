use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::create_dir_all;
use tracing::{debug, info};

/// Flat directory of media blobs addressed by cache key.
#[derive(Debug, Clone)]
pub struct MediaCache {
    cache_dir: PathBuf,
    extension: String,
}

impl MediaCache {
    pub fn new(cache_dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            extension: extension.to_string(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Ensure the cache directory exists
    pub async fn ensure_cache_dir(&self) -> io::Result<()> {
        if !tokio::fs::try_exists(&self.cache_dir).await? {
            debug!("Creating cache directory: {:?}", self.cache_dir);
            create_dir_all(&self.cache_dir).await?;
        }
        Ok(())
    }

    /// Get the full path for a cached file
    pub fn get_cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(key).with_extension(&self.extension)
    }

    pub async fn is_cached(&self, key: &str) -> io::Result<bool> {
        tokio::fs::try_exists(self.get_cache_path(key)).await
    }

    /// Store data in the cache. Concurrent writers each rename their own
    /// temp file into place, the last one wins.
    pub async fn store_in_cache(&self, key: &str, data: &[u8]) -> io::Result<()> {
        self.ensure_cache_dir().await?;
        let path = self.get_cache_path(key);
        let tmp_path = self
            .cache_dir
            .join(format!("{}.{}.tmp", key, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp_path, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            tokio::fs::remove_file(&tmp_path).await.ok();
            return Err(e);
        }
        info!("cache: Stored {} -> {} bytes", key, data.len());
        Ok(())
    }

    /// Retrieve data from the cache, `None` when the key is absent
    pub async fn retrieve_from_cache(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.get_cache_path(key)).await {
            Ok(data) => {
                debug!("Retrieved file from cache with key: {}", key);
                Ok(Some(data))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_from_cache(&self, key: &str) -> io::Result<()> {
        let path = self.get_cache_path(key);
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(path).await?;
            debug!("Deleted file from cache with key: {}", key);
        }
        Ok(())
    }
}

/// Hash every part into a filesystem safe key. Parts are length prefixed so
/// `("ab", "c")` and `("a", "bc")` never collide.
pub fn generate_cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_operations() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = MediaCache::new(dir.path().join("nested"), "wav");

        let key = generate_cache_key(&["test_data", "8000"]);
        assert!(!cache.is_cached(&key).await?);
        assert_eq!(cache.retrieve_from_cache(&key).await?, None);

        let test_data = b"TEST DATA".to_vec();
        cache.store_in_cache(&key, &test_data).await?;
        assert!(cache.is_cached(&key).await?);
        assert_eq!(cache.retrieve_from_cache(&key).await?, Some(test_data));
        assert_eq!(
            cache.get_cache_path(&key).extension().and_then(|e| e.to_str()),
            Some("wav")
        );

        cache.delete_from_cache(&key).await?;
        assert!(!cache.is_cached(&key).await?);
        // deleting twice is fine
        cache.delete_from_cache(&key).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_store_leaves_no_temp_files() -> io::Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = MediaCache::new(dir.path(), "wav");
        let key = generate_cache_key(&["hello"]);
        cache.store_in_cache(&key, b"one").await?;
        cache.store_in_cache(&key, b"two").await?;

        let mut entries = tokio::fs::read_dir(dir.path()).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec![format!("{}.wav", key)]);
        assert_eq!(cache.retrieve_from_cache(&key).await?, Some(b"two".to_vec()));
        Ok(())
    }

    #[test]
    fn test_generate_cache_key() {
        let key1 = generate_cache_key(&["hello", "16000"]);
        let key2 = generate_cache_key(&["hello", "8000"]);
        let key3 = generate_cache_key(&["world", "16000"]);

        assert_ne!(key1, key2);
        assert_ne!(key1, key3);
        assert_eq!(key1, generate_cache_key(&["hello", "16000"]));
        assert_ne!(generate_cache_key(&["ab", "c"]), generate_cache_key(&["a", "bc"]));
        assert_eq!(key1.len(), 64);
    }
}
