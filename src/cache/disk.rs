/// Disk-based key cache backend
use crate::{
    cache::CacheStore,
    error::{CedeError, CedeResult},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};

/// Disk cache backend
///
/// One file per key in a flat directory. Keys that are not safe as file
/// names are stored under `~` + hex(sha256(key)).
#[derive(Clone)]
pub struct DiskCache {
    base_path: PathBuf,
    max_bytes: u64,
}

impl DiskCache {
    /// Create a new disk cache rooted at `base_path`
    pub fn new(base_path: PathBuf, max_bytes: u64) -> Self {
        Self {
            base_path,
            max_bytes,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a key
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.base_path.join(file_name_for(key))
    }

    /// Ensure the cache directory exists
    async fn ensure_dir(&self) -> CedeResult<()> {
        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            CedeError::CacheWrite {
                key_body: String::new(),
                message: format!(
                    "creating cache directory {}: {}",
                    self.base_path.display(),
                    e
                ),
            }
        })
    }

    /// Erase the oldest entries until the directory fits in `max_bytes`.
    ///
    /// `keep` is never evicted. Best-effort: failures are logged only.
    async fn enforce_bound(&self, keep: &Path) {
        let mut entries = match self.list_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to scan cache directory: {}", e);
                return;
            }
        };

        let mut total: u64 = entries.iter().map(|(_, len, _)| len).sum();
        if total <= self.max_bytes {
            return;
        }

        entries.sort_by_key(|(_, _, modified)| *modified);
        for (path, len, _) in entries {
            if total <= self.max_bytes {
                break;
            }
            if path == keep {
                continue;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Evicted cache entry {}", path.display());
                    total = total.saturating_sub(len);
                }
                Err(e) => warn!("Failed to evict cache entry {}: {}", path.display(), e),
            }
        }
    }

    /// Cache entries as (path, size, modified), skipping temp files
    async fn list_entries(&self) -> std::io::Result<Vec<(PathBuf, u64, SystemTime)>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = dir.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((entry.path(), metadata.len(), modified));
        }

        Ok(entries)
    }
}

/// Per-process sequence for temp file names
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Map a key to a file name inside the cache directory
fn file_name_for(key: &str) -> String {
    let safe = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if safe {
        key.to_string()
    } else {
        format!("~{}", hex::encode(Sha256::digest(key.as_bytes())))
    }
}

#[async_trait]
impl CacheStore for DiskCache {
    async fn has(&self, key: &str) -> bool {
        fs::metadata(self.entry_path(key)).await.is_ok()
    }

    async fn read(&self, key: &str) -> CedeResult<Vec<u8>> {
        let path = self.entry_path(key);

        let failure = match fs::read(&path).await {
            Ok(data) if !data.is_empty() => return Ok(data),
            Ok(_) => "empty entry".to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CedeError::CacheRead(format!("no entry for {}", key)));
            }
            Err(e) => e.to_string(),
        };

        warn!("Erasing corrupt cache entry for {}: {}", key, failure);
        if let Err(e) = self.erase(key).await {
            warn!("Failed to erase cache entry for {}: {}", key, e);
        }
        Err(CedeError::CacheRead(format!("{}: {}", key, failure)))
    }

    async fn write(&self, key: &str, value: &[u8]) -> CedeResult<()> {
        self.ensure_dir().await?;

        let path = self.entry_path(key);
        // Unique per writer, so concurrent writes of one key never share a temp file
        let tmp_path = self.base_path.join(format!(
            ".{}.{}.{}.tmp",
            file_name_for(key),
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let write_error = |e: std::io::Error| CedeError::CacheWrite {
            key_body: String::new(),
            message: format!("{}: {}", key, e),
        };

        fs::write(&tmp_path, value).await.map_err(write_error)?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(write_error(e));
        }

        self.enforce_bound(&path).await;
        Ok(())
    }

    async fn is_expired(&self, key: &str, ttl_secs: u64) -> bool {
        let modified = match fs::metadata(self.entry_path(key)).await {
            Ok(metadata) => match metadata.modified() {
                Ok(modified) => modified,
                Err(_) => return false,
            },
            Err(_) => return false,
        };

        let written_at: DateTime<Utc> = modified.into();
        match i64::try_from(ttl_secs).ok().and_then(TimeDelta::try_seconds) {
            Some(ttl) => written_at
                .checked_add_signed(ttl)
                .map_or(false, |expiry| expiry < Utc::now()),
            None => false,
        }
    }

    async fn erase(&self, key: &str) -> CedeResult<()> {
        let path = self.entry_path(key);

        let result = match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&path).await,
            Ok(_) => fs::remove_file(&path).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CedeError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn cache_in(dir: &Path) -> DiskCache {
        DiskCache::new(dir.join("cache"), 64 * 1024)
    }

    fn age_entry(cache: &DiskCache, key: &str, age: Duration) {
        let file = std::fs::File::options()
            .write(true)
            .open(cache.entry_path(key))
            .unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_write_and_read_entry() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        assert!(!cache.has("alice").await);
        cache.write("alice", b"ssh-ed25519 AAAA alice").await.unwrap();

        assert!(cache.has("alice").await);
        assert_eq!(cache.read("alice").await.unwrap(), b"ssh-ed25519 AAAA alice");
    }

    #[tokio::test]
    async fn test_overwrite_entry() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.write("alice", b"old").await.unwrap();
        cache.write("alice", b"new").await.unwrap();

        assert_eq!(cache.read("alice").await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_read_missing_entry() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        let err = cache.read("nobody").await.unwrap_err();
        assert!(matches!(err, CedeError::CacheRead(_)));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_erased_on_read() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.write("alice", b"key").await.unwrap();
        std::fs::write(cache.entry_path("alice"), b"").unwrap();

        let err = cache.read("alice").await.unwrap_err();
        assert!(matches!(err, CedeError::CacheRead(_)));
        assert!(!cache.has("alice").await);
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_erased_on_read() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        std::fs::create_dir_all(cache.entry_path("alice")).unwrap();
        assert!(cache.has("alice").await);

        assert!(cache.read("alice").await.is_err());
        assert!(!cache.has("alice").await);
    }

    #[tokio::test]
    async fn test_expiry_uses_modification_time() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.write("alice", b"key").await.unwrap();
        assert!(!cache.is_expired("alice", 60).await);

        age_entry(&cache, "alice", Duration::from_secs(120));
        assert!(cache.is_expired("alice", 60).await);
        assert!(!cache.is_expired("alice", 600).await);
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_expired() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        assert!(!cache.is_expired("nobody", 0).await);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.write("alice", b"key").await.unwrap();
        age_entry(&cache, "alice", Duration::from_secs(120));

        assert!(!cache.is_expired("alice", 10_000_000_000_000).await);
        assert!(!cache.is_expired("alice", u64::MAX).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_of_one_key() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        let mut handles = Vec::new();
        for writer in 0..8u8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let value = vec![b'a' + writer; 2000];
                let mut failures = 0;
                for _ in 0..100 {
                    if cache.write("alice", &value).await.is_err() {
                        failures += 1;
                    }
                }
                failures
            }));
        }

        let mut failures = 0;
        for handle in handles {
            failures += handle.await.unwrap();
        }
        assert_eq!(failures, 0);

        // Last writer wins with a whole value
        let stored = cache.read("alice").await.unwrap();
        assert_eq!(stored.len(), 2000);
        assert!(stored.iter().all(|b| *b == stored[0]));

        // No temp files left behind
        let leftovers = std::fs::read_dir(cache.base_path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_erase_entry() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        cache.write("alice", b"key").await.unwrap();
        cache.erase("alice").await.unwrap();
        assert!(!cache.has("alice").await);

        // Erasing again is fine
        cache.erase("alice").await.unwrap();
    }

    #[tokio::test]
    async fn test_unsafe_keys_are_hashed() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());

        for key in ["../escape", "a/b", ".hidden", "bob@example.com", ""] {
            let path = cache.entry_path(key);
            assert_eq!(path.parent(), Some(cache.base_path()), "{}", key);
            assert!(path.file_name().unwrap().to_string_lossy().starts_with('~'));
        }

        cache.write("../escape", b"key").await.unwrap();
        assert_eq!(cache.read("../escape").await.unwrap(), b"key");
        assert!(!dir.path().join("escape").exists());
    }

    #[tokio::test]
    async fn test_oldest_entries_evicted_over_bound() {
        let dir = tempdir().unwrap();
        let cache = DiskCache::new(dir.path().join("cache"), 10);

        cache.write("old", b"123456").await.unwrap();
        age_entry(&cache, "old", Duration::from_secs(300));
        cache.write("new", b"abcdef").await.unwrap();

        assert!(!cache.has("old").await);
        assert_eq!(cache.read("new").await.unwrap(), b"abcdef");
    }
}
