/// Key Cache
///
/// Local persistent store for fetched key bodies, keyed by username. Freshness
/// comes from the entry's last-write time on the backing store, so the payload
/// is stored as-is with no embedded metadata.

pub mod disk;

pub use disk::DiskCache;

use crate::error::CedeResult;
use async_trait::async_trait;

/// Cache backend trait
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check if an entry exists
    async fn has(&self, key: &str) -> bool;

    /// Read an entry.
    ///
    /// Fails with `CacheRead` if the entry is absent or corrupt. A corrupt
    /// entry is erased before returning.
    async fn read(&self, key: &str) -> CedeResult<Vec<u8>>;

    /// Create or overwrite an entry
    async fn write(&self, key: &str, value: &[u8]) -> CedeResult<()>;

    /// Whether the entry was last written more than `ttl_secs` seconds ago.
    ///
    /// An entry whose timestamp cannot be read is not considered expired.
    async fn is_expired(&self, key: &str, ttl_secs: u64) -> bool;

    /// Remove an entry; removing a missing entry succeeds
    async fn erase(&self, key: &str) -> CedeResult<()>;
}
