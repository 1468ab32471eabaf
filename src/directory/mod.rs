/// Identity Directory
///
/// Typed access to the external user/group/key store. The resolver and
/// enumerator only see the `Directory` trait; `IamDirectory` talks to AWS IAM
/// and `MemoryDirectory` serves fixed data for tests and local runs.

pub mod iam;
pub mod memory;

pub use iam::IamDirectory;
pub use memory::MemoryDirectory;

use crate::error::CedeResult;
use async_trait::async_trait;

/// A directory user, conceptually `local@domain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub address: String,
}

impl Identity {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Whether a key may be disclosed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Inactive,
}

/// Key metadata as listed by the directory (no body)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub id: String,
    pub status: KeyStatus,
}

impl KeyRecord {
    pub fn new(id: impl Into<String>, status: KeyStatus) -> Self {
        Self {
            id: id.into(),
            status,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// Identity provider operations
///
/// Every method is a blocking network round-trip from the caller's point of
/// view. Implementations return `CedeError::Directory` on failure and do not
/// retry at this layer.
#[async_trait]
pub trait Directory: Send + Sync {
    /// All users, in directory order
    async fn list_users(&self) -> CedeResult<Vec<Identity>>;

    /// Key ids and status for one user, in directory order
    async fn list_keys(&self, address: &str) -> CedeResult<Vec<KeyRecord>>;

    /// Key body for one key id
    async fn fetch_key_body(&self, address: &str, key_id: &str) -> CedeResult<String>;

    /// Members of a group, in directory order
    async fn list_group_members(&self, group_name: &str) -> CedeResult<Vec<Identity>>;
}

/// First active key in directory order
pub fn first_active_key(keys: &[KeyRecord]) -> Option<&KeyRecord> {
    keys.iter().find(|key| key.is_active())
}
