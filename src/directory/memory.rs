/// In-memory directory backend
///
/// Serves a fixed set of users, keys and groups. Every call is counted so
/// callers can assert how often the directory was consulted, and any
/// operation can be switched to fail.
use crate::{
    directory::{Directory, Identity, KeyRecord, KeyStatus},
    error::{CedeError, CedeResult},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Directory operations, for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListUsers,
    ListKeys,
    FetchKeyBody,
    ListGroupMembers,
}

#[derive(Default)]
struct Counters {
    list_users: AtomicUsize,
    list_keys: AtomicUsize,
    fetch_key_body: AtomicUsize,
    list_group_members: AtomicUsize,
}

#[derive(Debug, Clone)]
struct StoredKey {
    record: KeyRecord,
    body: String,
}

/// In-memory `Directory`
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    users: Vec<Identity>,
    keys: HashMap<String, Vec<StoredKey>>,
    groups: HashMap<String, Vec<Identity>>,
    failing: Arc<Mutex<HashSet<Operation>>>,
    failing_groups: HashSet<String>,
    counters: Arc<Counters>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with no keys
    pub fn with_user(mut self, address: &str) -> Self {
        self.users.push(Identity::new(address));
        self
    }

    /// Add a key to a user, registering the user if needed
    pub fn with_key(mut self, address: &str, id: &str, status: KeyStatus, body: &str) -> Self {
        if !self.users.iter().any(|u| u.address == address) {
            self.users.push(Identity::new(address));
        }
        self.keys
            .entry(address.to_string())
            .or_default()
            .push(StoredKey {
                record: KeyRecord::new(id, status),
                body: body.to_string(),
            });
        self
    }

    /// Add a group with the given members
    pub fn with_group(mut self, name: &str, members: &[&str]) -> Self {
        self.groups.insert(
            name.to_string(),
            members.iter().map(|m| Identity::new(*m)).collect(),
        );
        self
    }

    /// Make lookups of one group fail
    pub fn with_failing_group(mut self, name: &str) -> Self {
        self.failing_groups.insert(name.to_string());
        self
    }

    /// Make every call to `operation` fail from now on
    pub fn fail(&self, operation: Operation) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(operation);
        }
    }

    /// Number of calls made to `operation` so far
    pub fn calls(&self, operation: Operation) -> usize {
        self.counter(operation).load(Ordering::SeqCst)
    }

    /// Total number of directory calls so far
    pub fn total_calls(&self) -> usize {
        [
            Operation::ListUsers,
            Operation::ListKeys,
            Operation::FetchKeyBody,
            Operation::ListGroupMembers,
        ]
        .into_iter()
        .map(|op| self.calls(op))
        .sum()
    }

    fn counter(&self, operation: Operation) -> &AtomicUsize {
        match operation {
            Operation::ListUsers => &self.counters.list_users,
            Operation::ListKeys => &self.counters.list_keys,
            Operation::FetchKeyBody => &self.counters.fetch_key_body,
            Operation::ListGroupMembers => &self.counters.list_group_members,
        }
    }

    fn enter(&self, operation: Operation) -> CedeResult<()> {
        self.counter(operation).fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(&operation))
            .unwrap_or(false);
        if failing {
            return Err(CedeError::Directory(format!("{:?} unavailable", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn list_users(&self) -> CedeResult<Vec<Identity>> {
        self.enter(Operation::ListUsers)?;
        Ok(self.users.clone())
    }

    async fn list_keys(&self, address: &str) -> CedeResult<Vec<KeyRecord>> {
        self.enter(Operation::ListKeys)?;
        Ok(self
            .keys
            .get(address)
            .map(|keys| keys.iter().map(|k| k.record.clone()).collect())
            .unwrap_or_default())
    }

    async fn fetch_key_body(&self, address: &str, key_id: &str) -> CedeResult<String> {
        self.enter(Operation::FetchKeyBody)?;
        self.keys
            .get(address)
            .and_then(|keys| keys.iter().find(|k| k.record.id == key_id))
            .map(|k| k.body.clone())
            .ok_or_else(|| {
                CedeError::Directory(format!("no key {} for user={}", key_id, address))
            })
    }

    async fn list_group_members(&self, group_name: &str) -> CedeResult<Vec<Identity>> {
        self.enter(Operation::ListGroupMembers)?;
        if self.failing_groups.contains(group_name) {
            return Err(CedeError::Directory(format!(
                "group {} unavailable",
                group_name
            )));
        }
        self.groups
            .get(group_name)
            .cloned()
            .ok_or_else(|| CedeError::Directory(format!("no such group: {}", group_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_keys_in_insertion_order() {
        let directory = MemoryDirectory::new()
            .with_key("bob@example.com", "K0", KeyStatus::Inactive, "ssh-ed25519 AAAA0")
            .with_key("bob@example.com", "K1", KeyStatus::Active, "ssh-ed25519 AAAA1");

        let keys = directory.list_keys("bob@example.com").await.unwrap();
        let ids: Vec<&str> = keys.iter().map(|k| k.id.as_str()).collect();
        assert_eq!(ids, vec!["K0", "K1"]);

        let body = directory.fetch_key_body("bob@example.com", "K1").await.unwrap();
        assert_eq!(body, "ssh-ed25519 AAAA1");
        assert_eq!(directory.users.len(), 1);
    }

    #[tokio::test]
    async fn test_counts_and_fails_calls() {
        let directory = MemoryDirectory::new().with_user("alice@example.com");

        directory.list_users().await.unwrap();
        directory.fail(Operation::ListUsers);
        let err = directory.list_users().await.unwrap_err();

        assert!(matches!(err, CedeError::Directory(_)));
        assert_eq!(directory.calls(Operation::ListUsers), 2);
        assert_eq!(directory.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let directory = MemoryDirectory::new().with_group("admins", &["alice@example.com"]);
        let clone = directory.clone();

        clone.list_group_members("admins").await.unwrap();
        assert_eq!(directory.calls(Operation::ListGroupMembers), 1);
    }
}
