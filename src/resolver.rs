/// Key Resolver - authorization, cache lookup and directory fallback for one user
use crate::{
    address,
    cache::CacheStore,
    config::Policy,
    directory::{first_active_key, Directory},
    error::{CedeError, CedeResult},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// External user; handled out of band, nothing to print
    Bypassed,
    /// Fresh key body from the local cache
    Cached(String),
    /// Key body fetched from the directory and written to the cache
    Fetched(String),
}

impl Resolution {
    /// Key body to disclose, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Resolution::Bypassed => None,
            Resolution::Cached(key) | Resolution::Fetched(key) => Some(key),
        }
    }
}

/// Resolves a username to its SSH public key
///
/// Holds the directory and cache handles; the policy is supplied per call.
#[derive(Clone)]
pub struct KeyResolver {
    directory: Arc<dyn Directory>,
    cache: Arc<dyn CacheStore>,
}

impl KeyResolver {
    pub fn new(directory: Arc<dyn Directory>, cache: Arc<dyn CacheStore>) -> Self {
        Self { directory, cache }
    }

    /// Resolve `username` to a key body
    ///
    /// Resolution order:
    /// 1. External users short-circuit with no output
    /// 2. A fresh cache entry is returned as-is
    /// 3. Otherwise the directory is searched and the key cached
    ///
    /// A user outside the allowed domains is reported exactly like a user
    /// missing from the directory.
    pub async fn resolve(&self, username: &str, policy: &Policy) -> CedeResult<Resolution> {
        if policy.is_external_user(username) {
            debug!("user={} is external, skipping key lookup", username);
            return Ok(Resolution::Bypassed);
        }

        if let Some(key) = self.from_cache(username, policy.cache_life_time).await {
            return Ok(Resolution::Cached(key));
        }

        self.from_directory(username, policy)
            .await
            .map(Resolution::Fetched)
    }

    /// Fresh cached key, or `None` on a miss, expiry or unreadable entry
    async fn from_cache(&self, username: &str, ttl_secs: u64) -> Option<String> {
        if !self.cache.has(username).await {
            debug!("Cache miss for user={}", username);
            return None;
        }

        if self.cache.is_expired(username, ttl_secs).await {
            debug!("Cache entry for user={} expired", username);
            return None;
        }

        let bytes = match self.cache.read(username).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Cache read for user={} failed: {}", username, e);
                return None;
            }
        };

        match String::from_utf8(bytes) {
            Ok(key) => {
                debug!("Cache hit for user={}", username);
                Some(key)
            }
            Err(_) => {
                warn!("Erasing non-UTF-8 cache entry for user={}", username);
                if let Err(e) = self.cache.erase(username).await {
                    warn!("Failed to erase cache entry for user={}: {}", username, e);
                }
                None
            }
        }
    }

    /// Look the user up in the directory and cache the first active key
    async fn from_directory(&self, username: &str, policy: &Policy) -> CedeResult<String> {
        let users = self.directory.list_users().await.map_err(|e| match e {
            CedeError::Directory(message) => {
                CedeError::Directory(format!("getting users: {}", message))
            }
            other => other,
        })?;

        let allowed = address::filter_by_domains(&users, &policy.allowed_domains);
        let address = address::find_by_username(&allowed, username).ok_or_else(|| {
            CedeError::NotFound(format!("user={} not present in directory", username))
        })?;

        let keys = self.directory.list_keys(address).await?;
        let key = first_active_key(&keys)
            .ok_or_else(|| CedeError::NotFound(format!("no key for user={}", username)))?;

        info!("Fetching key {} for user={} from directory", key.id, address);
        let body = self.directory.fetch_key_body(address, &key.id).await?;

        if let Err(e) = self.cache.write(username, body.as_bytes()).await {
            let message = match e {
                CedeError::CacheWrite { message, .. } => message,
                other => other.to_string(),
            };
            return Err(CedeError::CacheWrite {
                key_body: body,
                message,
            });
        }

        Ok(body)
    }
}
