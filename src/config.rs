/// Configuration management for cede
use crate::error::{CedeError, CedeResult};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the policy file location
pub const CONFIG_PATH_ENV: &str = "CEDE_CONFIG_PATH";

/// Policy file location when no override is set
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cede/cede.conf";

/// Cache directory when `CEDE_CACHE_PATH` is unset
pub const DEFAULT_CACHE_PATH: &str = "/tmp/cede-cache";

/// On-disk cache footprint when `CEDE_CACHE_MAX_BYTES` is unset
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 64 * 1024;

/// Cache lifetime in seconds when the policy omits `cacheLifeTime`
pub const DEFAULT_CACHE_LIFETIME: u64 = 300;

/// Organization authorization policy, loaded from YAML
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Email domains whose directory users may receive keys
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Users handled out of band; key lookup is a silent no-op for them
    #[serde(default)]
    pub external_users: Vec<String>,

    /// Directory groups listed by `get-users`, in order
    #[serde(default)]
    pub groups: Vec<Group>,

    /// Cache freshness window in seconds
    #[serde(default = "default_cache_lifetime")]
    pub cache_life_time: u64,
}

/// A configured directory group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(rename = "superuser", default)]
    pub is_superuser: bool,
}

fn default_cache_lifetime() -> u64 {
    DEFAULT_CACHE_LIFETIME
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            external_users: Vec::new(),
            groups: Vec::new(),
            cache_life_time: DEFAULT_CACHE_LIFETIME,
        }
    }
}

impl Policy {
    /// Parse a policy document
    pub fn from_yaml(yaml: &str) -> CedeResult<Self> {
        let policy: Policy = serde_yaml::from_str(yaml)
            .map_err(|e| CedeError::Config(format!("unmarshalling config: {}", e)))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read and parse the policy file at `path`
    pub fn read(path: &Path) -> CedeResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CedeError::Config(format!("reading config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Policy file path from `CEDE_CONFIG_PATH`, else the default path
    pub fn path_from_env() -> PathBuf {
        match env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Validate policy contents
    pub fn validate(&self) -> CedeResult<()> {
        if self.allowed_domains.iter().any(|d| d.trim().is_empty()) {
            return Err(CedeError::Config(
                "allowedDomains cannot contain empty entries".to_string(),
            ));
        }

        if self.groups.iter().any(|g| g.name.trim().is_empty()) {
            return Err(CedeError::Config("group name cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Whether `username` is on the external-user bypass list (exact match)
    pub fn is_external_user(&self, username: &str) -> bool {
        self.external_users.iter().any(|u| u == username)
    }
}

/// Process-level settings that are not part of the policy
#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub cache_path: PathBuf,
    pub cache_max_bytes: u64,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> CedeResult<Self> {
        dotenv::dotenv().ok();

        let config_path = Policy::path_from_env();
        let cache_path = env::var("CEDE_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_PATH));
        let cache_max_bytes = match env::var("CEDE_CACHE_MAX_BYTES") {
            Ok(value) => value.parse().map_err(|_| {
                CedeError::Config(format!("invalid CEDE_CACHE_MAX_BYTES: {}", value))
            })?,
            Err(_) => DEFAULT_CACHE_MAX_BYTES,
        };

        Ok(Settings {
            config_path,
            cache_path,
            cache_max_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_policy() {
        let yaml = r#"
allowedDomains:
  - example.com
  - corp.example.org
externalUsers:
  - contractor
groups:
  - name: admins
    superuser: true
  - name: developers
cacheLifeTime: 60
"#;
        let policy = Policy::from_yaml(yaml).unwrap();

        assert_eq!(policy.allowed_domains, vec!["example.com", "corp.example.org"]);
        assert_eq!(policy.external_users, vec!["contractor"]);
        assert_eq!(
            policy.groups,
            vec![
                Group { name: "admins".to_string(), is_superuser: true },
                Group { name: "developers".to_string(), is_superuser: false },
            ]
        );
        assert_eq!(policy.cache_life_time, 60);
    }

    #[test]
    fn test_missing_fields_default() {
        let policy = Policy::from_yaml("allowedDomains: [example.com]").unwrap();

        assert!(policy.external_users.is_empty());
        assert!(policy.groups.is_empty());
        assert_eq!(policy.cache_life_time, DEFAULT_CACHE_LIFETIME);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = Policy::from_yaml("allowedDomains: {not: [a list").unwrap_err();
        assert!(matches!(err, CedeError::Config(_)));
    }

    #[test]
    fn test_empty_group_name_rejected() {
        let err = Policy::from_yaml("groups:\n  - name: \"\"\n").unwrap_err();
        assert!(matches!(err, CedeError::Config(_)));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Policy::read(&dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(err, CedeError::Config(_)));
    }

    #[test]
    fn test_external_user_exact_match() {
        let policy = Policy {
            external_users: vec!["Contractor".to_string()],
            ..Default::default()
        };

        assert!(policy.is_external_user("Contractor"));
        assert!(!policy.is_external_user("contractor"));
    }
}
