/// AWS IAM directory backend
use crate::{
    directory::{Directory, Identity, KeyRecord, KeyStatus},
    error::{CedeError, CedeResult},
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_iam::error::DisplayErrorContext;
use aws_sdk_iam::types::{EncodingType, StatusType};
use aws_sdk_iam::Client;
use tracing::{debug, info};

/// IAM-backed directory
///
/// IAM user names are expected to be email addresses; SSH keys are the
/// per-user public keys uploaded for CodeCommit/EC2 Instance Connect.
#[derive(Clone)]
pub struct IamDirectory {
    client: Client,
}

impl IamDirectory {
    /// Build a client from the ambient AWS configuration
    /// (environment, profile, instance metadata).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        info!(
            "Initializing IAM directory (region: {})",
            config
                .region()
                .map(|r| r.as_ref().to_string())
                .unwrap_or_else(|| "global".to_string())
        );
        Self::new(Client::new(&config))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn directory_error<E>(operation: &str, err: E) -> CedeError
where
    E: std::error::Error,
{
    CedeError::Directory(format!("{}: {}", operation, DisplayErrorContext(&err)))
}

fn key_status(status: &StatusType) -> KeyStatus {
    match status {
        StatusType::Active => KeyStatus::Active,
        _ => KeyStatus::Inactive,
    }
}

#[async_trait]
impl Directory for IamDirectory {
    async fn list_users(&self) -> CedeResult<Vec<Identity>> {
        let mut users = Vec::new();
        let mut pages = self.client.list_users().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| directory_error("ListUsers", e))?;
            users.extend(page.users().iter().map(|u| Identity::new(u.user_name())));
        }

        debug!("ListUsers returned {} users", users.len());
        Ok(users)
    }

    async fn list_keys(&self, address: &str) -> CedeResult<Vec<KeyRecord>> {
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_ssh_public_keys()
            .user_name(address)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| directory_error("ListSSHPublicKeys", e))?;
            keys.extend(
                page.ssh_public_keys()
                    .iter()
                    .map(|k| KeyRecord::new(k.ssh_public_key_id(), key_status(k.status()))),
            );
        }

        Ok(keys)
    }

    async fn fetch_key_body(&self, address: &str, key_id: &str) -> CedeResult<String> {
        let output = self
            .client
            .get_ssh_public_key()
            .user_name(address)
            .ssh_public_key_id(key_id)
            .encoding(EncodingType::Ssh)
            .send()
            .await
            .map_err(|e| directory_error("GetSSHPublicKey", e))?;

        output
            .ssh_public_key()
            .map(|key| key.ssh_public_key_body().to_string())
            .ok_or_else(|| {
                CedeError::Directory(format!(
                    "GetSSHPublicKey: empty response for key {} of user={}",
                    key_id, address
                ))
            })
    }

    async fn list_group_members(&self, group_name: &str) -> CedeResult<Vec<Identity>> {
        let mut members = Vec::new();
        let mut pages = self
            .client
            .get_group()
            .group_name(group_name)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| directory_error("GetGroup", e))?;
            members.extend(page.users().iter().map(|u| Identity::new(u.user_name())));
        }

        Ok(members)
    }
}
