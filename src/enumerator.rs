/// User Enumerator - members of the configured groups
use crate::{
    config::Policy,
    directory::Directory,
    error::{CedeError, CedeResult},
};
use std::collections::HashSet;
use tracing::debug;

/// List the members of every configured group, in policy order.
///
/// Members are deduplicated by exact address, first occurrence wins. Any
/// failing group lookup aborts the whole listing; there are no partial
/// results.
pub async fn enumerate_users(directory: &dyn Directory, policy: &Policy) -> CedeResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut users = Vec::new();

    for group in &policy.groups {
        let members = directory
            .list_group_members(&group.name)
            .await
            .map_err(|e| match e {
                CedeError::Directory(message) => CedeError::Directory(format!(
                    "getting group {}: {}",
                    group.name, message
                )),
                other => other,
            })?;

        debug!("Group {} has {} members", group.name, members.len());
        for member in members {
            if seen.insert(member.address.clone()) {
                users.push(member.address);
            }
        }
    }

    Ok(users)
}
