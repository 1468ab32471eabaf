/// Email-shaped directory identities: parsing, domain filtering and lookup
use crate::{
    directory::Identity,
    error::{CedeError, CedeResult},
};
use tracing::warn;

/// Split `local@domain` into its two parts.
///
/// Anything other than exactly one `@` with text on both sides is a parse error.
fn split_address(address: &str) -> CedeResult<(&str, &str)> {
    let mut parts = address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty() => {
            Ok((local, domain))
        }
        _ => Err(CedeError::Parse(address.to_string())),
    }
}

/// Domain part of an address
pub fn domain_of(address: &str) -> CedeResult<&str> {
    split_address(address).map(|(_, domain)| domain)
}

/// Local (username) part of an address
pub fn username_of(address: &str) -> CedeResult<&str> {
    split_address(address).map(|(local, _)| local)
}

/// Keep the addresses whose domain is allowed, in directory order.
///
/// Identities that are not email-shaped (service accounts) are skipped.
pub fn filter_by_domains(identities: &[Identity], allowed_domains: &[String]) -> Vec<String> {
    identities
        .iter()
        .filter_map(|identity| match domain_of(&identity.address) {
            Ok(domain) if allowed_domains.iter().any(|d| d == domain) => {
                Some(identity.address.clone())
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Skipping directory identity: {}", e);
                None
            }
        })
        .collect()
}

/// Find the first address whose local part equals `username`, ignoring case.
///
/// The domain is not considered: `bob@a.com` and `bob@b.com` both match `bob`
/// and whichever comes first wins.
pub fn find_by_username<'a>(addresses: &'a [String], username: &str) -> Option<&'a str> {
    addresses
        .iter()
        .map(String::as_str)
        .find(|address| match username_of(address) {
            Ok(local) => local.to_lowercase() == username.to_lowercase(),
            Err(_) => false,
        })
}
