/// cede - SSH public keys from an identity directory
///
/// Resolves a user's active SSH public key from the directory, subject to the
/// organization policy (allowed email domains, external users), with a local
/// on-disk cache in front of the directory. Intended for use as sshd's
/// `AuthorizedKeysCommand`.

pub mod address;
pub mod cache;
pub mod cli;
pub mod config;
pub mod directory;
pub mod enumerator;
pub mod error;
pub mod resolver;

pub use error::{CedeError, CedeResult};
