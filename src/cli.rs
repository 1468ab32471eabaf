/// Command-line surface: argument parsing and command execution
use crate::{
    cache::CacheStore,
    config::Policy,
    directory::Directory,
    enumerator::enumerate_users,
    error::{CedeError, CedeResult},
    resolver::KeyResolver,
};
use anyhow::Context;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;

const COMMANDS: &str = "get-key, get-users, import-users";

#[derive(Parser, Debug)]
#[command(name = "cede")]
#[command(version, about = "Resolve SSH public keys from the identity directory")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the active public key of a user
    GetKey {
        /// Local part of the user's directory address
        username: String,
    },
    /// Print the members of the configured groups
    GetUsers,
    /// Import the configured users as local accounts
    ImportUsers,
}

/// What the process should do after parsing its arguments
#[derive(Debug)]
pub enum Invocation {
    Run(Command),
    /// Help or version text; print it and exit successfully
    Display(String),
}

impl Cli {
    /// Parse arguments, mapping every clap usage failure to `CedeError::Usage`
    pub fn parse_args<I, T>(args: I) -> CedeResult<Invocation>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        match Cli::try_parse_from(args) {
            Ok(cli) => Ok(Invocation::Run(cli.command)),
            Err(e) => match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    Ok(Invocation::Display(e.to_string()))
                }
                ErrorKind::MissingSubcommand
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Err(CedeError::Usage(
                    format!("missing command must be {}", COMMANDS),
                )),
                ErrorKind::MissingRequiredArgument => {
                    Err(CedeError::Usage("get-key: missing username".to_string()))
                }
                ErrorKind::InvalidSubcommand => Err(CedeError::Usage(format!(
                    "unknown command must be {}",
                    COMMANDS
                ))),
                ErrorKind::UnknownArgument => {
                    let message = match e.get(ContextKind::InvalidArg) {
                        Some(ContextValue::String(arg)) => format!("unexpected argument {}", arg),
                        _ => "unexpected argument".to_string(),
                    };
                    Err(CedeError::Usage(message))
                }
                _ => Err(CedeError::Usage(e.to_string())),
            },
        }
    }
}

/// Run one command against the given directory and cache, printing to `out`
pub async fn execute<W: Write>(
    command: &Command,
    policy: &Policy,
    directory: Arc<dyn Directory>,
    cache: Arc<dyn CacheStore>,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::GetKey { username } => {
            let resolver = KeyResolver::new(directory, cache);
            let resolution = resolver.resolve(username, policy).await?;
            if let Some(key) = resolution.key() {
                writeln!(out, "{}", key)?;
            }
        }
        Command::GetUsers => {
            let users = enumerate_users(directory.as_ref(), policy)
                .await
                .context("getting users from directory")?;
            for user in users {
                writeln!(out, "{}", user)?;
            }
        }
        Command::ImportUsers => {
            return Err(CedeError::Unsupported("import-users".to_string()).into());
        }
    }

    Ok(())
}
