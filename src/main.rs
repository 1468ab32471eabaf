/// cede - print SSH public keys and group members from the identity directory
use cede::cache::DiskCache;
use cede::cli::{self, Cli, Command, Invocation};
use cede::config::{Policy, Settings};
use cede::directory::IamDirectory;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let command = match Cli::parse_args(std::env::args_os()) {
        Ok(Invocation::Run(command)) => command,
        Ok(Invocation::Display(text)) => {
            print!("{}", text);
            return ExitCode::SUCCESS;
        }
        Err(e) => return fail(&anyhow::Error::from(e)),
    };

    // stdout carries key material for sshd, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cede=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let policy = Policy::read(&settings.config_path)?;

    let directory = Arc::new(IamDirectory::from_env().await);
    let cache = Arc::new(DiskCache::new(settings.cache_path, settings.cache_max_bytes));

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    cli::execute(&command, &policy, directory, cache, &mut out).await
}

fn fail(err: &anyhow::Error) -> ExitCode {
    println!("cede: {:#}", err);
    ExitCode::FAILURE
}
