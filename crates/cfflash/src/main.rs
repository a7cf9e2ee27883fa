mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

use cfflash_config::Config;
use cfflash_core::ReleaseCache;

use crate::cli::{Cli, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");
    commands::dispatch(cli.command, &cli.global).await
}

/// Load the config file selected by `--config`, or the platform default.
pub(crate) fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = match global.config {
        Some(ref path) => cfflash_config::load_config_from(path)?,
        None => cfflash_config::load_config()?,
    };
    Ok(cfg)
}

/// Build the release cache from config plus CLI overrides.
pub(crate) fn build_cache(global: &GlobalOpts) -> Result<ReleaseCache, CliError> {
    let mut cfg = load_config(global)?;
    if let Some(ref url) = global.index_url {
        cfg.release_index_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        cfg.request_timeout_secs = timeout;
    }

    let settings = cfg.release_settings()?;
    tracing::debug!(index = %settings.index_url, "using release index");
    Ok(ReleaseCache::from_settings(&settings, Handle::current())?)
}
