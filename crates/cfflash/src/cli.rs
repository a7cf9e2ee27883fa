//! Clap derive structures for the `cfflash` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use cfflash_core::Target;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cfflash -- Crazyflie firmware release and image tool
#[derive(Debug, Parser)]
#[command(
    name = "cfflash",
    version,
    about = "Fetch and inspect Crazyflie firmware releases",
    long_about = "Lists published Crazyflie firmware releases, downloads release\n\
        archives through a validated cache, and checks local .bin/.zip images\n\
        before they are handed to the bootloader.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CFFLASH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Release index URL (overrides config)
    #[arg(long, global = true)]
    pub index_url: Option<String>,

    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List published firmware releases
    #[command(alias = "ls")]
    Releases,

    /// Download a release archive
    Fetch(FetchArgs),

    /// Check a local firmware image
    Inspect(InspectArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

// ── Command Arguments ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Release label as shown by `cfflash releases`, e.g. "2024.2 - cf2"
    pub label: String,

    /// Destination directory or file
    #[arg(long, short = 'd', default_value = ".")]
    pub dest: PathBuf,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Path to a .bin or .zip image
    pub image: PathBuf,

    /// Restrict flashing to one target (stm32, nrf51)
    #[arg(long, short = 't')]
    pub target: Option<Target>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
