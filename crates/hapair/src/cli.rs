//! Clap derive structures for the `hapair` CLI.
//!
//! Also compiled by `build.rs` for man page generation, so this module
//! depends on nothing but clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hapair -- deploy a firewall HA pair through the device XML API
#[derive(Debug, Parser)]
#[command(
    name = "hapair",
    version,
    about = "Deploy a firewall HA pair through the device XML API",
    long_about = "Takes two firewalls from factory defaults to a synchronized\n\
        active-passive HA pair: HA interfaces, HA group, role election,\n\
        firewall configuration on the active device, commit and sync.",
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
    /// Configuration file (default: platform config dir, hapair/config.toml)
    #[arg(long, short = 'c', env = "HAPAIR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HAPAIR_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "HAPAIR_INSECURE", global = true)]
    pub insecure: bool,

    /// Per-request timeout in seconds (overrides config)
    #[arg(long, env = "HAPAIR_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Abort the whole run after this many seconds (overrides config)
    #[arg(long, env = "HAPAIR_DEADLINE", global = true)]
    pub deadline: Option<u64>,

    /// Also write logs to this file
    #[arg(long, env = "HAPAIR_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,
}

// ── Output, Color & Log Enums ────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Deployment stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageArg {
    /// Issue API keys on both devices
    Authenticate,
    /// Mark the HA1/HA2 ports as HA interfaces
    HaInterfaces,
    /// Push and activate the HA group
    HaGroup,
    /// Wait for one active and one passive device
    ResolveRoles,
    /// Apply the firewall payloads to the active device
    FirewallConfig,
    /// Commit on the active device and wait for peer sync
    CommitSync,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the deployment, or a contiguous range of its stages
    Run(RunArgs),

    /// Run a single stage (authentication and role resolution are added as needed)
    Stage(StageArgs),

    /// Show HA state, HA interfaces, and sync status of both devices
    #[command(alias = "status")]
    Discover,

    /// Show the HA settings each device will receive, without contacting them
    Plan,

    /// Inspect configuration and store credentials
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// First stage to run
    #[arg(long, value_enum, default_value = "authenticate")]
    pub from: StageArg,

    /// Last stage to run
    #[arg(long, value_enum, default_value = "commit-sync")]
    pub to: StageArg,
}

#[derive(Debug, Args)]
pub struct StageArgs {
    /// Stage to run
    #[arg(value_enum)]
    pub stage: StageArg,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration (password masked)
    Show,

    /// Print the default configuration file location
    Path,

    /// Store the management password in the system keyring
    SetPassword {
        /// Username to store the password for (default: from config)
        #[arg(long, short = 'u')]
        username: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
