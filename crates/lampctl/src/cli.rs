//! Clap derive structures for the `lampctl` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use lampctl_core::Owner;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// lampctl -- control and provision networked lamps
#[derive(Debug, Parser)]
#[command(
    name = "lampctl",
    version,
    about = "Control networked lamps and provision their WiFi",
    long_about = "Talks to a lamp's WebSocket server to switch it on and off and to\n\
        watch its pairing state, and pushes WiFi credentials to the lamp over ssh.",
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
    /// Act as this owner instead of the saved preference
    #[arg(long, value_name = "arni|ian", global = true)]
    pub owner: Option<Owner>,

    /// Lamp WebSocket address (overrides config)
    #[arg(long, short = 'a', value_name = "URL", global = true)]
    pub address: Option<String>,

    /// Config file to use
    #[arg(long, env = "LAMPCTL_CONFIG", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Switch the lamp on or off
    Power(PowerArgs),

    /// Print lamp state changes until the session ends
    Watch,

    /// List WiFi networks in range
    Scan(ScanArgs),

    /// Push WiFi credentials to the lamp
    Provision(ProvisionArgs),

    /// Manage the saved owner preference
    Owner(OwnerArgs),
}

// ── Power ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PowerArgs {
    #[command(subcommand)]
    pub command: PowerCommand,
}

#[derive(Debug, Subcommand)]
pub enum PowerCommand {
    /// Turn the lamp on
    On {
        /// Wait up to SECS for the peer lamp to confirm pairing
        #[arg(long, value_name = "SECS")]
        wait_paired: Option<u64>,
    },

    /// Turn the lamp off
    Off,
}

// ── Scan ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Scan from the lamp's radio over ssh instead of this machine's
    #[arg(long)]
    pub remote: bool,

    /// Provisioning host (overrides config)
    #[arg(long)]
    pub host: Option<String>,
}

// ── Provision ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Network name; prompts with a scan when omitted
    #[arg(long)]
    pub ssid: Option<String>,

    /// The network has no password
    #[arg(long)]
    pub open: bool,

    /// Discover networks from the lamp's radio when prompting
    #[arg(long)]
    pub remote_scan: bool,

    /// Provisioning host (overrides config)
    #[arg(long)]
    pub host: Option<String>,
}

// ── Owner ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OwnerArgs {
    #[command(subcommand)]
    pub command: OwnerCommand,
}

#[derive(Debug, Subcommand)]
pub enum OwnerCommand {
    /// Print the saved owner
    Show,

    /// Save an owner preference
    Set {
        #[arg(value_name = "arni|ian")]
        owner: Owner,
    },

    /// Forget the saved owner
    Clear,
}
