use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rtsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile vSphere VM inventory into RackTables", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output (name lists, per-VM plans)
    #[arg(short, long, alias = "silent", global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile the local export against RackTables and apply the changes
    Sync(SyncArgs),

    /// Reconcile and print the plan without writing anything
    Diff(DiffArgs),

    /// Dump the remote VM depot as JSON
    Export(ExportArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared arguments
// ============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// RackTables host (used to build the API URL when --api is not given)
    #[arg(short = 's', long)]
    pub host: Option<String>,

    /// Full api.php URL
    #[arg(short, long)]
    pub api: Option<String>,

    /// User name for HTTP basic auth
    #[arg(short, long)]
    pub user: Option<String>,

    /// Password (prompted for when omitted)
    #[arg(short, long, env = "RTSYNC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Config file (default: ~/.config/rtsync/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// vSphere export to reconcile
    #[arg(long, default_value = "getVMsWithPlacement.json")]
    pub jsonfile: PathBuf,

    /// Shape of the export
    #[arg(long, value_enum, default_value_t = LayoutArg::Flat)]
    pub layout: LayoutArg,

    /// Only reconcile VMs placed in this cluster
    #[arg(long)]
    pub only_cluster: Option<String>,

    /// Also remove remote addresses the export no longer lists
    #[arg(long)]
    pub prune_ips: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// { vm: attributes }
    Flat,
    /// { datacenter: { cluster: { host: { vm: attributes } } } }
    ByCluster,
}

impl From<LayoutArg> for reconcile::Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Flat => Self::Flat,
            LayoutArg::ByCluster => Self::ByCluster,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub input: InputArgs,

    /// Show what would change without updating RackTables
    #[arg(short = 't', long = "test", alias = "dry-run")]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Where to write the depot
    #[arg(short, long, default_value = "ViperRTVMs.json")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sync_flags() {
        let cli = Cli::parse_from([
            "rtsync",
            "sync",
            "-s",
            "rt.example.com",
            "-u",
            "admin",
            "--jsonfile",
            "vms.json",
            "--layout",
            "by-cluster",
            "--test",
        ]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.connection.host.as_deref(), Some("rt.example.com"));
        assert_eq!(args.connection.user.as_deref(), Some("admin"));
        assert_eq!(args.input.jsonfile, PathBuf::from("vms.json"));
        assert_eq!(args.input.layout, LayoutArg::ByCluster);
        assert!(args.dry_run);
        assert!(!args.input.prune_ips);
    }

    #[test]
    fn test_dry_run_alias_and_silent() {
        let cli = Cli::parse_from(["rtsync", "sync", "--dry-run", "--silent"]);
        assert!(cli.quiet);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert!(args.dry_run);
        assert_eq!(
            args.input.jsonfile,
            PathBuf::from("getVMsWithPlacement.json")
        );
    }

    #[test]
    fn test_export_default_output() {
        let cli = Cli::parse_from(["rtsync", "export"]);
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.output, PathBuf::from("ViperRTVMs.json"));
    }
}
