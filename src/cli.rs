//! CLI argument parsing for the manifest patch workflow.
//!
//! The CLI is intentionally thin: commands route straight into `workflow`
//! without embedding policy, so the core patcher stays reusable.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "pbxpatch",
    version,
    about = "Register newly discovered files into an Xcode project manifest",
    after_help = "Commands:\n  init                 Write a default pbxpatch.json config stub\n  scan                 List unregistered files under the source root\n  apply                Patch the manifest (backup, validate, commit)\n  check                Audit manifest sentinels and group-tree invariants\n\nExamples:\n  pbxpatch scan --project App.xcodeproj/project.pbxproj --source-root App\n  pbxpatch apply --project App.xcodeproj/project.pbxproj --source-root App\n  pbxpatch apply --project App.xcodeproj --source-root App --dry-run\n  pbxpatch check --project App.xcodeproj/project.pbxproj --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    Scan(ScanArgs),
    Apply(ApplyArgs),
    Check(CheckArgs),
}

/// Init command inputs for bootstrapping a config.
#[derive(Parser, Debug)]
#[command(about = "Write a default config stub")]
pub struct InitArgs {
    /// Output path for the config stub
    #[arg(long, value_name = "PATH", default_value = "pbxpatch.json")]
    pub out: PathBuf,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Scan command inputs.
#[derive(Parser, Debug)]
#[command(about = "List unregistered files under the source root")]
pub struct ScanArgs {
    /// Project manifest (`project.pbxproj`, or the `.xcodeproj` wrapper)
    #[arg(long, value_name = "PATH")]
    pub project: PathBuf,

    /// Directory scanned for candidate files
    #[arg(long, value_name = "DIR")]
    pub source_root: PathBuf,

    /// Config file (defaults to the built-in pbxproj dialect)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

/// Apply command inputs for the patch transaction.
#[derive(Parser, Debug)]
#[command(about = "Patch the manifest: backup, insert, validate, commit")]
pub struct ApplyArgs {
    /// Project manifest (`project.pbxproj`, or the `.xcodeproj` wrapper)
    #[arg(long, value_name = "PATH")]
    pub project: PathBuf,

    /// Directory scanned for candidate files
    #[arg(long, value_name = "DIR")]
    pub source_root: PathBuf,

    /// Config file (defaults to the built-in pbxproj dialect)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Plan and validate without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    /// Emit a verbose transcript of the run
    #[arg(long)]
    pub verbose: bool,
}

/// Check command inputs.
#[derive(Parser, Debug)]
#[command(about = "Audit manifest sentinels and group-tree invariants")]
pub struct CheckArgs {
    /// Project manifest (`project.pbxproj`, or the `.xcodeproj` wrapper)
    #[arg(long, value_name = "PATH")]
    pub project: PathBuf,

    /// Config file (defaults to the built-in pbxproj dialect)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
