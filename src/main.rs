use anyhow::Result;
use clap::{Parser, Subcommand};

use vary::error::VaryError;

mod commands;

/// Branch-level feature-flag manager
///
/// vary keeps multiple coexisting variants of source files inside one Git
/// working tree. Two engines do the work:
///
///   - versions: whole-file variants saved as content-addressed snapshots,
///     materialised in place by toggling features ON/OFF
///   - blocks: inline @feature/@default regions toggled ON/OFF/DEV directly
///     inside the file
///
/// QUICK START:
///
///   vary init
///   vary versions base src/config.yaml
///   # edit the file, then record the edit as a feature:
///   vary versions new-feature src/config.yaml dark-mode
///   vary toggle dark-mode OFF
///   vary sync
///
/// Run `vary sync` after editing tracked files — it discovers new block
/// regions and asks what to do with unsaved version changes.
#[derive(Parser)]
#[command(name = "vary")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'vary <command> --help' for more information on a specific command.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the .features workspace in the current repository
    ///
    /// Wipes any existing workspace and recreates the default delimiter
    /// registry and an empty preset map.
    Init,

    /// Reconcile both engines with the git working tree
    ///
    /// Routes every modified/untracked/deleted path through block-region
    /// discovery and the versions divergence check.
    Sync,

    /// Print feature status tables
    Report(commands::report::ReportArgs),

    /// Manage comment delimiters per file extension
    #[command(subcommand)]
    Delimiters(commands::delimiters::DelimiterCommands),

    /// Manage presets (named bundles of toggles)
    #[command(subcommand)]
    Presets(commands::presets::PresetCommands),

    /// Manage whole-file version features
    #[command(subcommand)]
    Versions(commands::versions::VersionCommands),

    /// Manage inline block features
    #[command(subcommand)]
    Blocks(commands::blocks::BlockCommands),

    /// Toggle a feature by name across both engines
    Toggle(commands::toggle::ToggleArgs),
}

fn main() -> Result<()> {
    vary::telemetry::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Sync => commands::sync::run(),
        Commands::Report(args) => commands::report::run(&args),
        Commands::Delimiters(cmd) => commands::delimiters::run(cmd),
        Commands::Presets(cmd) => commands::presets::run(cmd),
        Commands::Versions(cmd) => commands::versions::run(cmd),
        Commands::Blocks(cmd) => commands::blocks::run(cmd),
        Commands::Toggle(args) => commands::toggle::run(&args),
    };

    // User cancellation is a clean exit, not a failure.
    match result {
        Err(err)
            if err
                .downcast_ref::<VaryError>()
                .is_some_and(VaryError::is_cancelled) =>
        {
            Ok(())
        }
        other => other,
    }
}
