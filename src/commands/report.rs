use anyhow::Result;
use clap::Args;

/// Arguments for `vary report`.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Only the versions engine's tables
    #[arg(long, conflicts_with = "blocks")]
    pub versions: bool,

    /// Only the blocks engine's tables
    #[arg(long)]
    pub blocks: bool,
}

pub fn run(args: &ReportArgs) -> Result<()> {
    let (store, ws) = super::existing_context()?;
    if !args.versions {
        print!("{}", vary::report::all_blocks_details(&store, &ws)?);
    }
    if !args.blocks {
        print!("{}", vary::report::all_version_details(&store, &ws)?);
    }
    Ok(())
}
