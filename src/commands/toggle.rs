use anyhow::Result;
use clap::Args;

use vary::error::VaryError;
use vary::resolver::tui::TuiResolver;
use vary::state::State;

/// Arguments for `vary toggle`.
#[derive(Args, Debug)]
pub struct ToggleArgs {
    /// Feature name (or preset name with --preset)
    pub name: String,

    /// Target state (ON, OFF or DEV)
    pub state: Option<State>,

    /// Only the versions engine
    #[arg(long, conflicts_with_all = ["blocks", "preset"])]
    pub versions: bool,

    /// Only the blocks engine
    #[arg(long, conflicts_with = "preset")]
    pub blocks: bool,

    /// Treat <NAME> as a preset and apply it
    #[arg(long)]
    pub preset: bool,
}

pub fn run(args: &ToggleArgs) -> Result<()> {
    let (store, ws) = super::existing_context()?;
    let mut resolver = TuiResolver;

    if args.preset {
        vary::presets::apply(&store, &ws, &args.name, &mut resolver)?;
        println!("preset {} applied", args.name);
        return Ok(());
    }

    let state = args.state.ok_or_else(|| VaryError::InvalidState {
        state: "<missing>".to_owned(),
        reason: "a target state is required unless --preset is given".to_owned(),
    })?;
    if args.versions && state == State::Dev {
        return Err(VaryError::InvalidState {
            state: state.to_string(),
            reason: "version features are ON/OFF only".to_owned(),
        }
        .into());
    }

    let mut known = false;
    if !args.versions {
        match vary::blocks::toggle(&store, &ws, &args.name, state) {
            Ok(()) => known = true,
            Err(VaryError::FeatureNotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }
    if !args.blocks && state != State::Dev {
        match vary::versions::toggle(&store, &ws, &args.name, state, &mut resolver) {
            Ok(()) => known = true,
            Err(VaryError::FeatureNotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }
    }

    if known {
        println!("feature {} toggled {state}", args.name);
        Ok(())
    } else {
        Err(VaryError::FeatureNotFound {
            name: args.name.clone(),
        }
        .into())
    }
}
