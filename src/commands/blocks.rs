use anyhow::Result;
use clap::Subcommand;

use vary::blocks;
use vary::state::State;
use vary::ui::{Prompter, SelectOption, prompt::TermPrompter};

/// Subcommands for `vary blocks`.
#[derive(Subcommand, Debug)]
pub enum BlockCommands {
    /// Toggle a block feature across every file that has it
    Toggle {
        /// Feature name
        name: String,
        /// Target state (ON, OFF or DEV)
        state: State,
    },

    /// Replace every region of a feature with its feature branch
    Promote {
        /// Feature name; prompts for one when omitted
        name: Option<String>,
    },

    /// Replace every region of a feature with its default branch
    Demote {
        /// Feature name; prompts for one when omitted
        name: Option<String>,
    },

    /// Print the blocks status tables
    Details,
}

pub fn run(cmd: BlockCommands) -> Result<()> {
    let (store, ws) = super::existing_context()?;
    let mut prompter = TermPrompter;

    match cmd {
        BlockCommands::Toggle { name, state } => {
            blocks::toggle(&store, &ws, &name, state)?;
            println!("feature {name} toggled {state}");
        }
        BlockCommands::Promote { name } => {
            let name = match name {
                Some(n) => n,
                None => pick_feature(&store, &ws, &mut prompter, "promote")?,
            };
            blocks::promote(&store, &ws, &name)?;
            println!("feature {name} promoted");
        }
        BlockCommands::Demote { name } => {
            let name = match name {
                Some(n) => n,
                None => pick_feature(&store, &ws, &mut prompter, "demote")?,
            };
            blocks::demote(&store, &ws, &name)?;
            println!("feature {name} demoted");
        }
        BlockCommands::Details => {
            print!("{}", vary::report::all_blocks_details(&store, &ws)?);
        }
    }
    Ok(())
}

fn pick_feature(
    store: &vary::store::FileStore,
    ws: &vary::workspace::Workspace,
    prompter: &mut dyn Prompter,
    verb: &str,
) -> Result<String> {
    let names = blocks::feature_names(store, ws)?;
    let options: Vec<SelectOption> = names
        .iter()
        .map(|n| SelectOption::new(n.clone(), n.clone(), ""))
        .collect();
    Ok(prompter.select(&format!("Select a feature to {verb}"), &options)?)
}
