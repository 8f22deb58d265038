use anyhow::Result;
use clap::Subcommand;

use vary::presets;
use vary::report::render_table;
use vary::resolver::tui::TuiResolver;
use vary::state::State;

/// Subcommands for `vary presets`.
#[derive(Subcommand, Debug)]
pub enum PresetCommands {
    /// List every preset and its entries
    List,

    /// Create a preset, optionally cloning an existing one
    Create {
        /// Name of the new preset
        name: String,
        /// Clone the entries of this preset
        #[arg(long)]
        from: Option<String>,
    },

    /// Delete a preset
    Delete {
        /// Name of the preset
        name: String,
    },

    /// Set a feature's target state inside a preset
    SetFeature {
        /// Preset name
        preset: String,
        /// Feature name
        feature: String,
        /// Target state (ON, OFF or DEV)
        state: State,
    },

    /// Remove a feature entry from a preset
    DeleteFeature {
        /// Preset name
        preset: String,
        /// Feature name
        feature: String,
    },

    /// Apply a preset's toggles across both engines
    Apply {
        /// Preset name
        name: String,
    },
}

pub fn run(cmd: PresetCommands) -> Result<()> {
    let (store, ws) = super::existing_context()?;
    let file = ws.presets_file();

    match cmd {
        PresetCommands::List => {
            let presets = presets::load(&store, &file)?;
            if presets.is_empty() {
                println!("No presets created");
                return Ok(());
            }
            for (name, entries) in presets {
                println!("{name}");
                let rows: Vec<Vec<String>> = entries
                    .iter()
                    .map(|(feature, state)| vec![feature.clone(), state.to_string()])
                    .collect();
                print!("{}", render_table(&["FEATURE", "STATE"], &rows));
            }
        }
        PresetCommands::Create { name, from } => {
            presets::create(&store, &file, &name, from.as_deref())?;
            println!("preset {name} created");
        }
        PresetCommands::Delete { name } => {
            presets::delete(&store, &file, &name)?;
            println!("preset {name} deleted");
        }
        PresetCommands::SetFeature {
            preset,
            feature,
            state,
        } => {
            presets::set_feature(&store, &file, &preset, &feature, state)?;
            println!("{preset}: {feature} -> {state}");
        }
        PresetCommands::DeleteFeature { preset, feature } => {
            presets::delete_feature(&store, &file, &preset, &feature)?;
            println!("{preset}: {feature} removed");
        }
        PresetCommands::Apply { name } => {
            let mut resolver = TuiResolver;
            presets::apply(&store, &ws, &name, &mut resolver)?;
            println!("preset {name} applied");
        }
    }
    Ok(())
}
