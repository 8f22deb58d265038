use std::collections::BTreeMap;

use anyhow::Result;
use clap::Subcommand;

use vary::error::VaryError;
use vary::resolver::tui::TuiResolver;
use vary::state::State;
use vary::store::FileStore;
use vary::ui::{Prompter, SelectOption, prompt::TermPrompter};
use vary::versions;
use vary::workspace::Workspace;

/// Subcommands for `vary versions`.
#[derive(Subcommand, Debug)]
pub enum VersionCommands {
    /// Turn a file into a version base
    Base {
        /// Repository-relative path; prompts for one when omitted
        path: Option<String>,
    },

    /// Record the file's current contents as a new feature
    NewFeature {
        /// Repository-relative path; prompts for one when omitted
        path: Option<String>,
        /// Feature name (min 5 characters, no '+')
        name: Option<String>,
    },

    /// Save the file's current contents over an existing feature/state
    Save {
        /// Repository-relative path; prompts for one when omitted
        path: Option<String>,
    },

    /// Delete a feature and every state containing it
    Delete {
        /// Repository-relative path; prompts for one when omitted
        path: Option<String>,
    },

    /// Toggle a feature ON or OFF across every file that has it
    Toggle {
        /// Feature name
        name: String,
        /// Target state (ON or OFF)
        state: State,
    },

    /// Fold a feature/state into the base of every file holding it
    Promote,

    /// Discard a feature/state from every file holding it
    Demote,

    /// Print the versions status tables
    Details,
}

pub fn run(cmd: VersionCommands) -> Result<()> {
    let (store, ws) = super::existing_context()?;
    let mut prompter = TermPrompter;
    let mut resolver = TuiResolver;

    match cmd {
        VersionCommands::Base { path } => {
            let path = match path {
                Some(p) => p,
                None => pick_repository_file(&ws, &mut prompter)?,
            };
            println!(
                "Once the base exists, keeping features up to date is on you: use the save \
                 command regularly or snapshots will drift out of date."
            );
            if !prompter.confirm("Do you want to continue?")? {
                return Err(VaryError::Cancelled.into());
            }
            versions::base(&store, &ws, &path)?;
            println!("{path} is now a version base");
        }
        VersionCommands::NewFeature { path, name } => {
            let path = match path {
                Some(p) => p,
                None => pick_versioned_file(&store, &ws, &mut prompter)?,
            };
            let name = match name {
                Some(n) => n,
                None => {
                    let existing: Vec<String> = versions::list_features(&store, &ws, &path)?
                        .into_iter()
                        .map(|f| f.name)
                        .collect();
                    prompter.input("What's the name of the feature?", &move |value: &str| {
                        if existing.iter().any(|n| n == value) {
                            return Err(format!("{value} already exists"));
                        }
                        versions::validate_feature_name(value).map_err(|e| e.to_string())
                    })?
                }
            };
            versions::new_feature(&store, &ws, &path, &name, &mut resolver)?;
            println!("saved record for {path} with feature {name}");
        }
        VersionCommands::Save { path } => {
            let path = match path {
                Some(p) => p,
                None => pick_versioned_file(&store, &ws, &mut prompter)?,
            };
            let ids = pick_state(&store, &ws, &path, &mut prompter, false)?;
            versions::save_to(&store, &ws, &path, &ids)?;
            println!("saved");
        }
        VersionCommands::Delete { path } => {
            let path = match path {
                Some(p) => p,
                None => pick_versioned_file(&store, &ws, &mut prompter)?,
            };
            let ids = pick_state(&store, &ws, &path, &mut prompter, true)?;
            versions::delete_feature(&store, &ws, &path, &ids[0], &mut resolver)?;
            println!("feature deleted from {path}");
        }
        VersionCommands::Toggle { name, state } => {
            versions::toggle(&store, &ws, &name, state, &mut resolver)?;
            println!("feature {name} toggled {state}");
        }
        VersionCommands::Promote => {
            let names = pick_feature_set(&store, &ws, &mut prompter, "promote")?;
            versions::promote(&store, &ws, &names, &mut resolver)?;
            println!("{} promoted", names.join("+"));
        }
        VersionCommands::Demote => {
            let names = pick_feature_set(&store, &ws, &mut prompter, "demote")?;
            versions::demote(&store, &ws, &names, &mut resolver)?;
            println!("{} demoted", names.join("+"));
        }
        VersionCommands::Details => {
            print!("{}", vary::report::all_version_details(&store, &ws)?);
        }
    }
    Ok(())
}

/// Pick any file from the repository walk.
fn pick_repository_file(ws: &Workspace, prompter: &mut dyn Prompter) -> Result<String> {
    let files = vary::repo::list_repository_files(ws.root())?;
    let options: Vec<SelectOption> = files
        .iter()
        .map(|f| SelectOption::new(f.clone(), f.clone(), ""))
        .collect();
    Ok(prompter.select("Select a file", &options)?)
}

/// Pick one of the files that already have a version base.
fn pick_versioned_file(
    store: &FileStore,
    ws: &Workspace,
    prompter: &mut dyn Prompter,
) -> Result<String> {
    let paths = ws.tracked_paths(store, &ws.versions_dir())?;
    let options: Vec<SelectOption> = paths
        .iter()
        .map(|p| SelectOption::new(p.clone(), p.clone(), ""))
        .collect();
    Ok(prompter.select("Select a versioned file", &options)?)
}

/// Pick an index entry of `path`; `solo_only` restricts to single features.
fn pick_state(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    prompter: &mut dyn Prompter,
    solo_only: bool,
) -> Result<Vec<String>> {
    let entries = versions::state_entries(store, ws, path)?;
    let options: Vec<SelectOption> = entries
        .iter()
        .filter(|e| !solo_only || e.is_solo())
        .map(|entry| {
            let label = if entry.is_current {
                format!("{} (current state)", entry.label())
            } else {
                entry.label()
            };
            let detail = if entry.is_solo() { "feature" } else { "state" };
            SelectOption::new(vary::worktree::key_for(&entry.ids), label, detail)
        })
        .collect();
    if options.is_empty() {
        return Err(VaryError::StateNotFound {
            key: "[]".to_owned(),
        }
        .into());
    }
    let key = prompter.select("Select a feature/state", &options)?;
    Ok(vary::worktree::parse_key(&key))
}

/// Pick a feature/state by name across every versioned file.
fn pick_feature_set(
    store: &FileStore,
    ws: &Workspace,
    prompter: &mut dyn Prompter,
    verb: &str,
) -> Result<Vec<String>> {
    let mut seen: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in ws.tracked_paths(store, &ws.versions_dir())? {
        for entry in versions::state_entries(store, ws, &path)? {
            seen.entry(entry.label()).or_insert_with(|| entry.names.clone());
        }
    }
    let options: Vec<SelectOption> = seen
        .iter()
        .map(|(label, names)| {
            let detail = if names.len() == 1 { "feature" } else { "state" };
            SelectOption::new(label.clone(), label.clone(), detail)
        })
        .collect();
    let chosen = prompter.select(&format!("Select a feature or state to {verb}"), &options)?;
    Ok(seen.remove(&chosen).unwrap_or_default())
}
