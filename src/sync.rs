//! Sync orchestrator — reconcile both engines with the VCS-reported state.
//!
//! Git supplies three path listings: modified, untracked, deleted. A deleted
//! path loses its block and version directories; every other path runs block
//! discovery first and then the versions divergence check. A versioned file
//! whose bytes no longer match its materialised state prompts the user to
//! decide what the edit means (new feature, save, rebase, update base) —
//! cancelling rebuilds the file and discards the edit.

use std::collections::BTreeMap;

use tracing::info;

use crate::blocks;
use crate::error::Result;
use crate::repo;
use crate::resolver::ResolverUi;
use crate::store::FileStore;
use crate::ui::{Prompter, SelectOption};
use crate::versions;
use crate::workspace::Workspace;

// ---------------------------------------------------------------------------
// Path classification
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PathAction {
    Changed,
    Deleted,
}

/// Merge the three listings into one action per path. Deletion wins; a path
/// both modified and untracked is handled once.
fn classify(
    modified: Vec<String>,
    untracked: Vec<String>,
    deleted: Vec<String>,
) -> BTreeMap<String, PathAction> {
    let mut actions = BTreeMap::new();
    for path in modified.into_iter().chain(untracked) {
        actions.insert(path, PathAction::Changed);
    }
    for path in deleted {
        actions.insert(path, PathAction::Deleted);
    }
    actions
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Run one sync pass over the repository.
pub fn sync(
    store: &FileStore,
    ws: &Workspace,
    prompter: &mut dyn Prompter,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    ws.ensure(store)?;

    let actions = classify(
        repo::modified_files(ws.root())?,
        repo::untracked_files(ws.root())?,
        repo::deleted_files(ws.root())?,
    );

    for (path, action) in &actions {
        match action {
            PathAction::Deleted => {
                blocks::handle_deleted(store, ws, path)?;
                versions::handle_deleted(store, ws, path)?;
            }
            PathAction::Changed => {
                blocks::handle_block(store, ws, path)?;
                handle_version(store, ws, path, prompter, ui)?;
            }
        }
        info!(path, ?action, "synced");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Versions divergence handling
// ---------------------------------------------------------------------------

const CHOICE_SAVE_CURRENT: &str = "save-to-current-state";
const CHOICE_SAVE_OTHER: &str = "save-to-other";
const CHOICE_CREATE: &str = "create-new-feature";
const CHOICE_REBASE: &str = "rebase";
const CHOICE_UPDATE_BASE: &str = "update-base";
const CHOICE_CANCEL: &str = "cancel";

/// Check one versioned path for divergence and route the user's decision.
pub fn handle_version(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    prompter: &mut dyn Prompter,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    if !versions::is_base(store, ws, path) {
        return Ok(());
    }
    if !versions::has_untracked_changes(store, ws, path)? {
        return Ok(());
    }

    let features = versions::list_features(store, ws, path)?;
    let state_name = versions::current_state_name(store, ws, path)?;
    let state_count = versions::state_entries(store, ws, path)?.len();

    let options = if features.is_empty() {
        vec![
            SelectOption::new(CHOICE_UPDATE_BASE, "Update base", ""),
            SelectOption::new(CHOICE_CREATE, "Create a new feature with the change", ""),
            SelectOption::new(CHOICE_CANCEL, "Restore changes", ""),
        ]
    } else {
        vec![
            SelectOption::new(
                CHOICE_SAVE_CURRENT,
                format!("Save changes to the current feature/state ({state_name})"),
                "",
            ),
            SelectOption::new(CHOICE_SAVE_OTHER, "Save changes to a specific feature/state", ""),
            SelectOption::new(CHOICE_CREATE, "Create a new feature with the change", ""),
            SelectOption::new(
                CHOICE_REBASE,
                format!("Rebase (merge changes to all [{state_count}] features/states)"),
                "",
            ),
            SelectOption::new(CHOICE_CANCEL, "Restore changes", ""),
        ]
    };

    let selected = prompter.select(
        &format!("Untracked changes detected on {path}, which is a version base. What should we do?"),
        &options,
    )?;

    match selected.as_str() {
        CHOICE_UPDATE_BASE => versions::update_base(store, ws, path, ui),
        CHOICE_REBASE => versions::rebase(store, ws, path, ui),
        CHOICE_SAVE_CURRENT => versions::save_to_current_state(store, ws, path),
        CHOICE_SAVE_OTHER => {
            let entries = versions::state_entries(store, ws, path)?;
            let options: Vec<SelectOption> = entries
                .iter()
                .map(|entry| {
                    let label = if entry.is_current {
                        format!("{} (current state)", entry.label())
                    } else {
                        entry.label()
                    };
                    let detail = if entry.is_solo() { "feature" } else { "state" };
                    SelectOption::new(crate::worktree::key_for(&entry.ids), label, detail)
                })
                .collect();
            let key = prompter.select("Select a feature/state to save", &options)?;
            versions::save_to(store, ws, path, &crate::worktree::parse_key(&key))
        }
        CHOICE_CREATE => {
            let existing: Vec<String> = features.iter().map(|f| f.name.clone()).collect();
            let name = prompter.input("What's the name of the feature?", &move |value: &str| {
                if existing.iter().any(|n| n == value) {
                    return Err(format!("{value} already exists"));
                }
                versions::validate_feature_name(value).map_err(|err| err.to_string())
            })?;
            versions::new_feature(store, ws, path, &name, ui)
        }
        _ => versions::build(store, ws, path, ui),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
