//! Presets — named bundles of feature toggles applied atomically.
//!
//! Persisted as JSON at `.features/presets`: preset name → (feature name →
//! target state). Applying a preset routes every entry through the toggle
//! paths of both engines; DEV targets only ever concern the blocks engine.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::blocks;
use crate::error::{Result, VaryError};
use crate::resolver::ResolverUi;
use crate::state::State;
use crate::store::FileStore;
use crate::versions;
use crate::workspace::Workspace;

/// The preset map: name → (feature name → state).
pub type Presets = BTreeMap<String, BTreeMap<String, State>>;

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

/// Load the preset map from `file`.
pub fn load(store: &FileStore, file: &Path) -> Result<Presets> {
    store.read_json(file)
}

/// Create an empty preset, or clone `from` when given.
pub fn create(store: &FileStore, file: &Path, name: &str, from: Option<&str>) -> Result<()> {
    let mut presets = load(store, file)?;
    if presets.contains_key(name) {
        return Err(VaryError::PresetExists {
            name: name.to_owned(),
        });
    }
    let entries = match from {
        Some(source) => presets
            .get(source)
            .cloned()
            .ok_or_else(|| VaryError::PresetNotFound {
                name: source.to_owned(),
            })?,
        None => BTreeMap::new(),
    };
    presets.insert(name.to_owned(), entries);
    store.write_json(file, &presets)
}

/// Delete a preset.
pub fn delete(store: &FileStore, file: &Path, name: &str) -> Result<()> {
    let mut presets = load(store, file)?;
    if presets.remove(name).is_none() {
        return Err(VaryError::PresetNotFound {
            name: name.to_owned(),
        });
    }
    store.write_json(file, &presets)
}

/// Set one feature's target state inside a preset.
pub fn set_feature(
    store: &FileStore,
    file: &Path,
    preset: &str,
    feature: &str,
    state: State,
) -> Result<()> {
    let mut presets = load(store, file)?;
    let entries = presets
        .get_mut(preset)
        .ok_or_else(|| VaryError::PresetNotFound {
            name: preset.to_owned(),
        })?;
    entries.insert(feature.to_owned(), state);
    store.write_json(file, &presets)
}

/// Remove one feature entry from a preset.
pub fn delete_feature(store: &FileStore, file: &Path, preset: &str, feature: &str) -> Result<()> {
    let mut presets = load(store, file)?;
    let entries = presets
        .get_mut(preset)
        .ok_or_else(|| VaryError::PresetNotFound {
            name: preset.to_owned(),
        })?;
    if entries.remove(feature).is_none() {
        return Err(VaryError::FeatureNotFound {
            name: feature.to_owned(),
        });
    }
    store.write_json(file, &presets)
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Apply every entry of `preset`: block features are toggled wherever the
/// name is known to the blocks engine, version features wherever it is known
/// to the versions engine. Unknown names are reported and skipped.
pub fn apply(
    store: &FileStore,
    ws: &Workspace,
    preset: &str,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    let presets = load(store, &ws.presets_file())?;
    let entries = presets.get(preset).ok_or_else(|| VaryError::PresetNotFound {
        name: preset.to_owned(),
    })?;

    for (feature, state) in entries {
        let mut known = false;
        match blocks::toggle(store, ws, feature, *state) {
            Ok(()) => known = true,
            Err(VaryError::FeatureNotFound { .. }) => {}
            Err(err) => return Err(err),
        }
        if *state != State::Dev {
            match versions::toggle(store, ws, feature, *state, ui) {
                Ok(()) => known = true,
                Err(VaryError::FeatureNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        if !known {
            warn!(preset, feature, "preset entry matches no known feature");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
