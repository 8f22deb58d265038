//! Versions engine — whole-file variants over a content-addressed store.
//!
//! A versioned file has a pristine `base`, a set of named features (each ON
//! or OFF), and a working-tree index mapping sorted feature-id sets to
//! snapshots under `_wt/`. Toggling features materialises the matching
//! snapshot in place; combinations that were never saved are composed lazily
//! by three-way merging solo snapshots against the base, caching every
//! intermediate state ([`build`]).
//!
//! Promote folds a feature (or state) into the base and rewrites every
//! remaining snapshot through a merge; demote discards it. Both remove the
//! whole version directory once the index is empty.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::blocks::parse::MIN_FEATURE_LEN;
use crate::error::{Result, VaryError};
use crate::merge;
use crate::resolver::ResolverUi;
use crate::state::State;
use crate::store::{FileStore, generate_id};
use crate::workspace::{WORKING_TREE_DIR, Workspace};
use crate::worktree::{self, SnapshotRecord};

// ---------------------------------------------------------------------------
// VersionFeature
// ---------------------------------------------------------------------------

/// Persistent record for one file-wide feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFeature {
    /// 25-hex feature identifier; also the record's file name.
    pub id: String,
    /// Feature name shown to the user.
    pub name: String,
    /// ON or OFF. DEV does not exist for whole-file variants.
    pub state: State,
}

/// One selectable row of a file's index, resolved to display names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateEntry {
    /// The member feature IDs, sorted.
    pub ids: Vec<String>,
    /// The member feature names, in ID order.
    pub names: Vec<String>,
    /// Whether this key is exactly the currently-ON set.
    pub is_current: bool,
}

impl StateEntry {
    /// Solo feature snapshot (single-element key) or composite state.
    #[must_use]
    pub fn is_solo(&self) -> bool {
        self.ids.len() == 1
    }

    /// Display label: names joined by `+`.
    #[must_use]
    pub fn label(&self) -> String {
        self.names.join("+")
    }
}

// ---------------------------------------------------------------------------
// Layout + listing
// ---------------------------------------------------------------------------

fn base_file(ws: &Workspace, path: &str) -> PathBuf {
    ws.version_dir(path).join("base")
}

fn wt_dir(ws: &Workspace, path: &str) -> PathBuf {
    ws.version_dir(path).join(WORKING_TREE_DIR)
}

fn snapshot_file(ws: &Workspace, path: &str, saved: &str) -> PathBuf {
    wt_dir(ws, path).join(saved)
}

fn feature_file(ws: &Workspace, path: &str, id: &str) -> PathBuf {
    ws.version_dir(path).join(format!("{id}.feature"))
}

/// Whether `path` has a version base.
#[must_use]
pub fn is_base(store: &FileStore, ws: &Workspace, path: &str) -> bool {
    store.exists(&ws.version_dir(path))
}

fn require_base(store: &FileStore, ws: &Workspace, path: &str) -> Result<()> {
    if is_base(store, ws, path) {
        Ok(())
    } else {
        Err(VaryError::NotABase { path: path.into() })
    }
}

/// All feature records for one file, sorted by ID.
pub fn list_features(store: &FileStore, ws: &Workspace, path: &str) -> Result<Vec<VersionFeature>> {
    let dir = ws.version_dir(path);
    if !store.exists(&dir) {
        return Ok(Vec::new());
    }
    let mut features = Vec::new();
    for entry in store.list_dir(&dir)? {
        if entry.extension().is_some_and(|e| e == "feature") {
            features.push(store.read_json::<VersionFeature>(&entry)?);
        }
    }
    Ok(features)
}

/// Feature records for every versioned file, keyed by path.
pub fn list_all_features(
    store: &FileStore,
    ws: &Workspace,
) -> Result<BTreeMap<String, Vec<VersionFeature>>> {
    let mut out = BTreeMap::new();
    for path in ws.tracked_paths(store, &ws.versions_dir())? {
        let features = list_features(store, ws, &path)?;
        out.insert(path, features);
    }
    Ok(out)
}

/// Sorted IDs of the currently-ON features.
fn on_ids(features: &[VersionFeature]) -> Vec<String> {
    let mut ids: Vec<String> = features
        .iter()
        .filter(|f| f.state == State::On)
        .map(|f| f.id.clone())
        .collect();
    ids.sort_unstable();
    ids
}

fn names_for(features: &[VersionFeature], ids: &[String]) -> Vec<String> {
    ids.iter()
        .filter_map(|id| {
            features
                .iter()
                .find(|f| &f.id == id)
                .map(|f| f.name.clone())
        })
        .collect()
}

/// Sorted IDs of the features currently ON for `path`.
pub fn current_on_ids(store: &FileStore, ws: &Workspace, path: &str) -> Result<Vec<String>> {
    Ok(on_ids(&list_features(store, ws, path)?))
}

/// `+`-joined names of the features currently ON (the "current state" label).
pub fn current_state_name(store: &FileStore, ws: &Workspace, path: &str) -> Result<String> {
    let features = list_features(store, ws, path)?;
    let ids = on_ids(&features);
    Ok(names_for(&features, &ids).join("+"))
}

/// Every index key of `path`, resolved for display.
pub fn state_entries(store: &FileStore, ws: &Workspace, path: &str) -> Result<Vec<StateEntry>> {
    let features = list_features(store, ws, path)?;
    let current = on_ids(&features);
    let tree = worktree::load(store, &ws.version_dir(path))?;
    Ok(tree
        .keys()
        .map(|key| {
            let ids = worktree::parse_key(key);
            let names = names_for(&features, &ids);
            let is_current = ids == current;
            StateEntry {
                ids,
                names,
                is_current,
            }
        })
        .collect())
}

/// Validate a new feature name: at least [`MIN_FEATURE_LEN`] characters,
/// no `+` (it is the display separator).
pub fn validate_feature_name(name: &str) -> Result<()> {
    if name.chars().count() < MIN_FEATURE_LEN {
        return Err(VaryError::InvalidFeatureName {
            name: name.to_owned(),
            reason: format!("names need at least {MIN_FEATURE_LEN} characters"),
        });
    }
    if name.contains('+') {
        return Err(VaryError::InvalidFeatureName {
            name: name.to_owned(),
            reason: "names cannot contain '+'".to_owned(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Base lifecycle
// ---------------------------------------------------------------------------

/// Turn `path` into a version base.
pub fn base(store: &FileStore, ws: &Workspace, path: &str) -> Result<()> {
    ws.ensure(store)?;
    if is_base(store, ws, path) {
        return Err(VaryError::AlreadyABase { path: path.into() });
    }
    let dir = ws.version_dir(path);
    store.create_dir(&dir)?;
    store.create_dir(&wt_dir(ws, path))?;
    worktree::create(store, &dir)?;
    store.copy(&ws.abs(path), &base_file(ws, path))?;
    store.write(&dir.join("_path"), path.as_bytes())?;
    info!(path, "created version base");
    Ok(())
}

/// Overwrite the base with the file's current contents, then rebuild.
pub fn update_base(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    require_base(store, ws, path)?;
    store.copy(&ws.abs(path), &base_file(ws, path))?;
    build(store, ws, path, ui)
}

// ---------------------------------------------------------------------------
// Features and snapshots
// ---------------------------------------------------------------------------

/// Record the file's current contents as a new feature named `name`.
///
/// The bytes become the solo snapshot `[id]`. If other features are ON, the
/// same bytes additionally become the combined state of all of them plus the
/// new one — the file on disk already reflects that combination.
pub fn new_feature(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    name: &str,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    require_base(store, ws, path)?;
    validate_feature_name(name)?;

    let features = list_features(store, ws, path)?;
    if features.iter().any(|f| f.name == name) {
        return Err(VaryError::FeatureExists {
            name: name.to_owned(),
            path: path.into(),
        });
    }

    let already_on = on_ids(&features);
    let id = generate_id(&[path, name]);
    let dir = ws.version_dir(path);
    let checksum = store.checksum(&ws.abs(path))?;

    let solo = vec![id.clone()];
    let record = SnapshotRecord::new(&solo, checksum.clone());
    store.copy(&ws.abs(path), &snapshot_file(ws, path, &record.saved_check_sum))?;
    worktree::add(store, &dir, &solo, record)?;

    if !already_on.is_empty() {
        let mut combined = already_on;
        combined.push(id.clone());
        combined.sort_unstable();
        let record = SnapshotRecord::new(&combined, checksum);
        store.copy(&ws.abs(path), &snapshot_file(ws, path, &record.saved_check_sum))?;
        worktree::add(store, &dir, &combined, record)?;
    }

    store.write_json(
        &feature_file(ws, path, &id),
        &VersionFeature {
            id: id.clone(),
            name: name.to_owned(),
            state: State::On,
        },
    )?;
    info!(path, feature = name, %id, "created version feature");
    build(store, ws, path, ui)
}

/// Replace the snapshot of the currently-ON feature set with the file's
/// current contents.
pub fn save_to_current_state(store: &FileStore, ws: &Workspace, path: &str) -> Result<()> {
    require_base(store, ws, path)?;
    let features = list_features(store, ws, path)?;
    save_to(store, ws, path, &on_ids(&features))
}

/// Replace the snapshot of an arbitrary existing key with the file's current
/// contents. Snapshots may be refreshed even when no longer current.
pub fn save_to(store: &FileStore, ws: &Workspace, path: &str, ids: &[String]) -> Result<()> {
    require_base(store, ws, path)?;
    let dir = ws.version_dir(path);
    let old = worktree::find_required(store, &dir, ids)?;
    store.remove(&snapshot_file(ws, path, &old.saved_check_sum))?;

    let checksum = store.checksum(&ws.abs(path))?;
    let record = SnapshotRecord::new(ids, checksum);
    store.copy(&ws.abs(path), &snapshot_file(ws, path, &record.saved_check_sum))?;
    worktree::add(store, &dir, ids, record)?;
    debug!(path, key = %worktree::key_for(ids), "saved snapshot");
    Ok(())
}

/// Delete a solo feature: every index entry containing its ID, every
/// snapshot those entries name, and the feature record itself.
pub fn delete_feature(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    id: &str,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    require_base(store, ws, path)?;
    let dir = ws.version_dir(path);
    for (_, record) in worktree::remove_containing(store, &dir, id)? {
        store.remove(&snapshot_file(ws, path, &record.saved_check_sum))?;
    }
    store.remove(&feature_file(ws, path, id))?;
    build(store, ws, path, ui)
}

/// Flip the persisted state of every feature named `name`, rebuilding each
/// affected file.
pub fn toggle(
    store: &FileStore,
    ws: &Workspace,
    name: &str,
    state: State,
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    if state == State::Dev {
        return Err(VaryError::InvalidState {
            state: state.to_string(),
            reason: "version features are ON/OFF only".to_owned(),
        });
    }

    let all = list_all_features(store, ws)?;
    let mut found = false;
    for (path, features) in &all {
        let mut touched = false;
        for feature in features {
            if feature.name == name {
                found = true;
                touched = true;
                let mut updated = feature.clone();
                updated.state = state;
                store.write_json(&feature_file(ws, path, &feature.id), &updated)?;
            }
        }
        if touched {
            build(store, ws, path, ui)?;
        }
    }

    if found {
        info!(feature = name, state = %state, "version feature toggled");
        Ok(())
    } else {
        Err(VaryError::FeatureNotFound {
            name: name.to_owned(),
        })
    }
}

// ---------------------------------------------------------------------------
// Build — lazy state materialisation
// ---------------------------------------------------------------------------

/// Materialise the currently-ON feature set into the working file.
///
/// Missing combinations are composed by walking from the nearest stored
/// prefix, merging one solo snapshot at a time against the base; every
/// intermediate state is cached in the index on the way.
pub fn build(store: &FileStore, ws: &Workspace, path: &str, ui: &mut dyn ResolverUi) -> Result<()> {
    require_base(store, ws, path)?;
    let dir = ws.version_dir(path);
    let features = list_features(store, ws, path)?;
    let target = on_ids(&features);

    if target.is_empty() {
        store.copy(&base_file(ws, path), &ws.abs(path))?;
        return Ok(());
    }

    if let Some(record) = worktree::find(store, &dir, &target)? {
        store.copy(&snapshot_file(ws, path, &record.saved_check_sum), &ws.abs(path))?;
        return Ok(());
    }

    let (mut prefix, remaining) = worktree::nearest_prefix(store, &dir, &target)?;
    if prefix.is_empty() {
        return Err(VaryError::PrefixNotFound);
    }
    let prefix_record = worktree::find_required(store, &dir, &prefix)?;

    let scratch = ws.merge_tmp();
    store.copy(
        &snapshot_file(ws, path, &prefix_record.saved_check_sum),
        &scratch,
    )?;
    let mut state_label = names_for(&features, &prefix).join("+");

    for id in remaining {
        let solo = worktree::find_required(store, &dir, std::slice::from_ref(&id))?;
        let feature_label = names_for(&features, std::slice::from_ref(&id)).join("+");

        merge::merge_resolving(
            store,
            ws,
            &scratch,
            &base_file(ws, path),
            &snapshot_file(ws, path, &solo.saved_check_sum),
            &state_label,
            &feature_label,
            &format!("Building a new state for {state_label} and {feature_label}"),
            ui,
        )?;

        prefix.push(id);
        prefix.sort_unstable();
        state_label = format!("{state_label}+{feature_label}");

        let checksum = store.checksum(&scratch)?;
        let record = SnapshotRecord::new(&prefix, checksum);
        store.copy(&scratch, &snapshot_file(ws, path, &record.saved_check_sum))?;
        worktree::add(store, &dir, &prefix, record)?;
    }

    store.copy(&scratch, &ws.abs(path))?;
    store.remove(&scratch)?;
    debug!(path, "materialised state");
    Ok(())
}

/// Whether the working file diverged from its materialised state.
///
/// Checksum comparison is whole-string equality on the hex digests.
pub fn has_untracked_changes(store: &FileStore, ws: &Workspace, path: &str) -> Result<bool> {
    require_base(store, ws, path)?;
    let features = list_features(store, ws, path)?;
    let target = on_ids(&features);
    let live = store.checksum(&ws.abs(path))?;

    if target.is_empty() {
        let base_checksum = store.checksum(&base_file(ws, path))?;
        return Ok(live != base_checksum);
    }

    let record = worktree::find_required(store, &ws.version_dir(path), &target)?;
    Ok(live != record.file_check_sum)
}

// ---------------------------------------------------------------------------
// Rebase
// ---------------------------------------------------------------------------

/// Make the file's current contents the new base: merge them into every
/// stored snapshot (old base as ancestor), install them as `base`, rebuild.
pub fn rebase(store: &FileStore, ws: &Workspace, path: &str, ui: &mut dyn ResolverUi) -> Result<()> {
    require_base(store, ws, path)?;
    let dir = ws.version_dir(path);
    let features = list_features(store, ws, path)?;
    let tree = worktree::load(store, &dir)?;

    for (key, record) in &tree {
        let ids = worktree::parse_key(key);
        let label = names_for(&features, &ids).join("+");

        merge::merge_resolving(
            store,
            ws,
            &snapshot_file(ws, path, &record.saved_check_sum),
            &base_file(ws, path),
            &ws.abs(path),
            &label,
            "New base",
            &format!("Merging {label} with the new base"),
            ui,
        )?;

        store.remove(&snapshot_file(ws, path, &record.saved_check_sum))?;
        let checksum = store.checksum(&ws.merge_tmp())?;
        let new_record = SnapshotRecord::new(&ids, checksum);
        store.copy(
            &ws.merge_tmp(),
            &snapshot_file(ws, path, &new_record.saved_check_sum),
        )?;
        worktree::add(store, &dir, &ids, new_record)?;
    }

    store.copy(&ws.abs(path), &base_file(ws, path))?;
    store.remove(&ws.merge_tmp())?;
    info!(path, "rebased");
    build(store, ws, path, ui)
}

// ---------------------------------------------------------------------------
// Promote / demote
// ---------------------------------------------------------------------------

/// Fold the feature set named by `names` into the base of every file that
/// holds exactly that set, merging the promoted content into every other
/// stored snapshot.
pub fn promote(
    store: &FileStore,
    ws: &Workspace,
    names: &[String],
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    for path in ws.tracked_paths(store, &ws.versions_dir())? {
        promote_on_path(store, ws, &path, names, ui)?;
    }
    Ok(())
}

/// Discard the feature set named by `names` from every file that holds it.
pub fn demote(
    store: &FileStore,
    ws: &Workspace,
    names: &[String],
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    for path in ws.tracked_paths(store, &ws.versions_dir())? {
        demote_on_path(store, ws, &path, names, ui)?;
    }
    Ok(())
}

/// The index key of `path` whose member names equal `names` as a set.
fn matching_key(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    names: &[String],
) -> Result<Option<(Vec<String>, SnapshotRecord)>> {
    let features = list_features(store, ws, path)?;
    let tree = worktree::load(store, &ws.version_dir(path))?;
    let mut wanted: Vec<&String> = names.iter().collect();
    wanted.sort();

    for (key, record) in &tree {
        let ids = worktree::parse_key(key);
        if ids.len() != names.len() {
            continue;
        }
        let mut entry_names = names_for(&features, &ids);
        entry_names.sort();
        if entry_names.iter().collect::<Vec<_>>() == wanted {
            return Ok(Some((ids, record.clone())));
        }
    }
    Ok(None)
}

/// Remove every index entry sharing an element with `ids`, plus their
/// snapshots and feature records.
fn purge_ids(store: &FileStore, ws: &Workspace, path: &str, ids: &[String]) -> Result<()> {
    let dir = ws.version_dir(path);
    for id in ids {
        for (_, record) in worktree::remove_containing(store, &dir, id)? {
            store.remove(&snapshot_file(ws, path, &record.saved_check_sum))?;
        }
        store.remove(&feature_file(ws, path, id))?;
    }
    Ok(())
}

fn promote_on_path(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    names: &[String],
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    let Some((ids, record)) = matching_key(store, ws, path, names)? else {
        return Ok(());
    };
    let dir = ws.version_dir(path);
    let features = list_features(store, ws, path)?;
    let promoted = ws.feature_tmp();
    store.copy(&snapshot_file(ws, path, &record.saved_check_sum), &promoted)?;

    purge_ids(store, ws, path, &ids)?;

    let remaining = worktree::load(store, &dir)?;
    if remaining.is_empty() {
        store.copy(&promoted, &ws.abs(path))?;
        store.remove(&promoted)?;
        store.remove_dir(&dir)?;
        info!(path, "promoted into working file; no states remain");
        return Ok(());
    }

    let promoted_label = names.join("+");
    for (key, old) in &remaining {
        let key_ids = worktree::parse_key(key);
        let label = names_for(&features, &key_ids).join("+");

        merge::merge_resolving(
            store,
            ws,
            &promoted,
            &base_file(ws, path),
            &snapshot_file(ws, path, &old.saved_check_sum),
            &promoted_label,
            &label,
            &format!("Merging promoted {promoted_label} with {label}"),
            ui,
        )?;

        store.remove(&snapshot_file(ws, path, &old.saved_check_sum))?;
        let checksum = store.checksum(&ws.merge_tmp())?;
        let new_record = SnapshotRecord::new(&key_ids, checksum);
        store.copy(
            &ws.merge_tmp(),
            &snapshot_file(ws, path, &new_record.saved_check_sum),
        )?;
        worktree::add(store, &dir, &key_ids, new_record)?;
    }

    store.copy(&promoted, &base_file(ws, path))?;
    store.remove(&promoted)?;
    store.remove(&ws.merge_tmp())?;
    info!(path, promoted = %promoted_label, "promoted into base");
    build(store, ws, path, ui)
}

fn demote_on_path(
    store: &FileStore,
    ws: &Workspace,
    path: &str,
    names: &[String],
    ui: &mut dyn ResolverUi,
) -> Result<()> {
    let Some((ids, _)) = matching_key(store, ws, path, names)? else {
        return Ok(());
    };
    let dir = ws.version_dir(path);
    purge_ids(store, ws, path, &ids)?;

    let remaining = worktree::load(store, &dir)?;
    if remaining.is_empty() {
        store.copy(&base_file(ws, path), &ws.abs(path))?;
        store.remove_dir(&dir)?;
        info!(path, "demoted; base restored");
        return Ok(());
    }
    build(store, ws, path, ui)
}

/// Remove a file's version directory outright (the file was deleted).
pub fn handle_deleted(store: &FileStore, ws: &Workspace, path: &str) -> Result<()> {
    store.remove_dir(&ws.version_dir(path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
