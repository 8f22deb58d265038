//! Blocks engine — inline feature variants inside tracked files.
//!
//! Each `@feature`/`@default` region in a file has one record under
//! `.features/blocks/<token>/<id>.block`. The record tracks the region's
//! state and, while a branch is hidden (ON or OFF), carries that branch in
//! `swapContent` so every toggle is lossless:
//!
//! | from \ to | ON | OFF | DEV |
//! |-----------|----|-----|-----|
//! | DEV | feature only, swap := default | default only, swap := feature | — |
//! | OFF | feature := swap, swap := default | — | both restored, swap := "" |
//! | ON  | default := swap, swap := feature | — | both restored, swap := "" |
//!
//! The invariant: the visible branch plus `swapContent` always reconstruct
//! the full FEATURE+DEFAULT region.
//!
//! Records are created and garbage-collected by the sync pass
//! ([`handle_block`]), never by hand.

pub mod parse;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::delimiters;
use crate::error::{Result, VaryError};
use crate::state::State;
use crate::store::FileStore;
use crate::workspace::Workspace;

use parse::{Region, RegionKind};

// ---------------------------------------------------------------------------
// BlockFeature
// ---------------------------------------------------------------------------

/// Persistent record for one region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFeature {
    /// 25-hex region identifier; also the record's file name.
    pub id: String,
    /// Feature name shown to the user.
    pub name: String,
    /// Current state of the region.
    pub state: State,
    /// Sweep flag used only during sync.
    pub synced: bool,
    /// The hidden branch while `state` is ON or OFF; empty in DEV.
    pub swap_content: String,
}

// ---------------------------------------------------------------------------
// Record storage
// ---------------------------------------------------------------------------

fn record_file(ws: &Workspace, path: &str, id: &str) -> std::path::PathBuf {
    ws.block_dir(path).join(format!("{id}.block"))
}

/// All records for one file, sorted by ID (the record file name).
pub fn list_blocks(store: &FileStore, ws: &Workspace, path: &str) -> Result<Vec<BlockFeature>> {
    let dir = ws.block_dir(path);
    if !store.exists(&dir) {
        return Ok(Vec::new());
    }
    let mut records = Vec::new();
    for entry in store.list_dir(&dir)? {
        if entry.extension().is_some_and(|e| e == "block") {
            records.push(store.read_json::<BlockFeature>(&entry)?);
        }
    }
    Ok(records)
}

/// Records for every tracked file, keyed by repository-relative path.
pub fn list_all_blocks(
    store: &FileStore,
    ws: &Workspace,
) -> Result<BTreeMap<String, Vec<BlockFeature>>> {
    let mut out = BTreeMap::new();
    for path in ws.tracked_paths(store, &ws.blocks_dir())? {
        let records = list_blocks(store, ws, &path)?;
        out.insert(path, records);
    }
    Ok(out)
}

fn write_block(store: &FileStore, ws: &Workspace, path: &str, record: &BlockFeature) -> Result<()> {
    store.write_json(&record_file(ws, path, &record.id), record)
}

/// Remove a record file, then the whole directory once no records remain.
fn remove_block(store: &FileStore, ws: &Workspace, path: &str, id: &str) -> Result<()> {
    store.remove(&record_file(ws, path, id))?;
    if list_blocks(store, ws, path)?.is_empty() {
        store.remove_dir(&ws.block_dir(path))?;
    }
    Ok(())
}

fn require_feature(
    blocks: &BTreeMap<String, Vec<BlockFeature>>,
    name: &str,
) -> Result<()> {
    let known = blocks
        .values()
        .flatten()
        .any(|record| record.name == name);
    if known {
        Ok(())
    } else {
        Err(VaryError::FeatureNotFound {
            name: name.to_owned(),
        })
    }
}

fn find_region<'a>(regions: &'a [Region], record: &BlockFeature) -> Option<&'a Region> {
    regions
        .iter()
        .find(|region| region.id == record.id && region.name == record.name)
}

fn file_regions(store: &FileStore, ws: &Workspace, path: &str) -> Result<(String, Vec<Region>)> {
    let registry = delimiters::load(store, &ws.delimiters_file())?;
    let delimiter = delimiters::for_path(&registry, path);
    let text = store.read_string(&ws.abs(path))?;
    let regions = parse::extract(path, &text, &delimiter);
    Ok((text, regions))
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

/// Flip every region named `name` to `target`, across all tracked files.
pub fn toggle(store: &FileStore, ws: &Workspace, name: &str, target: State) -> Result<()> {
    let blocks = list_all_blocks(store, ws)?;
    require_feature(&blocks, name)?;

    for (path, records) in &blocks {
        let (mut text, regions) = file_regions(store, ws, path)?;
        let mut dirty = false;

        for record in records {
            if record.name != name {
                continue;
            }
            let Some(region) = find_region(&regions, record) else {
                continue;
            };
            let Some((next_kind, next_record)) = transition(region, record, target) else {
                continue;
            };

            let replacement = region.with_kind(next_kind).render(true);
            text = parse::replace_region(&text, &region.text, &replacement);
            dirty = true;
            write_block(store, ws, path, &next_record)?;
        }

        if dirty {
            store.write(&ws.abs(path), text.as_bytes())?;
        }
    }

    debug!(feature = name, state = %target, "block feature toggled");
    Ok(())
}

/// One step of the region state machine. Returns the region's next shape and
/// the updated record, or `None` for a no-op transition.
fn transition(
    region: &Region,
    record: &BlockFeature,
    target: State,
) -> Option<(RegionKind, BlockFeature)> {
    let mut next = record.clone();
    next.state = target;

    let kind = match (record.state, target) {
        (State::Dev, State::On) => {
            next.swap_content = region.default_content().to_owned();
            RegionKind::Feature {
                feature: region.feature_content().to_owned(),
            }
        }
        (State::Dev, State::Off) => {
            next.swap_content = region.feature_content().to_owned();
            RegionKind::Default {
                default: region.default_content().to_owned(),
            }
        }
        (State::Off, State::On) => {
            let feature = record.swap_content.clone();
            next.swap_content = region.default_content().to_owned();
            RegionKind::Feature { feature }
        }
        (State::Off, State::Dev) => {
            next.swap_content = String::new();
            RegionKind::Both {
                feature: record.swap_content.clone(),
                default: region.default_content().to_owned(),
            }
        }
        (State::On, State::Off) => {
            let default = record.swap_content.clone();
            next.swap_content = region.feature_content().to_owned();
            RegionKind::Default { default }
        }
        (State::On, State::Dev) => {
            next.swap_content = String::new();
            RegionKind::Both {
                feature: region.feature_content().to_owned(),
                default: record.swap_content.clone(),
            }
        }
        _ => return None,
    };
    Some((kind, next))
}

// ---------------------------------------------------------------------------
// Promote / demote
// ---------------------------------------------------------------------------

/// Replace every region named `name` with its feature branch and drop the
/// records. Irreversible.
pub fn promote(store: &FileStore, ws: &Workspace, name: &str) -> Result<()> {
    collapse(store, ws, name, |region, record| match record.state {
        State::Dev | State::On => region.feature_content().to_owned(),
        State::Off => record.swap_content.clone(),
    })
}

/// Replace every region named `name` with its default branch and drop the
/// records. Irreversible.
pub fn demote(store: &FileStore, ws: &Workspace, name: &str) -> Result<()> {
    collapse(store, ws, name, |region, record| match record.state {
        State::Dev | State::Off => region.default_content().to_owned(),
        State::On => record.swap_content.clone(),
    })
}

fn collapse(
    store: &FileStore,
    ws: &Workspace,
    name: &str,
    winning_branch: impl Fn(&Region, &BlockFeature) -> String,
) -> Result<()> {
    let blocks = list_all_blocks(store, ws)?;
    require_feature(&blocks, name)?;

    for (path, records) in &blocks {
        let (mut text, regions) = file_regions(store, ws, path)?;
        let mut dirty = false;

        for record in records {
            if record.name != name {
                continue;
            }
            let Some(region) = find_region(&regions, record) else {
                continue;
            };
            text = parse::replace_region(&text, &region.text, &winning_branch(region, record));
            dirty = true;
            remove_block(store, ws, path, &record.id)?;
        }

        if dirty {
            store.write(&ws.abs(path), text.as_bytes())?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sync discovery
// ---------------------------------------------------------------------------

/// Reconcile one file's regions with its records.
///
/// New regions are normalised on disk to the FEATURE+DEFAULT form with an ID
/// token and recorded in DEV state; records whose region vanished are swept
/// away; a file with no regions loses its block directory entirely.
pub fn handle_block(store: &FileStore, ws: &Workspace, path: &str) -> Result<()> {
    let abs = ws.abs(path);
    if !store.exists(&abs) {
        return Ok(());
    }

    let (mut text, regions) = file_regions(store, ws, path)?;
    let dir = ws.block_dir(path);

    if regions.is_empty() {
        store.remove_dir(&dir)?;
        return Ok(());
    }
    if !store.exists(&dir) {
        store.create_dir(&dir)?;
        store.write(&dir.join("_path"), path.as_bytes())?;
    }

    let mut records = list_blocks(store, ws, path)?;
    for record in &mut records {
        record.synced = false;
    }

    let mut dirty = false;
    for region in &regions {
        if region.id_found
            && let Some(record) = records.iter_mut().find(|r| r.id == region.id)
        {
            record.synced = true;
            continue;
        }

        // A region the engine has not seen: capture both branches on disk.
        let normalised = region.with_kind(RegionKind::Both {
            feature: region.feature_content().to_owned(),
            default: region.default_content().to_owned(),
        });
        text = parse::replace_region(&text, &region.text, &normalised.render(true));
        dirty = true;

        records.push(BlockFeature {
            id: region.id.clone(),
            name: region.name.clone(),
            state: State::Dev,
            synced: true,
            swap_content: String::new(),
        });
        debug!(feature = %region.name, id = %region.id, path, "discovered block region");
    }

    if dirty {
        store.write(&abs, text.as_bytes())?;
    }

    // A re-discovered region may reuse a stale record's id; the fresh
    // record wins and the stale one must not sweep its file away.
    let synced_ids: std::collections::BTreeSet<&str> = records
        .iter()
        .filter(|r| r.synced)
        .map(|r| r.id.as_str())
        .collect();
    for record in &records {
        if record.synced {
            write_block(store, ws, path, record)?;
        } else if !synced_ids.contains(record.id.as_str()) {
            remove_block(store, ws, path, &record.id)?;
        }
    }
    Ok(())
}

/// Remove a file's block directory outright (the file was deleted).
pub fn handle_deleted(store: &FileStore, ws: &Workspace, path: &str) -> Result<()> {
    store.remove_dir(&ws.block_dir(path))
}

/// All distinct block feature names across the workspace.
pub fn feature_names(store: &FileStore, ws: &Workspace) -> Result<Vec<String>> {
    let mut names: Vec<String> = list_all_blocks(store, ws)?
        .values()
        .flatten()
        .map(|record| record.name.clone())
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "fn main() {\n// @feature(alpha-mode) //\nlet x = 1;\n// @default(alpha-mode) //\nlet x = 0;\n// !feature //\n}\n";

    fn fixture() -> (FileStore, tempfile::TempDir, Workspace) {
        let store = FileStore::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::at(dir.path().to_path_buf());
        ws.init(&store).unwrap();
        (store, dir, ws)
    }

    fn seed_file(store: &FileStore, ws: &Workspace, path: &str, content: &str) {
        store.write(&ws.abs(path), content.as_bytes()).unwrap();
        handle_block(store, ws, path).unwrap();
    }

    // -- sync discovery --

    #[test]
    fn sync_creates_dev_record_and_inserts_id() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);

        let records = list_blocks(&store, &ws, "main.go").unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "alpha-mode");
        assert_eq!(record.state, State::Dev);
        assert_eq!(record.swap_content, "");

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert!(text.contains(&format!("@feature(alpha-mode) {}", record.id)));
        assert!(store.exists(&ws.block_dir("main.go").join("_path")));
    }

    #[test]
    fn sync_is_idempotent() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        let text_after_first = store.read_string(&ws.abs("main.go")).unwrap();
        let records_first = list_blocks(&store, &ws, "main.go").unwrap();

        handle_block(&store, &ws, "main.go").unwrap();
        assert_eq!(store.read_string(&ws.abs("main.go")).unwrap(), text_after_first);
        assert_eq!(list_blocks(&store, &ws, "main.go").unwrap(), records_first);
    }

    #[test]
    fn sync_gc_removes_vanished_regions() {
        let (store, _dir, ws) = fixture();
        let two_regions = format!(
            "{FILE}// @feature(beta-mode) //\ny();\n// !feature //\n"
        );
        seed_file(&store, &ws, "main.go", &two_regions);
        assert_eq!(list_blocks(&store, &ws, "main.go").unwrap().len(), 2);

        // Drop the beta region from the file.
        seed_file(&store, &ws, "main.go", FILE);
        let records = list_blocks(&store, &ws, "main.go").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "alpha-mode");
    }

    #[test]
    fn sync_removes_dir_when_no_regions_remain() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        assert!(store.exists(&ws.block_dir("main.go")));

        seed_file(&store, &ws, "main.go", "fn main() {}\n");
        assert!(!store.exists(&ws.block_dir("main.go")));
    }

    // -- toggle state machine --

    #[test]
    fn dev_to_on_hides_default_branch() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        toggle(&store, &ws, "alpha-mode", State::On).unwrap();

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert!(text.contains("let x = 1;"));
        assert!(!text.contains("let x = 0;"));
        assert!(!text.contains("@default"));

        let record = &list_blocks(&store, &ws, "main.go").unwrap()[0];
        assert_eq!(record.state, State::On);
        assert_eq!(record.swap_content, "\nlet x = 0;\n");
    }

    #[test]
    fn dev_to_off_hides_feature_branch() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        toggle(&store, &ws, "alpha-mode", State::Off).unwrap();

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert!(!text.contains("let x = 1;"));
        assert!(text.contains("let x = 0;"));

        let record = &list_blocks(&store, &ws, "main.go").unwrap()[0];
        assert_eq!(record.state, State::Off);
        assert_eq!(record.swap_content, "\nlet x = 1;\n");
    }

    #[test]
    fn dev_on_dev_roundtrip_is_identity() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        let normalised = store.read_string(&ws.abs("main.go")).unwrap();

        toggle(&store, &ws, "alpha-mode", State::On).unwrap();
        toggle(&store, &ws, "alpha-mode", State::Dev).unwrap();

        assert_eq!(store.read_string(&ws.abs("main.go")).unwrap(), normalised);
        let record = &list_blocks(&store, &ws, "main.go").unwrap()[0];
        assert_eq!(record.state, State::Dev);
        assert_eq!(record.swap_content, "");
    }

    #[test]
    fn dev_off_dev_roundtrip_is_identity() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        let normalised = store.read_string(&ws.abs("main.go")).unwrap();

        toggle(&store, &ws, "alpha-mode", State::Off).unwrap();
        toggle(&store, &ws, "alpha-mode", State::Dev).unwrap();

        assert_eq!(store.read_string(&ws.abs("main.go")).unwrap(), normalised);
    }

    #[test]
    fn off_to_on_swaps_branches_losslessly() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        toggle(&store, &ws, "alpha-mode", State::Off).unwrap();
        toggle(&store, &ws, "alpha-mode", State::On).unwrap();

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert!(text.contains("let x = 1;"));
        assert!(!text.contains("let x = 0;"));

        let record = &list_blocks(&store, &ws, "main.go").unwrap()[0];
        assert_eq!(record.swap_content, "\nlet x = 0;\n");

        // And back to DEV restores everything.
        toggle(&store, &ws, "alpha-mode", State::Dev).unwrap();
        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert!(text.contains("let x = 1;"));
        assert!(text.contains("let x = 0;"));
    }

    #[test]
    fn on_to_on_is_noop() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        toggle(&store, &ws, "alpha-mode", State::On).unwrap();
        let before = store.read_string(&ws.abs("main.go")).unwrap();
        toggle(&store, &ws, "alpha-mode", State::On).unwrap();
        assert_eq!(store.read_string(&ws.abs("main.go")).unwrap(), before);
    }

    #[test]
    fn toggle_unknown_feature_fails() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        assert!(matches!(
            toggle(&store, &ws, "no-such-feature", State::On),
            Err(VaryError::FeatureNotFound { .. })
        ));
    }

    #[test]
    fn toggle_spans_multiple_files() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "a.go", FILE);
        seed_file(&store, &ws, "b.go", FILE);
        toggle(&store, &ws, "alpha-mode", State::On).unwrap();

        for path in ["a.go", "b.go"] {
            let text = store.read_string(&ws.abs(path)).unwrap();
            assert!(!text.contains("let x = 0;"), "{path} still shows default");
        }
    }

    // -- promote / demote --

    #[test]
    fn promote_installs_feature_branch_and_drops_record() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        promote(&store, &ws, "alpha-mode").unwrap();

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert_eq!(text, "fn main() {\n\nlet x = 1;\n\n}\n");
        assert!(!store.exists(&ws.block_dir("main.go")));
    }

    #[test]
    fn promote_off_region_uses_swap_content() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        toggle(&store, &ws, "alpha-mode", State::Off).unwrap();
        promote(&store, &ws, "alpha-mode").unwrap();

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert!(text.contains("let x = 1;"));
        assert!(!text.contains("let x = 0;"));
    }

    #[test]
    fn demote_installs_default_branch() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        demote(&store, &ws, "alpha-mode").unwrap();

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert_eq!(text, "fn main() {\n\nlet x = 0;\n\n}\n");
        assert!(!store.exists(&ws.block_dir("main.go")));
    }

    #[test]
    fn demote_on_region_uses_swap_content() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        toggle(&store, &ws, "alpha-mode", State::On).unwrap();
        demote(&store, &ws, "alpha-mode").unwrap();

        let text = store.read_string(&ws.abs("main.go")).unwrap();
        assert!(text.contains("let x = 0;"));
        assert!(!text.contains("let x = 1;"));
    }

    // -- misc --

    #[test]
    fn feature_names_are_sorted_and_deduped() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "a.go", FILE);
        seed_file(&store, &ws, "b.go", FILE);
        assert_eq!(feature_names(&store, &ws).unwrap(), vec!["alpha-mode".to_owned()]);
    }

    #[test]
    fn handle_deleted_drops_directory() {
        let (store, _dir, ws) = fixture();
        seed_file(&store, &ws, "main.go", FILE);
        handle_deleted(&store, &ws, "main.go").unwrap();
        assert!(!store.exists(&ws.block_dir("main.go")));
    }

    #[test]
    fn record_serializes_with_camel_case() {
        let record = BlockFeature {
            id: "x".repeat(25),
            name: "alpha-mode".into(),
            state: State::On,
            synced: false,
            swap_content: "body".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"swapContent\""));
        assert!(json.contains("\"state\":\"ON\""));
    }
}
