//! Per-file working-tree index for the versions engine.
//!
//! A JSON map stored as `working_tree_manager` inside each versioned-file
//! directory. Keys are the canonical string form of a sorted, non-empty set
//! of feature IDs (`"[id1, id2]"`); values name the snapshot that materialises
//! exactly that feature combination:
//!
//! - a single-element key is a *solo feature snapshot*;
//! - a multi-element key is a *state* — the combined effect of those features
//!   being ON together.
//!
//! `savedCheckSum` doubles as the snapshot's file name inside `_wt/`, and is
//! derived from the member IDs plus the content checksum, so re-saving a
//! state under new content always lands in a fresh blob.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, VaryError};
use crate::store::FileStore;

/// File name of the index inside a versioned-file directory.
pub const WORKING_TREE_FILE: &str = "working_tree_manager";

// ---------------------------------------------------------------------------
// SnapshotRecord
// ---------------------------------------------------------------------------

/// Index value: identifies and validates one snapshot blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    /// SHA-256 of the snapshot's bytes; detects user edits.
    pub file_check_sum: String,
    /// Name of the snapshot file inside `_wt/`.
    pub saved_check_sum: String,
}

impl SnapshotRecord {
    /// Build a record for the given feature set and content checksum.
    #[must_use]
    pub fn new(ids: &[String], file_check_sum: String) -> Self {
        let saved_check_sum = saved_checksum(ids, &file_check_sum);
        Self {
            file_check_sum,
            saved_check_sum,
        }
    }
}

/// `savedCheckSum = sha256_hex(id1 ∥ … ∥ idn ∥ fileCheckSum)`, over the
/// sorted id list.
#[must_use]
pub fn saved_checksum(ids: &[String], file_check_sum: &str) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    for id in sorted {
        hasher.update(id.as_bytes());
    }
    hasher.update(file_check_sum.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    use std::fmt::Write as _;
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// The index: canonical key → snapshot record.
pub type WorkingTree = BTreeMap<String, SnapshotRecord>;

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Canonical key form: sort the IDs, join with `", "`, wrap in brackets.
#[must_use]
pub fn key_for(ids: &[String]) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    format!("[{}]", sorted.join(", "))
}

/// Split a canonical key back into its ID list.
#[must_use]
pub fn parse_key(key: &str) -> Vec<String> {
    key.trim_matches(['[', ']'])
        .split(", ")
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

fn index_file(dir: &Path) -> std::path::PathBuf {
    dir.join(WORKING_TREE_FILE)
}

/// Write an empty index into `dir`.
pub fn create(store: &FileStore, dir: &Path) -> Result<()> {
    store.write_json(&index_file(dir), &WorkingTree::new())
}

/// Load the index from `dir`.
pub fn load(store: &FileStore, dir: &Path) -> Result<WorkingTree> {
    store.read_json(&index_file(dir))
}

/// Save the index into `dir`.
pub fn save(store: &FileStore, dir: &Path, tree: &WorkingTree) -> Result<()> {
    store.write_json(&index_file(dir), tree)
}

/// Insert or overwrite the record for a feature set.
pub fn add(store: &FileStore, dir: &Path, ids: &[String], record: SnapshotRecord) -> Result<()> {
    let mut tree = load(store, dir)?;
    tree.insert(key_for(ids), record);
    save(store, dir, &tree)
}

/// Remove one key. Unknown keys are ignored.
pub fn remove(store: &FileStore, dir: &Path, key: &str) -> Result<()> {
    let mut tree = load(store, dir)?;
    tree.remove(key);
    save(store, dir, &tree)
}

/// Remove every key whose ID list contains `id` (element equality, never
/// substring matching) and return the removed records.
pub fn remove_containing(
    store: &FileStore,
    dir: &Path,
    id: &str,
) -> Result<Vec<(String, SnapshotRecord)>> {
    let mut tree = load(store, dir)?;
    let doomed: Vec<String> = tree
        .keys()
        .filter(|key| parse_key(key).iter().any(|member| member == id))
        .cloned()
        .collect();
    let mut removed = Vec::with_capacity(doomed.len());
    for key in doomed {
        if let Some(record) = tree.remove(&key) {
            removed.push((key, record));
        }
    }
    save(store, dir, &tree)?;
    Ok(removed)
}

/// Look up the record for a feature set, if present.
pub fn find(store: &FileStore, dir: &Path, ids: &[String]) -> Result<Option<SnapshotRecord>> {
    let tree = load(store, dir)?;
    Ok(tree.get(&key_for(ids)).cloned())
}

/// Like [`find`], but a missing key is an error.
pub fn find_required(store: &FileStore, dir: &Path, ids: &[String]) -> Result<SnapshotRecord> {
    find(store, dir, ids)?.ok_or_else(|| VaryError::StateNotFound { key: key_for(ids) })
}

/// Longest stored prefix of `target` (compared element-by-element in sorted
/// order across every key), and the target elements not covered by it.
pub fn nearest_prefix(
    store: &FileStore,
    dir: &Path,
    target: &[String],
) -> Result<(Vec<String>, Vec<String>)> {
    if target.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    let mut sorted_target: Vec<String> = target.to_vec();
    sorted_target.sort_unstable();

    let tree = load(store, dir)?;
    let mut best: Vec<String> = Vec::new();
    for key in tree.keys() {
        let members = parse_key(key);
        let mut current = Vec::new();
        for (member, want) in members.iter().zip(&sorted_target) {
            if member == want {
                current.push(member.clone());
            } else {
                break;
            }
        }
        if current.len() > best.len() {
            best = current;
        }
    }

    let remaining: Vec<String> = sorted_target
        .into_iter()
        .filter(|id| !best.contains(id))
        .collect();
    Ok((best, remaining))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
