//! The `.features/` workspace: layout, initialisation, repair.
//!
//! One workspace per repository, rooted at `<repo>/.features/`. Everything
//! the engines persist lives beneath it:
//!
//! ```text
//! .features/
//!   blocks/<token>/<id>.block      block-engine records
//!   versions/<token>/...           versions-engine store
//!   delimeters                     delimiter registry (historical spelling)
//!   presets                        preset map
//!   merge-tmp, feature-tmp         transient scratch
//! ```
//!
//! `init` wipes and recreates; `check` lazily repairs missing subfolders and
//! default files and only reports false when `.features/` itself is absent.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::delimiters;
use crate::error::{Result, VaryError};
use crate::pathtoken;
use crate::store::FileStore;

/// Name of the workspace directory at the repository root.
pub const FEATURES_DIR: &str = ".features";

/// Snapshot subdirectory inside each versioned-file directory.
pub const WORKING_TREE_DIR: &str = "_wt";

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Resolved workspace rooted at a repository.
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Workspace for the repository at `root`.
    #[must_use]
    pub fn at(root: PathBuf) -> Self {
        Self { root }
    }

    /// Discover the enclosing repository from `dir` and return its workspace.
    pub fn discover(dir: &Path) -> Result<Self> {
        Ok(Self::at(crate::repo::repo_root(dir)?))
    }

    /// The repository root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a repository-relative file.
    #[must_use]
    pub fn abs(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// `<root>/.features`.
    #[must_use]
    pub fn features_dir(&self) -> PathBuf {
        self.root.join(FEATURES_DIR)
    }

    /// `<root>/.features/blocks`.
    #[must_use]
    pub fn blocks_dir(&self) -> PathBuf {
        self.features_dir().join("blocks")
    }

    /// `<root>/.features/versions`.
    #[must_use]
    pub fn versions_dir(&self) -> PathBuf {
        self.features_dir().join("versions")
    }

    /// Per-file block directory for a repository-relative path.
    #[must_use]
    pub fn block_dir(&self, rel: &str) -> PathBuf {
        self.blocks_dir().join(pathtoken::encode(rel))
    }

    /// Per-file versions directory for a repository-relative path.
    #[must_use]
    pub fn version_dir(&self, rel: &str) -> PathBuf {
        self.versions_dir().join(pathtoken::encode(rel))
    }

    /// The delimiter registry file.
    #[must_use]
    pub fn delimiters_file(&self) -> PathBuf {
        self.features_dir().join("delimeters")
    }

    /// The preset map file.
    #[must_use]
    pub fn presets_file(&self) -> PathBuf {
        self.features_dir().join("presets")
    }

    /// Scratch file used by merge materialisation.
    #[must_use]
    pub fn merge_tmp(&self) -> PathBuf {
        self.features_dir().join("merge-tmp")
    }

    /// Scratch file used by promote.
    #[must_use]
    pub fn feature_tmp(&self) -> PathBuf {
        self.features_dir().join("feature-tmp")
    }

    /// Wipe and recreate the workspace with default registry files.
    pub fn init(&self, store: &FileStore) -> Result<()> {
        store.remove_dir(&self.features_dir())?;
        store.create_dir(&self.blocks_dir())?;
        store.create_dir(&self.versions_dir())?;
        store.write_json(&self.delimiters_file(), &delimiters::default_registry())?;
        store.write_json(&self.presets_file(), &BTreeMap::<String, ()>::new())?;
        Ok(())
    }

    /// Repair missing pieces of an existing workspace. Returns `false` only
    /// when `.features/` itself does not exist.
    pub fn check(&self, store: &FileStore) -> Result<bool> {
        if !store.exists(&self.features_dir()) {
            return Ok(false);
        }
        if !store.exists(&self.blocks_dir()) {
            store.create_dir(&self.blocks_dir())?;
        }
        if !store.exists(&self.versions_dir()) {
            store.create_dir(&self.versions_dir())?;
        }
        if !store.exists(&self.delimiters_file()) {
            store.write_json(&self.delimiters_file(), &delimiters::default_registry())?;
        }
        if !store.exists(&self.presets_file()) {
            store.write_json(&self.presets_file(), &BTreeMap::<String, ()>::new())?;
        }
        Ok(true)
    }

    /// Like [`Workspace::check`], but an absent workspace is an error.
    pub fn ensure(&self, store: &FileStore) -> Result<()> {
        if self.check(store)? {
            Ok(())
        } else {
            Err(VaryError::WorkspaceMissing)
        }
    }

    /// Tokens of the per-file directories under `dir`, decoded back to
    /// repository-relative paths. Sorted.
    pub fn tracked_paths(&self, store: &FileStore, dir: &Path) -> Result<Vec<String>> {
        if !store.exists(dir) {
            return Ok(Vec::new());
        }
        let mut paths: Vec<String> = store
            .list_dir(dir)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| {
                p.file_name()
                    .map(|n| pathtoken::decode(&n.to_string_lossy()))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
